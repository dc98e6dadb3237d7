//! Sweep decomposition of a volume.
//!
//! A sweepable volume has a bottom face, a top face with the same loop
//! structure, and one four-sided side face per bottom edge. Each side face
//! runs `[bottom edge, depth edge, top edge, depth edge]` around its loop,
//! which gives the bottom-to-top correspondence of vertices and edges.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::error::{MeshError, Result};
use crate::geometry::{EdgeId, EdgeUse, FaceId, Model, VertexId, VolumeId};

/// The side face swept from one bottom edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideFace {
    /// The side face.
    pub face: FaceId,
    /// Position of the bottom edge use within the side face's loop.
    pub position: usize,
    /// Whether that use runs against the bottom edge's parameter direction.
    pub reversed: bool,
}

/// A depth edge joining a bottom vertex to its top image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthEdge {
    /// The edge.
    pub edge: EdgeId,
    /// Whether the edge's parameter runs from bottom to top.
    pub upward: bool,
}

/// Bottom-to-top correspondence of a swept volume.
#[derive(Debug, Clone)]
pub struct SweepTopology {
    /// The volume.
    pub volume: VolumeId,
    /// Source face of the sweep.
    pub bottom: FaceId,
    /// Target face of the sweep.
    pub top: FaceId,
    /// Top image of every bottom vertex.
    pub vertex_map: HashMap<VertexId, VertexId>,
    /// Top image of every bottom edge, with whether it runs in the same
    /// direction as the image of the bottom edge.
    pub edge_map: HashMap<EdgeId, (EdgeId, bool)>,
    /// Side face of every bottom edge.
    pub side_faces: HashMap<EdgeId, SideFace>,
    /// Depth edge of every bottom vertex.
    pub depth_edges: HashMap<VertexId, DepthEdge>,
    /// Number of loops of the bottom face.
    pub num_face_loops: usize,
}

impl SweepTopology {
    /// Decompose `volume`, using its explicit `(bottom, top)` pair if it
    /// has one and otherwise the unique pair of faces that works.
    pub fn analyze(model: &Model, volume: VolumeId) -> Result<Self> {
        let vol = model.volume(volume);
        if let Some((bottom, top)) = vol.sweep() {
            return Self::try_pair(model, volume, bottom, top);
        }

        let faces = vol.faces();
        let mut found = Vec::new();
        for (i, &a) in faces.iter().enumerate() {
            for &b in &faces[i + 1..] {
                if let Ok(sweep) = Self::try_pair(model, volume, a, b) {
                    found.push(sweep);
                }
            }
        }
        match found.len() {
            0 => Err(MeshError::topology(volume, "no bottom/top face pair admits a sweep")),
            1 => Ok(found.remove(0)),
            n => Err(MeshError::topology(
                volume,
                format!("sweep direction is ambiguous ({} candidate face pairs)", n),
            )),
        }
    }

    /// Decompose `volume` as a sweep from `bottom` to `top`.
    pub fn try_pair(model: &Model, volume: VolumeId, bottom: FaceId, top: FaceId) -> Result<Self> {
        let err = |msg: String| MeshError::topology(volume, msg);
        let bottom_face = model.face(bottom);
        let top_face = model.face(top);
        if bottom_face.loops().len() != top_face.loops().len() {
            return Err(err(format!(
                "{:?} and {:?} have different numbers of loops",
                bottom, top
            )));
        }

        let live = |u: &&EdgeUse| !model.edge(u.edge).is_degenerate();
        let bottom_edges: HashSet<EdgeId> =
            bottom_face.edge_uses().filter(live).map(|u| u.edge).collect();
        let top_edges: HashSet<EdgeId> = top_face.edge_uses().filter(live).map(|u| u.edge).collect();
        if bottom_edges.len() != top_edges.len() {
            return Err(err(format!(
                "{:?} and {:?} have different numbers of edges",
                bottom, top
            )));
        }

        let mut sweep = Self {
            volume,
            bottom,
            top,
            vertex_map: HashMap::new(),
            edge_map: HashMap::new(),
            side_faces: HashMap::new(),
            depth_edges: HashMap::new(),
            num_face_loops: bottom_face.loops().len(),
        };

        for &f in model.volume(volume).faces() {
            if f == bottom || f == top {
                continue;
            }
            let loops = model.face(f).loops();
            if loops.len() != 1 || loops[0].len() != 4 {
                return Err(err(format!("side face {:?} is not a single four-sided loop", f)));
            }
            let uses = &loops[0];
            let Some(r) = uses.iter().position(|u| bottom_edges.contains(&u.edge)) else {
                return Err(err(format!("side face {:?} does not touch the bottom face", f)));
            };
            let b = uses[r];
            let d1 = uses[(r + 1) % 4];
            let t = uses[(r + 2) % 4];
            let d0 = uses[(r + 3) % 4];
            if !top_edges.contains(&t.edge) {
                return Err(err(format!("side face {:?} does not reach the top face", f)));
            }
            for d in [d0, d1] {
                if bottom_edges.contains(&d.edge) || top_edges.contains(&d.edge) {
                    return Err(err(format!("side face {:?} has no depth edges", f)));
                }
            }
            if sweep.side_faces.contains_key(&b.edge) {
                return Err(err(format!("{:?} has more than one side face", b.edge)));
            }
            sweep.side_faces.insert(
                b.edge,
                SideFace {
                    face: f,
                    position: r,
                    reversed: b.reversed,
                },
            );

            // b: s -> e, d1: e -> e', t: e' -> s', d0: s' -> s
            let (s, e) = (model.use_start(&b), model.use_end(&b));
            let (s_top, e_top) = (model.use_end(&t), model.use_start(&t));
            sweep.map_vertex(volume, s, s_top)?;
            sweep.map_vertex(volume, e, e_top)?;
            sweep.add_depth_edge(volume, e, DepthEdge { edge: d1.edge, upward: !d1.reversed })?;
            sweep.add_depth_edge(volume, s, DepthEdge { edge: d0.edge, upward: d0.reversed })?;

            let (v0, _) = model.edge(b.edge).vertices();
            let (w0, _) = model.edge(t.edge).vertices();
            let same = sweep.vertex_map.get(&v0) == Some(&w0);
            sweep.edge_map.insert(b.edge, (t.edge, same));
        }

        for e in &bottom_edges {
            if !sweep.side_faces.contains_key(e) {
                return Err(err(format!("{:?} has no side face", e)));
            }
        }
        let images: HashSet<EdgeId> = sweep.edge_map.values().map(|&(t, _)| t).collect();
        if images != top_edges {
            return Err(err(format!(
                "side faces do not map the edges of {:?} onto {:?}",
                bottom, top
            )));
        }

        debug!(
            "{:?}: sweep {:?} -> {:?}, {} side faces, {} loops",
            volume,
            bottom,
            top,
            sweep.side_faces.len(),
            sweep.num_face_loops
        );
        Ok(sweep)
    }

    fn map_vertex(&mut self, volume: VolumeId, b: VertexId, t: VertexId) -> Result<()> {
        if b == t {
            return Err(MeshError::topology(volume, format!("{:?} maps onto itself", b)));
        }
        match self.vertex_map.insert(b, t) {
            Some(prev) if prev != t => Err(MeshError::topology(
                volume,
                format!("{:?} maps to both {:?} and {:?}", b, prev, t),
            )),
            _ => Ok(()),
        }
    }

    fn add_depth_edge(&mut self, volume: VolumeId, v: VertexId, d: DepthEdge) -> Result<()> {
        match self.depth_edges.insert(v, d) {
            Some(prev) if prev != d => Err(MeshError::topology(
                volume,
                format!("{:?} has two depth edges {:?} and {:?}", v, prev.edge, d.edge),
            )),
            _ => Ok(()),
        }
    }

    /// Depth edges of the sweep in a deterministic order.
    pub fn depth_edge_list(&self) -> Vec<EdgeId> {
        let mut list: Vec<EdgeId> = self.depth_edges.values().map(|d| d.edge).collect();
        list.sort_by_key(|e| e.index());
        list.dedup();
        list
    }

    /// The depth edge of the lowest-numbered bottom vertex.
    pub fn reference_depth_edge(&self) -> Option<DepthEdge> {
        self.depth_edges
            .iter()
            .min_by_key(|(v, _)| v.index())
            .map(|(_, &d)| d)
    }
}
