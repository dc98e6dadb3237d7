//! Swept hexahedral meshes of volumes.
//!
//! The bottom face mesh is stacked into `N` layers along the depth edges:
//! layer 0 is the bottom face, layer `N - 1` the top face (meshed as a copy
//! of the bottom, so local indices match). Intermediate boundary nodes come
//! from the structured side faces and the depth edges; intermediate interior
//! nodes belong to the volume and are interpolated between bottom and top.

use std::path::Path;

use log::{debug, info};
use nalgebra::{Point3, Vector3};

use crate::algo::quality::hex_volume;
use crate::algo::sweep::SweepTopology;
use crate::error::{MeshError, Result};
use crate::geometry::{Model, VolumeId};
use crate::io::{CellKind, UnstructuredGrid};
use crate::options::MeshOptions;

use super::edge::EdgeMesh;
use super::face::{FaceMesh, FaceMeshType};
use super::node::NodeKey;
use super::numbering::NumberingContext;
use super::{edge_mesh, face_mesh, key_point, resolve_key};

/// The hexahedral mesh of one swept volume.
#[derive(Debug)]
pub struct VolumeMesh<'m> {
    model: &'m Model,
    volume: VolumeId,
    sweep: Option<SweepTopology>,
    num_depth: usize,
    layer_size: usize,
    points: Vec<Point3<f64>>,
    keys: Vec<NodeKey>,
    hexes: Vec<[usize; 8]>,
    node_nums: Vec<Option<usize>>,
    meshed: bool,
}

impl<'m> VolumeMesh<'m> {
    /// Create an unmeshed volume mesh.
    pub fn new(model: &'m Model, volume: VolumeId) -> Self {
        Self {
            model,
            volume,
            sweep: None,
            num_depth: 0,
            layer_size: 0,
            points: Vec::new(),
            keys: Vec::new(),
            hexes: Vec::new(),
            node_nums: Vec::new(),
            meshed: false,
        }
    }

    /// Use an already analyzed sweep decomposition.
    pub fn with_sweep(mut self, sweep: SweepTopology) -> Self {
        self.sweep = Some(sweep);
        self
    }

    /// The meshed volume.
    pub fn volume(&self) -> VolumeId {
        self.volume
    }

    /// Mesh the volume by sweeping its bottom face mesh.
    ///
    /// Every bounding face must be meshed: side faces structured and the top
    /// face copied from the bottom. The number of layers is the common point
    /// count of the depth edges.
    pub fn mesh(&mut self, options: &MeshOptions, edges: &[EdgeMesh], faces: &[FaceMesh]) -> Result<()> {
        options.validate()?;
        self.meshed = false;
        self.points.clear();
        self.keys.clear();
        self.hexes.clear();
        self.node_nums.clear();

        let volume = self.volume;
        let sweep = match self.sweep.take() {
            Some(s) => s,
            None => SweepTopology::analyze(self.model, volume)?,
        };
        let result = self.mesh_sweep(&sweep, edges, faces);
        self.sweep = Some(sweep);
        result?;

        self.node_nums = vec![None; self.points.len()];
        self.meshed = true;
        info!(
            "{:?}: {} layers of {} nodes, {} hexes",
            volume,
            self.num_depth,
            self.layer_size,
            self.hexes.len()
        );
        Ok(())
    }

    fn mesh_sweep(&mut self, sweep: &SweepTopology, edges: &[EdgeMesh], faces: &[FaceMesh]) -> Result<()> {
        let volume = self.volume;
        let err = |msg: String| MeshError::topology(volume, msg);

        for &f in self.model.volume(volume).faces() {
            let fm = face_mesh(faces, f)?;
            if !fm.is_meshed() {
                return Err(err(format!("bounding face {:?} has not been meshed", f)));
            }
        }
        for side in sweep.side_faces.values() {
            if face_mesh(faces, side.face)?.mesh_type() != FaceMeshType::Structured {
                return Err(err(format!("side face {:?} is not structured", side.face)));
            }
        }
        let bottom = face_mesh(faces, sweep.bottom)?;
        let top = face_mesh(faces, sweep.top)?;
        if top.source() != Some(sweep.bottom) {
            return Err(err(format!(
                "top face {:?} was not meshed from {:?}",
                sweep.top, sweep.bottom
            )));
        }

        let mut depth_counts = Vec::new();
        for e in sweep.depth_edge_list() {
            depth_counts.push(edge_mesh(edges, e)?.num_points()?);
        }
        let n = depth_counts.first().copied().unwrap_or(0);
        if n < 2 || depth_counts.iter().any(|&c| c != n) {
            return Err(err(format!("depth edges disagree on the layer count: {:?}", depth_counts)));
        }

        let reference = sweep
            .reference_depth_edge()
            .ok_or_else(|| err("sweep has no depth edges".to_string()))?;
        let (_, ref_points) = edge_mesh(edges, reference.edge)?.mesh_points()?;
        let mut along: Vec<Point3<f64>> = ref_points.to_vec();
        if !reference.upward {
            along.reverse();
        }
        let mut fractions = vec![0.0; n];
        for k in 1..n {
            fractions[k] = fractions[k - 1] + (along[k] - along[k - 1]).norm();
        }
        let total = fractions[n - 1];
        for f in fractions.iter_mut() {
            *f = if total > 0.0 { *f / total } else { 0.0 };
        }

        let (_, bottom_points) = bottom.mesh_points()?;
        let (_, top_points) = top.mesh_points()?;
        let size = bottom_points.len();
        let num_fixed = bottom.num_fixed_points()?;
        let num_free = size - num_fixed;
        if top_points.len() != size {
            return Err(err(format!(
                "top face has {} nodes, bottom face has {}",
                top_points.len(),
                size
            )));
        }

        self.keys.reserve(n * size);
        self.points.reserve(n * size);
        for i in 0..size {
            self.keys.push(bottom.node_key(i)?);
            self.points.push(bottom_points[i]);
        }
        for k in 1..n - 1 {
            for i in 0..size {
                let key = match bottom.node_key(i)? {
                    NodeKey::Vertex(v) => {
                        let d = sweep
                            .depth_edges
                            .get(&v)
                            .ok_or_else(|| err(format!("{:?} has no depth edge", v)))?;
                        edge_mesh(edges, d.edge)?.node_key(if d.upward { k } else { n - 1 - k })?
                    }
                    NodeKey::Edge(e, j) => {
                        let side = sweep
                            .side_faces
                            .get(&e)
                            .ok_or_else(|| err(format!("{:?} has no side face", e)))?;
                        let m = edge_mesh(edges, e)?.num_points()?;
                        let along = if side.reversed { m - 1 - j } else { j };
                        face_mesh(faces, side.face)?.structured_node(side.position, along, k)?
                    }
                    NodeKey::Face(_, free) => NodeKey::Volume(volume, (k - 1) * num_free + free),
                    other => return Err(err(format!("unexpected bottom node {:?}", other))),
                };
                let point = match key {
                    NodeKey::Volume(..) => {
                        let t = fractions[k];
                        Point3::from(bottom_points[i].coords * (1.0 - t) + top_points[i].coords * t)
                    }
                    _ => key_point(key, self.model, edges, faces)?,
                };
                self.keys.push(key);
                self.points.push(point);
            }
        }
        for i in 0..size {
            self.keys.push(top.node_key(i)?);
            self.points.push(top_points[i]);
        }

        let mut quads = bottom.local_connectivity()?.to_vec();
        let hex_at = |q: &[usize; 4], k: usize| -> [usize; 8] {
            let (lo, hi) = (k * size, (k + 1) * size);
            [
                q[0] + lo,
                q[1] + lo,
                q[2] + lo,
                q[3] + lo,
                q[0] + hi,
                q[1] + hi,
                q[2] + hi,
                q[3] + hi,
            ]
        };
        // summed quad normals, (p2 - p0) x (p3 - p1) points to the top for a
        // quad that is counter-clockwise seen from above
        let normal = quads.iter().fold(Vector3::<f64>::zeros(), |acc, q| {
            let p = q.map(|v| bottom_points[v]);
            acc + (p[2] - p[0]).cross(&(p[3] - p[1]))
        });
        let rise = along[n - 1] - along[0];
        if normal.dot(&rise) < 0.0 {
            debug!("{:?}: bottom quads face away from the sweep, flipping", volume);
            for q in quads.iter_mut() {
                *q = [q[0], q[3], q[2], q[1]];
            }
        }
        let mut hexes = Vec::with_capacity((n - 1) * quads.len());
        for k in 0..n - 1 {
            for q in &quads {
                let hex = hex_at(q, k);
                let estimate = hex_volume(&hex.map(|v| self.points[v]));
                if !(estimate > 0.0) {
                    return Err(MeshError::DegenerateElement {
                        element: hexes.len(),
                        volume: estimate,
                    });
                }
                hexes.push(hex);
            }
        }

        self.hexes = hexes;
        self.num_depth = n;
        self.layer_size = size;
        Ok(())
    }

    fn check(&self) -> Result<()> {
        if self.meshed {
            Ok(())
        } else {
            Err(MeshError::not_meshed(self.volume))
        }
    }

    /// Whether `mesh()` has succeeded.
    pub fn is_meshed(&self) -> bool {
        self.meshed
    }

    /// Number of node layers, bottom and top included.
    pub fn num_depth_points(&self) -> Result<usize> {
        self.check()?;
        Ok(self.num_depth)
    }

    /// Number of boundary loops of the swept face.
    pub fn num_face_loops(&self) -> Result<usize> {
        self.check()?;
        Ok(self.sweep.as_ref().map_or(0, |s| s.num_face_loops))
    }

    /// Nodes per layer.
    pub fn layer_size(&self) -> Result<usize> {
        self.check()?;
        Ok(self.layer_size)
    }

    /// Node positions, layer by layer.
    pub fn mesh_points(&self) -> Result<&[Point3<f64>]> {
        self.check()?;
        Ok(&self.points)
    }

    /// Logical node of point `i`.
    pub fn node_key(&self, i: usize) -> Result<NodeKey> {
        self.check()?;
        self.keys
            .get(i)
            .copied()
            .ok_or_else(|| MeshError::InvalidState(format!("{:?} has no point {}", self.volume, i)))
    }

    /// Hexahedra in volume-local indices, VTK node order.
    pub fn local_connectivity(&self) -> Result<&[[usize; 8]]> {
        self.check()?;
        Ok(&self.hexes)
    }

    /// Number the interior layer nodes owned by the volume and take every
    /// other number from its owner. Returns how many numbers were assigned.
    pub fn set_node_nums(
        &mut self,
        ctx: &mut NumberingContext,
        edges: &[EdgeMesh],
        faces: &[FaceMesh],
    ) -> Result<usize> {
        self.check()?;
        let mut count = 0;
        for (i, &key) in self.keys.iter().enumerate() {
            match key {
                NodeKey::Volume(..) => {
                    if self.node_nums[i].is_none() {
                        self.node_nums[i] = Some(ctx.next_num());
                        count += 1;
                    }
                }
                _ => self.node_nums[i] = Some(resolve_key(key, ctx, edges, faces)?),
            }
        }
        Ok(count)
    }

    /// Global number of point `i`.
    pub fn node_num(&self, i: usize) -> Result<usize> {
        self.check()?;
        self.node_nums.get(i).copied().flatten().ok_or_else(|| {
            MeshError::InvalidState(format!("{:?} point {} is not numbered", self.volume, i))
        })
    }

    /// Global numbers of all points.
    pub fn node_nums(&self) -> Result<Vec<usize>> {
        self.check()?;
        (0..self.points.len()).map(|i| self.node_num(i)).collect()
    }

    /// Write the hexahedra as legacy VTK.
    pub fn write_to_vtk<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.check()?;
        UnstructuredGrid::new(format!("{:?}", self.volume))
            .with_points(self.points.clone())
            .with_cells(CellKind::Hexahedron, &self.hexes)
            .save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{shapes, EdgeId, FaceId};
    use std::collections::HashSet;

    /// Mesh edges and faces of a single swept volume by hand.
    fn prepare<'m>(
        model: &'m Model,
        plane_points: usize,
        depth_points: impl Fn(EdgeId) -> usize,
    ) -> (SweepTopology, Vec<EdgeMesh<'m>>, Vec<FaceMesh<'m>>) {
        let sweep = SweepTopology::analyze(model, VolumeId::new(0)).unwrap();
        let depth: HashSet<EdgeId> = sweep.depth_edge_list().into_iter().collect();
        let options = MeshOptions::default();
        let edges: Vec<EdgeMesh> = model
            .edge_ids()
            .map(|e| {
                let mut em = EdgeMesh::new(model, e);
                let n = if depth.contains(&e) { depth_points(e) } else { plane_points };
                em.mesh_with_points(&options, n).unwrap();
                em
            })
            .collect();
        let mut faces: Vec<FaceMesh> = model.face_ids().map(|f| FaceMesh::new(model, f)).collect();
        for f in model.face_ids() {
            if f != sweep.top {
                faces[f.index()]
                    .mesh(&options, 0.3, FaceMeshType::Structured, &edges)
                    .unwrap();
            }
        }
        let mut top = FaceMesh::new(model, sweep.top);
        top.mesh_from_source(&options, &faces[sweep.bottom.index()], &sweep, &edges)
            .unwrap();
        faces[sweep.top.index()] = top;
        (sweep, edges, faces)
    }

    #[test]
    fn test_block_layers() {
        let model = shapes::block(1.0, 1.0, 2.0).unwrap();
        let (sweep, edges, faces) = prepare(&model, 4, |_| 5);
        let mut volume = VolumeMesh::new(&model, VolumeId::new(0)).with_sweep(sweep);
        volume.mesh(&MeshOptions::default(), &edges, &faces).unwrap();

        assert_eq!(volume.num_depth_points().unwrap(), 5);
        assert_eq!(volume.num_face_loops().unwrap(), 1);
        assert_eq!(volume.layer_size().unwrap(), 16);
        assert_eq!(volume.mesh_points().unwrap().len(), 80);
        let hexes = volume.local_connectivity().unwrap();
        assert_eq!(hexes.len(), 4 * 9);
        let points = volume.mesh_points().unwrap();
        for hex in hexes {
            let v = hex_volume(&hex.map(|i| points[i]));
            assert!((v - 1.0 / 18.0).abs() < 1e-9);
        }
        // second layer sits at z = 0.5
        for p in &points[16..32] {
            assert!((p.z - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_holed_block_sweeps() {
        let model = shapes::holed_block(4.0, 3.0, 0.75, 1.0).unwrap();
        let sweep = SweepTopology::analyze(&model, VolumeId::new(0)).unwrap();
        let options = MeshOptions::default();
        let depth: HashSet<EdgeId> = sweep.depth_edge_list().into_iter().collect();
        let edges: Vec<EdgeMesh> = model
            .edge_ids()
            .map(|e| {
                let mut em = EdgeMesh::new(&model, e);
                if depth.contains(&e) {
                    em.mesh_with_points(&options, 3).unwrap();
                } else {
                    em.mesh(&options, 0.5).unwrap();
                }
                em
            })
            .collect();
        let mut faces: Vec<FaceMesh> = model.face_ids().map(|f| FaceMesh::new(&model, f)).collect();
        for f in model.face_ids().filter(|&f| f != sweep.top) {
            faces[f.index()]
                .mesh(&options, 0.5, FaceMeshType::Structured, &edges)
                .unwrap();
        }
        let mut top = FaceMesh::new(&model, sweep.top);
        top.mesh_from_source(&options, &faces[sweep.bottom.index()], &sweep, &edges)
            .unwrap();
        faces[sweep.top.index()] = top;

        let mut volume = VolumeMesh::new(&model, VolumeId::new(0));
        volume.mesh(&options, &edges, &faces).unwrap();
        assert_eq!(volume.num_face_loops().unwrap(), 2);
        let quads = faces[sweep.bottom.index()].local_connectivity().unwrap().len();
        assert_eq!(volume.local_connectivity().unwrap().len(), 2 * quads);
    }

    #[test]
    fn test_curved_sides_all_positive() {
        let model = shapes::holed_block(2.0, 1.5, 0.4, 1.0).unwrap();
        let (sweep, edges, faces) = prepare(&model, 4, |_| 4);
        let bottom = sweep.bottom;
        let mut volume = VolumeMesh::new(&model, VolumeId::new(0)).with_sweep(sweep);
        volume.mesh(&MeshOptions::default(), &edges, &faces).unwrap();
        assert_eq!(volume.num_face_loops().unwrap(), 2);

        let quads = faces[bottom.index()].local_connectivity().unwrap().len();
        let hexes = volume.local_connectivity().unwrap();
        assert_eq!(hexes.len(), 3 * quads);
        let points = volume.mesh_points().unwrap();
        for hex in hexes {
            let p = hex.map(|i| points[i]);
            assert!(hex_volume(&p) > 0.0);
            let normal = (p[2] - p[0]).cross(&(p[3] - p[1]));
            let lower = (p[0].coords + p[1].coords + p[2].coords + p[3].coords) / 4.0;
            let upper = (p[4].coords + p[5].coords + p[6].coords + p[7].coords) / 4.0;
            assert!(normal.dot(&(upper - lower)) > 0.0);
        }
    }

    #[test]
    fn test_mismatched_depth_edge_rejected() {
        let model = shapes::block(1.0, 1.0, 1.0).unwrap();
        let sweep = SweepTopology::analyze(&model, VolumeId::new(0)).unwrap();
        let odd = sweep.depth_edge_list()[0];
        let options = MeshOptions::default();
        let edges: Vec<EdgeMesh> = model
            .edge_ids()
            .map(|e| {
                let mut em = EdgeMesh::new(&model, e);
                em.mesh_with_points(&options, if e == odd { 4 } else { 3 }).unwrap();
                em
            })
            .collect();
        let mut faces: Vec<FaceMesh> = model.face_ids().map(|f| FaceMesh::new(&model, f)).collect();
        for f in model.face_ids().filter(|&f| f != sweep.top) {
            faces[f.index()]
                .mesh(&options, 0.5, FaceMeshType::Structured, &edges)
                .unwrap();
        }
        let mut top = FaceMesh::new(&model, sweep.top);
        top.mesh_from_source(&options, &faces[sweep.bottom.index()], &sweep, &edges)
            .unwrap();
        faces[sweep.top.index()] = top;

        let mut volume = VolumeMesh::new(&model, VolumeId::new(0));
        let err = volume.mesh(&options, &edges, &faces).unwrap_err();
        assert!(matches!(err, MeshError::Topology { .. }));
        assert!(volume.local_connectivity().is_err());
    }

    #[test]
    fn test_unmeshed_face_is_topology_error() {
        let model = shapes::block(1.0, 1.0, 1.0).unwrap();
        let (_, edges, mut faces) = prepare(&model, 3, |_| 3);
        faces[2] = FaceMesh::new(&model, FaceId::new(2));
        let mut volume = VolumeMesh::new(&model, VolumeId::new(0));
        let err = volume.mesh(&MeshOptions::default(), &edges, &faces).unwrap_err();
        assert!(matches!(err, MeshError::Topology { .. }));
    }

    #[test]
    fn test_numbering_shares_side_nodes() {
        let model = shapes::block(1.0, 1.0, 1.0).unwrap();
        let (sweep, mut edges, mut faces) = prepare(&model, 3, |_| 4);
        let mut volume = VolumeMesh::new(&model, VolumeId::new(0)).with_sweep(sweep);
        volume.mesh(&MeshOptions::default(), &edges, &faces).unwrap();

        let mut ctx = NumberingContext::new(model.num_vertices());
        ctx.number_vertices();
        for em in edges.iter_mut() {
            em.set_node_nums(&mut ctx).unwrap();
        }
        for fm in faces.iter_mut() {
            fm.set_node_nums(&mut ctx, &edges).unwrap();
        }
        let before = ctx.num_assigned();
        let owned = volume.set_node_nums(&mut ctx, &edges, &faces).unwrap();
        // one interior node per intermediate layer of a 3 x 3 bottom grid
        assert_eq!(owned, 2);
        assert_eq!(ctx.num_assigned(), before + 2);
        // 3 x 3 x 4 lattice
        assert_eq!(ctx.num_assigned(), 36);

        let nums = volume.node_nums().unwrap();
        let distinct: HashSet<usize> = nums.iter().copied().collect();
        assert_eq!(distinct.len(), nums.len());
    }
}
