//! Whole-model meshing and global numbering.

use std::collections::HashMap;
use std::path::Path;

use log::{debug, info};
use nalgebra::Point3;

use crate::algo::progress::Progress;
use crate::algo::quality::{quad_quality, QualityHistogram};
use crate::algo::sweep::SweepTopology;
use crate::error::{MeshError, Result};
use crate::geometry::{EdgeId, FaceId, Model, VolumeId};
use crate::options::MeshOptions;

use super::edge::EdgeMesh;
use super::face::{FaceMesh, FaceMeshType};
use super::global::GlobalMesh;
use super::numbering::NumberingContext;
use super::volume::VolumeMesh;

/// Passes of the boundary parity adjustment.
const PARITY_PASSES: usize = 3;

const STAGE_EDGES: usize = 0;
const STAGE_FACES: usize = 1;
const STAGE_VOLUMES: usize = 2;
const STAGE_NUMBERING: usize = 3;
const STAGES: usize = 4;

/// Disjoint sets of edges that must share a point count.
struct EdgeGroups {
    parent: Vec<usize>,
}

impl EdgeGroups {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut a: usize) -> usize {
        while self.parent[a] != a {
            self.parent[a] = self.parent[self.parent[a]];
            a = self.parent[a];
        }
        a
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}

/// Point count of every edge before any edge is meshed.
///
/// Starts from the per-edge spacing policy, forces the sweep layer count on
/// depth edges and equal counts on each bottom/top edge pair, then bumps
/// one edge group of every face expected to mesh unstructured with an odd
/// number of boundary segments, so the triangulation can pair up fully.
fn plan_edge_counts(model: &Model, sweeps: &[SweepTopology], htarget: f64) -> Vec<usize> {
    let ne = model.num_edges();
    let mut counts: Vec<usize> = model
        .edge_ids()
        .map(|e| EdgeMesh::point_count(model.edge(e).length(), htarget))
        .collect();
    let mut locked: Vec<Option<usize>> = vec![None; ne];
    let mut groups = EdgeGroups::new(ne);

    for sweep in sweeps {
        let depth = sweep.depth_edge_list();
        let longest = depth
            .iter()
            .map(|&e| model.edge(e).length())
            .fold(0.0, f64::max);
        let layers = EdgeMesh::point_count(longest, htarget);
        for &e in &depth {
            locked[e.index()] = Some(layers.max(locked[e.index()].unwrap_or(0)));
            groups.union(depth[0].index(), e.index());
        }
        for (b, &(t, _)) in &sweep.edge_map {
            groups.union(b.index(), t.index());
        }
    }

    let mut members: HashMap<usize, Vec<usize>> = HashMap::new();
    for e in 0..ne {
        members.entry(groups.find(e)).or_default().push(e);
    }
    for list in members.values() {
        let fixed = list.iter().filter_map(|&e| locked[e]).max();
        let n = fixed.unwrap_or_else(|| list.iter().map(|&e| counts[e]).max().unwrap_or(2));
        for &e in list {
            counts[e] = n;
        }
    }

    let tops: Vec<FaceId> = sweeps.iter().map(|s| s.top).collect();
    for pass in 0..PARITY_PASSES {
        let mut bumped = 0;
        for f in model.face_ids() {
            if tops.contains(&f) {
                continue;
            }
            let face = model.face(f);
            let live: Vec<EdgeId> = face
                .edge_uses()
                .map(|u| u.edge)
                .filter(|&e| !model.edge(e).is_degenerate())
                .collect();
            let structured = face.loops().len() == 1
                && face.loops()[0].len() == 4
                && live.len() == 4
                && counts[live[0].index()] == counts[live[2].index()]
                && counts[live[1].index()] == counts[live[3].index()];
            if structured {
                continue;
            }
            let segments: usize = live.iter().map(|e| counts[e.index()] - 1).sum();
            if segments % 2 == 0 {
                continue;
            }
            let candidate = live
                .iter()
                .copied()
                .filter(|&e| {
                    let root = groups.find(e.index());
                    members[&root].iter().all(|&m| locked[m].is_none())
                })
                .max_by(|a, b| {
                    model
                        .edge(*a)
                        .length()
                        .total_cmp(&model.edge(*b).length())
                        .then(b.index().cmp(&a.index()))
                });
            match candidate {
                Some(e) => {
                    let root = groups.find(e.index());
                    for &m in &members[&root] {
                        counts[m] += 1;
                    }
                    debug!("{:?}: odd boundary, {:?} gets {} points", f, e, counts[e.index()]);
                    bumped += 1;
                }
                None => debug!("{:?}: odd boundary and no adjustable edge", f),
            }
        }
        debug!("parity pass {}: {} faces adjusted", pass, bumped);
        if bumped == 0 {
            break;
        }
    }
    counts
}

/// A meshing session over one model.
///
/// Entity meshes are created unmeshed by [`Mesh::new`] and filled by
/// [`Mesh::mesh`], which also assembles the [`GlobalMesh`].
#[derive(Debug)]
pub struct Mesh<'m> {
    model: &'m Model,
    edges: Vec<EdgeMesh<'m>>,
    faces: Vec<FaceMesh<'m>>,
    volumes: Vec<VolumeMesh<'m>>,
    global: Option<GlobalMesh>,
}

impl<'m> Mesh<'m> {
    /// Create a session with every entity unmeshed.
    pub fn new(model: &'m Model) -> Self {
        Self {
            model,
            edges: model.edge_ids().map(|e| EdgeMesh::new(model, e)).collect(),
            faces: model.face_ids().map(|f| FaceMesh::new(model, f)).collect(),
            volumes: model.volume_ids().map(|v| VolumeMesh::new(model, v)).collect(),
            global: None,
        }
    }

    /// The meshed model.
    pub fn model(&self) -> &'m Model {
        self.model
    }

    /// Mesh every edge, face and volume at target size `htarget`, then
    /// number all nodes.
    pub fn mesh(&mut self, options: &MeshOptions, htarget: f64) -> Result<()> {
        self.mesh_with_progress(options, htarget, &Progress::none())
    }

    /// Like [`Mesh::mesh`], reporting progress through four stages: edges,
    /// faces, volumes and numbering.
    pub fn mesh_with_progress(
        &mut self,
        options: &MeshOptions,
        htarget: f64,
        progress: &Progress,
    ) -> Result<()> {
        options.validate()?;
        if !(htarget > 0.0) || !htarget.is_finite() {
            return Err(MeshError::invalid_param("htarget", htarget, "must be positive"));
        }
        self.global = None;
        let model = self.model;

        let sweeps: Vec<SweepTopology> = model
            .volume_ids()
            .map(|v| SweepTopology::analyze(model, v))
            .collect::<Result<_>>()?;
        let mut targets: HashMap<FaceId, usize> = HashMap::new();
        for (i, sweep) in sweeps.iter().enumerate() {
            if let Some(prev) = targets.insert(sweep.top, i) {
                return Err(MeshError::topology(
                    sweep.top,
                    format!(
                        "face is the sweep target of both {:?} and {:?}",
                        sweeps[prev].volume, sweep.volume
                    ),
                ));
            }
        }

        let counts = plan_edge_counts(model, &sweeps, htarget);
        let ne = counts.len();
        for (k, (em, &n)) in self.edges.iter_mut().zip(&counts).enumerate() {
            progress.report_sub(k, ne, STAGE_EDGES, STAGES, "meshing edges");
            em.mesh_with_points(options, n)?;
        }

        let nf = self.faces.len();
        let mut done = 0;
        for fm in self.faces.iter_mut() {
            if targets.contains_key(&fm.face()) {
                continue;
            }
            progress.report_sub(done, nf, STAGE_FACES, STAGES, "meshing faces");
            fm.mesh(options, htarget, FaceMeshType::Structured, &self.edges)?;
            done += 1;
        }

        // targets may themselves be sources of a later sweep
        let mut pending: Vec<usize> = targets.values().copied().collect();
        pending.sort_unstable();
        while !pending.is_empty() {
            let before = pending.len();
            let mut waiting = Vec::new();
            for i in pending {
                let sweep = &sweeps[i];
                if !self.faces[sweep.bottom.index()].is_meshed() {
                    waiting.push(i);
                    continue;
                }
                progress.report_sub(done, nf, STAGE_FACES, STAGES, "copying sweep targets");
                let mut top = FaceMesh::new(model, sweep.top);
                top.mesh_from_source(options, &self.faces[sweep.bottom.index()], sweep, &self.edges)?;
                self.faces[sweep.top.index()] = top;
                done += 1;
            }
            if waiting.len() == before {
                return Err(MeshError::InvalidState(format!(
                    "sweep sources of {:?} are never meshed",
                    waiting.iter().map(|&i| sweeps[i].volume).collect::<Vec<VolumeId>>()
                )));
            }
            pending = waiting;
        }

        let nv = self.volumes.len();
        for (k, (vm, sweep)) in self.volumes.iter_mut().zip(sweeps).enumerate() {
            progress.report_sub(k, nv, STAGE_VOLUMES, STAGES, "meshing volumes");
            *vm = VolumeMesh::new(model, vm.volume()).with_sweep(sweep);
            vm.mesh(options, &self.edges, &self.faces)?;
        }

        progress.report_sub(0, 1, STAGE_NUMBERING, STAGES, "numbering nodes");
        self.init_mesh()?;
        progress.report_sub(1, 1, STAGE_NUMBERING, STAGES, "done");
        Ok(())
    }

    /// Number every node and assemble the [`GlobalMesh`].
    ///
    /// Vertices are numbered first, then edges, faces and volumes, each in
    /// id order. Every entity must be meshed.
    pub fn init_mesh(&mut self) -> Result<&GlobalMesh> {
        let model = self.model;
        let mut ctx = NumberingContext::new(model.num_vertices());
        ctx.number_vertices();
        for em in self.edges.iter_mut() {
            em.set_node_nums(&mut ctx)?;
        }
        for fm in self.faces.iter_mut() {
            fm.set_node_nums(&mut ctx, &self.edges)?;
        }
        for vm in self.volumes.iter_mut() {
            vm.set_node_nums(&mut ctx, &self.edges, &self.faces)?;
        }

        let mut slots: Vec<Option<Point3<f64>>> = vec![None; ctx.num_assigned()];
        for v in model.vertex_ids() {
            slots[ctx.vertex_num(v)?] = Some(model.vertex(v).point());
        }
        for em in &self.edges {
            let (_, points) = em.mesh_points()?;
            for (i, &p) in points.iter().enumerate() {
                slots[em.node_num(i)?] = Some(p);
            }
        }
        for fm in &self.faces {
            let (_, points) = fm.mesh_points()?;
            for (i, &p) in points.iter().enumerate() {
                slots[fm.node_num(i)?] = Some(p);
            }
        }
        for vm in &self.volumes {
            for (i, &p) in vm.mesh_points()?.iter().enumerate() {
                slots[vm.node_num(i)?] = Some(p);
            }
        }
        let points = slots
            .into_iter()
            .enumerate()
            .map(|(n, p)| {
                p.ok_or_else(|| MeshError::InvalidState(format!("node {} has no position", n)))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut quads = Vec::new();
        for fm in &self.faces {
            let nums = fm.node_nums()?;
            quads.extend(fm.local_connectivity()?.iter().map(|q| q.map(|v| nums[v])));
        }
        let mut hexes = Vec::new();
        for vm in &self.volumes {
            let nums = vm.node_nums()?;
            hexes.extend(vm.local_connectivity()?.iter().map(|h| h.map(|v| nums[v])));
        }

        info!(
            "global mesh: {} nodes, {} quads, {} hexes",
            points.len(),
            quads.len(),
            hexes.len()
        );
        Ok(self.global.insert(GlobalMesh {
            points,
            quads,
            hexes,
        }))
    }

    /// The assembled mesh.
    pub fn global(&self) -> Result<&GlobalMesh> {
        self.global
            .as_ref()
            .ok_or_else(|| MeshError::InvalidState("model has not been meshed".to_string()))
    }

    /// Mesh of one edge.
    pub fn edge_mesh(&self, id: EdgeId) -> Result<&EdgeMesh<'m>> {
        self.global()?;
        super::edge_mesh(&self.edges, id)
    }

    /// Mesh of one face.
    pub fn face_mesh(&self, id: FaceId) -> Result<&FaceMesh<'m>> {
        self.global()?;
        super::face_mesh(&self.faces, id)
    }

    /// Mesh of one volume.
    pub fn volume_mesh(&self, id: VolumeId) -> Result<&VolumeMesh<'m>> {
        self.global()?;
        self.volumes
            .get(id.index())
            .ok_or_else(|| MeshError::InvalidState(format!("no mesh for {:?}", id)))
    }

    /// Node positions by global number.
    pub fn mesh_points(&self) -> Result<&[Point3<f64>]> {
        Ok(&self.global()?.points)
    }

    /// All face quads in global numbering.
    pub fn quad_connectivity(&self) -> Result<&[[usize; 4]]> {
        Ok(&self.global()?.quads)
    }

    /// All volume hexahedra in global numbering.
    pub fn hex_connectivity(&self) -> Result<&[[usize; 8]]> {
        Ok(&self.global()?.hexes)
    }

    /// Quad quality over every face.
    pub fn quad_quality(&self, nbins: usize) -> Result<QualityHistogram> {
        let global = self.global()?;
        let mut hist = QualityHistogram::new(nbins);
        for q in &global.quads {
            hist.add(quad_quality(&q.map(|v| global.points[v])));
        }
        Ok(hist)
    }

    /// Write the assembled mesh as legacy VTK.
    pub fn write_to_vtk<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.global()?.write_to_vtk(path)
    }

    /// Write the assembled surface mesh as Nastran bulk data.
    pub fn write_to_bdf<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.global()?.write_to_bdf(path)
    }

    /// Build a new model from the assembled surface mesh.
    pub fn create_model_from_mesh(&self) -> Result<Model> {
        self.global()?.to_model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::quality::hex_volume;
    use crate::geometry::{shapes, EdgeUse, LineSegment, Plane, VertexId};
    use crate::io::UnstructuredGrid;
    use crate::mesh::NodeKey;
    use nalgebra::Point2;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    fn polygon(corners: &[(f64, f64)]) -> Model {
        let mut model = Model::new();
        let v: Vec<VertexId> = corners
            .iter()
            .map(|&(x, y)| model.add_vertex(Point3::new(x, y, 0.0)))
            .collect();
        let mut uses = Vec::new();
        for k in 0..v.len() {
            let (a, b) = (v[k], v[(k + 1) % v.len()]);
            let seg = LineSegment::new(model.vertex(a).point(), model.vertex(b).point());
            uses.push(EdgeUse::fwd(model.add_edge(seg, a, b).unwrap()));
        }
        model
            .add_face(Plane::xy(0.0, Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)), vec![uses])
            .unwrap();
        model
    }

    /// Two unit squares side by side sharing the edge x = 1.
    fn two_squares() -> Model {
        let mut model = Model::new();
        let pts = [(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (0.0, 1.0), (1.0, 1.0), (2.0, 1.0)];
        let v: Vec<VertexId> = pts
            .iter()
            .map(|&(x, y)| model.add_vertex(Point3::new(x, y, 0.0)))
            .collect();
        let mut line = |a: usize, b: usize| {
            let seg = LineSegment::new(model.vertex(v[a]).point(), model.vertex(v[b]).point());
            model.add_edge(seg, v[a], v[b]).unwrap()
        };
        let (b0, b1, shared, r, t0, t1, l) =
            (line(0, 1), line(1, 2), line(1, 4), line(2, 5), line(4, 3), line(5, 4), line(3, 0));
        let left = vec![EdgeUse::fwd(b0), EdgeUse::fwd(shared), EdgeUse::fwd(t0), EdgeUse::fwd(l)];
        let right = vec![EdgeUse::fwd(b1), EdgeUse::fwd(r), EdgeUse::fwd(t1), EdgeUse::rev(shared)];
        model
            .add_face(Plane::xy(0.0, Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)), vec![left])
            .unwrap();
        model
            .add_face(Plane::xy(0.0, Point2::new(1.0, 0.0), Point2::new(2.0, 1.0)), vec![right])
            .unwrap();
        model
    }

    #[test]
    fn test_accessors_fail_before_mesh() {
        let model = shapes::rectangle(1.0, 1.0).unwrap();
        let mesh = Mesh::new(&model);
        assert!(matches!(mesh.global(), Err(MeshError::InvalidState(_))));
        assert!(mesh.mesh_points().is_err());
        assert!(mesh.face_mesh(FaceId::new(0)).is_err());
        assert!(mesh.create_model_from_mesh().is_err());
    }

    #[test]
    fn test_shared_edge_numbers_agree() {
        let model = two_squares();
        let mut mesh = Mesh::new(&model);
        mesh.mesh(&MeshOptions::default(), 0.25).unwrap();
        let global = mesh.global().unwrap();
        assert_eq!(global.num_nodes(), 45);
        assert_eq!(global.num_quads(), 32);

        let left = mesh.face_mesh(FaceId::new(0)).unwrap();
        let right = mesh.face_mesh(FaceId::new(1)).unwrap();
        let mut by_key: HashMap<NodeKey, usize> = HashMap::new();
        for i in 0..left.num_fixed_points().unwrap() {
            by_key.insert(left.node_key(i).unwrap(), left.node_num(i).unwrap());
        }
        let mut shared = 0;
        for i in 0..right.num_fixed_points().unwrap() {
            if let Some(&n) = by_key.get(&right.node_key(i).unwrap()) {
                assert_eq!(right.node_num(i).unwrap(), n);
                shared += 1;
            }
        }
        assert_eq!(shared, 5);

        for (n, p) in global.points.iter().enumerate() {
            for q in &global.points[n + 1..] {
                assert!((p - q).norm() > 1e-9, "duplicate node at {:?}", p);
            }
        }
    }

    #[test]
    fn test_zero_length_edge_shares_vertex_node() {
        let mut model = Model::new();
        let v: Vec<VertexId> = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]
            .iter()
            .map(|&(x, y)| model.add_vertex(Point3::new(x, y, 0.0)))
            .collect();
        let corner = model.vertex(v[1]).point();
        let pinch = model.add_edge(LineSegment::new(corner, corner), v[1], v[1]).unwrap();
        let mut uses = Vec::new();
        for k in 0..4 {
            let (a, b) = (v[k], v[(k + 1) % 4]);
            let seg = LineSegment::new(model.vertex(a).point(), model.vertex(b).point());
            uses.push(EdgeUse::fwd(model.add_edge(seg, a, b).unwrap()));
            if k == 0 {
                uses.push(EdgeUse::fwd(pinch));
            }
        }
        model
            .add_face(Plane::xy(0.0, Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)), vec![uses])
            .unwrap();

        let mut mesh = Mesh::new(&model);
        mesh.mesh(&MeshOptions::default(), 0.25).unwrap();
        let nums = mesh.edge_mesh(pinch).unwrap().node_nums().unwrap();
        assert_eq!(nums[0], nums[1]);

        let global = mesh.global().unwrap();
        assert!(global.num_quads() > 0);
        let used: HashSet<usize> = global.quads.iter().flatten().copied().collect();
        assert!(used.iter().all(|&n| n < global.num_nodes()));
        assert_eq!(used.len(), global.num_nodes());
        for (n, p) in global.points.iter().enumerate() {
            for q in &global.points[n + 1..] {
                assert!((p - q).norm() > 1e-9, "duplicate node at {:?}", p);
            }
        }
    }

    #[test]
    fn test_block_sweep() {
        let model = shapes::block(1.0, 1.0, 1.0).unwrap();
        let mut mesh = Mesh::new(&model);
        mesh.mesh(&MeshOptions::default(), 0.5).unwrap();
        let volume = mesh.volume_mesh(VolumeId::new(0)).unwrap();
        assert_eq!(volume.num_depth_points().unwrap(), 3);
        let global = mesh.global().unwrap();
        assert_eq!(global.num_nodes(), 27);
        assert_eq!(global.num_quads(), 24);
        assert_eq!(global.num_hexes(), 8);
        for hex in mesh.hex_connectivity().unwrap() {
            assert!(hex_volume(&hex.map(|v| global.points[v])) > 0.0);
        }
    }

    #[test]
    fn test_holed_block_sweep() {
        let model = shapes::holed_block(4.0, 3.0, 0.75, 1.0).unwrap();
        let mut mesh = Mesh::new(&model);
        mesh.mesh(&MeshOptions::default(), 0.3).unwrap();
        let sweep = SweepTopology::analyze(&model, VolumeId::new(0)).unwrap();
        let bottom = mesh.face_mesh(sweep.bottom).unwrap();
        assert_eq!(bottom.mesh_type(), FaceMeshType::Unstructured);
        let volume = mesh.volume_mesh(VolumeId::new(0)).unwrap();
        let layers = volume.num_depth_points().unwrap();
        assert_eq!(layers, 4);
        let q = bottom.local_connectivity().unwrap().len();
        let global = mesh.global().unwrap();
        assert_eq!(global.num_hexes(), (layers - 1) * q);
        for hex in &global.hexes {
            assert!(hex_volume(&hex.map(|v| global.points[v])) > 0.0);
        }
        let used: HashSet<usize> = global
            .quads
            .iter()
            .flatten()
            .chain(global.hexes.iter().flatten())
            .copied()
            .collect();
        assert_eq!(used.len(), global.num_nodes());
    }

    #[test]
    fn test_odd_boundary_is_bumped() {
        let model = polygon(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]);
        let counts = plan_edge_counts(&model, &[], 0.5);
        assert_eq!(counts, vec![3, 5, 3]);
    }

    #[test]
    fn test_sweep_counts_are_locked() {
        let model = shapes::block(1.0, 2.0, 3.0).unwrap();
        let sweep = SweepTopology::analyze(&model, VolumeId::new(0)).unwrap();
        let counts = plan_edge_counts(&model, std::slice::from_ref(&sweep), 0.5);
        for e in sweep.depth_edge_list() {
            assert_eq!(counts[e.index()], 7);
        }
        for (b, (t, _)) in &sweep.edge_map {
            assert_eq!(counts[b.index()], counts[t.index()]);
        }
    }

    #[test]
    fn test_unstructured_boundaries_even() {
        let model = shapes::plate_with_hole(2.0, 1.0, 0.3).unwrap();
        for h in [0.3, 0.22, 0.17] {
            let counts = plan_edge_counts(&model, &[], h);
            let segments: usize = counts.iter().map(|c| c - 1).sum();
            assert_eq!(segments % 2, 0, "odd boundary at h = {}", h);
        }
    }

    #[test]
    fn test_progress_reaches_total() {
        let model = shapes::l_bracket(1.0).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress = Progress::new(move |current, total, _| {
            if let Ok(mut v) = sink.lock() {
                v.push((current, total));
            }
        });
        let mut mesh = Mesh::new(&model);
        mesh.mesh_with_progress(&MeshOptions::default(), 0.25, &progress).unwrap();
        let seen = seen.lock().unwrap();
        let &(last, total) = seen.last().unwrap();
        assert_eq!(last, total);
        assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
        assert_eq!(seen.len(), model.num_edges() + model.num_faces() + 2);
    }

    #[test]
    fn test_exports_reparse() {
        let dir = tempfile::tempdir().unwrap();
        let model = shapes::plate_with_hole(2.0, 1.0, 0.25).unwrap();
        let mut mesh = Mesh::new(&model);
        mesh.mesh(&MeshOptions::default(), 0.2).unwrap();

        let vtk = dir.path().join("plate.vtk");
        mesh.write_to_vtk(&vtk).unwrap();
        let grid = UnstructuredGrid::load(&vtk).unwrap();
        assert_eq!(grid.num_points(), mesh.mesh_points().unwrap().len());
        assert_eq!(grid.num_cells(), mesh.quad_connectivity().unwrap().len());

        let bdf = dir.path().join("plate.bdf");
        mesh.write_to_bdf(&bdf).unwrap();
        let text = std::fs::read_to_string(&bdf).unwrap();
        let grids = text.lines().filter(|l| l.starts_with("GRID*")).count();
        assert_eq!(grids, mesh.global().unwrap().num_nodes());

        let derived = mesh.create_model_from_mesh().unwrap();
        assert_eq!(derived.num_faces(), mesh.quad_connectivity().unwrap().len());
    }
}
