//! Face meshes: quad meshes of model faces in their parameter space.
//!
//! A face mesh stores its boundary ("fixed") points first, in loop order,
//! followed by its interior ("free") points. Fixed points are not copies of
//! anything the face owns: each carries the [`NodeKey`] of the edge or
//! vertex node it reuses, so only the free points are numbered here.
//!
//! Two meshing paths exist, chosen at mesh time:
//!
//! - **Structured**: a four-sided face with matching opposite point counts
//!   gets a transfinite quad grid directly.
//! - **Unstructured**: constrained Delaunay triangulation of the boundary,
//!   frontal refinement, triangle smoothing, blossom recombination into
//!   quads, doublet removal and quad smoothing.

use std::collections::HashMap;
use std::path::Path;

use log::{debug, info, warn};
use nalgebra::{Point2, Point3};

use crate::algo::quality::{quad_quality, tri_quality, QualityHistogram};
use crate::algo::recombine::{recombine, simplify_quads, DualGraph, RecombineReport};
use crate::algo::smooth::{smooth_quads, smooth_triangles, SmoothOptions};
use crate::algo::sweep::SweepTopology;
use crate::algo::triangulate::{refine, triangulate_boundary, StructuredGrid};
use crate::error::{MeshError, Result};
use crate::geometry::{FaceId, Model};
use crate::io::{CellKind, UnstructuredGrid};
use crate::options::MeshOptions;

use super::adjacency::{quad_neighbors, BOUNDARY};
use super::edge::EdgeMesh;
use super::node::{NodeKey, NodeRecord};
use super::numbering::NumberingContext;
use super::{edge_mesh, resolve_key};

/// How a face was meshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaceMeshType {
    /// Not meshed.
    #[default]
    NoMesh,
    /// Transfinite quad grid.
    Structured,
    /// Triangulated and recombined.
    Unstructured,
}

/// Boundary nodes of a face gathered from its edge meshes.
struct Boundary {
    keys: Vec<NodeKey>,
    points: Vec<Point3<f64>>,
    /// Offset of each loop in `keys`, plus a final end offset.
    loop_offsets: Vec<usize>,
    /// Point counts of the edges of the first loop, in use order.
    side_counts: Vec<usize>,
    /// Whether any edge of the face is degenerate.
    has_degenerate: bool,
}

impl Boundary {
    fn gather(model: &Model, face: FaceId, edges: &[EdgeMesh]) -> Result<Self> {
        let mut boundary = Boundary {
            keys: Vec::new(),
            points: Vec::new(),
            loop_offsets: vec![0],
            side_counts: Vec::new(),
            has_degenerate: false,
        };
        for (l, uses) in model.face(face).loops().iter().enumerate() {
            let start = boundary.keys.len();
            for u in uses {
                let em = edge_mesh(edges, u.edge)?;
                if !em.is_meshed() {
                    return Err(MeshError::InvalidState(format!(
                        "{:?} is bounded by {:?}, which has not been meshed",
                        face, u.edge
                    )));
                }
                if l == 0 {
                    boundary.side_counts.push(em.num_points()?);
                }
                // both ends are one vertex, already pushed by the neighbouring use
                if em.is_degenerate()? {
                    boundary.has_degenerate = true;
                    continue;
                }
                let (_, pts) = em.mesh_points()?;
                let n = pts.len();
                // the last point is the first point of the next use
                for s in 0..n - 1 {
                    let j = if u.reversed { n - 1 - s } else { s };
                    boundary.keys.push(em.node_key(j)?);
                    boundary.points.push(pts[j]);
                }
            }
            if boundary.keys.len() - start < 3 {
                return Err(MeshError::topology(
                    face,
                    format!("loop {} has fewer than three boundary points", l),
                ));
            }
            boundary.loop_offsets.push(boundary.keys.len());
        }
        Ok(boundary)
    }

    fn num_loops(&self) -> usize {
        self.loop_offsets.len() - 1
    }

    fn loop_range(&self, l: usize) -> std::ops::Range<usize> {
        self.loop_offsets[l]..self.loop_offsets[l + 1]
    }
}

/// Twice the signed area of a closed polygon.
fn signed_area2(params: &[Point2<f64>]) -> f64 {
    let n = params.len();
    (0..n)
        .map(|k| params[k].coords.perp(&params[(k + 1) % n].coords))
        .sum()
}

/// Twice the summed signed area of a quad list.
fn quads_area2(params: &[Point2<f64>], quads: &[[usize; 4]]) -> f64 {
    quads
        .iter()
        .map(|q| (params[q[2]] - params[q[0]]).perp(&(params[q[3]] - params[q[1]])))
        .sum()
}

fn reversed(q: &[usize; 4]) -> [usize; 4] {
    [q[0], q[3], q[2], q[1]]
}

fn lift(params: &[Point2<f64>]) -> Vec<Point3<f64>> {
    params.iter().map(|p| Point3::new(p.x, p.y, 0.0)).collect()
}

/// The quad mesh of one model face.
#[derive(Debug)]
pub struct FaceMesh<'m> {
    model: &'m Model,
    face: FaceId,
    mesh_type: FaceMeshType,
    params: Vec<Point2<f64>>,
    points: Vec<Point3<f64>>,
    fixed_keys: Vec<NodeKey>,
    quads: Vec<[usize; 4]>,
    grid: Option<StructuredGrid>,
    triangles: Option<(Vec<Point3<f64>>, Vec<[usize; 3]>)>,
    report: Option<RecombineReport>,
    source: Option<FaceId>,
    node_nums: Vec<Option<usize>>,
}

impl<'m> FaceMesh<'m> {
    /// Create an unmeshed face mesh.
    pub fn new(model: &'m Model, face: FaceId) -> Self {
        Self {
            model,
            face,
            mesh_type: FaceMeshType::NoMesh,
            params: Vec::new(),
            points: Vec::new(),
            fixed_keys: Vec::new(),
            quads: Vec::new(),
            grid: None,
            triangles: None,
            report: None,
            source: None,
            node_nums: Vec::new(),
        }
    }

    /// The meshed face.
    pub fn face(&self) -> FaceId {
        self.face
    }

    fn reset(&mut self) {
        self.mesh_type = FaceMeshType::NoMesh;
        self.params.clear();
        self.points.clear();
        self.fixed_keys.clear();
        self.quads.clear();
        self.grid = None;
        self.triangles = None;
        self.report = None;
        self.source = None;
        self.node_nums.clear();
    }

    /// Mesh the face at target size `htarget`.
    ///
    /// Every bounding edge must already be meshed. `requested` selects the
    /// structured path when the face admits it; otherwise the face is meshed
    /// unstructured. Requesting [`FaceMeshType::NoMesh`] clears the mesh.
    pub fn mesh(
        &mut self,
        options: &MeshOptions,
        htarget: f64,
        requested: FaceMeshType,
        edges: &[EdgeMesh],
    ) -> Result<()> {
        options.validate()?;
        if !(htarget > 0.0) || !htarget.is_finite() {
            return Err(MeshError::invalid_param("htarget", htarget, "must be positive"));
        }
        self.reset();
        if requested == FaceMeshType::NoMesh {
            return Ok(());
        }

        let boundary = Boundary::gather(self.model, self.face, edges)?;
        let surface = self.model.face(self.face).surface();
        let params: Vec<Point2<f64>> = boundary
            .points
            .iter()
            .map(|p| surface.inv_eval_point(p))
            .collect();

        let grid = match requested {
            FaceMeshType::Structured => self.structured_grid(&boundary, &params),
            _ => None,
        };
        self.fixed_keys = boundary.keys.clone();
        match grid {
            Some(grid) => self.mesh_structured(grid, params),
            None => self.mesh_unstructured(options, htarget, &boundary, params)?,
        }
        self.node_nums = vec![None; self.params.len()];

        info!(
            "{:?}: {:?}, {} points ({} fixed), {} quads",
            self.face,
            self.mesh_type,
            self.params.len(),
            self.fixed_keys.len(),
            self.quads.len()
        );
        Ok(())
    }

    /// The structured grid of the face, if it admits one.
    fn structured_grid(&self, boundary: &Boundary, params: &[Point2<f64>]) -> Option<StructuredGrid> {
        let counts = &boundary.side_counts;
        if boundary.num_loops() != 1 || counts.len() != 4 || boundary.has_degenerate {
            return None;
        }
        if counts[0] != counts[2] || counts[1] != counts[3] {
            debug!("{:?}: opposite sides differ ({:?}), meshing unstructured", self.face, counts);
            return None;
        }
        let grid = StructuredGrid::new(counts[0], counts[1]);
        if !grid.corners_ok(params) {
            debug!("{:?}: corner angles out of range, meshing unstructured", self.face);
            return None;
        }
        Some(grid)
    }

    fn mesh_structured(&mut self, grid: StructuredGrid, mut params: Vec<Point2<f64>>) {
        let surface = self.model.face(self.face).surface();
        params.extend(grid.interior_params(&params));
        self.points = params.iter().map(|&uv| surface.eval_point(uv)).collect();
        self.params = params;
        self.quads = grid.quads();
        self.grid = Some(grid);
        self.mesh_type = FaceMeshType::Structured;
    }

    fn mesh_unstructured(
        &mut self,
        options: &MeshOptions,
        htarget: f64,
        boundary: &Boundary,
        params: Vec<Point2<f64>>,
    ) -> Result<()> {
        let surface = self.model.face(self.face).surface();
        let num_fixed = params.len();

        let mut segments = Vec::with_capacity(num_fixed);
        for l in 0..boundary.num_loops() {
            let range = boundary.loop_range(l);
            for k in range.clone() {
                let next = if k + 1 == range.end { range.start } else { k + 1 };
                segments.push((k, next));
            }
        }
        // a clockwise outer loop is triangulated reversed, then flipped back
        let flipped = signed_area2(&params[boundary.loop_range(0)]) < 0.0;
        if flipped {
            for s in segments.iter_mut() {
                *s = (s.1, s.0);
            }
        }

        let mut tri = triangulate_boundary(&params, &segments)?;
        if options.dump.init_domain_triangle {
            let (p, t) = tri.interior();
            self.dump(options, "init_domain_triangle", || {
                UnstructuredGrid::new("initial domain triangulation")
                    .with_points(lift(&p))
                    .with_cells(
                        CellKind::Line,
                        &segments.iter().map(|&(a, b)| [a, b]).collect::<Vec<_>>(),
                    )
                    .with_cells(CellKind::Triangle, &t)
            });
        }

        let inserted = refine(&mut tri, surface, htarget, options.frontal_quality_factor);
        let (mut params, tris) = tri.interior();
        debug!(
            "{:?}: {} boundary points, {} inserted, {} triangles",
            self.face,
            num_fixed,
            inserted,
            tris.len()
        );
        if options.dump.pre_smooth_triangle {
            self.dump(options, "pre_smooth_triangle", || {
                UnstructuredGrid::new("triangles before smoothing")
                    .with_points(lift(&params))
                    .with_cells(CellKind::Triangle, &tris)
            });
        }

        let smoothing = SmoothOptions::from(options);
        let rejected = smooth_triangles(&mut params, num_fixed, &tris, &smoothing);
        debug!("{:?}: triangle smoothing dropped {} moves", self.face, rejected);
        if options.dump.post_smooth_triangle {
            self.dump(options, "post_smooth_triangle", || {
                UnstructuredGrid::new("triangles after smoothing")
                    .with_points(lift(&params))
                    .with_cells(CellKind::Triangle, &tris)
            });
        }

        let mut points: Vec<Point3<f64>> = params.iter().map(|&uv| surface.eval_point(uv)).collect();
        let (mut quads, report) = recombine(&tris, &points)?;
        if options.dump.dual_recombine {
            let dual = DualGraph::build(&tris, &points)?;
            let centroids = DualGraph::centroids(&tris, &points);
            let lines: Vec<[usize; 2]> = dual.edges.iter().map(|e| [e.t1, e.t2]).collect();
            let weights: Vec<f64> = dual.edges.iter().map(|e| e.weight).collect();
            self.dump(options, "dual_recombine", || {
                UnstructuredGrid::new("recombination dual graph")
                    .with_points(centroids)
                    .with_cells(CellKind::Line, &lines)
                    .with_quality(weights)
            });
        }
        self.triangles = Some((points.clone(), tris));

        let removed = simplify_quads(
            &mut params,
            &mut points,
            num_fixed,
            &mut quads,
            options.max_simplify_iterations,
        );
        if removed > 0 {
            debug!("{:?}: removed {} doublet nodes", self.face, removed);
        }
        if options.dump.pre_smooth_quad {
            self.dump(options, "pre_smooth_quad", || quad_grid("quads before smoothing", &points, &quads));
        }

        let rejected = smooth_quads(&mut params, num_fixed, &quads, &smoothing);
        debug!("{:?}: quad smoothing dropped {} moves", self.face, rejected);
        for k in num_fixed..params.len() {
            points[k] = surface.eval_point(params[k]);
        }
        if options.dump.post_smooth_quad {
            self.dump(options, "post_smooth_quad", || quad_grid("quads after smoothing", &points, &quads));
        }
        if options.dump.quad_dual {
            let neighbors = quad_neighbors(&quads)?;
            let centroids: Vec<Point3<f64>> = quads
                .iter()
                .map(|q| Point3::from(q.iter().map(|&v| points[v].coords).sum::<nalgebra::Vector3<f64>>() / 4.0))
                .collect();
            let mut lines = Vec::new();
            for (a, n) in neighbors.iter().enumerate() {
                for &b in n {
                    if b != BOUNDARY && a < b {
                        lines.push([a, b]);
                    }
                }
            }
            self.dump(options, "quad_dual", || {
                UnstructuredGrid::new("quad dual graph")
                    .with_points(centroids)
                    .with_cells(CellKind::Line, &lines)
            });
        }

        if flipped {
            for q in quads.iter_mut() {
                *q = reversed(q);
            }
        }
        self.params = params;
        self.points = points;
        self.quads = quads;
        self.report = Some(report);
        self.mesh_type = FaceMeshType::Unstructured;
        Ok(())
    }

    /// Mesh a sweep's target face as a copy of the already meshed source
    /// face.
    ///
    /// Free points and connectivity follow the source. Fixed points are the
    /// images of the source's fixed points under the sweep correspondence,
    /// in the source's order; interior points move with the inverse-distance
    /// weighted boundary displacement and are projected onto this face.
    pub fn mesh_from_source(
        &mut self,
        options: &MeshOptions,
        source: &FaceMesh,
        sweep: &SweepTopology,
        edges: &[EdgeMesh],
    ) -> Result<()> {
        options.validate()?;
        self.reset();
        if source.face != sweep.bottom || self.face != sweep.top {
            return Err(MeshError::topology(
                sweep.volume,
                format!("{:?} is not the sweep image of {:?}", self.face, source.face),
            ));
        }
        source.check()?;

        let boundary = Boundary::gather(self.model, self.face, edges)?;
        let own: HashMap<NodeKey, Point3<f64>> = boundary
            .keys
            .iter()
            .copied()
            .zip(boundary.points.iter().copied())
            .collect();
        if own.len() != source.fixed_keys.len() {
            return Err(MeshError::topology(
                sweep.volume,
                format!(
                    "{:?} has {} boundary points, {:?} has {}",
                    self.face,
                    own.len(),
                    source.face,
                    source.fixed_keys.len()
                ),
            ));
        }

        let mut fixed_keys = Vec::with_capacity(own.len());
        let mut fixed_points = Vec::with_capacity(own.len());
        for &key in &source.fixed_keys {
            let image = image_key(key, sweep, edges)?;
            let Some(&p) = own.get(&image) else {
                return Err(MeshError::topology(
                    sweep.volume,
                    format!("{:?} maps to {:?}, which is not on {:?}", key, image, self.face),
                ));
            };
            fixed_keys.push(image);
            fixed_points.push(p);
        }

        let surface = self.model.face(self.face).surface();
        let num_fixed = fixed_keys.len();
        let mut params: Vec<Point2<f64>> = fixed_points.iter().map(|p| surface.inv_eval_point(p)).collect();
        let mut points = fixed_points.clone();
        let displacement: Vec<_> = fixed_points
            .iter()
            .zip(&source.points[..num_fixed])
            .map(|(t, s)| t - s)
            .collect();
        for p in &source.points[num_fixed..] {
            let mut sum = nalgebra::Vector3::zeros();
            let mut wsum = 0.0;
            let mut snapped = None;
            for (k, s) in source.points[..num_fixed].iter().enumerate() {
                let d2 = (p - s).norm_squared();
                if d2 < 1e-24 {
                    snapped = Some(displacement[k]);
                    break;
                }
                sum += displacement[k] / d2;
                wsum += 1.0 / d2;
            }
            let moved = p + snapped.unwrap_or_else(|| sum / wsum);
            let uv = surface.inv_eval_point(&moved);
            params.push(uv);
            points.push(surface.eval_point(uv));
        }

        let mut quads = source.quads.clone();
        let outer = boundary.loop_range(0);
        let loop_sign = signed_area2(&params_of(&boundary.points[outer], surface));
        if quads_area2(&params, &quads) * loop_sign < 0.0 {
            for q in quads.iter_mut() {
                *q = reversed(q);
            }
        }

        self.fixed_keys = fixed_keys;
        self.params = params;
        self.points = points;
        self.quads = quads;
        self.source = Some(source.face);
        self.mesh_type = source.mesh_type;
        self.node_nums = vec![None; self.params.len()];
        info!(
            "{:?}: copied from {:?}, {} points, {} quads",
            self.face,
            source.face,
            self.params.len(),
            self.quads.len()
        );
        Ok(())
    }

    fn dump<F>(&self, options: &MeshOptions, stage: &str, grid: F)
    where
        F: FnOnce() -> UnstructuredGrid,
    {
        let path = options.dump.path(stage, self.face.index());
        if let Err(e) = grid().save(&path) {
            warn!("{:?}: could not write {}: {}", self.face, path.display(), e);
        }
    }

    fn check(&self) -> Result<()> {
        if self.mesh_type == FaceMeshType::NoMesh {
            Err(MeshError::not_meshed(self.face))
        } else {
            Ok(())
        }
    }

    /// How the face was meshed.
    pub fn mesh_type(&self) -> FaceMeshType {
        self.mesh_type
    }

    /// Whether the face has a mesh.
    pub fn is_meshed(&self) -> bool {
        self.mesh_type != FaceMeshType::NoMesh
    }

    /// The face this mesh was copied from, for a sweep target.
    pub fn source(&self) -> Option<FaceId> {
        self.source
    }

    /// Parameters and positions, fixed points first.
    pub fn mesh_points(&self) -> Result<(&[Point2<f64>], &[Point3<f64>])> {
        self.check()?;
        Ok((&self.params, &self.points))
    }

    /// Number of points.
    pub fn num_points(&self) -> Result<usize> {
        self.check()?;
        Ok(self.params.len())
    }

    /// Number of boundary points.
    pub fn num_fixed_points(&self) -> Result<usize> {
        self.check()?;
        Ok(self.fixed_keys.len())
    }

    /// Logical node of point `i`.
    pub fn node_key(&self, i: usize) -> Result<NodeKey> {
        self.check()?;
        let num_fixed = self.fixed_keys.len();
        if i < num_fixed {
            Ok(self.fixed_keys[i])
        } else if i < self.params.len() {
            Ok(NodeKey::Face(self.face, i - num_fixed))
        } else {
            Err(MeshError::InvalidState(format!("{:?} has no point {}", self.face, i)))
        }
    }

    /// Value view of point `i`.
    pub fn node(&self, i: usize) -> Result<NodeRecord<Point2<f64>>> {
        self.node_key(i)?;
        Ok(NodeRecord {
            param: self.params[i],
            point: self.points[i],
            num: self.node_nums[i],
        })
    }

    /// Quads in face-local indices.
    pub fn local_connectivity(&self) -> Result<&[[usize; 4]]> {
        self.check()?;
        Ok(&self.quads)
    }

    /// Node of a structured face addressed from one of its sides: `along`
    /// points from the start of side `side` (in loop direction) and `depth`
    /// rows into the face.
    pub fn structured_node(&self, side: usize, along: usize, depth: usize) -> Result<NodeKey> {
        self.check()?;
        let grid = self.grid.ok_or_else(|| {
            MeshError::InvalidState(format!("{:?} does not have a structured grid", self.face))
        })?;
        let (nx, ny) = (grid.nx(), grid.ny());
        let (length, width) = if side % 2 == 0 { (nx, ny) } else { (ny, nx) };
        if side > 3 || along >= length || depth >= width {
            return Err(MeshError::InvalidState(format!(
                "{:?} has no structured node ({}, {}, {})",
                self.face, side, along, depth
            )));
        }
        let (i, j) = match side {
            0 => (along, depth),
            1 => (nx - 1 - depth, along),
            2 => (nx - 1 - along, ny - 1 - depth),
            _ => (depth, ny - 1 - along),
        };
        self.node_key(grid.index(i, j))
    }

    /// Take the fixed numbers from the owning edges and vertices, then
    /// number the free points. Returns how many numbers were assigned.
    pub fn set_node_nums(&mut self, ctx: &mut NumberingContext, edges: &[EdgeMesh]) -> Result<usize> {
        self.check()?;
        for (i, &key) in self.fixed_keys.iter().enumerate() {
            self.node_nums[i] = Some(resolve_key(key, ctx, edges, &[])?);
        }
        let mut count = 0;
        for num in self.node_nums[self.fixed_keys.len()..].iter_mut() {
            if num.is_none() {
                *num = Some(ctx.next_num());
                count += 1;
            }
        }
        Ok(count)
    }

    /// Global number of point `i`.
    pub fn node_num(&self, i: usize) -> Result<usize> {
        self.check()?;
        self.node_nums.get(i).copied().flatten().ok_or_else(|| {
            MeshError::InvalidState(format!("{:?} point {} is not numbered", self.face, i))
        })
    }

    /// Global number of free point `i` (counted from the first free point).
    pub fn free_node_num(&self, i: usize) -> Result<usize> {
        self.node_num(self.fixed_keys.len() + i)
    }

    /// Global numbers of all points.
    pub fn node_nums(&self) -> Result<Vec<usize>> {
        self.check()?;
        (0..self.params.len()).map(|i| self.node_num(i)).collect()
    }

    /// Recombination statistics of an unstructured mesh.
    pub fn report(&self) -> Option<RecombineReport> {
        self.report
    }

    /// The mesh as a VTK grid with per-quad quality.
    pub fn to_grid(&self) -> Result<UnstructuredGrid> {
        self.check()?;
        Ok(quad_grid(&format!("{:?}", self.face), &self.points, &self.quads))
    }

    /// Write the quads as legacy VTK.
    pub fn write_to_vtk<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.to_grid()?.save(path)
    }

    /// Add every quad's quality to `counts`, a histogram of `nbins` equal
    /// bins over `[0, 1]`.
    pub fn add_quad_quality(&self, nbins: usize, counts: &mut Vec<usize>) -> Result<()> {
        self.check()?;
        let nbins = nbins.max(1);
        counts.resize(nbins, 0);
        for q in &self.quads {
            let quality = quad_quality(&q.map(|v| self.points[v]));
            let bin = ((quality * nbins as f64) as usize).min(nbins - 1);
            counts[bin] += 1;
        }
        Ok(())
    }

    /// Log the quad quality histogram.
    pub fn print_quad_quality(&self) -> Result<()> {
        self.check()?;
        let mut hist = QualityHistogram::new(10);
        for q in &self.quads {
            hist.add(quad_quality(&q.map(|v| self.points[v])));
        }
        hist.log(&format!("{:?} quad quality", self.face));
        Ok(())
    }

    /// Log the quality histogram of the triangulation that was recombined.
    pub fn print_tri_quality(&self) -> Result<()> {
        self.check()?;
        let Some((points, tris)) = &self.triangles else {
            info!("{:?}: no triangulation recorded", self.face);
            return Ok(());
        };
        let mut hist = QualityHistogram::new(10);
        for t in tris {
            hist.add(tri_quality(&t.map(|v| points[v])));
        }
        hist.log(&format!("{:?} triangle quality", self.face));
        Ok(())
    }
}

fn quad_grid(title: &str, points: &[Point3<f64>], quads: &[[usize; 4]]) -> UnstructuredGrid {
    let quality = quads.iter().map(|q| quad_quality(&q.map(|v| points[v]))).collect();
    UnstructuredGrid::new(title)
        .with_points(points.to_vec())
        .with_cells(CellKind::Quad, quads)
        .with_quality(quality)
}

fn params_of(points: &[Point3<f64>], surface: &dyn crate::geometry::Surface) -> Vec<Point2<f64>> {
    points.iter().map(|p| surface.inv_eval_point(p)).collect()
}

/// Image of a bottom boundary node on the top face of a sweep.
fn image_key(key: NodeKey, sweep: &SweepTopology, edges: &[EdgeMesh]) -> Result<NodeKey> {
    match key {
        NodeKey::Vertex(v) => sweep
            .vertex_map
            .get(&v)
            .map(|&t| NodeKey::Vertex(t))
            .ok_or_else(|| MeshError::topology(sweep.volume, format!("{:?} has no top image", v))),
        NodeKey::Edge(e, j) => {
            let &(t, same) = sweep
                .edge_map
                .get(&e)
                .ok_or_else(|| MeshError::topology(sweep.volume, format!("{:?} has no top image", e)))?;
            let top = edge_mesh(edges, t)?;
            let n = top.num_points()?;
            let source_n = edge_mesh(edges, e)?.num_points()?;
            if n != source_n {
                return Err(MeshError::topology(
                    sweep.volume,
                    format!("{:?} has {} points but its image {:?} has {}", e, source_n, t, n),
                ));
            }
            top.node_key(if same { j } else { n - 1 - j })
        }
        other => Err(MeshError::topology(
            sweep.volume,
            format!("{:?} is not a boundary node", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{shapes, EdgeId, EdgeUse, LineSegment, Plane, VertexId, VolumeId};
    use crate::options::DumpOptions;

    fn mesh_edges<'m>(model: &'m Model, npts: impl Fn(EdgeId) -> usize) -> Vec<EdgeMesh<'m>> {
        let options = MeshOptions::default();
        model
            .edge_ids()
            .map(|e| {
                let mut em = EdgeMesh::new(model, e);
                em.mesh_with_points(&options, npts(e)).unwrap();
                em
            })
            .collect()
    }

    fn mesh_edges_h<'m>(model: &'m Model, h: f64) -> Vec<EdgeMesh<'m>> {
        mesh_edges(model, |e| EdgeMesh::point_count(model.edge(e).length(), h))
    }

    #[test]
    fn test_unit_square_structured_grid() {
        let model = shapes::rectangle(1.0, 1.0).unwrap();
        let edges = mesh_edges(&model, |_| 4);
        let options = MeshOptions::default();
        let mut face = FaceMesh::new(&model, FaceId::new(0));
        face.mesh(&options, 0.25, FaceMeshType::Structured, &edges).unwrap();
        assert_eq!(face.mesh_type(), FaceMeshType::Structured);
        assert_eq!(face.num_points().unwrap(), 16);
        assert_eq!(face.num_fixed_points().unwrap(), 12);
        assert_eq!(face.local_connectivity().unwrap().len(), 9);

        let (params, _) = face.mesh_points().unwrap();
        let third = 1.0 / 3.0;
        for p in &params[12..] {
            let (i, j) = (p.x / third, p.y / third);
            assert!((i - i.round()).abs() < 1e-9 && (j - j.round()).abs() < 1e-9);
        }

        let mut again = FaceMesh::new(&model, FaceId::new(0));
        again.mesh(&options, 0.25, FaceMeshType::Structured, &edges).unwrap();
        assert_eq!(again.mesh_points().unwrap(), face.mesh_points().unwrap());
        assert_eq!(again.local_connectivity().unwrap(), face.local_connectivity().unwrap());
    }

    #[test]
    fn test_requires_meshed_edges() {
        let model = shapes::rectangle(1.0, 1.0).unwrap();
        let mut edges = mesh_edges(&model, |_| 3);
        edges[2] = EdgeMesh::new(&model, EdgeId::new(2));
        let mut face = FaceMesh::new(&model, FaceId::new(0));
        assert!(matches!(face.num_points(), Err(MeshError::InvalidState(_))));
        let err = face
            .mesh(&MeshOptions::default(), 0.5, FaceMeshType::Structured, &edges)
            .unwrap_err();
        assert!(matches!(err, MeshError::InvalidState(_)));
        assert!(!face.is_meshed());
    }

    #[test]
    fn test_boundary_follows_edges() {
        let model = shapes::plate_with_hole(2.0, 1.0, 0.25).unwrap();
        let edges = mesh_edges_h(&model, 0.1);
        let options = MeshOptions::default().sequential();
        let mut face = FaceMesh::new(&model, FaceId::new(0));
        face.mesh(&options, 0.1, FaceMeshType::Structured, &edges).unwrap();
        assert_eq!(face.mesh_type(), FaceMeshType::Unstructured);

        let mut k = 0;
        for uses in model.face(FaceId::new(0)).loops() {
            for u in uses {
                let em = &edges[u.edge.index()];
                let n = em.num_points().unwrap();
                for s in 0..n - 1 {
                    let j = if u.reversed { n - 1 - s } else { s };
                    assert_eq!(face.node_key(k).unwrap(), em.node_key(j).unwrap());
                    k += 1;
                }
            }
        }
        assert_eq!(face.num_fixed_points().unwrap(), k);
        assert!(face.num_points().unwrap() > k);

        let report = face.report().unwrap();
        assert!(report.num_triangles > 0);
        let (params, _) = face.mesh_points().unwrap();
        for q in face.local_connectivity().unwrap() {
            assert!(q.iter().all(|&v| v < params.len()));
            let area = (params[q[2]] - params[q[0]]).perp(&(params[q[3]] - params[q[1]]));
            assert!(area > 0.0);
        }
    }

    /// Unit square whose loop passes through a zero-length edge at (1, 0).
    fn pinched_square() -> (Model, EdgeId) {
        let mut model = Model::new();
        let corners = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        let v: Vec<_> = corners
            .iter()
            .map(|&(x, y)| model.add_vertex(Point3::new(x, y, 0.0)))
            .collect();
        fn line(model: &mut Model, a: VertexId, b: VertexId) -> EdgeId {
            let seg = LineSegment::new(model.vertex(a).point(), model.vertex(b).point());
            model.add_edge(seg, a, b).unwrap()
        }
        let e0 = line(&mut model, v[0], v[1]);
        let d = line(&mut model, v[1], v[1]);
        let e1 = line(&mut model, v[1], v[2]);
        let e2 = line(&mut model, v[2], v[3]);
        let e3 = line(&mut model, v[3], v[0]);
        let uses = [e0, d, e1, e2, e3].iter().map(|&e| EdgeUse::fwd(e)).collect();
        model
            .add_face(Plane::xy(0.0, Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)), vec![uses])
            .unwrap();
        (model, d)
    }

    #[test]
    fn test_zero_length_edge_collapses_to_one_point() {
        let (model, d) = pinched_square();
        assert!(model.edge(d).is_degenerate());
        let edges = mesh_edges_h(&model, 0.25);
        let mut face = FaceMesh::new(&model, FaceId::new(0));
        face.mesh(&MeshOptions::default(), 0.25, FaceMeshType::Structured, &edges)
            .unwrap();
        assert_eq!(face.mesh_type(), FaceMeshType::Unstructured);

        let num_fixed = face.num_fixed_points().unwrap();
        assert_eq!(num_fixed, 16);
        let keys: Vec<_> = (0..num_fixed).map(|i| face.node_key(i).unwrap()).collect();
        let corner = NodeKey::Vertex(model.edge(d).vertices().0);
        assert_eq!(keys.iter().filter(|&&k| k == corner).count(), 1);
        for i in 0..num_fixed {
            for j in i + 1..num_fixed {
                assert_ne!(keys[i], keys[j]);
            }
        }

        let (_, points) = face.mesh_points().unwrap();
        for i in 0..points.len() {
            for j in i + 1..points.len() {
                assert!((points[i] - points[j]).norm() > 1e-9);
            }
        }
        let mut used = vec![false; points.len()];
        for q in face.local_connectivity().unwrap() {
            for &v in q {
                assert!(v < points.len());
                used[v] = true;
            }
        }
        assert!(used.iter().all(|&u| u));
    }

    #[test]
    fn test_non_four_sided_falls_back() {
        let model = shapes::l_bracket(1.0).unwrap();
        let edges = mesh_edges_h(&model, 0.25);
        let mut face = FaceMesh::new(&model, FaceId::new(0));
        face.mesh(&MeshOptions::default(), 0.25, FaceMeshType::Structured, &edges)
            .unwrap();
        assert_eq!(face.mesh_type(), FaceMeshType::Unstructured);
        assert!(face.structured_node(0, 0, 0).is_err());
    }

    #[test]
    fn test_clockwise_loop_gives_clockwise_quads() {
        let mut model = Model::new();
        let corners = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        let v: Vec<_> = corners
            .iter()
            .map(|&(x, y)| model.add_vertex(Point3::new(x, y, 0.0)))
            .collect();
        let mut e = Vec::new();
        for k in 0..4 {
            let (a, b) = (v[k], v[(k + 1) % 4]);
            let seg = LineSegment::new(model.vertex(a).point(), model.vertex(b).point());
            e.push(model.add_edge(seg, a, b).unwrap());
        }
        let uses = e.iter().rev().map(|&e| EdgeUse::rev(e)).collect();
        model
            .add_face(Plane::xy(0.0, Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)), vec![uses])
            .unwrap();
        let edges = mesh_edges_h(&model, 0.25);
        let mut face = FaceMesh::new(&model, FaceId::new(0));
        face.mesh(&MeshOptions::default(), 0.25, FaceMeshType::Unstructured, &edges)
            .unwrap();
        let (params, _) = face.mesh_points().unwrap();
        let quads = face.local_connectivity().unwrap();
        assert!(!quads.is_empty());
        assert!(quads_area2(params, quads) < 0.0);
    }

    #[test]
    fn test_numbering_reuses_edge_numbers() {
        let model = shapes::rectangle(1.0, 1.0).unwrap();
        let mut edges = mesh_edges(&model, |_| 4);
        let mut face = FaceMesh::new(&model, FaceId::new(0));
        face.mesh(&MeshOptions::default(), 0.25, FaceMeshType::Structured, &edges)
            .unwrap();

        let mut ctx = NumberingContext::new(model.num_vertices());
        ctx.number_vertices();
        assert!(face.set_node_nums(&mut ctx, &edges).is_err());
        for em in edges.iter_mut() {
            em.set_node_nums(&mut ctx).unwrap();
        }
        assert_eq!(face.set_node_nums(&mut ctx, &edges).unwrap(), 4);
        assert_eq!(ctx.num_assigned(), 16);
        let nums = face.node_nums().unwrap();
        assert_eq!(nums[1], edges[0].node_num(1).unwrap());
        let mut sorted = nums.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 16);
    }

    #[test]
    fn test_structured_node_sides() {
        let model = shapes::rectangle(2.0, 1.0).unwrap();
        let edges = mesh_edges(&model, |e| if e.index() % 2 == 0 { 5 } else { 3 });
        let mut face = FaceMesh::new(&model, FaceId::new(0));
        face.mesh(&MeshOptions::default(), 0.5, FaceMeshType::Structured, &edges)
            .unwrap();
        let corner = |k: usize| NodeKey::Vertex(crate::geometry::VertexId::new(k));
        assert_eq!(face.structured_node(0, 0, 0).unwrap(), corner(0));
        assert_eq!(face.structured_node(1, 0, 0).unwrap(), corner(1));
        assert_eq!(face.structured_node(2, 0, 0).unwrap(), corner(2));
        assert_eq!(face.structured_node(3, 0, 0).unwrap(), corner(3));
        assert_eq!(face.structured_node(0, 4, 2).unwrap(), corner(2));
        assert_eq!(
            face.structured_node(1, 1, 0).unwrap(),
            NodeKey::Edge(EdgeId::new(1), 1)
        );
        // the centre of the 5 x 3 grid, reached from two sides
        let centre = face.structured_node(0, 2, 1).unwrap();
        assert_eq!(face.structured_node(2, 2, 1).unwrap(), centre);
        assert!(matches!(centre, NodeKey::Face(_, _)));
        assert!(face.structured_node(1, 3, 0).is_err());
    }

    #[test]
    fn test_top_face_copies_bottom() {
        let model = shapes::block(1.0, 1.0, 1.0).unwrap();
        let sweep = SweepTopology::analyze(&model, VolumeId::new(0)).unwrap();
        let edges = mesh_edges(&model, |_| 4);
        let options = MeshOptions::default();
        let mut bottom = FaceMesh::new(&model, sweep.bottom);
        bottom.mesh(&options, 0.3, FaceMeshType::Structured, &edges).unwrap();
        let mut top = FaceMesh::new(&model, sweep.top);
        top.mesh_from_source(&options, &bottom, &sweep, &edges).unwrap();

        assert_eq!(top.source(), Some(sweep.bottom));
        assert_eq!(top.num_points().unwrap(), bottom.num_points().unwrap());
        assert_eq!(top.local_connectivity().unwrap(), bottom.local_connectivity().unwrap());
        let (_, bp) = bottom.mesh_points().unwrap();
        let (_, tp) = top.mesh_points().unwrap();
        for (b, t) in bp.iter().zip(tp) {
            assert!((t - b - nalgebra::Vector3::z()).norm() < 1e-9);
        }
        for i in 0..top.num_fixed_points().unwrap() {
            match top.node_key(i).unwrap() {
                NodeKey::Vertex(v) => assert!(sweep.vertex_map.values().any(|&t| t == v)),
                NodeKey::Edge(e, _) => assert!(sweep.edge_map.values().any(|&(t, _)| t == e)),
                other => panic!("unexpected fixed key {:?}", other),
            }
        }
    }

    #[test]
    fn test_dumps_written() {
        let dir = tempfile::tempdir().unwrap();
        let model = shapes::l_bracket(1.0).unwrap();
        let edges = mesh_edges_h(&model, 0.25);
        let options = MeshOptions::default().with_dump(DumpOptions::all(dir.path()));
        let mut face = FaceMesh::new(&model, FaceId::new(0));
        face.mesh(&options, 0.25, FaceMeshType::Unstructured, &edges).unwrap();
        for stage in [
            "init_domain_triangle",
            "pre_smooth_triangle",
            "post_smooth_triangle",
            "dual_recombine",
            "pre_smooth_quad",
            "post_smooth_quad",
            "quad_dual",
        ] {
            assert!(options.dump.path(stage, 0).exists(), "{} missing", stage);
        }
        let grid = UnstructuredGrid::load(options.dump.path("post_smooth_quad", 0)).unwrap();
        assert_eq!(grid.count(CellKind::Quad), face.local_connectivity().unwrap().len());
        assert_eq!(grid.num_points(), face.num_points().unwrap());
    }

    #[test]
    fn test_quality_histogram() {
        let model = shapes::rectangle(1.0, 1.0).unwrap();
        let edges = mesh_edges(&model, |_| 3);
        let mut face = FaceMesh::new(&model, FaceId::new(0));
        face.mesh(&MeshOptions::default(), 0.5, FaceMeshType::Structured, &edges)
            .unwrap();
        let mut counts = Vec::new();
        face.add_quad_quality(4, &mut counts).unwrap();
        assert_eq!(counts, vec![0, 0, 0, 4]);
        assert!(face.print_quad_quality().is_ok());
    }
}
