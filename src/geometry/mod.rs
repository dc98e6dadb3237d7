//! Boundary-representation geometry consumed by the mesher.
//!
//! The mesher only needs a narrow evaluation contract: curves and surfaces
//! that can be evaluated (and, for surfaces, inverted), plus the topology
//! linking them. [`Model`] stores entities in arenas addressed by handles;
//! faces refer to edges and volumes refer to faces, never the other way.

pub mod curves;
pub mod index;
pub mod shapes;
pub mod surfaces;

use std::fmt::Debug;

use nalgebra::{Matrix2, Point2, Point3, Vector2, Vector3};

use crate::error::{MeshError, Result};

pub use curves::{ArcLengthTable, CircularArc, LineSegment};
pub use index::{EdgeId, FaceId, VertexId, VolumeId};
pub use surfaces::{BilinearPatch, CylinderPatch, Plane};

/// Edges shorter than this are treated as degenerate.
pub const DEGENERATE_LENGTH: f64 = 1e-10;

/// A parametric curve `t -> R^3` over a closed interval.
pub trait Curve: Debug + Send + Sync {
    /// Parameter interval `(t0, t1)`.
    fn range(&self) -> (f64, f64);

    /// Evaluate the point at parameter `t`.
    fn eval_point(&self, t: f64) -> Point3<f64>;

    /// First derivative at `t`. Defaults to a central difference.
    fn eval_deriv(&self, t: f64) -> Vector3<f64> {
        let (t0, t1) = self.range();
        let dt = 1e-6 * (t1 - t0).abs().max(1e-12);
        let a = (t - dt).max(t0.min(t1));
        let b = (t + dt).min(t0.max(t1));
        (self.eval_point(b) - self.eval_point(a)) / (b - a)
    }
}

/// A parametric surface `(u, v) -> R^3` over a rectangle.
pub trait Surface: Debug + Send + Sync {
    /// Parameter rectangle as `(min, max)` corners.
    fn range(&self) -> (Point2<f64>, Point2<f64>);

    /// Evaluate the point at `uv`.
    fn eval_point(&self, uv: Point2<f64>) -> Point3<f64>;

    /// Partial derivatives `(dS/du, dS/dv)` at `uv`. Defaults to central differences.
    fn eval_deriv(&self, uv: Point2<f64>) -> (Vector3<f64>, Vector3<f64>) {
        let (lo, hi) = self.range();
        let du = 1e-6 * (hi.x - lo.x).abs().max(1e-12);
        let dv = 1e-6 * (hi.y - lo.y).abs().max(1e-12);
        let su = (self.eval_point(Point2::new(uv.x + du, uv.y))
            - self.eval_point(Point2::new(uv.x - du, uv.y)))
            / (2.0 * du);
        let sv = (self.eval_point(Point2::new(uv.x, uv.y + dv))
            - self.eval_point(Point2::new(uv.x, uv.y - dv)))
            / (2.0 * dv);
        (su, sv)
    }

    /// Parameters of the surface point closest to `point`.
    ///
    /// The default samples the parameter rectangle and refines the best
    /// sample with Gauss-Newton iterations, clamped to the range.
    fn inv_eval_point(&self, point: &Point3<f64>) -> Point2<f64> {
        const SAMPLES: usize = 8;
        let (lo, hi) = self.range();
        let mut best = lo;
        let mut best_dist = f64::INFINITY;
        for j in 0..=SAMPLES {
            for i in 0..=SAMPLES {
                let uv = Point2::new(
                    lo.x + (hi.x - lo.x) * i as f64 / SAMPLES as f64,
                    lo.y + (hi.y - lo.y) * j as f64 / SAMPLES as f64,
                );
                let d = (self.eval_point(uv) - point).norm_squared();
                if d < best_dist {
                    best_dist = d;
                    best = uv;
                }
            }
        }

        let mut uv = best;
        for _ in 0..30 {
            let r = self.eval_point(uv) - point;
            let (su, sv) = self.eval_deriv(uv);
            let jtj = Matrix2::new(su.dot(&su), su.dot(&sv), su.dot(&sv), sv.dot(&sv));
            let jtr = Vector2::new(su.dot(&r), sv.dot(&r));
            let Some(inv) = jtj.try_inverse() else {
                break;
            };
            let step = -(inv * jtr);
            uv = Point2::new(
                (uv.x + step.x).clamp(lo.x, hi.x),
                (uv.y + step.y).clamp(lo.y, hi.y),
            );
            if step.norm() < 1e-14 * (1.0 + uv.coords.norm()) {
                break;
            }
        }
        uv
    }
}

/// A model vertex.
#[derive(Debug, Clone)]
pub struct Vertex {
    point: Point3<f64>,
}

impl Vertex {
    /// Position of the vertex.
    pub fn point(&self) -> Point3<f64> {
        self.point
    }
}

/// A model edge: a curve bounded by two vertices.
#[derive(Debug)]
pub struct Edge {
    curve: Box<dyn Curve>,
    vertices: (VertexId, VertexId),
    length: f64,
    degenerate: bool,
}

impl Edge {
    /// The underlying curve.
    pub fn curve(&self) -> &dyn Curve {
        self.curve.as_ref()
    }

    /// Vertices at the start and end of the curve's parameter interval.
    pub fn vertices(&self) -> (VertexId, VertexId) {
        self.vertices
    }

    /// Arc length of the curve.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Whether the edge has zero length.
    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }
}

/// One traversal of an edge inside a face loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeUse {
    /// The edge.
    pub edge: EdgeId,
    /// Whether the loop runs against the edge's parameter direction.
    pub reversed: bool,
}

impl EdgeUse {
    /// Traverse `edge` along its parameter direction.
    pub fn fwd(edge: EdgeId) -> Self {
        Self { edge, reversed: false }
    }

    /// Traverse `edge` against its parameter direction.
    pub fn rev(edge: EdgeId) -> Self {
        Self { edge, reversed: true }
    }
}

/// A model face: a surface trimmed by closed loops of edges.
///
/// The first loop is the outer boundary. Outer loops run counter-clockwise
/// in parameter space and hole loops clockwise, so the face interior is
/// always on the left.
#[derive(Debug)]
pub struct Face {
    surface: Box<dyn Surface>,
    loops: Vec<Vec<EdgeUse>>,
}

impl Face {
    /// The underlying surface.
    pub fn surface(&self) -> &dyn Surface {
        self.surface.as_ref()
    }

    /// Boundary loops, outer loop first.
    pub fn loops(&self) -> &[Vec<EdgeUse>] {
        &self.loops
    }

    /// Iterate over every edge use of every loop.
    pub fn edge_uses(&self) -> impl Iterator<Item = &EdgeUse> + '_ {
        self.loops.iter().flatten()
    }
}

/// A model volume bounded by faces.
#[derive(Debug, Clone)]
pub struct Volume {
    faces: Vec<FaceId>,
    sweep: Option<(FaceId, FaceId)>,
}

impl Volume {
    /// Bounding faces.
    pub fn faces(&self) -> &[FaceId] {
        &self.faces
    }

    /// Explicit `(bottom, top)` sweep designation, if any.
    pub fn sweep(&self) -> Option<(FaceId, FaceId)> {
        self.sweep
    }
}

/// Arena of model entities.
#[derive(Debug, Default)]
pub struct Model {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    faces: Vec<Face>,
    volumes: Vec<Volume>,
}

impl Model {
    /// Create an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex.
    pub fn add_vertex(&mut self, point: Point3<f64>) -> VertexId {
        self.vertices.push(Vertex { point });
        VertexId::new(self.vertices.len() - 1)
    }

    /// Add an edge whose curve runs from `v1` to `v2`.
    ///
    /// The arc length is computed here; an edge shorter than
    /// [`DEGENERATE_LENGTH`] is flagged degenerate and must start and end at
    /// the same vertex, so the collapsed point has a single owner.
    pub fn add_edge<C: Curve + 'static>(
        &mut self,
        curve: C,
        v1: VertexId,
        v2: VertexId,
    ) -> Result<EdgeId> {
        for v in [v1, v2] {
            if v.index() >= self.vertices.len() {
                return Err(MeshError::topology(v, "vertex does not exist"));
            }
        }
        let length = ArcLengthTable::new(&curve, 64).length();
        let degenerate = length < DEGENERATE_LENGTH;
        if degenerate && v1 != v2 {
            return Err(MeshError::topology(
                EdgeId::new(self.edges.len()),
                format!("zero-length edge joins distinct vertices {:?} and {:?}", v1, v2),
            ));
        }
        self.edges.push(Edge {
            curve: Box::new(curve),
            vertices: (v1, v2),
            length,
            degenerate,
        });
        Ok(EdgeId::new(self.edges.len() - 1))
    }

    /// Add a face. Consecutive edge uses of every loop must share a vertex
    /// and each loop must close.
    pub fn add_face<S: Surface + 'static>(
        &mut self,
        surface: S,
        loops: Vec<Vec<EdgeUse>>,
    ) -> Result<FaceId> {
        let id = FaceId::new(self.faces.len());
        if loops.is_empty() {
            return Err(MeshError::topology(id, "face has no boundary loop"));
        }
        for edge_loop in &loops {
            if edge_loop.is_empty() {
                return Err(MeshError::topology(id, "empty boundary loop"));
            }
            for u in edge_loop {
                if u.edge.index() >= self.edges.len() {
                    return Err(MeshError::topology(id, format!("{:?} does not exist", u.edge)));
                }
            }
            for (k, u) in edge_loop.iter().enumerate() {
                let next = &edge_loop[(k + 1) % edge_loop.len()];
                if self.use_end(u) != self.use_start(next) {
                    return Err(MeshError::topology(
                        id,
                        format!("{:?} and {:?} are not connected", u.edge, next.edge),
                    ));
                }
            }
        }
        self.faces.push(Face {
            surface: Box::new(surface),
            loops,
        });
        Ok(id)
    }

    /// Add a volume bounded by `faces`, optionally naming the `(bottom, top)`
    /// pair of a sweep.
    pub fn add_volume(
        &mut self,
        faces: Vec<FaceId>,
        sweep: Option<(FaceId, FaceId)>,
    ) -> Result<VolumeId> {
        let id = VolumeId::new(self.volumes.len());
        if let Some(f) = faces.iter().find(|f| f.index() >= self.faces.len()) {
            return Err(MeshError::topology(id, format!("{:?} does not exist", f)));
        }
        if let Some((bottom, top)) = sweep {
            if bottom == top || !faces.contains(&bottom) || !faces.contains(&top) {
                return Err(MeshError::topology(
                    id,
                    "sweep faces must be two distinct bounding faces",
                ));
            }
        }
        self.volumes.push(Volume { faces, sweep });
        Ok(id)
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of edges.
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Number of faces.
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Number of volumes.
    pub fn num_volumes(&self) -> usize {
        self.volumes.len()
    }

    /// Get a vertex.
    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id.index()]
    }

    /// Get an edge.
    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.index()]
    }

    /// Get a face.
    pub fn face(&self, id: FaceId) -> &Face {
        &self.faces[id.index()]
    }

    /// Get a volume.
    pub fn volume(&self, id: VolumeId) -> &Volume {
        &self.volumes[id.index()]
    }

    /// Iterate over vertex handles.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> {
        (0..self.vertices.len()).map(VertexId::new)
    }

    /// Iterate over edge handles.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> {
        (0..self.edges.len()).map(EdgeId::new)
    }

    /// Iterate over face handles.
    pub fn face_ids(&self) -> impl Iterator<Item = FaceId> {
        (0..self.faces.len()).map(FaceId::new)
    }

    /// Iterate over volume handles.
    pub fn volume_ids(&self) -> impl Iterator<Item = VolumeId> {
        (0..self.volumes.len()).map(VolumeId::new)
    }

    /// Vertex where an edge use starts.
    pub fn use_start(&self, u: &EdgeUse) -> VertexId {
        let (a, b) = self.edge(u.edge).vertices;
        if u.reversed {
            b
        } else {
            a
        }
    }

    /// Vertex where an edge use ends.
    pub fn use_end(&self, u: &EdgeUse) -> VertexId {
        let (a, b) = self.edge(u.edge).vertices;
        if u.reversed {
            a
        } else {
            b
        }
    }

    /// Faces whose loops use `edge`.
    pub fn faces_of_edge(&self, edge: EdgeId) -> Vec<FaceId> {
        self.face_ids()
            .filter(|&f| self.face(f).edge_uses().any(|u| u.edge == edge))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_edge_flag() {
        let mut model = Model::new();
        let a = model.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let b = model.add_vertex(Point3::new(2.0, 0.0, 0.0));
        let e = model
            .add_edge(LineSegment::new(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 0.0, 0.0)), a, b)
            .unwrap();
        let d = model
            .add_edge(LineSegment::new(Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 0.0, 0.0)), a, a)
            .unwrap();
        assert!((model.edge(e).length() - 2.0).abs() < 1e-10);
        assert!(!model.edge(e).is_degenerate());
        assert!(model.edge(d).is_degenerate());
    }

    #[test]
    fn test_degenerate_edge_needs_one_vertex() {
        let mut model = Model::new();
        let a = model.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let b = model.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let p = Point3::new(1.0, 0.0, 0.0);
        let result = model.add_edge(LineSegment::new(p, p), a, b);
        assert!(matches!(result, Err(MeshError::Topology { .. })));
        assert_eq!(model.num_edges(), 0);
        assert!(model.add_edge(LineSegment::new(p, p), a, a).is_ok());
    }

    #[test]
    fn test_open_loop_rejected() {
        let mut model = Model::new();
        let a = model.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let b = model.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let c = model.add_vertex(Point3::new(1.0, 1.0, 0.0));
        let e0 = model
            .add_edge(LineSegment::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)), a, b)
            .unwrap();
        let e1 = model
            .add_edge(LineSegment::new(Point3::new(1.0, 0.0, 0.0), Point3::new(1.0, 1.0, 0.0)), b, c)
            .unwrap();
        let plane = Plane::xy(0.0, Point2::new(0.0, 0.0), Point2::new(1.0, 1.0));
        let result = model.add_face(plane, vec![vec![EdgeUse::fwd(e0), EdgeUse::fwd(e1)]]);
        assert!(matches!(result, Err(MeshError::Topology { .. })));
    }

    #[test]
    fn test_default_inversion() {
        let patch = BilinearPatch::new([
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.5, 1.0, 0.5),
            Point3::new(0.0, 1.0, 0.0),
        ]);
        let uv = Point2::new(0.3, 0.7);
        let p = patch.eval_point(uv);
        let back = patch.inv_eval_point(&p);
        assert!((back - uv).norm() < 1e-8);
    }

    #[test]
    fn test_faces_of_edge() {
        let model = shapes::block(1.0, 1.0, 1.0).unwrap();
        for e in model.edge_ids() {
            assert_eq!(model.faces_of_edge(e).len(), 2, "{:?}", e);
        }
    }
}
