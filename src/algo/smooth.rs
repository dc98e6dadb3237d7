//! Parameter-space smoothing of face meshes.
//!
//! Free points (indices at or beyond `num_fixed`) are relaxed with Jacobi
//! sweeps: every candidate position is computed from the previous sweep,
//! then applied one point at a time. A move that would invert an incident
//! triangle, or make an incident quad non-convex, is dropped.
//!
//! # Algorithms
//!
//! - [`smooth_triangles`]: Laplacian or spring smoothing of a triangulation
//! - [`smooth_quads`]: Laplacian smoothing of a quad mesh
//!
//! # Example
//!
//! ```
//! use brepmesh::algo::smooth::{smooth_triangles, SmoothOptions};
//! use nalgebra::Point2;
//!
//! let mut params = vec![
//!     Point2::new(0.0, 0.0),
//!     Point2::new(1.0, 0.0),
//!     Point2::new(1.0, 1.0),
//!     Point2::new(0.0, 1.0),
//!     Point2::new(0.2, 0.3), // free
//! ];
//! let tris = [[0, 1, 4], [1, 2, 4], [2, 3, 4], [3, 0, 4]];
//! smooth_triangles(&mut params, 4, &tris, &SmoothOptions::default());
//! assert!((params[4] - Point2::new(0.5, 0.5)).norm() < 1e-6);
//! ```

use nalgebra::{Point2, Vector2};
use rayon::prelude::*;

use crate::options::{MeshOptions, TriSmoothingType};

/// Options for parameter-space smoothing.
#[derive(Debug, Clone)]
pub struct SmoothOptions {
    /// Number of smoothing iterations.
    pub iterations: usize,

    /// Fraction of the computed displacement applied per iteration.
    pub lambda: f64,

    /// Smoothing rule used for triangulations.
    pub rule: TriSmoothingType,

    /// Whether to compute candidate positions in parallel (default: true).
    pub parallel: bool,
}

impl Default for SmoothOptions {
    fn default() -> Self {
        Self {
            iterations: 10,
            lambda: 1.0,
            rule: TriSmoothingType::Laplacian,
            parallel: true,
        }
    }
}

impl SmoothOptions {
    /// Set the number of iterations.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the relaxation factor.
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    /// Set the triangle smoothing rule.
    pub fn with_rule(mut self, rule: TriSmoothingType) -> Self {
        self.rule = rule;
        self
    }

    /// Enable or disable parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Disable parallel execution.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}

impl From<&MeshOptions> for SmoothOptions {
    fn from(options: &MeshOptions) -> Self {
        Self::default()
            .with_iterations(options.num_smoothing_steps)
            .with_rule(options.tri_smoothing_type)
            .with_parallel(options.parallel)
    }
}

/// Vertex neighbours and incident elements of a polygon mesh.
struct Stencil {
    neighbors: Vec<Vec<usize>>,
    incident: Vec<Vec<usize>>,
}

impl Stencil {
    fn new<const N: usize>(num_points: usize, polys: &[[usize; N]]) -> Self {
        let mut neighbors = vec![Vec::new(); num_points];
        let mut incident = vec![Vec::new(); num_points];
        for (e, poly) in polys.iter().enumerate() {
            for i in 0..N {
                let (a, b) = (poly[i], poly[(i + 1) % N]);
                if !incident[a].contains(&e) {
                    incident[a].push(e);
                }
                if a != b {
                    neighbors[a].push(b);
                    neighbors[b].push(a);
                }
            }
        }
        for list in neighbors.iter_mut() {
            list.sort_unstable();
            list.dedup();
        }
        Self {
            neighbors,
            incident,
        }
    }
}

#[inline]
fn cross(o: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    (a - o).perp(&(b - o))
}

fn triangle_valid(params: &[Point2<f64>], t: &[usize; 3]) -> bool {
    cross(&params[t[0]], &params[t[1]], &params[t[2]]) > 0.0
}

/// Strict convexity of a counter-clockwise quad. A quad with a repeated
/// corner is checked as the triangle it collapses to.
pub(crate) fn quad_valid(params: &[Point2<f64>], q: &[usize; 4]) -> bool {
    if let Some(k) = (0..4).find(|&k| q[k] == q[(k + 1) % 4]) {
        let t = [q[(k + 1) % 4], q[(k + 2) % 4], q[(k + 3) % 4]];
        return triangle_valid(params, &t);
    }
    (0..4).all(|k| cross(&params[q[k]], &params[q[(k + 1) % 4]], &params[q[(k + 2) % 4]]) > 0.0)
}

fn laplacian_target(params: &[Point2<f64>], nbrs: &[usize]) -> Option<Point2<f64>> {
    if nbrs.is_empty() {
        return None;
    }
    let sum: Vector2<f64> = nbrs.iter().map(|&w| params[w].coords).sum();
    Some(Point2::from(sum / nbrs.len() as f64))
}

fn spring_target(params: &[Point2<f64>], v: usize, nbrs: &[usize]) -> Option<Point2<f64>> {
    if nbrs.is_empty() {
        return None;
    }
    let p = params[v];
    let rest = nbrs.iter().map(|&w| (params[w] - p).norm()).sum::<f64>() / nbrs.len() as f64;
    let mut force = Vector2::zeros();
    for &w in nbrs {
        let d = params[w] - p;
        let len = d.norm();
        if len > 1e-300 {
            force += d * ((len - rest) / len);
        }
    }
    Some(p + force * (0.5 / nbrs.len() as f64))
}

fn jacobi<F, G>(
    params: &mut [Point2<f64>],
    num_fixed: usize,
    iterations: usize,
    lambda: f64,
    parallel: bool,
    target: F,
    valid: G,
) -> usize
where
    F: Fn(&[Point2<f64>], usize) -> Option<Point2<f64>> + Sync,
    G: Fn(&[Point2<f64>], usize) -> bool,
{
    let num_points = params.len();
    if num_fixed >= num_points || lambda == 0.0 {
        return 0;
    }
    let mut rejected = 0;
    for _ in 0..iterations {
        let snapshot: &[Point2<f64>] = params;
        let step = |v: usize| {
            target(snapshot, v).map(|c| snapshot[v] + (c - snapshot[v]) * lambda)
        };
        let candidates: Vec<Option<Point2<f64>>> = if parallel {
            (num_fixed..num_points).into_par_iter().map(step).collect()
        } else {
            (num_fixed..num_points).map(step).collect()
        };

        for (k, cand) in candidates.into_iter().enumerate() {
            let v = num_fixed + k;
            let Some(p) = cand else { continue };
            let old = params[v];
            params[v] = p;
            if !valid(params, v) {
                params[v] = old;
                rejected += 1;
            }
        }
    }
    rejected
}

/// Smooth the free points of a counter-clockwise triangulation.
///
/// Returns the number of moves dropped by the inversion guard.
pub fn smooth_triangles(
    params: &mut [Point2<f64>],
    num_fixed: usize,
    tris: &[[usize; 3]],
    options: &SmoothOptions,
) -> usize {
    if options.iterations == 0 {
        return 0;
    }
    let stencil = Stencil::new(params.len(), tris);
    let valid = |p: &[Point2<f64>], v: usize| {
        stencil.incident[v].iter().all(|&t| triangle_valid(p, &tris[t]))
    };
    match options.rule {
        TriSmoothingType::Laplacian => jacobi(
            params,
            num_fixed,
            options.iterations,
            options.lambda,
            options.parallel,
            |p, v| laplacian_target(p, &stencil.neighbors[v]),
            valid,
        ),
        TriSmoothingType::Spring => jacobi(
            params,
            num_fixed,
            options.iterations,
            options.lambda,
            options.parallel,
            |p, v| spring_target(p, v, &stencil.neighbors[v]),
            valid,
        ),
    }
}

/// Laplacian smoothing of the free points of a counter-clockwise quad mesh.
///
/// Returns the number of moves dropped by the convexity guard.
pub fn smooth_quads(
    params: &mut [Point2<f64>],
    num_fixed: usize,
    quads: &[[usize; 4]],
    options: &SmoothOptions,
) -> usize {
    if options.iterations == 0 {
        return 0;
    }
    let stencil = Stencil::new(params.len(), quads);
    jacobi(
        params,
        num_fixed,
        options.iterations,
        options.lambda,
        options.parallel,
        |p, v| laplacian_target(p, &stencil.neighbors[v]),
        |p, v| stencil.incident[v].iter().all(|&q| quad_valid(p, &quads[q])),
    )
}
