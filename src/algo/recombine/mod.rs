//! Triangle-to-quad recombination.
//!
//! Recombination proceeds in three steps:
//!
//! 1. [`DualGraph::build`] weighs every pair of adjacent triangles by the
//!    quality of the quad they would form.
//! 2. [`max_weight_matching`] selects a triangle-disjoint set of pairs of
//!    maximum total quality. The dual graph is not bipartite, so this is
//!    the general blossom algorithm.
//! 3. [`repair_unmatched`] re-pairs leftover triangles along short
//!    alternating paths. Anything still unmatched becomes a degenerate quad
//!    `[a, b, c, c]`.
//!
//! [`simplify_quads`] then removes poor doublets.

mod dual;
mod matching;
mod repair;
mod simplify;

pub use dual::{DualEdge, DualGraph};
pub use matching::{max_weight_matching, NONE};
pub use repair::{repair_unmatched, MAX_REPAIR_DEPTH};
pub use simplify::{simplify_quads, DOUBLET_QUALITY};

use log::{debug, warn};
use nalgebra::Point3;

use crate::error::Result;

/// Scale applied to quality scores to get integer matching weights.
const WEIGHT_SCALE: f64 = 1e6;

/// Outcome of a recombination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecombineReport {
    /// Triangles in the input.
    pub num_triangles: usize,
    /// Quads produced, degenerate ones included.
    pub num_quads: usize,
    /// Triangles paired by the matching.
    pub num_matched: usize,
    /// Triangles paired by the alternating-path repair.
    pub num_repaired: usize,
    /// Triangles turned into degenerate quads.
    pub num_degenerate: usize,
}

/// Integer matching weight of a dual edge; even so dual updates stay exact.
#[inline]
fn matching_weight(quality: f64) -> i64 {
    2 * (quality * WEIGHT_SCALE).round() as i64
}

/// Pairs selected by the matching, as a partner per triangle.
pub fn match_triangles(dual: &DualGraph) -> Vec<usize> {
    let edges: Vec<(usize, usize, i64)> = dual
        .edges
        .iter()
        .filter(|e| e.weight > 0.0)
        .map(|e| (e.t1, e.t2, matching_weight(e.weight)))
        .collect();
    max_weight_matching(dual.num_nodes(), &edges, false)
}

/// Recombine a counter-clockwise triangulation into quads.
///
/// Quads are emitted in ascending order of their lowest triangle index.
/// Fails only if the triangulation is not manifold.
pub fn recombine(
    tris: &[[usize; 3]],
    points: &[Point3<f64>],
) -> Result<(Vec<[usize; 4]>, RecombineReport)> {
    let dual = DualGraph::build(tris, points)?;
    let mut mate = match_triangles(&dual);
    let num_matched = mate.iter().filter(|&&m| m != NONE).count();
    let num_repaired = repair_unmatched(&dual, &mut mate);

    let mut quads = Vec::with_capacity(tris.len() / 2 + 1);
    let mut num_degenerate = 0;
    for (t, tri) in tris.iter().enumerate() {
        let m = mate[t];
        if m == NONE {
            quads.push([tri[0], tri[1], tri[2], tri[2]]);
            num_degenerate += 1;
        } else if t < m {
            if let Some(e) = dual.edge_between(t, m) {
                quads.push(e.quad);
            }
        }
    }

    let report = RecombineReport {
        num_triangles: tris.len(),
        num_quads: quads.len(),
        num_matched,
        num_repaired,
        num_degenerate,
    };
    debug!(
        "recombination: {} triangles, {} matched, {} repaired",
        tris.len(),
        num_matched,
        num_repaired
    );
    if num_degenerate > 0 {
        warn!(
            "{} of {} triangles could not be paired and were kept as degenerate quads",
            num_degenerate,
            tris.len()
        );
    }
    Ok((quads, report))
}
