//! Removal of low-quality doublets from a quad mesh.
//!
//! A doublet is a free node with exactly two incident quads sharing two of
//! its edges. When both quads are poor, dropping the node and merging them
//! into one quad improves the mesh.

use log::debug;
use nalgebra::{Point2, Point3};

use crate::algo::quality::quad_quality;

/// Quads at or above this quality are never merged away.
pub const DOUBLET_QUALITY: f64 = 0.5;

fn param_area(params: &[Point2<f64>], q: &[usize; 4]) -> f64 {
    0.5 * (params[q[2]] - params[q[0]]).perp(&(params[q[3]] - params[q[1]]))
}

fn is_degenerate(q: &[usize; 4]) -> bool {
    (0..4).any(|k| q[k] == q[(k + 1) % 4])
}

/// Rotate `q` so that `v` comes first.
fn rotated_to(q: &[usize; 4], v: usize) -> Option<[usize; 4]> {
    let k = q.iter().position(|&x| x == v)?;
    Some([q[k], q[(k + 1) % 4], q[(k + 2) % 4], q[(k + 3) % 4]])
}

/// One pass over all free nodes. Returns the nodes removed.
fn doublet_pass(
    params: &[Point2<f64>],
    points: &[Point3<f64>],
    num_fixed: usize,
    quads: &mut [[usize; 4]],
    alive: &mut [bool],
    removed: &mut [bool],
) -> usize {
    let mut incident: Vec<Vec<usize>> = vec![Vec::new(); params.len()];
    for (k, q) in quads.iter().enumerate() {
        if !alive[k] || is_degenerate(q) {
            continue;
        }
        for &v in q {
            incident[v].push(k);
        }
    }

    let quality = |q: &[usize; 4]| quad_quality(&q.map(|v| points[v]));
    let mut count = 0;
    for v in num_fixed..params.len() {
        if removed[v] || incident[v].len() != 2 {
            continue;
        }
        let (k1, k2) = (incident[v][0], incident[v][1]);
        if !alive[k1] || !alive[k2] {
            continue;
        }
        let (Some(q1), Some(q2)) = (rotated_to(&quads[k1], v), rotated_to(&quads[k2], v)) else {
            continue;
        };
        // q1 = (v, a, x, b) and q2 = (v, b, y, a)
        let (a, x, b) = (q1[1], q1[2], q1[3]);
        if q2[1] != b || q2[3] != a {
            continue;
        }
        let y = q2[2];
        let (s1, s2) = (quality(&quads[k1]), quality(&quads[k2]));
        if s1 >= DOUBLET_QUALITY || s2 >= DOUBLET_QUALITY {
            continue;
        }
        let merged = [a, x, b, y];
        if is_degenerate(&merged) || param_area(params, &merged) <= 0.0 {
            continue;
        }
        let s = quality(&merged);
        if s <= 0.0 || s < s1.min(s2) {
            continue;
        }
        quads[k1] = merged;
        alive[k2] = false;
        removed[v] = true;
        // neighbours of the merged quads must be re-examined next pass
        for &w in &merged {
            incident[w].clear();
        }
        count += 1;
    }
    count
}

/// Remove low-quality doublets and compact the free nodes.
///
/// Fixed nodes (indices below `num_fixed`) are never removed. Surviving
/// free nodes keep their relative order. Returns the number of nodes
/// removed.
pub fn simplify_quads(
    params: &mut Vec<Point2<f64>>,
    points: &mut Vec<Point3<f64>>,
    num_fixed: usize,
    quads: &mut Vec<[usize; 4]>,
    max_iterations: usize,
) -> usize {
    let mut alive = vec![true; quads.len()];
    let mut removed = vec![false; params.len()];
    let mut total = 0;
    for pass in 0..max_iterations {
        let count = doublet_pass(params, points, num_fixed, quads, &mut alive, &mut removed);
        debug!("doublet pass {}: {} nodes removed", pass, count);
        total += count;
        if count == 0 {
            break;
        }
    }
    if total == 0 {
        return 0;
    }

    let mut remap = vec![usize::MAX; params.len()];
    let mut next = 0;
    for (v, slot) in remap.iter_mut().enumerate() {
        if !removed[v] {
            *slot = next;
            next += 1;
        }
    }
    let mut keep = removed.iter().map(|&r| !r);
    params.retain(|_| keep.next().unwrap_or(true));
    let mut keep = removed.iter().map(|&r| !r);
    points.retain(|_| keep.next().unwrap_or(true));

    let mut kept = alive.iter();
    quads.retain(|_| kept.next().copied().unwrap_or(true));
    for q in quads.iter_mut() {
        *q = q.map(|v| remap[v]);
    }
    total
}
