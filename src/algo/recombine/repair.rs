//! Repair of triangles left unmatched by the matching.
//!
//! An unmatched triangle looks for a short alternating path through the
//! matched pairs to another unmatched triangle; swapping the pairs along
//! the path pairs both. Only dual edges whose merged quad is valid are
//! used.
//!
//! Unmatched triangles are handled in this order: the alternating-path
//! re-pair here, searched up to [`MAX_REPAIR_DEPTH`] dual edges, then
//! whatever remains is emitted by the caller as a degenerate quad
//! `[a, b, c, c]`.

use std::collections::VecDeque;

use super::dual::DualGraph;
use super::matching::NONE;

/// Longest alternating path searched, in dual edges.
pub const MAX_REPAIR_DEPTH: usize = 8;

/// Pair up unmatched triangles along alternating paths of legal dual edges.
///
/// `mate[t]` is the triangle paired with `t` or [`NONE`]. Returns the
/// number of triangles that were unmatched and are now paired.
pub fn repair_unmatched(dual: &DualGraph, mate: &mut [usize]) -> usize {
    let n = mate.len();
    let mut repaired = 0;
    // outer triangle -> (matched triangle it was reached through, previous outer)
    let mut via = vec![(NONE, NONE); n];
    let mut depth = vec![0usize; n];
    let mut visited = vec![false; n];
    let mut touched: Vec<usize> = Vec::new();

    for u in 0..n {
        if mate[u] != NONE {
            continue;
        }
        for &t in &touched {
            visited[t] = false;
        }
        touched.clear();

        visited[u] = true;
        touched.push(u);
        depth[u] = 0;
        let mut queue = VecDeque::from([u]);
        let mut found = None;

        'search: while let Some(o) = queue.pop_front() {
            for &k in &dual.incident[o] {
                if dual.edges[k].weight <= 0.0 {
                    continue;
                }
                let x = dual.other(k, o);
                if visited[x] {
                    continue;
                }
                if mate[x] == NONE {
                    found = Some((o, x));
                    break 'search;
                }
                let y = mate[x];
                if visited[y] || depth[o] + 2 >= MAX_REPAIR_DEPTH {
                    continue;
                }
                visited[x] = true;
                visited[y] = true;
                touched.push(x);
                touched.push(y);
                via[y] = (x, o);
                depth[y] = depth[o] + 2;
                queue.push_back(y);
            }
        }

        let Some((mut outer, mut target)) = found else {
            continue;
        };
        loop {
            let (x, prev) = via[outer];
            mate[outer] = target;
            mate[target] = outer;
            if outer == u {
                break;
            }
            target = x;
            outer = prev;
        }
        repaired += 2;
    }
    repaired
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    /// A strip of four triangles over a 1x4 row of unit squares split
    /// along alternating diagonals.
    fn strip() -> (Vec<[usize; 3]>, Vec<Point3<f64>>) {
        let mut points = Vec::new();
        for i in 0..3 {
            points.push(Point3::new(i as f64, 0.0, 0.0));
            points.push(Point3::new(i as f64, 1.0, 0.0));
        }
        // bottom 0,2,4 top 1,3,5
        let tris = vec![[0, 2, 1], [2, 3, 1], [2, 4, 3], [4, 5, 3]];
        (tris, points)
    }

    #[test]
    fn test_alternating_path_repairs_both_ends() {
        let (tris, points) = strip();
        let dual = DualGraph::build(&tris, &points).unwrap();
        // the middle pair is matched, the end triangles are not
        let mut mate = vec![NONE, 2, 1, NONE];
        let repaired = repair_unmatched(&dual, &mut mate);
        assert_eq!(repaired, 2);
        assert_eq!(mate, vec![1, 0, 3, 2]);
    }

    #[test]
    fn test_isolated_triangle_stays_unmatched() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let dual = DualGraph::build(&[[0, 1, 2]], &points).unwrap();
        let mut mate = vec![NONE];
        assert_eq!(repair_unmatched(&dual, &mut mate), 0);
        assert_eq!(mate, vec![NONE]);
    }
}
