//! Element adjacency from face-vertex lists.
//!
//! Neighbour `n[i]` of polygon `p` is the polygon across the edge
//! `(p[i], p[i + 1])`, or [`BOUNDARY`] when that edge is on the boundary.

use std::collections::HashMap;

use crate::error::{MeshError, Result};

/// Sentinel neighbour for a boundary edge.
pub const BOUNDARY: usize = usize::MAX;

/// Build symmetric neighbour links for consistently oriented polygons.
///
/// Edges with repeated endpoints (collapsed corners of degenerate quads)
/// get no neighbour. Fails if an edge is shared by more than two polygons
/// or is traversed twice in the same direction.
pub fn polygon_neighbors<const N: usize>(polys: &[[usize; N]]) -> Result<Vec<[usize; N]>> {
    let mut uses: HashMap<(usize, usize), usize> = HashMap::new();
    for poly in polys {
        for i in 0..N {
            let (a, b) = (poly[i], poly[(i + 1) % N]);
            if a != b {
                let count = uses.entry((a.min(b), a.max(b))).or_insert(0);
                *count += 1;
                if *count > 2 {
                    return Err(MeshError::NonManifoldEdge { v0: a.min(b), v1: a.max(b) });
                }
            }
        }
    }

    // Map from directed edge (v0, v1) to (polygon, local edge)
    let mut edge_map: HashMap<(usize, usize), (usize, usize)> = HashMap::new();
    for (p, poly) in polys.iter().enumerate() {
        for i in 0..N {
            let (a, b) = (poly[i], poly[(i + 1) % N]);
            if a == b {
                continue;
            }
            if edge_map.insert((a, b), (p, i)).is_some() {
                return Err(MeshError::NonManifold {
                    details: format!("edge ({}, {}) is traversed twice in the same direction", a, b),
                });
            }
        }
    }

    let mut neighbors = vec![[BOUNDARY; N]; polys.len()];
    for (&(a, b), &(p, i)) in &edge_map {
        if let Some(&(q, _)) = edge_map.get(&(b, a)) {
            neighbors[p][i] = q;
        }
    }
    Ok(neighbors)
}

/// Neighbour links of a triangle list.
pub fn triangle_neighbors(tris: &[[usize; 3]]) -> Result<Vec<[usize; 3]>> {
    polygon_neighbors(tris)
}

/// Neighbour links of a quad list.
pub fn quad_neighbors(quads: &[[usize; 4]]) -> Result<Vec<[usize; 4]>> {
    polygon_neighbors(quads)
}
