//! Weighted dual graph of a triangulation.

use nalgebra::Point3;

use crate::algo::quality::quad_quality;
use crate::error::Result;
use crate::mesh::adjacency::{triangle_neighbors, BOUNDARY};

/// Two triangles sharing an edge and the quad they would form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DualEdge {
    /// Lower triangle index.
    pub t1: usize,
    /// Higher triangle index.
    pub t2: usize,
    /// Merged quad `[a, d, b, c]`: `a -> b` is the shared edge as seen
    /// from `t1 = [a, b, c]`, and `d` is the far vertex of `t2`.
    pub quad: [usize; 4],
    /// Quality of the merged quad.
    pub weight: f64,
}

/// One node per triangle, one edge per interior triangle edge.
#[derive(Debug, Clone, Default)]
pub struct DualGraph {
    /// Dual edges ordered by `(t1, local edge of t1)`.
    pub edges: Vec<DualEdge>,
    /// Indices into `edges` incident to each triangle.
    pub incident: Vec<Vec<usize>>,
}

impl DualGraph {
    /// Build the dual graph and weigh every edge by the quality of the
    /// merged quad.
    ///
    /// Fails if the triangulation is not manifold.
    pub fn build(tris: &[[usize; 3]], points: &[Point3<f64>]) -> Result<Self> {
        let neighbors = triangle_neighbors(tris)?;
        let mut graph = Self {
            edges: Vec::new(),
            incident: vec![Vec::new(); tris.len()],
        };
        for (t, tri) in tris.iter().enumerate() {
            for i in 0..3 {
                let nb = neighbors[t][i];
                if nb == BOUNDARY || nb < t {
                    continue;
                }
                let (a, b, c) = (tri[i], tri[(i + 1) % 3], tri[(i + 2) % 3]);
                let Some(&d) = tris[nb].iter().find(|&&v| v != a && v != b) else {
                    continue;
                };
                let quad = [a, d, b, c];
                let weight = quad_quality(&quad.map(|v| points[v]));
                let k = graph.edges.len();
                graph.edges.push(DualEdge {
                    t1: t,
                    t2: nb,
                    quad,
                    weight,
                });
                graph.incident[t].push(k);
                graph.incident[nb].push(k);
            }
        }
        Ok(graph)
    }

    /// Number of triangles.
    pub fn num_nodes(&self) -> usize {
        self.incident.len()
    }

    /// The dual edge joining two triangles, if any.
    pub fn edge_between(&self, t1: usize, t2: usize) -> Option<&DualEdge> {
        self.incident
            .get(t1)?
            .iter()
            .map(|&k| &self.edges[k])
            .find(|e| (e.t1 == t1 && e.t2 == t2) || (e.t1 == t2 && e.t2 == t1))
    }

    /// Triangle on the other side of dual edge `k`.
    pub fn other(&self, k: usize, t: usize) -> usize {
        let e = &self.edges[k];
        if e.t1 == t {
            e.t2
        } else {
            e.t1
        }
    }

    /// Centroid of every triangle, used as dual node positions in dumps.
    pub fn centroids(tris: &[[usize; 3]], points: &[Point3<f64>]) -> Vec<Point3<f64>> {
        tris.iter()
            .map(|t| Point3::from((points[t[0]].coords + points[t[1]].coords + points[t[2]].coords) / 3.0))
            .collect()
    }
}
