//! The assembled mesh of a whole model.

use std::collections::HashMap;
use std::path::Path;

use nalgebra::Point3;

use crate::error::Result;
use crate::geometry::{BilinearPatch, EdgeId, EdgeUse, LineSegment, Model, VertexId};
use crate::io::{bdf, CellKind, UnstructuredGrid};

/// Points indexed by global number plus all quads and hexes in global
/// numbering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalMesh {
    /// Node positions, index = global number.
    pub points: Vec<Point3<f64>>,
    /// Surface quads of every face, face by face.
    pub quads: Vec<[usize; 4]>,
    /// Hexahedra of every volume, volume by volume.
    pub hexes: Vec<[usize; 8]>,
}

impl GlobalMesh {
    /// Number of distinct nodes.
    pub fn num_nodes(&self) -> usize {
        self.points.len()
    }

    /// Number of quads.
    pub fn num_quads(&self) -> usize {
        self.quads.len()
    }

    /// Number of hexahedra.
    pub fn num_hexes(&self) -> usize {
        self.hexes.len()
    }

    /// The mesh as a VTK grid: quads first, then hexes, in storage order.
    pub fn to_grid(&self) -> UnstructuredGrid {
        UnstructuredGrid::new("brepmesh global mesh")
            .with_points(self.points.clone())
            .with_cells(CellKind::Quad, &self.quads)
            .with_cells(CellKind::Hexahedron, &self.hexes)
    }

    /// Write quads and hexes as legacy VTK.
    pub fn write_to_vtk<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.to_grid().save(path)
    }

    /// Write the surface quads as Nastran bulk data.
    pub fn write_to_bdf<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        bdf::save(path, &self.points, &self.quads)
    }

    /// Build a model from the surface mesh: one vertex per node, one line
    /// edge per distinct quad edge and one bilinear face per quad.
    pub fn to_model(&self) -> Result<Model> {
        let mut model = Model::new();
        let vertices: Vec<VertexId> = self.points.iter().map(|&p| model.add_vertex(p)).collect();
        let mut edges: HashMap<(usize, usize), EdgeId> = HashMap::new();

        for q in &self.quads {
            let mut uses = Vec::with_capacity(4);
            for k in 0..4 {
                let (a, b) = (q[k], q[(k + 1) % 4]);
                if a == b {
                    continue;
                }
                let key = (a.min(b), a.max(b));
                let edge = match edges.get(&key) {
                    Some(&e) => e,
                    None => {
                        let (lo, hi) = key;
                        let e = model.add_edge(
                            LineSegment::new(self.points[lo], self.points[hi]),
                            vertices[lo],
                            vertices[hi],
                        )?;
                        edges.insert(key, e);
                        e
                    }
                };
                uses.push(if a < b { EdgeUse::fwd(edge) } else { EdgeUse::rev(edge) });
            }
            let corners = q.map(|v| self.points[v]);
            model.add_face(BilinearPatch::new(corners), vec![uses])?;
        }
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_quads() -> GlobalMesh {
        GlobalMesh {
            points: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(2.0, 1.0, 0.0),
            ],
            quads: vec![[0, 1, 4, 3], [1, 2, 5, 4]],
            hexes: Vec::new(),
        }
    }

    #[test]
    fn test_to_model_shares_edges() {
        let model = two_quads().to_model().unwrap();
        assert_eq!(model.num_vertices(), 6);
        assert_eq!(model.num_edges(), 7);
        assert_eq!(model.num_faces(), 2);
    }

    #[test]
    fn test_vtk_reparse_counts() {
        let mesh = two_quads();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("global.vtk");
        mesh.write_to_vtk(&path).unwrap();
        let grid = UnstructuredGrid::load(&path).unwrap();
        assert_eq!(grid.num_points(), mesh.num_nodes());
        assert_eq!(grid.num_cells(), mesh.num_quads() + mesh.num_hexes());
    }
}
