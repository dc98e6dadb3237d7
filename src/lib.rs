//! # brepmesh
//!
//! Quad-dominant surface meshing and swept hexahedral meshing of
//! boundary-representation models, for finite-element analysis.
//!
//! The pipeline runs strictly bottom-up:
//!
//! 1. every edge curve is sampled at near-uniform arc length
//! 2. every face is meshed, as a structured grid when it has four sides with
//!    matching point counts, otherwise by frontal Delaunay triangulation
//!    followed by blossom-matching recombination into quads
//! 3. every swept volume is filled with hexahedra by stacking copies of its
//!    bottom face mesh along the depth edges
//! 4. all nodes get one global number and the result is assembled into a
//!    single [`GlobalMesh`](mesh::GlobalMesh)
//!
//! ## Features
//!
//! - **Shared nodes by identity**: entities sharing a vertex or edge share
//!   its nodes without any geometric search
//! - **Blossom matching**: triangles pair up by maximum-weight matching on
//!   the dual graph
//! - **Diagnostics**: per-stage VTK dumps and quality histograms
//! - **Export**: legacy VTK and Nastran bulk data
//!
//! ## Quick Start
//!
//! ```
//! use brepmesh::prelude::*;
//!
//! let model = shapes::block(1.0, 1.0, 1.0).unwrap();
//! let mut mesh = Mesh::new(&model);
//! mesh.mesh(&MeshOptions::default(), 0.5).unwrap();
//!
//! let global = mesh.global().unwrap();
//! assert_eq!(global.num_nodes(), 27);
//! assert_eq!(global.num_hexes(), 8);
//! ```
//!
//! ## Building Models
//!
//! ```
//! use brepmesh::prelude::*;
//! use nalgebra::{Point2, Point3};
//!
//! let mut model = Model::new();
//! let v: Vec<_> = [(0.0, 0.0), (2.0, 0.0), (2.0, 1.0), (0.0, 1.0)]
//!     .iter()
//!     .map(|&(x, y)| model.add_vertex(Point3::new(x, y, 0.0)))
//!     .collect();
//! let mut uses = Vec::new();
//! for k in 0..4 {
//!     let (a, b) = (v[k], v[(k + 1) % 4]);
//!     let line = LineSegment::new(model.vertex(a).point(), model.vertex(b).point());
//!     uses.push(EdgeUse::fwd(model.add_edge(line, a, b).unwrap()));
//! }
//! model
//!     .add_face(Plane::xy(0.0, Point2::new(0.0, 0.0), Point2::new(2.0, 1.0)), vec![uses])
//!     .unwrap();
//!
//! let mut mesh = Mesh::new(&model);
//! mesh.mesh(&MeshOptions::default(), 0.5).unwrap();
//! assert_eq!(mesh.quad_connectivity().unwrap().len(), 8);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod error;
pub mod geometry;
pub mod io;
pub mod mesh;
pub mod options;

/// Prelude module for convenient imports.
///
/// ```
/// use brepmesh::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{MeshError, Result};
    pub use crate::geometry::{
        shapes, EdgeId, EdgeUse, FaceId, LineSegment, Model, Plane, VertexId, VolumeId,
    };
    pub use crate::mesh::{FaceMeshType, GlobalMesh, Mesh, NodeKey};
    pub use crate::options::{DumpOptions, MeshOptions, TriSmoothingType};
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_plate_with_hole() {
        let model = shapes::plate_with_hole(2.0, 1.0, 0.25).unwrap();
        let mut mesh = Mesh::new(&model);
        mesh.mesh(&MeshOptions::default().sequential(), 0.2).unwrap();
        let global = mesh.global().unwrap();

        assert!(global.num_quads() > 0);
        assert_eq!(global.num_hexes(), 0);
        for q in &global.quads {
            assert!(q.iter().all(|&v| v < global.num_nodes()));
        }
        let face = mesh.face_mesh(FaceId::new(0)).unwrap();
        assert_eq!(face.mesh_type(), FaceMeshType::Unstructured);
    }
}
