//! Entity meshes and their assembly into one numbered mesh.
//!
//! # Overview
//!
//! Every model entity gets its own mesh object, meshed strictly in the order
//! edges, faces, volumes:
//!
//! - [`EdgeMesh`]: points along a curve
//! - [`FaceMesh`]: a quad mesh of a face, structured or unstructured
//! - [`VolumeMesh`]: a swept hexahedral mesh of a volume
//!
//! [`Mesh`] drives the whole pipeline for a [`Model`](crate::geometry::Model)
//! and produces a [`GlobalMesh`].
//!
//! # Node identity
//!
//! A node shared by several entities is owned by exactly one of them and
//! referenced by [`NodeKey`] everywhere else. Global numbering walks the
//! entities in a fixed order with a [`NumberingContext`]; shared nodes pick
//! up their owner's number, so no geometric matching is needed.
//!
//! ```
//! use brepmesh::geometry::shapes;
//! use brepmesh::mesh::Mesh;
//! use brepmesh::options::MeshOptions;
//!
//! let model = shapes::rectangle(1.0, 1.0).unwrap();
//! let mut mesh = Mesh::new(&model);
//! mesh.mesh(&MeshOptions::default(), 0.25).unwrap();
//! let global = mesh.global().unwrap();
//! assert_eq!(global.num_nodes(), 25);
//! assert_eq!(global.num_quads(), 16);
//! ```

pub mod adjacency;
mod edge;
mod face;
mod global;
mod model_mesh;
mod node;
mod numbering;
mod volume;

pub use edge::EdgeMesh;
pub use face::{FaceMesh, FaceMeshType};
pub use global::GlobalMesh;
pub use model_mesh::Mesh;
pub use node::{NodeKey, NodeRecord};
pub use numbering::NumberingContext;
pub use volume::VolumeMesh;

use nalgebra::Point3;

use crate::error::{MeshError, Result};
use crate::geometry::{EdgeId, FaceId, Model};

/// The mesh of edge `e` from an edge-indexed slice.
pub(crate) fn edge_mesh<'a, 'm>(edges: &'a [EdgeMesh<'m>], e: EdgeId) -> Result<&'a EdgeMesh<'m>> {
    match edges.get(e.index()) {
        Some(em) if em.edge() == e => Ok(em),
        _ => Err(MeshError::InvalidState(format!("no mesh for {:?}", e))),
    }
}

/// The mesh of face `f` from a face-indexed slice.
pub(crate) fn face_mesh<'a, 'm>(faces: &'a [FaceMesh<'m>], f: FaceId) -> Result<&'a FaceMesh<'m>> {
    match faces.get(f.index()) {
        Some(fm) if fm.face() == f => Ok(fm),
        _ => Err(MeshError::InvalidState(format!("no mesh for {:?}", f))),
    }
}

/// Global number of a node owned by a vertex, edge or face.
pub(crate) fn resolve_key(
    key: NodeKey,
    ctx: &NumberingContext,
    edges: &[EdgeMesh],
    faces: &[FaceMesh],
) -> Result<usize> {
    match key {
        NodeKey::Vertex(v) => ctx.vertex_num(v),
        NodeKey::Edge(e, j) => edge_mesh(edges, e)?.node_num(j),
        NodeKey::Face(f, i) => face_mesh(faces, f)?.free_node_num(i),
        NodeKey::Volume(v, _) => Err(MeshError::InvalidState(format!(
            "{:?} is only numbered by {:?}",
            key, v
        ))),
    }
}

/// Position of a node owned by a vertex, edge or face.
pub(crate) fn key_point(
    key: NodeKey,
    model: &Model,
    edges: &[EdgeMesh],
    faces: &[FaceMesh],
) -> Result<Point3<f64>> {
    match key {
        NodeKey::Vertex(v) => Ok(model.vertex(v).point()),
        NodeKey::Edge(e, j) => Ok(edge_mesh(edges, e)?.node(j)?.point),
        NodeKey::Face(f, i) => {
            let fm = face_mesh(faces, f)?;
            Ok(fm.node(fm.num_fixed_points()? + i)?.point)
        }
        NodeKey::Volume(v, _) => Err(MeshError::InvalidState(format!(
            "{:?} has no position outside {:?}",
            key, v
        ))),
    }
}
