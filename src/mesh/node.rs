//! Logical node identity.
//!
//! A node on a shared boundary belongs to exactly one entity: the vertex,
//! edge, face or volume that created it. Every other entity that touches the
//! node stores its [`NodeKey`] instead of a copy, so numbering propagates
//! without any geometric coincidence search.

use nalgebra::Point3;

use crate::geometry::{EdgeId, FaceId, VertexId, VolumeId};

/// Name of a logical mesh node by its owning entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKey {
    /// A model vertex.
    Vertex(VertexId),
    /// Interior point `i` of an edge mesh, counted in the edge's own
    /// parameter direction.
    Edge(EdgeId, usize),
    /// Free (interior) point `i` of a face mesh.
    Face(FaceId, usize),
    /// Interior point `i` of a swept volume mesh.
    Volume(VolumeId, usize),
}

/// Value view of one node of an entity mesh.
///
/// `P` is the parameter type: `f64` for curves, `Point2<f64>` for surfaces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeRecord<P> {
    /// Coordinates in the entity's parameter domain.
    pub param: P,
    /// Evaluated position.
    pub point: Point3<f64>,
    /// Global number, unset until numbering runs.
    pub num: Option<usize>,
}
