//! Error types for brepmesh.
//!
//! Every fallible meshing, numbering and export operation returns
//! [`Result`]. Degenerate curves and unmatched triangles are handled
//! conditions and never surface here.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`MeshError`].
pub type Result<T> = std::result::Result<T, MeshError>;

/// Errors that can occur while meshing a model.
#[derive(Error, Debug)]
pub enum MeshError {
    /// An accessor or dependent operation ran before the data it needs exists.
    #[error("invalid mesh state: {0}")]
    InvalidState(String),

    /// The boundary topology of an entity cannot be decomposed as required.
    #[error("topology error on {entity}: {message}")]
    Topology {
        /// The entity that failed, e.g. `F(3)` or `Vol(0)`.
        entity: String,
        /// Description of the inconsistency.
        message: String,
    },

    /// The triangulation handed to recombination is not manifold.
    #[error("mesh has non-manifold topology: {details}")]
    NonManifold {
        /// Description of the non-manifold condition.
        details: String,
    },

    /// An edge has more than two incident triangles.
    #[error("edge ({v0}, {v1}) has more than two incident faces")]
    NonManifoldEdge {
        /// First vertex of the edge.
        v0: usize,
        /// Second vertex of the edge.
        v1: usize,
    },

    /// A swept hexahedron has non-positive volume.
    #[error("element {element} is degenerate (estimated volume {volume:e})")]
    DegenerateElement {
        /// Index of the element within its volume mesh.
        element: usize,
        /// The estimated volume.
        volume: f64,
    },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error loading a mesh from file.
    #[error("failed to load mesh from {path}: {message}")]
    LoadError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Error saving a mesh to file.
    #[error("failed to save mesh to {path}: {message}")]
    SaveError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Unsupported file format.
    #[error("unsupported file format: {extension}")]
    UnsupportedFormat {
        /// The file extension.
        extension: String,
    },

    /// Algorithm failed to converge.
    #[error("algorithm failed to converge after {iterations} iterations")]
    ConvergenceFailed {
        /// Number of iterations attempted.
        iterations: usize,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl MeshError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        MeshError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// Create a topology error for the given entity.
    pub fn topology<E: std::fmt::Debug>(entity: E, message: impl Into<String>) -> Self {
        MeshError::Topology {
            entity: format!("{:?}", entity),
            message: message.into(),
        }
    }

    /// Create a state error for an entity whose mesh has not been generated.
    pub fn not_meshed<E: std::fmt::Debug>(entity: E) -> Self {
        MeshError::InvalidState(format!("{:?} has not been meshed", entity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topology_message() {
        let err = MeshError::topology("F(2)", "loop is not closed");
        assert_eq!(err.to_string(), "topology error on \"F(2)\": loop is not closed");
    }

    #[test]
    fn test_invalid_param() {
        let err = MeshError::invalid_param("htarget", -1.0, "must be positive");
        assert!(matches!(err, MeshError::InvalidParameter { name: "htarget", .. }));
        assert!(err.to_string().contains("-1"));
    }
}
