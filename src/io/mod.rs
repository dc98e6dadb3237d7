//! Mesh file output.
//!
//! # Supported Formats
//!
//! | Format | Extension | Write | Read | Notes |
//! |--------|-----------|-------|------|-------|
//! | Legacy VTK | `.vtk` | ✓ | ✓ | ASCII unstructured grid, quads and hexes |
//! | Nastran bulk data | `.bdf`, `.nas` | ✓ | ✗ | `GRID*` and `CQUAD4` records |
//!
//! # Usage
//!
//! ```no_run
//! use brepmesh::geometry::shapes;
//! use brepmesh::mesh::Mesh;
//! use brepmesh::options::MeshOptions;
//!
//! let model = shapes::rectangle(2.0, 1.0).unwrap();
//! let mut mesh = Mesh::new(&model);
//! mesh.mesh(&MeshOptions::default(), 0.25).unwrap();
//! brepmesh::io::save_global(mesh.global().unwrap(), "plate.bdf").unwrap();
//! ```

pub mod bdf;
pub mod vtk;

use std::path::Path;

pub use vtk::{CellKind, UnstructuredGrid};

use crate::error::{MeshError, Result};
use crate::mesh::GlobalMesh;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Legacy ASCII VTK.
    Vtk,
    /// Nastran bulk data.
    Bdf,
}

impl Format {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext.to_lowercase().as_str() {
            "vtk" => Some(Format::Vtk),
            "bdf" | "nas" => Some(Format::Bdf),
            _ => None,
        }
    }

    /// Detect format from file path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Format> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Format::from_extension)
    }
}

/// Save an assembled mesh, choosing the format from the file extension.
///
/// Bulk data holds the surface quads only; VTK also carries the hexes.
pub fn save_global<P: AsRef<Path>>(mesh: &GlobalMesh, path: P) -> Result<()> {
    let path = path.as_ref();
    let format = Format::from_path(path).ok_or_else(|| MeshError::UnsupportedFormat {
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("(none)")
            .to_string(),
    })?;

    match format {
        Format::Vtk => mesh.write_to_vtk(path),
        Format::Bdf => mesh.write_to_bdf(path),
    }
}
