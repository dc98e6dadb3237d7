//! Meshing algorithms.
//!
//! - **Triangulation**: constrained Delaunay kernel, frontal refinement,
//!   structured grids
//! - **Smoothing**: Laplacian and spring smoothing in parameter space
//! - **Recombination**: dual graph, blossom matching, repair, doublet removal
//! - **Quality**: element quality metrics and histograms
//! - **Sweep**: bottom/top decomposition of swept volumes

pub mod progress;
pub mod quality;
pub mod recombine;
pub mod smooth;
pub mod sweep;
pub mod triangulate;

pub use progress::Progress;
