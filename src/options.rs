//! Meshing options.
//!
//! A single [`MeshOptions`] value configures every stage of the pipeline,
//! from edge sampling to quad smoothing, plus the per-stage diagnostic dumps.
//!
//! # Example
//!
//! ```
//! use brepmesh::options::{MeshOptions, TriSmoothingType};
//!
//! let options = MeshOptions::default()
//!     .with_smoothing_steps(5)
//!     .with_tri_smoothing(TriSmoothingType::Spring)
//!     .with_frontal_quality_factor(1.3);
//! assert!(options.validate().is_ok());
//! ```

use std::path::{Path, PathBuf};

use crate::error::{MeshError, Result};

/// Smoothing rule applied to the free points of a triangulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriSmoothingType {
    /// Move each point to the centroid of its neighbours.
    #[default]
    Laplacian,
    /// Relax each point under springs with a common rest length.
    Spring,
}

/// Diagnostic VTK dumps, one toggle per generation stage.
///
/// Files are written to `dir` as `<stage>_<face>.vtk`. A dump that fails to
/// write is logged and does not abort meshing.
#[derive(Debug, Clone, Default)]
pub struct DumpOptions {
    /// Boundary-only Delaunay triangulation of the parameter domain.
    pub init_domain_triangle: bool,
    /// Triangulation after frontal refinement.
    pub pre_smooth_triangle: bool,
    /// Triangulation after smoothing.
    pub post_smooth_triangle: bool,
    /// Weighted dual graph used for recombination.
    pub dual_recombine: bool,
    /// Quads after recombination and simplification.
    pub pre_smooth_quad: bool,
    /// Quads after smoothing.
    pub post_smooth_quad: bool,
    /// Dual graph of the final quad mesh.
    pub quad_dual: bool,
    /// Output directory.
    pub dir: PathBuf,
}

impl DumpOptions {
    /// Enable every stage and write into `dir`.
    pub fn all<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            init_domain_triangle: true,
            pre_smooth_triangle: true,
            post_smooth_triangle: true,
            dual_recombine: true,
            pre_smooth_quad: true,
            post_smooth_quad: true,
            quad_dual: true,
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Whether any stage is enabled.
    pub fn any(&self) -> bool {
        self.init_domain_triangle
            || self.pre_smooth_triangle
            || self.post_smooth_triangle
            || self.dual_recombine
            || self.pre_smooth_quad
            || self.post_smooth_quad
            || self.quad_dual
    }

    /// Path of the dump file for a stage and face index.
    pub fn path(&self, stage: &str, face: usize) -> PathBuf {
        self.dir.join(format!("{}_{}.vtk", stage, face))
    }
}

/// Options controlling the meshing pipeline.
#[derive(Debug, Clone)]
pub struct MeshOptions {
    /// Smoothing iterations applied to triangles and again to quads.
    pub num_smoothing_steps: usize,

    /// Smoothing rule for the triangulation.
    pub tri_smoothing_type: TriSmoothingType,

    /// Acceptance ratio of the frontal refinement: a triangle is accepted
    /// once its circumradius is within this factor of the ideal one.
    pub frontal_quality_factor: f64,

    /// Whether to use parallel execution in smoothing (default: true).
    pub parallel: bool,

    /// Number of parameter intervals used to tabulate curve arc length.
    pub arc_length_resolution: usize,

    /// Cap on doublet-removal passes in quad simplification.
    pub max_simplify_iterations: usize,

    /// Diagnostic dumps.
    pub dump: DumpOptions,
}

impl Default for MeshOptions {
    fn default() -> Self {
        Self {
            num_smoothing_steps: 10,
            tri_smoothing_type: TriSmoothingType::Laplacian,
            frontal_quality_factor: 1.5,
            parallel: true,
            arc_length_resolution: 64,
            max_simplify_iterations: 10,
            dump: DumpOptions::default(),
        }
    }
}

impl MeshOptions {
    /// Set the number of smoothing iterations.
    pub fn with_smoothing_steps(mut self, steps: usize) -> Self {
        self.num_smoothing_steps = steps;
        self
    }

    /// Set the triangle smoothing rule.
    pub fn with_tri_smoothing(mut self, kind: TriSmoothingType) -> Self {
        self.tri_smoothing_type = kind;
        self
    }

    /// Set the frontal acceptance factor.
    pub fn with_frontal_quality_factor(mut self, factor: f64) -> Self {
        self.frontal_quality_factor = factor;
        self
    }

    /// Set whether to use parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Create options for single-threaded execution.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Set the arc-length tabulation resolution.
    pub fn with_arc_length_resolution(mut self, intervals: usize) -> Self {
        self.arc_length_resolution = intervals;
        self
    }

    /// Set the diagnostic dumps.
    pub fn with_dump(mut self, dump: DumpOptions) -> Self {
        self.dump = dump;
        self
    }

    /// Check that every field is usable.
    pub fn validate(&self) -> Result<()> {
        if !(self.frontal_quality_factor > 0.0) || !self.frontal_quality_factor.is_finite() {
            return Err(MeshError::invalid_param(
                "frontal_quality_factor",
                self.frontal_quality_factor,
                "must be a positive finite number",
            ));
        }
        if self.arc_length_resolution == 0 {
            return Err(MeshError::invalid_param(
                "arc_length_resolution",
                self.arc_length_resolution,
                "must be at least 1",
            ));
        }
        Ok(())
    }
}
