//! Progress reporting for model meshing.
//!
//! The assembler reports one step per meshed entity, so a caller can drive
//! a progress bar without knowing the pipeline's internals.
//!
//! # Example
//!
//! ```
//! use brepmesh::algo::progress::Progress;
//!
//! let progress = Progress::new(|current, total, message| {
//!     eprintln!("[{}/{}] {}", current, total, message);
//! });
//! progress.report(0, 3, "meshing edges");
//! ```

/// Resolution of one stage in [`Progress::report_sub`].
const SUB_STEPS: usize = 1000;

/// A callback receiving `(current, total, message)` as meshing advances.
pub struct Progress {
    callback: Box<dyn Fn(usize, usize, &str) + Send + Sync>,
}

impl Progress {
    /// Create a new progress reporter with the given callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(usize, usize, &str) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Report progress.
    #[inline]
    pub fn report(&self, current: usize, total: usize, message: &str) {
        (self.callback)(current, total, message);
    }

    /// Report progress within a sub-range.
    ///
    /// Maps progress from `[0, sub_total]` to `[range_current, range_current + 1]`
    /// within a total of `range_total` steps. This enables hierarchical progress
    /// where sub-operations report their progress within an allocated slice.
    ///
    /// # Example
    ///
    /// ```
    /// # use brepmesh::algo::progress::Progress;
    /// # let progress = Progress::none();
    /// // stage 1 of 4 is face meshing, 7 of 20 faces are done
    /// progress.report_sub(7, 20, 1, 4, "meshing faces");
    /// ```
    #[inline]
    pub fn report_sub(
        &self,
        sub_current: usize,
        sub_total: usize,
        range_current: usize,
        range_total: usize,
        message: &str,
    ) {
        if sub_total == 0 || range_total == 0 {
            return;
        }
        let within = sub_current.min(sub_total) * SUB_STEPS / sub_total;
        (self.callback)(range_current * SUB_STEPS + within, range_total * SUB_STEPS, message);
    }

    /// Create a no-op progress reporter that discards all updates.
    pub fn none() -> Self {
        Self::new(|_, _, _| {})
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress").finish_non_exhaustive()
    }
}
