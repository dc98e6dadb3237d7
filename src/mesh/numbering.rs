//! Global node numbering.

use crate::error::{MeshError, Result};
use crate::geometry::VertexId;

/// Counter threaded through the numbering pass.
///
/// Entities are numbered in a fixed order (vertices, edges, faces,
/// volumes). Each entity asks the context for fresh numbers for the nodes
/// it owns and resolves every other node through its owner.
#[derive(Debug, Clone)]
pub struct NumberingContext {
    next: usize,
    vertex_nums: Vec<Option<usize>>,
}

impl NumberingContext {
    /// Create a context for a model with `num_vertices` vertices.
    pub fn new(num_vertices: usize) -> Self {
        Self {
            next: 0,
            vertex_nums: vec![None; num_vertices],
        }
    }

    /// Number every model vertex in handle order. Returns how many were assigned.
    pub fn number_vertices(&mut self) -> usize {
        let mut count = 0;
        for i in 0..self.vertex_nums.len() {
            if self.vertex_nums[i].is_none() {
                self.vertex_nums[i] = Some(self.next_num());
                count += 1;
            }
        }
        count
    }

    /// Take the next unused number.
    #[inline]
    pub fn next_num(&mut self) -> usize {
        let n = self.next;
        self.next += 1;
        n
    }

    /// Global number of a model vertex.
    pub fn vertex_num(&self, v: VertexId) -> Result<usize> {
        self.vertex_nums
            .get(v.index())
            .copied()
            .flatten()
            .ok_or_else(|| MeshError::InvalidState(format!("{:?} is not numbered", v)))
    }

    /// Total numbers handed out so far.
    pub fn num_assigned(&self) -> usize {
        self.next
    }
}
