//! Edge meshes: point sequences along model curves.

use log::debug;
use nalgebra::Point3;

use crate::error::{MeshError, Result};
use crate::geometry::{ArcLengthTable, EdgeId, Model};
use crate::options::MeshOptions;

use super::node::{NodeKey, NodeRecord};
use super::numbering::NumberingContext;

/// The discretization of one model edge.
///
/// Points are spaced uniformly in arc length. The two end points are the
/// edge's model vertices and are numbered by the vertices, never here.
#[derive(Debug)]
pub struct EdgeMesh<'m> {
    model: &'m Model,
    edge: EdgeId,
    params: Vec<f64>,
    points: Vec<Point3<f64>>,
    node_nums: Vec<Option<usize>>,
    meshed: bool,
}

impl<'m> EdgeMesh<'m> {
    /// Create an unmeshed edge mesh.
    pub fn new(model: &'m Model, edge: EdgeId) -> Self {
        Self {
            model,
            edge,
            params: Vec::new(),
            points: Vec::new(),
            node_nums: Vec::new(),
            meshed: false,
        }
    }

    /// The meshed edge.
    pub fn edge(&self) -> EdgeId {
        self.edge
    }

    /// Point count for a curve of `length` at target spacing `htarget`:
    /// `max(2, round(length / htarget) + 1)`.
    pub fn point_count(length: f64, htarget: f64) -> usize {
        if !(length > 0.0) || !(htarget > 0.0) {
            return 2;
        }
        ((length / htarget).round() as usize + 1).max(2)
    }

    /// Mesh the edge at target spacing `htarget`.
    pub fn mesh(&mut self, options: &MeshOptions, htarget: f64) -> Result<()> {
        if !(htarget > 0.0) || !htarget.is_finite() {
            return Err(MeshError::invalid_param("htarget", htarget, "must be positive"));
        }
        let npts = Self::point_count(self.model.edge(self.edge).length(), htarget);
        self.mesh_with_points(options, npts)
    }

    /// Mesh the edge with exactly `npts` points (at least 2). A degenerate
    /// edge always gets two coincident points.
    pub fn mesh_with_points(&mut self, options: &MeshOptions, npts: usize) -> Result<()> {
        self.meshed = false;
        self.params.clear();
        self.points.clear();
        self.node_nums.clear();

        let edge = self.model.edge(self.edge);
        let curve = edge.curve();
        let (t0, t1) = curve.range();
        let (v0, v1) = edge.vertices();
        let (p0, p1) = (self.model.vertex(v0).point(), self.model.vertex(v1).point());

        if edge.is_degenerate() {
            self.params = vec![t0, t1];
            self.points = vec![p0, p1];
        } else {
            let npts = npts.max(2);
            let table = ArcLengthTable::new(curve, options.arc_length_resolution);
            let length = table.length();
            self.params.push(t0);
            self.points.push(p0);
            for i in 1..npts - 1 {
                let s = length * i as f64 / (npts - 1) as f64;
                let t = table.param_at(curve, s);
                self.params.push(t);
                self.points.push(curve.eval_point(t));
            }
            self.params.push(t1);
            self.points.push(p1);
        }
        self.node_nums = vec![None; self.params.len()];
        self.meshed = true;
        debug!("{:?}: {} points", self.edge, self.params.len());
        Ok(())
    }

    /// Whether `mesh()` has run.
    pub fn is_meshed(&self) -> bool {
        self.meshed
    }

    fn check(&self) -> Result<()> {
        if self.meshed {
            Ok(())
        } else {
            Err(MeshError::not_meshed(self.edge))
        }
    }

    /// Whether the edge has zero length.
    pub fn is_degenerate(&self) -> Result<bool> {
        self.check()?;
        Ok(self.model.edge(self.edge).is_degenerate())
    }

    /// Number of points, end points included.
    pub fn num_points(&self) -> Result<usize> {
        self.check()?;
        Ok(self.params.len())
    }

    /// Curve parameters and positions of the points.
    pub fn mesh_points(&self) -> Result<(&[f64], &[Point3<f64>])> {
        self.check()?;
        Ok((&self.params, &self.points))
    }

    /// Logical node of point `i`.
    pub fn node_key(&self, i: usize) -> Result<NodeKey> {
        self.check()?;
        let n = self.params.len();
        if i >= n {
            return Err(MeshError::InvalidState(format!(
                "{:?} has no point {}",
                self.edge, i
            )));
        }
        let (v0, v1) = self.model.edge(self.edge).vertices();
        Ok(if i == 0 {
            NodeKey::Vertex(v0)
        } else if i == n - 1 {
            NodeKey::Vertex(v1)
        } else {
            NodeKey::Edge(self.edge, i)
        })
    }

    /// Value view of point `i`.
    pub fn node(&self, i: usize) -> Result<NodeRecord<f64>> {
        self.node_key(i)?;
        Ok(NodeRecord {
            param: self.params[i],
            point: self.points[i],
            num: self.node_nums[i],
        })
    }

    /// Number the interior points with fresh numbers and take the end
    /// numbers from the vertices. Returns how many numbers were assigned.
    pub fn set_node_nums(&mut self, ctx: &mut NumberingContext) -> Result<usize> {
        self.check()?;
        let n = self.params.len();
        let (v0, v1) = self.model.edge(self.edge).vertices();
        self.node_nums[0] = Some(ctx.vertex_num(v0)?);
        self.node_nums[n - 1] = Some(ctx.vertex_num(v1)?);
        let mut count = 0;
        for i in 1..n - 1 {
            if self.node_nums[i].is_none() {
                self.node_nums[i] = Some(ctx.next_num());
                count += 1;
            }
        }
        Ok(count)
    }

    /// Global number of point `i`.
    pub fn node_num(&self, i: usize) -> Result<usize> {
        self.check()?;
        self.node_nums
            .get(i)
            .copied()
            .flatten()
            .ok_or_else(|| MeshError::InvalidState(format!("{:?} point {} is not numbered", self.edge, i)))
    }

    /// Global numbers of all points.
    pub fn node_nums(&self) -> Result<Vec<usize>> {
        (0..self.params.len()).map(|i| self.node_num(i)).collect()
    }
}
