//! Parameter-space triangulation of face domains.
//!
//! - [`delaunay`]: constrained Delaunay kernel with robust predicates
//! - [`frontal`]: advancing-front refinement towards a target size
//! - [`structured`]: transfinite quad grids for four-sided faces

pub mod delaunay;
pub mod frontal;
pub mod structured;

pub use delaunay::Triangulation;
pub use frontal::refine;
pub use structured::StructuredGrid;

use nalgebra::Point2;

use crate::error::Result;

/// Boundary-conforming triangulation of a domain given by its boundary
/// points and directed segments (domain on the left).
///
/// No interior points are added.
pub fn triangulate_boundary(
    params: &[Point2<f64>],
    segments: &[(usize, usize)],
) -> Result<Triangulation> {
    let (mut min, mut max) = (Point2::new(f64::MAX, f64::MAX), Point2::new(f64::MIN, f64::MIN));
    for p in params {
        min = min.inf(p);
        max = max.sup(p);
    }
    let mut tri = Triangulation::new(min, max);
    tri.insert_fixed(params)?;
    tri.constrain(segments)?;
    Ok(tri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l_shape() {
        let params = vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 2.0),
            Point2::new(0.0, 2.0),
        ];
        let segments: Vec<(usize, usize)> = (0..6).map(|i| (i, (i + 1) % 6)).collect();
        let tri = triangulate_boundary(&params, &segments).unwrap();
        let (points, tris) = tri.interior();
        assert_eq!(points.len(), 6);
        assert_eq!(tris.len(), 4);
        let area: f64 = tris
            .iter()
            .map(|t| 0.5 * (points[t[1]] - points[t[0]]).perp(&(points[t[2]] - points[t[0]])))
            .sum();
        assert!((area - 3.0).abs() < 1e-12);
    }
}
