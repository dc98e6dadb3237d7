//! Element quality metrics and histograms.
//!
//! All scores lie in `[0, 1]`: 1 for an ideal element (equilateral triangle,
//! square quad), 0 for a degenerate or inverted one. Histograms are purely
//! diagnostic.

use std::f64::consts::{FRAC_PI_2, PI};

use log::info;
use nalgebra::Point3;

/// Quality of a quad from its corner angles.
///
/// Corners are measured about the quad normal `(p2 - p0) x (p3 - p1)`. The
/// score is `1 - (2/pi) * max |pi/2 - theta|` clamped at 0; a collapsed edge
/// or a reflex corner scores 0.
pub fn quad_quality(p: &[Point3<f64>; 4]) -> f64 {
    let normal = (p[2] - p[0]).cross(&(p[3] - p[1]));
    let len = normal.norm();
    if len < 1e-300 {
        return 0.0;
    }
    let n = normal / len;

    let mut max_dev: f64 = 0.0;
    for k in 0..4 {
        let next = p[(k + 1) % 4] - p[k];
        let prev = p[(k + 3) % 4] - p[k];
        if next.norm_squared() < 1e-300 || prev.norm_squared() < 1e-300 {
            return 0.0;
        }
        let theta = next.cross(&prev).dot(&n).atan2(next.dot(&prev));
        if theta <= 0.0 {
            return 0.0;
        }
        max_dev = max_dev.max((FRAC_PI_2 - theta).abs());
    }
    (1.0 - 2.0 * max_dev / PI).max(0.0)
}

/// Quality of a triangle, `4 sqrt(3) A / sum(l^2)`.
pub fn tri_quality(p: &[Point3<f64>; 3]) -> f64 {
    let area = 0.5 * (p[1] - p[0]).cross(&(p[2] - p[0])).norm();
    let l2 = (p[1] - p[0]).norm_squared()
        + (p[2] - p[1]).norm_squared()
        + (p[0] - p[2]).norm_squared();
    if l2 < 1e-300 {
        return 0.0;
    }
    (4.0 * 3f64.sqrt() * area / l2).clamp(0.0, 1.0)
}

/// Estimated volume of a hexahedron in VTK node order, as the sum of six
/// tetrahedra around the diagonal `0-6`.
///
/// Positive when `0-1-2-3` turns counter-clockwise seen from `4-5-6-7`.
pub fn hex_volume(p: &[Point3<f64>; 8]) -> f64 {
    const TETS: [[usize; 3]; 6] = [[1, 2, 6], [2, 3, 6], [3, 7, 6], [7, 4, 6], [4, 5, 6], [5, 1, 6]];
    TETS.iter()
        .map(|&[a, b, c]| (p[a] - p[0]).dot(&(p[b] - p[0]).cross(&(p[c] - p[0]))) / 6.0)
        .sum()
}

/// Histogram of quality scores over equal bins of `[0, 1]`.
#[derive(Debug, Clone)]
pub struct QualityHistogram {
    /// Count per bin, lowest quality first.
    pub bins: Vec<usize>,
    /// Smallest score seen.
    pub min: f64,
    /// Sum of all scores.
    pub sum: f64,
}

impl QualityHistogram {
    /// Create an empty histogram with `nbins` bins (at least one).
    pub fn new(nbins: usize) -> Self {
        Self {
            bins: vec![0; nbins.max(1)],
            min: f64::INFINITY,
            sum: 0.0,
        }
    }

    /// Add one score.
    pub fn add(&mut self, quality: f64) {
        let n = self.bins.len();
        let bin = ((quality * n as f64).floor().max(0.0) as usize).min(n - 1);
        self.bins[bin] += 1;
        self.min = self.min.min(quality);
        self.sum += quality;
    }

    /// Number of scores added.
    pub fn count(&self) -> usize {
        self.bins.iter().sum()
    }

    /// Mean score, or 0 when empty.
    pub fn mean(&self) -> f64 {
        match self.count() {
            0 => 0.0,
            n => self.sum / n as f64,
        }
    }

    /// Log the histogram at info level.
    pub fn log(&self, label: &str) {
        let n = self.bins.len();
        info!(
            "{}: {} elements, min {:.3}, mean {:.3}",
            label,
            self.count(),
            if self.count() == 0 { 0.0 } else { self.min },
            self.mean()
        );
        let total = self.count().max(1);
        for (i, &c) in self.bins.iter().enumerate() {
            info!(
                "  [{:.2}, {:.2}) {:>8} {:>6.2}%",
                i as f64 / n as f64,
                (i + 1) as f64 / n as f64,
                c,
                100.0 * c as f64 / total as f64
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheared(alpha_deg: f64) -> [Point3<f64>; 4] {
        let a = alpha_deg.to_radians();
        let top = nalgebra::Vector3::new(a.sin(), a.cos(), 0.0);
        [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0) + top,
            Point3::new(0.0, 0.0, 0.0) + top,
        ]
    }

    #[test]
    fn test_hex_volume() {
        let cube = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 2.0),
            Point3::new(1.0, 0.0, 2.0),
            Point3::new(1.0, 1.0, 2.0),
            Point3::new(0.0, 1.0, 2.0),
        ];
        assert!((hex_volume(&cube) - 2.0).abs() < 1e-12);

        let mut flipped = cube;
        flipped.swap(1, 3);
        flipped.swap(5, 7);
        assert!((hex_volume(&flipped) + 2.0).abs() < 1e-12);

        // collapsed corner: a triangular prism
        let mut wedge = cube;
        wedge[3] = wedge[2];
        wedge[7] = wedge[6];
        assert!((hex_volume(&wedge) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_unit_square() {
        assert!((quad_quality(&sheared(0.0)) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_shear_strictly_decreases() {
        let mut last = quad_quality(&sheared(0.0));
        for deg in 1..=45 {
            let q = quad_quality(&sheared(deg as f64));
            assert!(q < last, "quality did not drop at {} degrees", deg);
            last = q;
        }
        assert!((last - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_quads() {
        let collapsed = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        assert_eq!(quad_quality(&collapsed), 0.0);

        // arrowhead with a reflex corner at index 3
        let reflex = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(1.5, 0.5, 0.0),
        ];
        assert_eq!(quad_quality(&reflex), 0.0);
    }

    #[test]
    fn test_equilateral_triangle() {
        let p = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 3f64.sqrt() / 2.0, 0.0),
        ];
        assert!((tri_quality(&p) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_histogram_bins() {
        let mut hist = QualityHistogram::new(10);
        for q in [0.0, 0.05, 0.55, 1.0] {
            hist.add(q);
        }
        assert_eq!(hist.count(), 4);
        assert_eq!(hist.bins[0], 2);
        assert_eq!(hist.bins[5], 1);
        assert_eq!(hist.bins[9], 1);
        assert!((hist.mean() - 0.4).abs() < 1e-12);
    }
}
