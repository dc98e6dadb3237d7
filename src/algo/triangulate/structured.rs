//! Structured quad grids over four-sided faces.
//!
//! The boundary points of a face with four logical sides are the rim of an
//! `nx x ny` grid, listed once around the loop starting at the first corner.
//! Interior points come from transfinite (Coons) interpolation of the rim in
//! parameter space.

use nalgebra::{Point2, Vector2};

/// Smallest corner angle, in degrees, accepted for a structured face.
pub const MIN_CORNER_ANGLE: f64 = 30.0;
/// Largest corner angle, in degrees, accepted for a structured face.
pub const MAX_CORNER_ANGLE: f64 = 150.0;

/// An `nx x ny` point grid whose rim is the face boundary.
///
/// Grid index `(i, j)` has `i` along the first side and `j` along the
/// second. Rim points take local indices `0..num_fixed()` in loop order,
/// interior points follow row by row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuredGrid {
    nx: usize,
    ny: usize,
}

impl StructuredGrid {
    /// Grid with `nx` points along sides 0 and 2 and `ny` along sides 1 and 3.
    pub fn new(nx: usize, ny: usize) -> Self {
        Self {
            nx: nx.max(2),
            ny: ny.max(2),
        }
    }

    /// Points along the first side.
    pub fn nx(&self) -> usize {
        self.nx
    }

    /// Points along the second side.
    pub fn ny(&self) -> usize {
        self.ny
    }

    /// Number of rim points.
    pub fn num_fixed(&self) -> usize {
        2 * (self.nx - 1) + 2 * (self.ny - 1)
    }

    /// Total number of points.
    pub fn num_points(&self) -> usize {
        self.nx * self.ny
    }

    /// Local index of grid point `(i, j)`.
    pub fn index(&self, i: usize, j: usize) -> usize {
        let (nx, ny) = (self.nx, self.ny);
        if j == 0 {
            i
        } else if i == nx - 1 {
            (nx - 1) + j
        } else if j == ny - 1 {
            (nx - 1) + (ny - 1) + (nx - 1 - i)
        } else if i == 0 {
            (2 * (nx - 1) + (ny - 1) + (ny - 1 - j)) % self.num_fixed()
        } else {
            self.num_fixed() + (j - 1) * (nx - 2) + (i - 1)
        }
    }

    /// Grid position of a local index.
    pub fn position(&self, local: usize) -> Option<(usize, usize)> {
        let (nx, ny) = (self.nx, self.ny);
        let nfixed = self.num_fixed();
        if local >= self.num_points() {
            return None;
        }
        if local >= nfixed {
            let k = local - nfixed;
            return Some((k % (nx - 2) + 1, k / (nx - 2) + 1));
        }
        let mut k = local;
        if k < nx - 1 {
            return Some((k, 0));
        }
        k -= nx - 1;
        if k < ny - 1 {
            return Some((nx - 1, k));
        }
        k -= ny - 1;
        if k < nx - 1 {
            return Some((nx - 1 - k, ny - 1));
        }
        k -= nx - 1;
        Some((0, ny - 1 - k))
    }

    /// Local indices of the four corners in loop order.
    pub fn corners(&self) -> [usize; 4] {
        let (nx, ny) = (self.nx, self.ny);
        [0, nx - 1, nx - 1 + ny - 1, 2 * (nx - 1) + ny - 1]
    }

    /// Whether every corner angle of the rim lies within
    /// [`MIN_CORNER_ANGLE`, `MAX_CORNER_ANGLE`].
    pub fn corners_ok(&self, rim: &[Point2<f64>]) -> bool {
        let n = self.num_fixed();
        if rim.len() != n {
            return false;
        }
        self.corners().iter().all(|&c| {
            let prev = rim[(c + n - 1) % n] - rim[c];
            let next = rim[(c + 1) % n] - rim[c];
            let (lp, ln) = (prev.norm(), next.norm());
            if lp < 1e-300 || ln < 1e-300 {
                return false;
            }
            let angle = (prev.dot(&next) / (lp * ln)).clamp(-1.0, 1.0).acos().to_degrees();
            (MIN_CORNER_ANGLE..=MAX_CORNER_ANGLE).contains(&angle)
        })
    }

    /// Interior parameters by transfinite interpolation of the rim.
    pub fn interior_params(&self, rim: &[Point2<f64>]) -> Vec<Point2<f64>> {
        let (nx, ny) = (self.nx, self.ny);
        let g = |i: usize, j: usize| rim[self.index(i, j)].coords;
        let (c00, c10, c11, c01) = (g(0, 0), g(nx - 1, 0), g(nx - 1, ny - 1), g(0, ny - 1));

        let mut out = Vec::with_capacity((nx - 2) * (ny - 2));
        for j in 1..ny - 1 {
            let v = j as f64 / (ny - 1) as f64;
            for i in 1..nx - 1 {
                let u = i as f64 / (nx - 1) as f64;
                let edges: Vector2<f64> = g(i, 0) * (1.0 - v)
                    + g(i, ny - 1) * v
                    + g(0, j) * (1.0 - u)
                    + g(nx - 1, j) * u;
                let corners = c00 * ((1.0 - u) * (1.0 - v))
                    + c10 * (u * (1.0 - v))
                    + c11 * (u * v)
                    + c01 * ((1.0 - u) * v);
                out.push(Point2::from(edges - corners));
            }
        }
        out
    }

    /// Quads `[g(i,j), g(i+1,j), g(i+1,j+1), g(i,j+1)]`, row by row.
    pub fn quads(&self) -> Vec<[usize; 4]> {
        let mut quads = Vec::with_capacity((self.nx - 1) * (self.ny - 1));
        for j in 0..self.ny - 1 {
            for i in 0..self.nx - 1 {
                quads.push([
                    self.index(i, j),
                    self.index(i + 1, j),
                    self.index(i + 1, j + 1),
                    self.index(i, j + 1),
                ]);
            }
        }
        quads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_rim(grid: &StructuredGrid) -> Vec<Point2<f64>> {
        (0..grid.num_fixed())
            .map(|k| {
                let (i, j) = grid.position(k).unwrap();
                Point2::new(
                    i as f64 / (grid.nx() - 1) as f64,
                    j as f64 / (grid.ny() - 1) as f64,
                )
            })
            .collect()
    }

    #[test]
    fn test_index_position_inverse() {
        let grid = StructuredGrid::new(5, 3);
        let mut seen = vec![false; grid.num_points()];
        for j in 0..3 {
            for i in 0..5 {
                let k = grid.index(i, j);
                assert!(!seen[k]);
                seen[k] = true;
                assert_eq!(grid.position(k), Some((i, j)));
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_four_by_four() {
        let grid = StructuredGrid::new(4, 4);
        assert_eq!(grid.num_fixed(), 12);
        assert_eq!(grid.num_points(), 16);
        let quads = grid.quads();
        assert_eq!(quads.len(), 9);

        let rim = square_rim(&grid);
        assert!(grid.corners_ok(&rim));
        let interior = grid.interior_params(&rim);
        assert_eq!(interior.len(), 4);
        let third = 1.0 / 3.0;
        assert!((interior[0] - Point2::new(third, third)).norm() < 1e-12);
        assert!((interior[3] - Point2::new(2.0 * third, 2.0 * third)).norm() < 1e-12);

        let mut all = rim.clone();
        all.extend(interior);
        for q in &quads {
            let area = 0.5
                * ((all[q[2]] - all[q[0]]).perp(&(all[q[3]] - all[q[1]])));
            assert!((area - third * third).abs() < 1e-12);
        }
    }

    #[test]
    fn test_sharp_corner_rejected() {
        let grid = StructuredGrid::new(3, 3);
        let mut rim = square_rim(&grid);
        // stretch the right side so the corner at (2, 2) becomes sharp
        let c = grid.index(2, 2);
        rim[c] = Point2::new(6.0, 1.0);
        rim[grid.index(2, 1)] = Point2::new(3.5, 0.5);
        assert!(!grid.corners_ok(&rim));
    }
}
