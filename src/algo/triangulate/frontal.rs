//! Frontal Delaunay refinement.
//!
//! Rebay's advancing-front point placement on top of the constrained
//! Delaunay kernel. Triangles whose physical circumradius is within the
//! quality factor of the ideal `R* = h / sqrt(3)` are accepted. Active
//! triangles, those touching the boundary or an accepted triangle, are
//! refined largest first by placing a new point on the perpendicular
//! bisector of their front edge so that the new triangle approaches `R*`.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::{debug, warn};
use nalgebra::{Point2, Point3, Vector2};

use crate::geometry::Surface;
use crate::mesh::adjacency::BOUNDARY;

use super::delaunay::{Insertion, Region, Triangulation, SUPER};

/// Rejection radius for new points, as a fraction of the target size.
const MIN_SPACING: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Waiting,
    Active,
    Accepted,
    Outside,
}

/// Entry in the refinement queue, largest circumradius first.
#[derive(Debug, Clone)]
struct Candidate {
    radius: f64,
    tri: usize,
    generation: u32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.radius
            .total_cmp(&other.radius)
            .then_with(|| other.tri.cmp(&self.tri))
    }
}

/// Physical circumradius of a triangle, infinite when degenerate.
fn circumradius(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let (la, lb, lc) = ((b - c).norm(), (c - a).norm(), (a - b).norm());
    let area = 0.5 * (b - a).cross(&(c - a)).norm();
    if area <= 1e-300 {
        return f64::INFINITY;
    }
    la * lb * lc / (4.0 * area)
}

/// Circumcenter of a parameter-space triangle.
fn circumcenter(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> Option<Point2<f64>> {
    let (ab, ac) = (b - a, c - a);
    let d = 2.0 * ab.perp(&ac);
    if d.abs() < 1e-300 {
        return None;
    }
    let (ab2, ac2) = (ab.norm_squared(), ac.norm_squared());
    let ox = (ac.y * ab2 - ab.y * ac2) / d;
    let oy = (ab.x * ac2 - ac.x * ab2) / d;
    Some(a + Vector2::new(ox, oy))
}

struct Refiner<'a> {
    surface: &'a dyn Surface,
    h: f64,
    accept_radius: f64,
    phys: Vec<Point3<f64>>,
    state: Vec<State>,
    generation: Vec<u32>,
    heap: BinaryHeap<Candidate>,
}

impl<'a> Refiner<'a> {
    fn radius(&self, tri: &Triangulation, t: usize) -> f64 {
        let [a, b, c] = tri.tris[t].v;
        circumradius(&self.phys[a], &self.phys[b], &self.phys[c])
    }

    fn is_front(&self, tri: &Triangulation, t: usize, i: usize) -> bool {
        let tr = tri.tris[t];
        let nb = tr.n[i];
        nb == BOUNDARY
            || tri.is_constrained(tr.v[i], tr.v[(i + 1) % 3])
            || matches!(self.state[nb], State::Accepted | State::Outside)
    }

    fn classify(&mut self, tri: &Triangulation, t: usize) {
        self.state[t] = if tri.region[t] != Region::Interior {
            State::Outside
        } else if self.radius(tri, t) <= self.accept_radius {
            State::Accepted
        } else {
            State::Waiting
        };
    }

    fn activate(&mut self, tri: &Triangulation, t: usize) {
        if self.state[t] != State::Waiting || !(0..3).any(|i| self.is_front(tri, t, i)) {
            return;
        }
        self.state[t] = State::Active;
        self.heap.push(Candidate {
            radius: self.radius(tri, t),
            tri: t,
            generation: self.generation[t],
        });
    }

    fn activate_around(&mut self, tri: &Triangulation, t: usize) {
        self.activate(tri, t);
        for nb in tri.tris[t].n {
            if nb != BOUNDARY {
                self.activate(tri, nb);
            }
        }
    }

    /// Parameter-space point proposed for the longest front edge of `t`.
    fn propose(&self, tri: &Triangulation, t: usize) -> Option<Point2<f64>> {
        let tr = tri.tris[t];
        let edge = (0..3)
            .filter(|&i| self.is_front(tri, t, i))
            .max_by(|&i, &j| {
                let li = (self.phys[tr.v[(i + 1) % 3]] - self.phys[tr.v[i]]).norm();
                let lj = (self.phys[tr.v[(j + 1) % 3]] - self.phys[tr.v[j]]).norm();
                li.total_cmp(&lj)
            })?;
        let (a, b, c) = (tr.v[edge], tr.v[(edge + 1) % 3], tr.v[(edge + 2) % 3]);
        let (pa, pb, pc) = (tri.points[a], tri.points[b], tri.points[c]);

        let chord = pb - pa;
        let param_len = chord.norm();
        let phys_len = (self.phys[b] - self.phys[a]).norm();
        if param_len < 1e-300 || phys_len < 1e-300 {
            return None;
        }
        let scale = phys_len / param_len;
        let normal = Vector2::new(-chord.y, chord.x) / param_len;
        let mid = Point2::from((pa.coords + pb.coords) * 0.5);
        let p = 0.5 * param_len;

        let ideal = self.h / (scale * 3f64.sqrt());
        let mut rho = ideal.max(p);
        if let Some(cc) = circumcenter(&pa, &pb, &pc) {
            let q = (cc - mid).dot(&normal);
            if q > 0.0 {
                rho = rho.min((p * p + q * q) / (2.0 * q));
            }
        }
        let d = rho + (rho * rho - p * p).max(0.0).sqrt();
        Some(mid + normal * d)
    }
}

/// Refine an interior-classified triangulation towards target size `h`.
///
/// `factor` is the accepted ratio of circumradius to the ideal one. Returns
/// the number of points inserted.
pub fn refine(tri: &mut Triangulation, surface: &dyn Surface, h: f64, factor: f64) -> usize {
    let mut phys: Vec<Point3<f64>> = Vec::with_capacity(tri.points.len());
    for (k, p) in tri.points.iter().enumerate() {
        phys.push(if k < SUPER {
            Point3::origin()
        } else {
            surface.eval_point(*p)
        });
    }

    let mut refiner = Refiner {
        surface,
        h,
        accept_radius: factor * h / 3f64.sqrt(),
        phys,
        state: vec![State::Waiting; tri.tris.len()],
        generation: vec![0; tri.tris.len()],
        heap: BinaryHeap::new(),
    };

    let mut area = 0.0;
    for t in 0..tri.tris.len() {
        refiner.classify(tri, t);
        if tri.region[t] == Region::Interior {
            let [a, b, c] = tri.tris[t].v;
            let (pa, pb, pc) = (&refiner.phys[a], &refiner.phys[b], &refiner.phys[c]);
            area += 0.5 * (pb - pa).cross(&(pc - pa)).norm();
        }
    }
    for t in 0..tri.tris.len() {
        refiner.activate(tri, t);
    }

    let ideal_tri_area = 3f64.sqrt() / 4.0 * h * h;
    let max_points = (4.0 * area / ideal_tri_area) as usize / 2 + tri.num_points() + 16;
    let mut inserted = 0;
    let mut rejected = 0;

    while let Some(cand) = refiner.heap.pop() {
        let t = cand.tri;
        if cand.generation != refiner.generation[t] || refiner.state[t] != State::Active {
            continue;
        }
        if tri.num_points() >= max_points {
            warn!(
                "frontal refinement stopped at the point cap ({} points)",
                max_points
            );
            break;
        }

        let outcome = match refiner.propose(tri, t) {
            Some(x) => {
                let px = refiner.surface.eval_point(x);
                let min_dist = MIN_SPACING * refiner.h;
                let phys = &refiner.phys;
                let res = tri.insert(x, t, true, |_, verts| {
                    verts.iter().all(|&w| (phys[w] - px).norm() > min_dist)
                });
                if let Insertion::Inserted { .. } = res {
                    refiner.phys.push(px);
                }
                res
            }
            None => Insertion::Rejected,
        };

        match outcome {
            Insertion::Rejected => {
                rejected += 1;
                refiner.state[t] = State::Accepted;
                for nb in tri.tris[t].n {
                    if nb != BOUNDARY {
                        refiner.activate(tri, nb);
                    }
                }
            }
            Insertion::Inserted { created, .. } => {
                inserted += 1;
                while refiner.state.len() < tri.tris.len() {
                    refiner.state.push(State::Waiting);
                    refiner.generation.push(0);
                }
                for &s in &created {
                    refiner.generation[s] = refiner.generation[s].wrapping_add(1);
                    refiner.classify(tri, s);
                }
                if !created.contains(&t) {
                    refiner.state[t] = State::Accepted;
                }
                for &s in &created {
                    refiner.activate_around(tri, s);
                }
                if !created.contains(&t) {
                    for nb in tri.tris[t].n {
                        if nb != BOUNDARY {
                            refiner.activate(tri, nb);
                        }
                    }
                }
            }
        }
    }

    debug!(
        "frontal refinement: {} points inserted, {} proposals rejected",
        inserted, rejected
    );
    inserted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Plane;

    fn unit_square(n: usize) -> (Vec<Point2<f64>>, Vec<(usize, usize)>) {
        let h = 1.0 / n as f64;
        let mut pts = Vec::new();
        for i in 0..n {
            pts.push(Point2::new(i as f64 * h, 0.0));
        }
        for i in 0..n {
            pts.push(Point2::new(1.0, i as f64 * h));
        }
        for i in 0..n {
            pts.push(Point2::new(1.0 - i as f64 * h, 1.0));
        }
        for i in 0..n {
            pts.push(Point2::new(0.0, 1.0 - i as f64 * h));
        }
        let m = pts.len();
        (pts, (0..m).map(|i| (i, (i + 1) % m)).collect())
    }

    #[test]
    fn test_candidate_order() {
        let mut heap = BinaryHeap::new();
        for (tri, radius) in [(0, 1.0), (1, 3.0), (2, 2.0)] {
            heap.push(Candidate {
                radius,
                tri,
                generation: 0,
            });
        }
        assert_eq!(heap.pop().map(|c| c.tri), Some(1));
        assert_eq!(heap.pop().map(|c| c.tri), Some(2));
    }

    #[test]
    fn test_circumcenter_right_triangle() {
        let cc = circumcenter(
            &Point2::new(0.0, 0.0),
            &Point2::new(2.0, 0.0),
            &Point2::new(0.0, 2.0),
        )
        .unwrap();
        assert!((cc - Point2::new(1.0, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn test_refine_square() {
        let h = 0.1;
        let (pts, segs) = unit_square(10);
        let plane = Plane::xy(0.0, Point2::new(0.0, 0.0), Point2::new(1.0, 1.0));
        let mut tri = Triangulation::new(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0));
        tri.insert_fixed(&pts).unwrap();
        tri.constrain(&segs).unwrap();
        let inserted = refine(&mut tri, &plane, h, 1.5);
        assert!(inserted > 20, "only {} points inserted", inserted);

        let (points, tris) = tri.interior();
        let area: f64 = tris
            .iter()
            .map(|t| 0.5 * (points[t[1]] - points[t[0]]).perp(&(points[t[2]] - points[t[0]])))
            .sum();
        assert!((area - 1.0).abs() < 1e-9);

        // boundary points keep their indices
        for (k, p) in pts.iter().enumerate() {
            assert_eq!(points[k], *p);
        }
        for p in &points[pts.len()..] {
            assert!(p.x > -1e-12 && p.x < 1.0 + 1e-12);
            assert!(p.y > -1e-12 && p.y < 1.0 + 1e-12);
        }
    }
}
