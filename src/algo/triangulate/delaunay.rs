//! Constrained Delaunay triangulation of a parameter domain.
//!
//! Points are inserted incrementally with the Bowyer-Watson cavity rule
//! inside a large enclosing triangle. Boundary segments are then recovered
//! by edge flips, the Delaunay property is restored around them, and every
//! triangle is classified as inside or outside the domain.
//!
//! Triangles are stored counter-clockwise; neighbour `n[i]` lies across the
//! edge `(v[i], v[i + 1])`. Internally the three enclosing vertices occupy
//! indices `0..3`, so input point `i` is stored at `i + 3`.

use std::collections::{HashMap, HashSet};

use nalgebra::Point2;
use robust::{incircle, orient2d, Coord};

use crate::error::{MeshError, Result};
use crate::mesh::adjacency::BOUNDARY;

/// Number of enclosing vertices stored ahead of the input points.
pub(crate) const SUPER: usize = 3;

/// A triangle with its neighbour links.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Triangle {
    pub v: [usize; 3],
    pub n: [usize; 3],
}

/// Location of a triangle relative to the domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Region {
    Unknown,
    Interior,
    Exterior,
}

/// Result of a point insertion.
#[derive(Debug)]
pub(crate) enum Insertion {
    /// The point was added; `created` lists the triangle slots written.
    Inserted { vertex: usize, created: Vec<usize> },
    /// The point was not added and the triangulation is unchanged.
    Rejected,
}

/// Incremental constrained Delaunay triangulation.
#[derive(Debug, Clone)]
pub struct Triangulation {
    pub(crate) points: Vec<Point2<f64>>,
    pub(crate) tris: Vec<Triangle>,
    pub(crate) region: Vec<Region>,
    constrained: HashSet<(usize, usize)>,
    last: usize,
}

#[inline]
fn coord(p: &Point2<f64>) -> Coord<f64> {
    Coord { x: p.x, y: p.y }
}

#[inline]
fn edge_key(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

impl Triangulation {
    /// Create a triangulation whose enclosing triangle contains the box
    /// `[min, max]` with a wide margin.
    pub fn new(min: Point2<f64>, max: Point2<f64>) -> Self {
        let center = Point2::from((min.coords + max.coords) * 0.5);
        let extent = (max - min).amax().max(1e-12);
        let m = 20.0 * extent;
        let points = vec![
            Point2::new(center.x - m, center.y - m),
            Point2::new(center.x + m, center.y - m),
            Point2::new(center.x, center.y + m),
        ];
        Self {
            points,
            tris: vec![Triangle {
                v: [0, 1, 2],
                n: [BOUNDARY; 3],
            }],
            region: vec![Region::Unknown],
            constrained: HashSet::new(),
            last: 0,
        }
    }

    /// Number of input points inserted so far.
    pub fn num_points(&self) -> usize {
        self.points.len() - SUPER
    }

    /// Insert the boundary points in order. Fails if two coincide.
    pub fn insert_fixed(&mut self, params: &[Point2<f64>]) -> Result<()> {
        for p in params {
            let tol = 1e-12 * (1.0 + p.coords.norm());
            let outcome = self.insert(*p, self.last, false, |points, verts| {
                verts.iter().all(|&w| (points[w] - p).norm() > tol)
            });
            if let Insertion::Rejected = outcome {
                return Err(MeshError::topology(
                    "domain",
                    format!("boundary point ({}, {}) cannot be inserted", p.x, p.y),
                ));
            }
        }
        Ok(())
    }

    /// Recover every boundary segment (input indices), restore the
    /// constrained Delaunay property and classify triangles.
    ///
    /// Segments must keep the domain on their left.
    pub fn constrain(&mut self, segments: &[(usize, usize)]) -> Result<()> {
        for &(a, b) in segments {
            self.recover_segment(a + SUPER, b + SUPER)?;
            self.constrained.insert(edge_key(a + SUPER, b + SUPER));
        }
        self.restore_delaunay();
        self.classify(segments);
        Ok(())
    }

    /// Input points followed by inserted points, and the interior triangles,
    /// all in input numbering.
    pub fn interior(&self) -> (Vec<Point2<f64>>, Vec<[usize; 3]>) {
        let points = self.points[SUPER..].to_vec();
        let tris = self
            .tris
            .iter()
            .zip(self.region.iter())
            .filter(|(_, &r)| r == Region::Interior)
            .map(|(t, _)| t.v.map(|v| v - SUPER))
            .collect();
        (points, tris)
    }

    #[inline]
    pub(crate) fn orient(&self, a: usize, b: usize, p: &Point2<f64>) -> f64 {
        orient2d(coord(&self.points[a]), coord(&self.points[b]), coord(p))
    }

    #[inline]
    fn in_circle(&self, t: usize, p: &Point2<f64>) -> bool {
        let [a, b, c] = self.tris[t].v;
        incircle(
            coord(&self.points[a]),
            coord(&self.points[b]),
            coord(&self.points[c]),
            coord(p),
        ) > 0.0
    }

    pub(crate) fn is_constrained(&self, a: usize, b: usize) -> bool {
        self.constrained.contains(&edge_key(a, b))
    }

    /// Find a triangle containing `p` by walking from `hint`, falling back
    /// to a linear scan if the walk cycles.
    pub(crate) fn locate(&self, p: &Point2<f64>, hint: usize) -> Option<usize> {
        let mut t = if hint < self.tris.len() { hint } else { 0 };
        let max_steps = 4 * self.tris.len() + 16;
        'walk: for _ in 0..max_steps {
            let tri = self.tris[t];
            for i in 0..3 {
                if self.orient(tri.v[i], tri.v[(i + 1) % 3], p) < 0.0 {
                    let next = tri.n[i];
                    if next == BOUNDARY {
                        return None;
                    }
                    t = next;
                    continue 'walk;
                }
            }
            return Some(t);
        }
        (0..self.tris.len()).find(|&t| {
            let v = self.tris[t].v;
            (0..3).all(|i| self.orient(v[i], v[(i + 1) % 3], p) >= 0.0)
        })
    }

    /// Bowyer-Watson insertion of `p`.
    ///
    /// The cavity never crosses a constrained edge and is shrunk until every
    /// boundary edge sees `p` strictly on its left. `accept` is shown the
    /// cavity vertices before anything is modified. With `interior_only`,
    /// points falling outside the classified domain are rejected.
    pub(crate) fn insert<F>(
        &mut self,
        p: Point2<f64>,
        hint: usize,
        interior_only: bool,
        accept: F,
    ) -> Insertion
    where
        F: Fn(&[Point2<f64>], &[usize]) -> bool,
    {
        let Some(seed) = self.locate(&p, hint) else {
            return Insertion::Rejected;
        };
        if interior_only && self.region[seed] != Region::Interior {
            return Insertion::Rejected;
        }
        let seed_v = self.tris[seed].v;
        for i in 0..3 {
            let (a, b) = (seed_v[i], seed_v[(i + 1) % 3]);
            if self.is_constrained(a, b) && self.orient(a, b, &p) == 0.0 {
                return Insertion::Rejected;
            }
        }

        let mut excluded: HashSet<usize> = HashSet::new();
        let (cavity, boundary) = loop {
            let mut cavity = vec![seed];
            let mut in_cavity: HashSet<usize> = HashSet::from([seed]);
            let mut k = 0;
            while k < cavity.len() {
                let t = cavity[k];
                k += 1;
                let tri = self.tris[t];
                for i in 0..3 {
                    let nb = tri.n[i];
                    if nb == BOUNDARY
                        || in_cavity.contains(&nb)
                        || excluded.contains(&nb)
                        || self.is_constrained(tri.v[i], tri.v[(i + 1) % 3])
                    {
                        continue;
                    }
                    if self.in_circle(nb, &p) {
                        in_cavity.insert(nb);
                        cavity.push(nb);
                    }
                }
            }

            // (a, b, outside neighbour, owning cavity triangle)
            let mut boundary = Vec::new();
            let mut bad = None;
            for &t in &cavity {
                let tri = self.tris[t];
                for i in 0..3 {
                    let nb = tri.n[i];
                    if nb != BOUNDARY && in_cavity.contains(&nb) {
                        continue;
                    }
                    let (a, b) = (tri.v[i], tri.v[(i + 1) % 3]);
                    if self.orient(a, b, &p) <= 0.0 && bad.is_none() {
                        bad = Some(t);
                    }
                    boundary.push((a, b, nb));
                }
            }
            match bad {
                None => break (cavity, boundary),
                Some(t) if t == seed => return Insertion::Rejected,
                Some(t) => {
                    excluded.insert(t);
                }
            }
        };

        if boundary.len() != cavity.len() + 2 {
            return Insertion::Rejected;
        }
        let mut starts: HashMap<usize, usize> = HashMap::with_capacity(boundary.len());
        for (k, &(a, _, _)) in boundary.iter().enumerate() {
            if starts.insert(a, k).is_some() {
                return Insertion::Rejected;
            }
        }
        let verts: Vec<usize> = boundary.iter().map(|&(a, _, _)| a).collect();
        if !accept(&self.points, &verts) {
            return Insertion::Rejected;
        }

        let vertex = self.points.len();
        self.points.push(p);
        let region = self.region[seed];

        let mut slots = cavity;
        while slots.len() < boundary.len() {
            self.tris.push(Triangle {
                v: [0; 3],
                n: [BOUNDARY; 3],
            });
            self.region.push(region);
            slots.push(self.tris.len() - 1);
        }

        for (k, &(a, b, outside)) in boundary.iter().enumerate() {
            let t = slots[k];
            self.tris[t] = Triangle {
                v: [a, b, vertex],
                n: [outside, BOUNDARY, BOUNDARY],
            };
            self.region[t] = region;
            if outside != BOUNDARY {
                let o = &mut self.tris[outside];
                for j in 0..3 {
                    if o.v[j] == b && o.v[(j + 1) % 3] == a {
                        o.n[j] = t;
                    }
                }
            }
        }
        for (k, &(_, b, _)) in boundary.iter().enumerate() {
            let t = slots[k];
            if let Some(&kb) = starts.get(&b) {
                let tn = slots[kb];
                self.tris[t].n[1] = tn;
                self.tris[tn].n[2] = t;
            }
        }

        self.last = slots[0];
        Insertion::Inserted {
            vertex,
            created: slots,
        }
    }

    /// Find the triangle holding the directed edge `a -> b`.
    fn find_edge(&self, a: usize, b: usize) -> Option<(usize, usize)> {
        self.tris.iter().enumerate().find_map(|(t, tri)| {
            (0..3)
                .find(|&i| tri.v[i] == a && tri.v[(i + 1) % 3] == b)
                .map(|i| (t, i))
        })
    }

    /// Flip the edge `i` of triangle `t1` if the surrounding quad is strictly
    /// convex. Returns whether the flip happened.
    pub(crate) fn flip(&mut self, t1: usize, i: usize) -> bool {
        let t2 = self.tris[t1].n[i];
        if t2 == BOUNDARY {
            return false;
        }
        let tri1 = self.tris[t1];
        let tri2 = self.tris[t2];
        let (u, w, x) = (tri1.v[i], tri1.v[(i + 1) % 3], tri1.v[(i + 2) % 3]);
        let Some(j) = (0..3).find(|&j| tri2.v[j] == w && tri2.v[(j + 1) % 3] == u) else {
            return false;
        };
        let y = tri2.v[(j + 2) % 3];

        let (px, py) = (self.points[x], self.points[y]);
        if self.orient(x, u, &py) <= 0.0 || self.orient(y, w, &px) <= 0.0 {
            return false;
        }

        let n1a = tri1.n[(i + 1) % 3];
        let n1b = tri1.n[(i + 2) % 3];
        let n2a = tri2.n[(j + 1) % 3];
        let n2b = tri2.n[(j + 2) % 3];

        self.tris[t1] = Triangle {
            v: [x, u, y],
            n: [n1b, n2a, t2],
        };
        self.tris[t2] = Triangle {
            v: [y, w, x],
            n: [n2b, n1a, t1],
        };
        if n2a != BOUNDARY {
            self.replace_neighbor(n2a, t2, t1);
        }
        if n1a != BOUNDARY {
            self.replace_neighbor(n1a, t1, t2);
        }
        true
    }

    fn replace_neighbor(&mut self, t: usize, old: usize, new: usize) {
        for k in 0..3 {
            if self.tris[t].n[k] == old {
                self.tris[t].n[k] = new;
                return;
            }
        }
    }

    fn crosses(&self, a: usize, b: usize, c: usize, d: usize) -> bool {
        if c == a || c == b || d == a || d == b {
            return false;
        }
        let (pa, pb, pc, pd) = (self.points[a], self.points[b], self.points[c], self.points[d]);
        let s1 = self.orient(a, b, &pc);
        let s2 = self.orient(a, b, &pd);
        let s3 = self.orient(c, d, &pa);
        let s4 = self.orient(c, d, &pb);
        ((s1 > 0.0 && s2 < 0.0) || (s1 < 0.0 && s2 > 0.0))
            && ((s3 > 0.0 && s4 < 0.0) || (s3 < 0.0 && s4 > 0.0))
    }

    /// Make `a - b` an edge of the triangulation by flipping crossing edges.
    ///
    /// The diagonal created by the previous flip is only retried when no
    /// other crossing edge can be flipped.
    fn recover_segment(&mut self, a: usize, b: usize) -> Result<()> {
        let max_iterations = 64 + 8 * self.tris.len();
        let mut recent: Option<(usize, usize)> = None;
        for _ in 0..max_iterations {
            if self.find_edge(a, b).is_some() || self.find_edge(b, a).is_some() {
                return Ok(());
            }
            let crossing: Vec<(usize, usize)> = (0..self.tris.len())
                .flat_map(|t| (0..3).map(move |i| (t, i)))
                .filter(|&(t, i)| {
                    let tri = self.tris[t];
                    let (c, d) = (tri.v[i], tri.v[(i + 1) % 3]);
                    tri.n[i] != BOUNDARY
                        && c < d
                        && !self.is_constrained(c, d)
                        && self.crosses(a, b, c, d)
                })
                .collect();
            let key_of = |tris: &[Triangle], (t, i): (usize, usize)| {
                edge_key(tris[t].v[i], tris[t].v[(i + 1) % 3])
            };
            let mut flipped = None;
            for pass in 0..2 {
                for &(t, i) in &crossing {
                    let key = key_of(&self.tris, (t, i));
                    if pass == 0 && Some(key) == recent {
                        continue;
                    }
                    if self.flip(t, i) {
                        flipped = Some(t);
                        break;
                    }
                }
                if flipped.is_some() {
                    break;
                }
            }
            let Some(t) = flipped else {
                break;
            };
            // flip() leaves the new diagonal as edge 2 of `t`
            recent = Some(key_of(&self.tris, (t, 2)));
        }
        Err(MeshError::ConvergenceFailed {
            iterations: max_iterations,
        })
    }

    /// Lawson flips of every unconstrained non-Delaunay edge.
    fn restore_delaunay(&mut self) {
        for _ in 0..100 {
            let mut flips = 0;
            for t in 0..self.tris.len() {
                for i in 0..3 {
                    let tri = self.tris[t];
                    let nb = tri.n[i];
                    if nb == BOUNDARY || self.is_constrained(tri.v[i], tri.v[(i + 1) % 3]) {
                        continue;
                    }
                    let other = self.tris[nb];
                    let Some(y) = other
                        .v
                        .iter()
                        .copied()
                        .find(|&y| y != tri.v[i] && y != tri.v[(i + 1) % 3])
                    else {
                        continue;
                    };
                    let py = self.points[y];
                    if self.in_circle(t, &py) && self.flip(t, i) {
                        flips += 1;
                    }
                }
            }
            if flips == 0 {
                break;
            }
        }
    }

    /// Flood-fill the outside of the domain from the enclosing vertices and
    /// from the right-hand side of every boundary segment.
    fn classify(&mut self, segments: &[(usize, usize)]) {
        self.region = vec![Region::Unknown; self.tris.len()];
        let mut stack = Vec::new();
        for (t, tri) in self.tris.iter().enumerate() {
            if tri.v.iter().any(|&v| v < SUPER) {
                stack.push(t);
            }
        }
        for &(a, b) in segments {
            if let Some((t, _)) = self.find_edge(b + SUPER, a + SUPER) {
                stack.push(t);
            }
        }
        for &t in &stack {
            self.region[t] = Region::Exterior;
        }
        while let Some(t) = stack.pop() {
            let tri = self.tris[t];
            for i in 0..3 {
                let nb = tri.n[i];
                if nb == BOUNDARY
                    || self.region[nb] != Region::Unknown
                    || self.is_constrained(tri.v[i], tri.v[(i + 1) % 3])
                {
                    continue;
                }
                self.region[nb] = Region::Exterior;
                stack.push(nb);
            }
        }
        for r in self.region.iter_mut() {
            if *r == Region::Unknown {
                *r = Region::Interior;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_boundary(n: usize) -> (Vec<Point2<f64>>, Vec<(usize, usize)>) {
        let mut pts = Vec::new();
        let h = 1.0 / n as f64;
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
        let segs = (0..m).map(|i| (i, (i + 1) % m)).collect();
        (pts, segs)
    }

    fn total_area(points: &[Point2<f64>], tris: &[[usize; 3]]) -> f64 {
        tris.iter()
            .map(|t| {
                let (a, b, c) = (points[t[0]], points[t[1]], points[t[2]]);
                0.5 * (b - a).perp(&(c - a))
            })
            .sum()
    }

    #[test]
    fn test_square_domain() {
        let (pts, segs) = square_boundary(4);
        let mut tri = Triangulation::new(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0));
        tri.insert_fixed(&pts).unwrap();
        tri.constrain(&segs).unwrap();
        let (points, tris) = tri.interior();
        assert_eq!(points.len(), 16);
        assert!((total_area(&points, &tris) - 1.0).abs() < 1e-12);
        // a disk with 16 boundary points and no interior points
        assert_eq!(tris.len(), 14);
        for t in &tris {
            let (a, b, c) = (points[t[0]], points[t[1]], points[t[2]]);
            assert!((b - a).perp(&(c - a)) > 0.0);
        }
    }

    #[test]
    fn test_neighbors_symmetric() {
        let (pts, segs) = square_boundary(5);
        let mut tri = Triangulation::new(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0));
        tri.insert_fixed(&pts).unwrap();
        tri.constrain(&segs).unwrap();
        for (t, tr) in tri.tris.iter().enumerate() {
            for &nb in &tr.n {
                if nb != BOUNDARY {
                    assert!(tri.tris[nb].n.contains(&t));
                }
            }
        }
    }

    #[test]
    fn test_hole_is_excluded() {
        let (mut pts, mut segs) = square_boundary(4);
        let base = pts.len();
        // clockwise square hole
        let hole = [
            Point2::new(0.4, 0.4),
            Point2::new(0.4, 0.6),
            Point2::new(0.6, 0.6),
            Point2::new(0.6, 0.4),
        ];
        pts.extend_from_slice(&hole);
        for k in 0..4 {
            segs.push((base + k, base + (k + 1) % 4));
        }
        let mut tri = Triangulation::new(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0));
        tri.insert_fixed(&pts).unwrap();
        tri.constrain(&segs).unwrap();
        let (points, tris) = tri.interior();
        assert!((total_area(&points, &tris) - 0.96).abs() < 1e-12);
    }

    #[test]
    fn test_concave_domain_segments_recovered() {
        // thin comb that forces segment recovery
        let pts = vec![
            Point2::new(0.0, 0.0),
            Point2::new(3.0, 0.0),
            Point2::new(3.0, 1.0),
            Point2::new(2.0, 0.1),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        let segs: Vec<(usize, usize)> = (0..6).map(|i| (i, (i + 1) % 6)).collect();
        let mut tri = Triangulation::new(Point2::new(0.0, 0.0), Point2::new(3.0, 1.0));
        tri.insert_fixed(&pts).unwrap();
        tri.constrain(&segs).unwrap();
        let (points, tris) = tri.interior();
        let expected = 3.0 - 0.5 * 2.0 * 0.9;
        assert!((total_area(&points, &tris) - expected).abs() < 1e-12);
        assert_eq!(tris.len(), 4);
    }

    #[test]
    fn test_duplicate_point_rejected() {
        let pts = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 0.0),
        ];
        let mut tri = Triangulation::new(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0));
        assert!(tri.insert_fixed(&pts).is_err());
    }
}
