//! Concrete curves and arc-length tabulation.

use nalgebra::{Point3, Vector3};

use super::Curve;

const GAUSS_NODES: [f64; 3] = [-0.774_596_669_241_483_4, 0.0, 0.774_596_669_241_483_4];
const GAUSS_WEIGHTS: [f64; 3] = [5.0 / 9.0, 8.0 / 9.0, 5.0 / 9.0];

/// Straight segment from `a` (t = 0) to `b` (t = 1).
#[derive(Debug, Clone)]
pub struct LineSegment {
    a: Point3<f64>,
    b: Point3<f64>,
}

impl LineSegment {
    /// Create a segment between two points.
    pub fn new(a: Point3<f64>, b: Point3<f64>) -> Self {
        Self { a, b }
    }
}

impl Curve for LineSegment {
    fn range(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    fn eval_point(&self, t: f64) -> Point3<f64> {
        self.a + (self.b - self.a) * t
    }

    fn eval_deriv(&self, _t: f64) -> Vector3<f64> {
        self.b - self.a
    }
}

/// Circular arc parametrized by angle.
#[derive(Debug, Clone)]
pub struct CircularArc {
    center: Point3<f64>,
    x_axis: Vector3<f64>,
    y_axis: Vector3<f64>,
    radius: f64,
    start: f64,
    end: f64,
}

impl CircularArc {
    /// Arc of `radius` about `center` in the plane normal to `normal`,
    /// measuring angles from `ref_dir`, running from `start` to `end` radians.
    pub fn new(
        center: Point3<f64>,
        radius: f64,
        normal: Vector3<f64>,
        ref_dir: Vector3<f64>,
        start: f64,
        end: f64,
    ) -> Self {
        let n = normal.normalize();
        let x_axis = (ref_dir - n * ref_dir.dot(&n)).normalize();
        let y_axis = n.cross(&x_axis);
        Self {
            center,
            x_axis,
            y_axis,
            radius,
            start,
            end,
        }
    }

    /// Counter-clockwise arc in the plane `z = center.z`.
    pub fn xy(center: Point3<f64>, radius: f64, start: f64, end: f64) -> Self {
        Self::new(center, radius, Vector3::z(), Vector3::x(), start, end)
    }
}

impl Curve for CircularArc {
    fn range(&self) -> (f64, f64) {
        (self.start, self.end)
    }

    fn eval_point(&self, t: f64) -> Point3<f64> {
        self.center + (self.x_axis * t.cos() + self.y_axis * t.sin()) * self.radius
    }

    fn eval_deriv(&self, t: f64) -> Vector3<f64> {
        (self.y_axis * t.cos() - self.x_axis * t.sin()) * self.radius
    }
}

/// Cumulative arc length of a curve, tabulated on equal parameter intervals
/// with 3-point Gauss-Legendre quadrature.
#[derive(Debug, Clone)]
pub struct ArcLengthTable {
    params: Vec<f64>,
    cumulative: Vec<f64>,
}

impl ArcLengthTable {
    /// Tabulate `curve` over `intervals` equal parameter intervals.
    pub fn new(curve: &dyn Curve, intervals: usize) -> Self {
        let intervals = intervals.max(1);
        let (t0, t1) = curve.range();
        let params: Vec<f64> = (0..=intervals)
            .map(|k| t0 + (t1 - t0) * k as f64 / intervals as f64)
            .collect();
        let mut cumulative = Vec::with_capacity(params.len());
        cumulative.push(0.0);
        for w in params.windows(2) {
            let last = cumulative[cumulative.len() - 1];
            cumulative.push(last + segment_length(curve, w[0], w[1]));
        }
        Self { params, cumulative }
    }

    /// Total arc length.
    pub fn length(&self) -> f64 {
        self.cumulative[self.cumulative.len() - 1]
    }

    /// Parameter at arc length `s` from the start of the curve.
    pub fn param_at(&self, curve: &dyn Curve, s: f64) -> f64 {
        let total = self.length();
        if total <= 0.0 {
            return self.params[0];
        }
        let s = s.clamp(0.0, total);
        let last = self.params.len() - 2;
        let k = self
            .cumulative
            .partition_point(|&c| c <= s)
            .saturating_sub(1)
            .min(last);

        let (ta, tb) = (self.params[k], self.params[k + 1]);
        let seg = self.cumulative[k + 1] - self.cumulative[k];
        let ds = s - self.cumulative[k];
        if seg <= 0.0 {
            return ta;
        }

        let (lo, hi) = (ta.min(tb), ta.max(tb));
        let mut t = ta + (tb - ta) * ds / seg;
        for _ in 0..8 {
            let f = segment_length(curve, ta, t) - ds;
            let speed = curve.eval_deriv(t).norm();
            if speed < 1e-300 {
                break;
            }
            let step = f / speed * (tb - ta).signum();
            t = (t - step).clamp(lo, hi);
            if step.abs() < 1e-15 * (1.0 + t.abs()) {
                break;
            }
        }
        t
    }
}

fn segment_length(curve: &dyn Curve, a: f64, b: f64) -> f64 {
    let half = 0.5 * (b - a);
    let mid = 0.5 * (a + b);
    let sum: f64 = GAUSS_NODES
        .iter()
        .zip(GAUSS_WEIGHTS.iter())
        .map(|(&x, &w)| w * curve.eval_deriv(mid + half * x).norm())
        .sum();
    sum * half.abs()
}
