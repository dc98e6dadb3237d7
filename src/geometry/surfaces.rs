//! Concrete surfaces.

use std::f64::consts::PI;

use nalgebra::{Matrix2, Point2, Point3, Vector2, Vector3};

use super::Surface;

/// Planar patch `origin + u * du + v * dv`.
#[derive(Debug, Clone)]
pub struct Plane {
    origin: Point3<f64>,
    du: Vector3<f64>,
    dv: Vector3<f64>,
    min: Point2<f64>,
    max: Point2<f64>,
}

impl Plane {
    /// Plane through `origin` spanned by `du` and `dv`.
    pub fn new(
        origin: Point3<f64>,
        du: Vector3<f64>,
        dv: Vector3<f64>,
        min: Point2<f64>,
        max: Point2<f64>,
    ) -> Self {
        Self {
            origin,
            du,
            dv,
            min,
            max,
        }
    }

    /// The plane `z = z0` with `(u, v) = (x, y)`.
    pub fn xy(z0: f64, min: Point2<f64>, max: Point2<f64>) -> Self {
        Self::new(Point3::new(0.0, 0.0, z0), Vector3::x(), Vector3::y(), min, max)
    }
}

impl Surface for Plane {
    fn range(&self) -> (Point2<f64>, Point2<f64>) {
        (self.min, self.max)
    }

    fn eval_point(&self, uv: Point2<f64>) -> Point3<f64> {
        self.origin + self.du * uv.x + self.dv * uv.y
    }

    fn eval_deriv(&self, _uv: Point2<f64>) -> (Vector3<f64>, Vector3<f64>) {
        (self.du, self.dv)
    }

    fn inv_eval_point(&self, point: &Point3<f64>) -> Point2<f64> {
        let r = point - self.origin;
        let gram = Matrix2::new(
            self.du.dot(&self.du),
            self.du.dot(&self.dv),
            self.du.dot(&self.dv),
            self.dv.dot(&self.dv),
        );
        let rhs = Vector2::new(self.du.dot(&r), self.dv.dot(&r));
        match gram.try_inverse() {
            Some(inv) => Point2::from(inv * rhs),
            None => self.min,
        }
    }
}

/// Bilinear patch through four corners, `(0,0), (1,0), (1,1), (0,1)`.
///
/// Inversion uses the default Gauss-Newton projection.
#[derive(Debug, Clone)]
pub struct BilinearPatch {
    corners: [Point3<f64>; 4],
}

impl BilinearPatch {
    /// Create a patch from corners listed counter-clockwise in parameter space.
    pub fn new(corners: [Point3<f64>; 4]) -> Self {
        Self { corners }
    }
}

impl Surface for BilinearPatch {
    fn range(&self) -> (Point2<f64>, Point2<f64>) {
        (Point2::new(0.0, 0.0), Point2::new(1.0, 1.0))
    }

    fn eval_point(&self, uv: Point2<f64>) -> Point3<f64> {
        let [p00, p10, p11, p01] = self.corners;
        let (u, v) = (uv.x, uv.y);
        Point3::from(
            p00.coords * ((1.0 - u) * (1.0 - v))
                + p10.coords * (u * (1.0 - v))
                + p11.coords * (u * v)
                + p01.coords * ((1.0 - u) * v),
        )
    }

    fn eval_deriv(&self, uv: Point2<f64>) -> (Vector3<f64>, Vector3<f64>) {
        let [p00, p10, p11, p01] = self.corners;
        let (u, v) = (uv.x, uv.y);
        let su = (p10 - p00) * (1.0 - v) + (p11 - p01) * v;
        let sv = (p01 - p00) * (1.0 - u) + (p11 - p10) * u;
        (su, sv)
    }
}

/// Patch of a circular cylinder parametrized by `(angle, height)`.
#[derive(Debug, Clone)]
pub struct CylinderPatch {
    base: Point3<f64>,
    axis: Vector3<f64>,
    x_axis: Vector3<f64>,
    y_axis: Vector3<f64>,
    radius: f64,
    min: Point2<f64>,
    max: Point2<f64>,
}

impl CylinderPatch {
    /// Cylinder about `axis` through `base`, angles measured from `ref_dir`.
    /// `min`/`max` bound `(angle, height)`.
    pub fn new(
        base: Point3<f64>,
        axis: Vector3<f64>,
        ref_dir: Vector3<f64>,
        radius: f64,
        min: Point2<f64>,
        max: Point2<f64>,
    ) -> Self {
        let axis = axis.normalize();
        let x_axis = (ref_dir - axis * ref_dir.dot(&axis)).normalize();
        let y_axis = axis.cross(&x_axis);
        Self {
            base,
            axis,
            x_axis,
            y_axis,
            radius,
            min,
            max,
        }
    }
}

impl Surface for CylinderPatch {
    fn range(&self) -> (Point2<f64>, Point2<f64>) {
        (self.min, self.max)
    }

    fn eval_point(&self, uv: Point2<f64>) -> Point3<f64> {
        self.base
            + (self.x_axis * uv.x.cos() + self.y_axis * uv.x.sin()) * self.radius
            + self.axis * uv.y
    }

    fn eval_deriv(&self, uv: Point2<f64>) -> (Vector3<f64>, Vector3<f64>) {
        let su = (self.y_axis * uv.x.cos() - self.x_axis * uv.x.sin()) * self.radius;
        (su, self.axis)
    }

    fn inv_eval_point(&self, point: &Point3<f64>) -> Point2<f64> {
        let d = point - self.base;
        let h = d.dot(&self.axis);
        let mut theta = d.dot(&self.y_axis).atan2(d.dot(&self.x_axis));
        let tol = 1e-9;
        while theta < self.min.x - tol {
            theta += 2.0 * PI;
        }
        while theta > self.max.x + tol {
            theta -= 2.0 * PI;
        }
        Point2::new(theta, h)
    }
}
