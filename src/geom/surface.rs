use super::core::{Point3, Tolerance, Vec3};

pub(crate) fn wrap_param(value: f64, start: f64, end: f64) -> f64 {
    let span = end - start;
    if !span.is_finite() || span == 0.0 {
        return start;
    }
    let mut t = (value - start) % span;
    if t < 0.0 {
        t += span;
    }
    start + t
}

fn orthogonal_unit_vector(reference: Vec3) -> Vec3 {
    let candidate = if reference.x.abs() < reference.y.abs() {
        Vec3::new(0.0, -reference.z, reference.y)
    } else {
        Vec3::new(-reference.z, 0.0, reference.x)
    };

    candidate.normalized().unwrap_or(Vec3::X)
}

/// Right-handed orthonormal frame `(x, y, z)` with `z` along `normal` and `x`
/// as close as possible to `x_axis`.
pub(crate) fn frame_axes_from_xaxis_normal(x_axis: Vec3, normal: Vec3) -> (Vec3, Vec3, Vec3) {
    let z = normal.normalized().unwrap_or(Vec3::Z);
    let projected = x_axis - z.mul_scalar(x_axis.dot(z));
    let x = projected
        .normalized()
        .unwrap_or_else(|| orthogonal_unit_vector(z));
    let y = z.cross(x).normalized().unwrap_or(Vec3::Y);
    (x, y, z)
}

/// A parametric surface `S(u, v)`.
///
/// Normals follow `∂S/∂u × ∂S/∂v`; boundary loops are meshed
/// counter-clockwise about that direction.
pub trait Surface {
    fn point_at(&self, u: f64, v: f64) -> Point3;

    #[must_use]
    fn domain_u(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    #[must_use]
    fn domain_v(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    #[must_use]
    fn is_u_closed(&self) -> bool {
        false
    }

    #[must_use]
    fn is_v_closed(&self) -> bool {
        false
    }

    /// Central finite differences, one-sided at open domain edges.
    #[must_use]
    fn partial_derivatives_at(&self, u: f64, v: f64) -> (Vec3, Vec3) {
        let (u0, u1) = self.domain_u();
        let (v0, v1) = self.domain_v();

        let u = if self.is_u_closed() { wrap_param(u, u0, u1) } else { u.clamp(u0, u1) };
        let v = if self.is_v_closed() { wrap_param(v, v0, v1) } else { v.clamp(v0, v1) };

        let du = difference(
            Tolerance::DERIVATIVE.relative_to(u1 - u0),
            u,
            (u0, u1),
            self.is_u_closed(),
            |s| self.point_at(s, v),
        );
        let dv = difference(
            Tolerance::DERIVATIVE.relative_to(v1 - v0),
            v,
            (v0, v1),
            self.is_v_closed(),
            |s| self.point_at(u, s),
        );
        (du, dv)
    }

    /// Unit normal, `None` where the surface is singular (poles, collapsed
    /// edges).
    #[must_use]
    fn normal_at(&self, u: f64, v: f64) -> Option<Vec3> {
        let (du, dv) = self.partial_derivatives_at(u, v);
        let n = du.cross(dv);
        let scale = du.length() * dv.length();
        if !scale.is_finite() || n.length() <= Tolerance::ZERO_LENGTH.eps * scale.max(1.0) {
            return None;
        }
        n.normalized()
    }
}

fn difference(
    h: f64,
    t: f64,
    (t0, t1): (f64, f64),
    closed: bool,
    eval: impl Fn(f64) -> Point3,
) -> Vec3 {
    if !h.is_finite() || h <= 0.0 {
        return Vec3::ZERO;
    }
    let a = if closed { t - h } else { (t - h).max(t0) };
    let b = if closed { t + h } else { (t + h).min(t1) };
    if a == b {
        return Vec3::ZERO;
    }
    eval(b).sub_point(eval(a)).mul_scalar(1.0 / (b - a))
}

// ─────────────────────────────────────────────────────────────────────────────
// Plane
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneSurface {
    pub origin: Point3,
    pub u_axis: Vec3,
    pub v_axis: Vec3,
    pub domain_u: (f64, f64),
    pub domain_v: (f64, f64),
}

impl PlaneSurface {
    #[must_use]
    pub const fn new(origin: Point3, u_axis: Vec3, v_axis: Vec3) -> Self {
        Self {
            origin,
            u_axis,
            v_axis,
            domain_u: (0.0, 1.0),
            domain_v: (0.0, 1.0),
        }
    }
}

impl Surface for PlaneSurface {
    fn point_at(&self, u: f64, v: f64) -> Point3 {
        self.origin
            .add_vec(self.u_axis.mul_scalar(u))
            .add_vec(self.v_axis.mul_scalar(v))
    }

    fn domain_u(&self) -> (f64, f64) {
        self.domain_u
    }

    fn domain_v(&self) -> (f64, f64) {
        self.domain_v
    }

    fn partial_derivatives_at(&self, _u: f64, _v: f64) -> (Vec3, Vec3) {
        (self.u_axis, self.v_axis)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cylinder
// ─────────────────────────────────────────────────────────────────────────────

/// Cylinder around `axis`; `u ∈ [0, 1)` is one full turn, `v` is the height
/// fraction of `axis`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CylinderSurface {
    pub base: Point3,
    pub axis: Vec3,
    pub x_axis: Vec3,
    pub y_axis: Vec3,
    pub radius: f64,
}

impl CylinderSurface {
    pub fn new(base: Point3, axis: Vec3, radius: f64) -> Result<Self, String> {
        Self::from_base_axis_xaxis(base, axis, orthogonal_unit_vector(axis), radius)
    }

    pub fn from_base_axis_xaxis(
        base: Point3,
        axis: Vec3,
        x_axis: Vec3,
        radius: f64,
    ) -> Result<Self, String> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err("cylinder radius must be finite and > 0".to_string());
        }
        let axis_dir = axis
            .normalized()
            .ok_or_else(|| "cylinder axis must be non-zero".to_string())?;
        let (x_axis, y_axis, _) = frame_axes_from_xaxis_normal(x_axis, axis_dir);

        Ok(Self {
            base,
            axis,
            x_axis,
            y_axis,
            radius,
        })
    }
}

impl Surface for CylinderSurface {
    fn point_at(&self, u: f64, v: f64) -> Point3 {
        let angle = std::f64::consts::TAU * wrap_param(u, 0.0, 1.0);
        let radial = (self.x_axis.mul_scalar(angle.cos()) + self.y_axis.mul_scalar(angle.sin()))
            .mul_scalar(self.radius);
        self.base.add_vec(self.axis.mul_scalar(v)).add_vec(radial)
    }

    fn is_u_closed(&self) -> bool {
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sphere
// ─────────────────────────────────────────────────────────────────────────────

/// Sphere with poles at `v = 0` and `v = 1`, where the normal is undefined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereSurface {
    pub center: Point3,
    pub x_axis: Vec3,
    pub y_axis: Vec3,
    pub z_axis: Vec3,
    pub radius: f64,
}

impl SphereSurface {
    pub fn new(center: Point3, radius: f64) -> Result<Self, String> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err("sphere radius must be finite and > 0".to_string());
        }
        Ok(Self {
            center,
            x_axis: Vec3::X,
            y_axis: Vec3::Y,
            z_axis: Vec3::Z,
            radius,
        })
    }
}

impl Surface for SphereSurface {
    fn point_at(&self, u: f64, v: f64) -> Point3 {
        let theta = std::f64::consts::TAU * wrap_param(u, 0.0, 1.0);
        let phi = std::f64::consts::PI * (v.clamp(0.0, 1.0) - 0.5);
        let (sin_phi, cos_phi) = phi.sin_cos();

        let dir = self.x_axis.mul_scalar(cos_phi * theta.cos())
            + self.y_axis.mul_scalar(cos_phi * theta.sin())
            + self.z_axis.mul_scalar(sin_phi);
        self.center.add_vec(dir.mul_scalar(self.radius))
    }

    fn is_u_closed(&self) -> bool {
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Four-point (bilinear) patch
// ─────────────────────────────────────────────────────────────────────────────

/// Bilinear patch through four corners: `p00` at (0,0), `p10` at (1,0),
/// `p01` at (0,1), `p11` at (1,1). Twisted corners give a sail-like warp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FourPointSurface {
    pub p00: Point3,
    pub p10: Point3,
    pub p01: Point3,
    pub p11: Point3,
}

impl FourPointSurface {
    #[must_use]
    pub const fn new(p00: Point3, p10: Point3, p01: Point3, p11: Point3) -> Self {
        Self { p00, p10, p01, p11 }
    }
}

impl Surface for FourPointSurface {
    fn point_at(&self, u: f64, v: f64) -> Point3 {
        let u = u.clamp(0.0, 1.0);
        let v = v.clamp(0.0, 1.0);
        let bottom = self.p00.lerp(self.p10, u);
        let top = self.p01.lerp(self.p11, u);
        bottom.lerp(top, v)
    }

    fn partial_derivatives_at(&self, u: f64, v: f64) -> (Vec3, Vec3) {
        let u = u.clamp(0.0, 1.0);
        let v = v.clamp(0.0, 1.0);
        let du = (self.p10 - self.p00).mul_scalar(1.0 - v) + (self.p11 - self.p01).mul_scalar(v);
        let dv = (self.p01 - self.p00).mul_scalar(1.0 - u) + (self.p11 - self.p10).mul_scalar(u);
        (du, dv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cylinder_normal_points_away_from_axis() {
        let cyl = CylinderSurface::from_base_axis_xaxis(Point3::ORIGIN, Vec3::Z, Vec3::X, 2.0).unwrap();
        let p = cyl.point_at(0.0, 0.5);
        assert!((p.x - 2.0).abs() < 1e-12);
        assert!((p.z - 0.5).abs() < 1e-12);
        let n = cyl.normal_at(0.0, 0.5).unwrap();
        assert!(n.dot(Vec3::X) > 0.999);
    }

    #[test]
    fn sphere_normal_is_undefined_at_pole() {
        let sphere = SphereSurface::new(Point3::ORIGIN, 1.0).unwrap();
        assert!(sphere.normal_at(0.25, 1.0).is_none());
        let n = sphere.normal_at(0.25, 0.5).unwrap();
        assert!(n.dot(Vec3::Y) > 0.999);
    }

    #[test]
    fn four_point_surface_interpolates_corners() {
        let srf = FourPointSurface::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.5),
        );
        assert_eq!(srf.point_at(1.0, 1.0), Point3::new(1.0, 1.0, 0.5));
        let n = srf.normal_at(0.0, 0.0).unwrap();
        assert!(n.z > 0.99);
    }
}
