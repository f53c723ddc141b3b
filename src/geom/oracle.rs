//! Surface services consumed by the mesher.
//!
//! The mesher never touches a geometry representation directly; it asks a
//! [`SurfaceOracle`] to evaluate boundary parameters, to project candidate
//! apex points back onto the surface and to measure boundary arc lengths.
//! [`PlaneOracle`] is exact; [`ParametricOracle`] adapts any [`Surface`].

use super::core::{Point3, Tolerance, UvBounds, UvPoint, Vec3};
use super::surface::{Surface, frame_axes_from_xaxis_normal, wrap_param};

/// Result of an oracle query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSample {
    pub position: Point3,
    /// `None` where the surface normal is undefined (poles, degenerate edges).
    pub normal: Option<Vec3>,
    pub uv: Option<UvPoint>,
}

impl SurfaceSample {
    #[must_use]
    pub const fn new(position: Point3, normal: Option<Vec3>, uv: Option<UvPoint>) -> Self {
        Self { position, normal, uv }
    }
}

/// Number of chords used by the default [`SurfaceOracle::arc_length`].
pub const ARC_LENGTH_SAMPLES: usize = 16;

pub trait SurfaceOracle {
    /// Position and normal at a parameter. `None` when the parameter cannot
    /// be evaluated at all.
    fn evaluate(&self, uv: UvPoint) -> Option<SurfaceSample>;

    /// Foot point of `near` on the surface. `None` when the projection falls
    /// outside the patch.
    fn project(&self, near: Point3, normal_guess: Vec3) -> Option<SurfaceSample>;

    /// Length of the surface curve along the straight parameter path from
    /// `a` to `b`.
    fn arc_length(&self, a: UvPoint, b: UvPoint) -> f64 {
        let mut length = 0.0;
        let mut previous = match self.evaluate(a) {
            Some(sample) => sample.position,
            None => return 0.0,
        };
        for i in 1..=ARC_LENGTH_SAMPLES {
            let t = i as f64 / ARC_LENGTH_SAMPLES as f64;
            if let Some(sample) = self.evaluate(a.lerp(b, t)) {
                length += sample.position.distance_to(previous);
                previous = sample.position;
            }
        }
        length
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plane
// ─────────────────────────────────────────────────────────────────────────────

/// Exact oracle for a flat plane with orthonormal parameter axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneOracle {
    origin: Point3,
    u_axis: Vec3,
    v_axis: Vec3,
    normal: Vec3,
    bounds: Option<UvBounds>,
}

impl PlaneOracle {
    /// The XY plane; `(u, v)` equals `(x, y)` and the normal is `+Z`.
    #[must_use]
    pub const fn xy() -> Self {
        Self {
            origin: Point3::ORIGIN,
            u_axis: Vec3::X,
            v_axis: Vec3::Y,
            normal: Vec3::Z,
            bounds: None,
        }
    }

    #[must_use]
    pub fn new(origin: Point3, x_axis: Vec3, normal: Vec3) -> Self {
        let (u_axis, v_axis, normal) = frame_axes_from_xaxis_normal(x_axis, normal);
        Self {
            origin,
            u_axis,
            v_axis,
            normal,
            bounds: None,
        }
    }

    /// Restrict projections to a parameter rectangle.
    #[must_use]
    pub const fn with_bounds(mut self, bounds: UvBounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    fn point_at(&self, uv: UvPoint) -> Point3 {
        self.origin
            .add_vec(self.u_axis.mul_scalar(uv.u))
            .add_vec(self.v_axis.mul_scalar(uv.v))
    }
}

impl SurfaceOracle for PlaneOracle {
    fn evaluate(&self, uv: UvPoint) -> Option<SurfaceSample> {
        if !uv.is_finite() {
            return None;
        }
        Some(SurfaceSample::new(self.point_at(uv), Some(self.normal), Some(uv)))
    }

    fn project(&self, near: Point3, _normal_guess: Vec3) -> Option<SurfaceSample> {
        if !near.is_finite() {
            return None;
        }
        let rel = near - self.origin;
        let uv = UvPoint::new(rel.dot(self.u_axis), rel.dot(self.v_axis));
        if let Some(bounds) = self.bounds {
            if !bounds.contains(uv) {
                return None;
            }
        }
        Some(SurfaceSample::new(self.point_at(uv), Some(self.normal), Some(uv)))
    }

    fn arc_length(&self, a: UvPoint, b: UvPoint) -> f64 {
        self.point_at(a).distance_to(self.point_at(b))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parametric surfaces
// ─────────────────────────────────────────────────────────────────────────────

const PROJECTION_SEED_GRID: usize = 24;
const PROJECTION_MAX_STEPS: usize = 32;

/// Oracle over any [`Surface`]: closest-point projection seeded from a coarse
/// parameter grid and refined with Gauss-Newton steps.
#[derive(Debug, Clone)]
pub struct ParametricOracle<S> {
    surface: S,
    seed_grid: usize,
}

impl<S: Surface> ParametricOracle<S> {
    #[must_use]
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            seed_grid: PROJECTION_SEED_GRID,
        }
    }

    fn normalize_uv(&self, u: f64, v: f64) -> UvPoint {
        let (u0, u1) = self.surface.domain_u();
        let (v0, v1) = self.surface.domain_v();
        let u = if self.surface.is_u_closed() { wrap_param(u, u0, u1) } else { u.clamp(u0, u1) };
        let v = if self.surface.is_v_closed() { wrap_param(v, v0, v1) } else { v.clamp(v0, v1) };
        UvPoint::new(u, v)
    }

    fn seed(&self, target: Point3) -> UvPoint {
        let (u0, u1) = self.surface.domain_u();
        let (v0, v1) = self.surface.domain_v();
        let n = self.seed_grid;
        let mut best = UvPoint::new(u0, v0);
        let mut best_dist = f64::INFINITY;
        for i in 0..=n {
            let u = u0 + (u1 - u0) * i as f64 / n as f64;
            for j in 0..=n {
                let v = v0 + (v1 - v0) * j as f64 / n as f64;
                let d = self.surface.point_at(u, v).distance_to(target);
                if d < best_dist {
                    best_dist = d;
                    best = UvPoint::new(u, v);
                }
            }
        }
        best
    }

    /// `true` when `uv` sits on an open edge of the domain.
    fn on_open_edge(&self, uv: UvPoint) -> bool {
        let (u0, u1) = self.surface.domain_u();
        let (v0, v1) = self.surface.domain_v();
        let eps_u = Tolerance::DERIVATIVE.relative_to(u1 - u0);
        let eps_v = Tolerance::DERIVATIVE.relative_to(v1 - v0);
        let u_edge = !self.surface.is_u_closed() && (uv.u - u0 <= eps_u || u1 - uv.u <= eps_u);
        let v_edge = !self.surface.is_v_closed() && (uv.v - v0 <= eps_v || v1 - uv.v <= eps_v);
        u_edge || v_edge
    }
}

impl<S: Surface> SurfaceOracle for ParametricOracle<S> {
    fn evaluate(&self, uv: UvPoint) -> Option<SurfaceSample> {
        if !uv.is_finite() {
            return None;
        }
        let position = self.surface.point_at(uv.u, uv.v);
        if !position.is_finite() {
            return None;
        }
        Some(SurfaceSample::new(
            position,
            self.surface.normal_at(uv.u, uv.v),
            Some(uv),
        ))
    }

    fn project(&self, near: Point3, _normal_guess: Vec3) -> Option<SurfaceSample> {
        if !near.is_finite() {
            return None;
        }
        let (u0, u1) = self.surface.domain_u();
        let (v0, v1) = self.surface.domain_v();
        let step_eps_u = Tolerance::ZERO_LENGTH.relative_to(u1 - u0);
        let step_eps_v = Tolerance::ZERO_LENGTH.relative_to(v1 - v0);

        let mut uv = self.seed(near);
        for _ in 0..PROJECTION_MAX_STEPS {
            let p = self.surface.point_at(uv.u, uv.v);
            let (su, sv) = self.surface.partial_derivatives_at(uv.u, uv.v);
            let r = p - near;

            let a = su.dot(su);
            let b = su.dot(sv);
            let c = sv.dot(sv);
            let det = a * c - b * b;
            if !det.is_finite() || det.abs() <= Tolerance::ZERO_LENGTH.eps {
                break;
            }
            let gu = r.dot(su);
            let gv = r.dot(sv);
            let du = (-c * gu + b * gv) / det;
            let dv = (b * gu - a * gv) / det;

            uv = self.normalize_uv(uv.u + du, uv.v + dv);
            if du.abs() <= step_eps_u && dv.abs() <= step_eps_v {
                break;
            }
        }

        if self.on_open_edge(uv) {
            return None;
        }
        self.evaluate(uv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::surface::{CylinderSurface, PlaneSurface};

    #[test]
    fn plane_projection_drops_offset() {
        let oracle = PlaneOracle::xy();
        let sample = oracle.project(Point3::new(0.3, 0.7, 4.0), Vec3::Z).unwrap();
        assert_eq!(sample.position, Point3::new(0.3, 0.7, 0.0));
        assert_eq!(sample.normal, Some(Vec3::Z));
        assert!((oracle.arc_length(UvPoint::new(0.0, 0.0), UvPoint::new(3.0, 4.0)) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn bounded_plane_rejects_outside_points() {
        let bounds = UvBounds::new(UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 1.0));
        let oracle = PlaneOracle::xy().with_bounds(bounds);
        assert!(oracle.project(Point3::new(1.5, 0.5, 0.0), Vec3::Z).is_none());
        assert!(oracle.project(Point3::new(0.5, 0.5, 0.0), Vec3::Z).is_some());
    }

    #[test]
    fn cylinder_projection_lands_on_radius() {
        let cyl = CylinderSurface::from_base_axis_xaxis(Point3::ORIGIN, Vec3::Z, Vec3::X, 1.0).unwrap();
        let oracle = ParametricOracle::new(cyl);
        let sample = oracle.project(Point3::new(0.5, 0.5, 0.4), Vec3::X).unwrap();
        let radial = (sample.position.x.powi(2) + sample.position.y.powi(2)).sqrt();
        assert!((radial - 1.0).abs() < 1e-6);
        assert!((sample.position.z - 0.4).abs() < 1e-6);
        let n = sample.normal.unwrap();
        assert!((n.x - n.y).abs() < 1e-4);
    }

    #[test]
    fn cylinder_arc_length_matches_circumference_fraction() {
        let cyl = CylinderSurface::from_base_axis_xaxis(Point3::ORIGIN, Vec3::Z, Vec3::X, 1.0).unwrap();
        let oracle = ParametricOracle::new(cyl);
        let quarter = oracle.arc_length(UvPoint::new(0.0, 0.0), UvPoint::new(0.25, 0.0));
        assert!((quarter - std::f64::consts::FRAC_PI_2).abs() < 1e-2);
    }

    #[test]
    fn scaled_plane_surface_projects_to_parameters() {
        let plane = PlaneSurface::new(Point3::ORIGIN, Vec3::X * 2.0, Vec3::Y * 3.0);
        let oracle = ParametricOracle::new(plane);
        let sample = oracle.project(Point3::new(1.0, 1.5, 2.0), Vec3::Z).unwrap();
        assert!(sample.position.distance_to(Point3::new(1.0, 1.5, 0.0)) < 1e-9);
        let uv = sample.uv.unwrap();
        assert!((uv.u - 0.5).abs() < 1e-9 && (uv.v - 0.5).abs() < 1e-9);
        assert!(sample.normal.unwrap().z > 0.999);
    }

    #[test]
    fn projection_past_open_edge_fails() {
        let cyl = CylinderSurface::from_base_axis_xaxis(Point3::ORIGIN, Vec3::Z, Vec3::X, 1.0).unwrap();
        let oracle = ParametricOracle::new(cyl);
        assert!(oracle.project(Point3::new(1.0, 0.0, 3.0), Vec3::X).is_none());
    }
}
