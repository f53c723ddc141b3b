mod core;
mod oracle;
mod surface;

pub use core::{Point3, Tolerance, UvBounds, UvPoint, Vec3};
pub use oracle::{ARC_LENGTH_SAMPLES, ParametricOracle, PlaneOracle, SurfaceOracle, SurfaceSample};
pub use surface::{CylinderSurface, FourPointSurface, PlaneSurface, SphereSurface, Surface};
