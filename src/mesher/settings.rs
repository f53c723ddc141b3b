use serde::{Deserialize, Serialize};

use super::error::{MeshError, MeshResult};

/// Opposite-angle sum above which the Delaunay pass flips a shared edge, in
/// degrees. Includes one degree of slack over the circumcircle criterion.
pub const DELAUNAY_FLIP_THRESHOLD_DEG: f64 = 181.0;

/// Meshing tunables, snapshotted when a [`super::MeshSession`] starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshSettings {
    /// Target upper bound on triangle edge length. May be `f64::INFINITY`.
    pub max_edge_length: f64,
    /// Scale applied to the ideal apex height.
    pub growth_factor: f64,
    /// Radius of the close-node search as a fraction of the base length.
    pub search_radius_factor: f64,
    /// Triangle-count cap per patch.
    pub max_panel_count: usize,
    /// Iteration cap per patch; negative means unbounded.
    pub max_iterations: i64,
    pub delaunay_enabled: bool,
    /// Boundary segments shorter than this are folded into their neighbour.
    pub merge_distance: f64,
    pub flip_angle_threshold_deg: f64,
    /// Append the mirror image about the XZ plane to every patch.
    pub mirror_xz: bool,
    /// Mesh only the patch at this index.
    pub trace_patch: Option<usize>,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            max_edge_length: 0.25,
            growth_factor: 1.0,
            search_radius_factor: 0.7,
            max_panel_count: 1000,
            max_iterations: -1,
            delaunay_enabled: true,
            merge_distance: 1e-4,
            flip_angle_threshold_deg: DELAUNAY_FLIP_THRESHOLD_DEG,
            mirror_xz: false,
            trace_patch: None,
        }
    }
}

impl MeshSettings {
    #[must_use]
    pub fn with_max_edge_length(mut self, length: f64) -> Self {
        self.max_edge_length = length;
        self
    }

    #[must_use]
    pub fn with_max_panel_count(mut self, count: usize) -> Self {
        self.max_panel_count = count;
        self
    }

    #[must_use]
    pub fn with_max_iterations(mut self, iterations: i64) -> Self {
        self.max_iterations = iterations;
        self
    }

    #[must_use]
    pub fn with_delaunay(mut self, enabled: bool) -> Self {
        self.delaunay_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_search_radius_factor(mut self, factor: f64) -> Self {
        self.search_radius_factor = factor;
        self
    }

    #[must_use]
    pub fn with_merge_distance(mut self, distance: f64) -> Self {
        self.merge_distance = distance;
        self
    }

    /// Iteration cap, `None` when unbounded.
    #[must_use]
    pub fn iteration_cap(&self) -> Option<usize> {
        usize::try_from(self.max_iterations).ok()
    }

    pub fn validate(&self) -> MeshResult<()> {
        if self.max_edge_length.is_nan() || self.max_edge_length <= 0.0 {
            return Err(MeshError::InvalidSettings(format!(
                "max_edge_length must be > 0, got {}",
                self.max_edge_length
            )));
        }
        if !self.growth_factor.is_finite() || self.growth_factor <= 0.0 {
            return Err(MeshError::InvalidSettings(format!(
                "growth_factor must be finite and > 0, got {}",
                self.growth_factor
            )));
        }
        if !(0.0..=1.0).contains(&self.search_radius_factor) {
            return Err(MeshError::InvalidSettings(format!(
                "search_radius_factor must lie in [0, 1], got {}",
                self.search_radius_factor
            )));
        }
        if self.max_panel_count == 0 {
            return Err(MeshError::InvalidSettings(
                "max_panel_count must be at least 1".to_string(),
            ));
        }
        if !self.merge_distance.is_finite() || self.merge_distance < 0.0 {
            return Err(MeshError::InvalidSettings(format!(
                "merge_distance must be finite and >= 0, got {}",
                self.merge_distance
            )));
        }
        if !(self.flip_angle_threshold_deg > 0.0 && self.flip_angle_threshold_deg < 360.0) {
            return Err(MeshError::InvalidSettings(format!(
                "flip_angle_threshold_deg must lie in (0, 360), got {}",
                self.flip_angle_threshold_deg
            )));
        }
        Ok(())
    }
}
