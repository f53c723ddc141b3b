//! Counters and warnings collected while meshing.
//!
//! One [`MeshDiagnostics`] is produced per patch; a shell merges them.

use std::fmt;

use super::metrics::MeshTimingReport;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MeshDiagnostics {
    pub patch_count: usize,
    pub converged_patch_count: usize,

    /// Nodes on the discretized boundary.
    pub boundary_node_count: usize,
    /// Segments folded into a neighbour because they were shorter than the
    /// merge distance.
    pub folded_segment_count: usize,
    /// Boundary nodes whose normal was taken from a nudged parameter.
    pub nudged_normal_count: usize,
    /// Loops reversed to match the surface normal.
    pub orientation_flip_count: usize,

    pub iteration_count: usize,
    pub triangle_count: usize,
    pub closing_triangle_count: usize,
    pub sharp_angle_count: usize,
    pub ideal_triangle_count: usize,
    /// Apex projections retried with a shorter height.
    pub apex_retry_count: usize,
    /// Apexes replaced by an existing front node.
    pub node_substitution_count: usize,
    /// Candidates dropped because they were degenerate.
    pub discarded_candidate_count: usize,
    /// Segments left on the front when the loop stopped.
    pub residual_front_segments: usize,

    pub flip_count: usize,
    pub delaunay_pass_count: usize,
    /// Flips vetoed because they would invert a triangle.
    pub rejected_flip_count: usize,

    /// Phase timing, only with `mesh_engine_metrics`.
    pub timing: Option<MeshTimingReport>,

    /// Non-convergence reasons and recovered boundary issues.
    pub warnings: Vec<String>,
}

impl MeshDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        log::warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Sums counts, appends warnings and accumulates timing.
    pub fn merge(&mut self, other: &MeshDiagnostics) {
        self.patch_count += other.patch_count;
        self.converged_patch_count += other.converged_patch_count;
        self.boundary_node_count += other.boundary_node_count;
        self.folded_segment_count += other.folded_segment_count;
        self.nudged_normal_count += other.nudged_normal_count;
        self.orientation_flip_count += other.orientation_flip_count;
        self.iteration_count += other.iteration_count;
        self.triangle_count += other.triangle_count;
        self.closing_triangle_count += other.closing_triangle_count;
        self.sharp_angle_count += other.sharp_angle_count;
        self.ideal_triangle_count += other.ideal_triangle_count;
        self.apex_retry_count += other.apex_retry_count;
        self.node_substitution_count += other.node_substitution_count;
        self.discarded_candidate_count += other.discarded_candidate_count;
        self.residual_front_segments += other.residual_front_segments;
        self.flip_count += other.flip_count;
        self.delaunay_pass_count += other.delaunay_pass_count;
        self.rejected_flip_count += other.rejected_flip_count;
        if let Some(timing) = other.timing.as_ref() {
            self.timing
                .get_or_insert_with(MeshTimingReport::default)
                .accumulate(timing);
        }
        self.warnings.extend(other.warnings.iter().cloned());
    }

    /// One-line summary for logs: `"P:{patches} T:{triangles} ..."`.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = vec![format!(
            "P:{}/{} T:{} it:{}",
            self.converged_patch_count, self.patch_count, self.triangle_count, self.iteration_count
        )];
        if self.flip_count > 0 {
            parts.push(format!("flips:{}", self.flip_count));
        }
        if self.node_substitution_count > 0 {
            parts.push(format!("subst:{}", self.node_substitution_count));
        }
        if self.discarded_candidate_count > 0 {
            parts.push(format!("discarded:{}", self.discarded_candidate_count));
        }
        if self.residual_front_segments > 0 {
            parts.push(format!("residual:{}", self.residual_front_segments));
        }
        if !self.warnings.is_empty() {
            parts.push(format!("warnings:{}", self.warnings.len()));
        }
        parts.join(" ")
    }
}

impl fmt::Display for MeshDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mesh Diagnostics:")?;
        writeln!(
            f,
            "  Patches: {} ({} converged)",
            self.patch_count, self.converged_patch_count
        )?;
        writeln!(f, "  Boundary nodes: {}", self.boundary_node_count)?;
        writeln!(f, "  Triangles: {}", self.triangle_count)?;
        writeln!(f, "  Iterations: {}", self.iteration_count)?;
        writeln!(
            f,
            "  Construction: closing {} / sharp {} / ideal {} (retries {}, substitutions {})",
            self.closing_triangle_count,
            self.sharp_angle_count,
            self.ideal_triangle_count,
            self.apex_retry_count,
            self.node_substitution_count
        )?;
        writeln!(
            f,
            "  Delaunay: {} flips in {} passes",
            self.flip_count, self.delaunay_pass_count
        )?;
        if self.residual_front_segments > 0 {
            writeln!(f, "  Residual front: {} segments", self.residual_front_segments)?;
        }
        if !self.warnings.is_empty() {
            writeln!(f, "  Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "    - {warning}")?;
            }
        }
        if let Some(timing) = self.timing.as_ref() {
            writeln!(f, "  Timing: {} ms total", timing.total_ms())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_sums_counts_and_warnings() {
        let mut a = MeshDiagnostics {
            patch_count: 1,
            converged_patch_count: 1,
            triangle_count: 2,
            warnings: vec!["first".to_string()],
            ..Default::default()
        };
        let b = MeshDiagnostics {
            patch_count: 1,
            triangle_count: 5,
            flip_count: 3,
            residual_front_segments: 4,
            warnings: vec!["second".to_string()],
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.patch_count, 2);
        assert_eq!(a.converged_patch_count, 1);
        assert_eq!(a.triangle_count, 7);
        assert_eq!(a.flip_count, 3);
        assert_eq!(a.warnings, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn summary_lists_only_nonzero_extras() {
        let diag = MeshDiagnostics {
            patch_count: 2,
            converged_patch_count: 1,
            triangle_count: 10,
            iteration_count: 12,
            residual_front_segments: 3,
            ..Default::default()
        };
        let summary = diag.summary();
        assert!(summary.starts_with("P:1/2 T:10 it:12"));
        assert!(summary.contains("residual:3"));
        assert!(!summary.contains("flips"));
    }

    #[test]
    fn display_mentions_warnings() {
        let mut diag = MeshDiagnostics::new();
        diag.add_warning("loop reversed");
        let text = diag.to_string();
        assert!(text.contains("loop reversed"));
        assert!(diag.has_warnings());
    }
}
