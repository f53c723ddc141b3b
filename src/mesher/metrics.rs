//! Opt-in phase timing.
//!
//! Active only with the `mesh_engine_metrics` feature on non-wasm targets;
//! otherwise every call is a pass-through and [`MeshMetrics::end`] returns
//! `None`.

/// Phases of a patch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimingBucket {
    /// Boundary evaluation, folding and orientation.
    Discretization,
    /// The advancing-front loop.
    FrontAdvance,
    /// Edge-flip passes.
    Delaunay,
    /// Orientation reversal, mirroring and indexed export.
    Export,
}

/// Cumulative nanoseconds per phase.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MeshTimingReport {
    pub discretization_ns: u64,
    pub front_advance_ns: u64,
    pub delaunay_ns: u64,
    pub export_ns: u64,
}

impl MeshTimingReport {
    #[must_use]
    pub fn total_ns(&self) -> u64 {
        self.discretization_ns
            .saturating_add(self.front_advance_ns)
            .saturating_add(self.delaunay_ns)
            .saturating_add(self.export_ns)
    }

    #[must_use]
    pub fn total_ms(&self) -> f64 {
        self.total_ns() as f64 / 1_000_000.0
    }

    pub fn accumulate(&mut self, other: &Self) {
        self.discretization_ns = self.discretization_ns.saturating_add(other.discretization_ns);
        self.front_advance_ns = self.front_advance_ns.saturating_add(other.front_advance_ns);
        self.delaunay_ns = self.delaunay_ns.saturating_add(other.delaunay_ns);
        self.export_ns = self.export_ns.saturating_add(other.export_ns);
    }
}

#[derive(Debug, Default)]
pub struct MeshMetrics {
    #[cfg(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32")))]
    report: MeshTimingReport,
}

impl MeshMetrics {
    pub fn begin(&mut self) {
        #[cfg(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32")))]
        {
            self.report = MeshTimingReport::default();
        }
    }

    #[must_use]
    pub fn end(&self) -> Option<MeshTimingReport> {
        #[cfg(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32")))]
        {
            Some(self.report.clone())
        }
        #[cfg(not(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32"))))]
        {
            None
        }
    }

    /// Runs `f`, charging its wall time to `bucket`.
    pub fn time<R>(&mut self, bucket: TimingBucket, f: impl FnOnce() -> R) -> R {
        #[cfg(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32")))]
        {
            let start = std::time::Instant::now();
            let result = f();
            let nanos = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
            let slot = match bucket {
                TimingBucket::Discretization => &mut self.report.discretization_ns,
                TimingBucket::FrontAdvance => &mut self.report.front_advance_ns,
                TimingBucket::Delaunay => &mut self.report.delaunay_ns,
                TimingBucket::Export => &mut self.report.export_ns,
            };
            *slot = slot.saturating_add(nanos);
            result
        }

        #[cfg(not(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32"))))]
        {
            let _ = bucket;
            f()
        }
    }
}
