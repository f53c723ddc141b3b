//! Per-patch orchestration and shell aggregation.
//!
//! A [`MeshSession`] validates its settings once, then runs every patch
//! through discretization, the advancing front, the Delaunay pass and the
//! orientation post-steps. Patches are independent: one failing patch is
//! reported and its siblings still run. Cancellation stops the current patch
//! with its partial result and marks the remaining ones as skipped.

use crate::geom::Tolerance;

use super::advancer::{AdvanceState, FrontAdvancer, UnconvergedReason};
use super::boundary::{BoundaryDiscretizer, Patch};
use super::cancel::CancelToken;
use super::delaunay::DelaunayImprover;
use super::diagnostics::MeshDiagnostics;
use super::elements::Triangle;
use super::error::{MeshError, MeshResult};
use super::export::IndexedMesh;
use super::front::Front;
use super::metrics::{MeshMetrics, TimingBucket};
use super::observer::MeshObserver;
use super::settings::MeshSettings;

#[derive(Debug, Clone, PartialEq)]
pub enum PatchStatus {
    Converged,
    /// A partial mesh; `residual_front` holds what was left.
    Unconverged(UnconvergedReason),
    Cancelled,
    /// The boundary could not be discretized.
    Rejected(MeshError),
    /// Not meshed: filtered by `trace_patch` or after cancellation.
    Skipped,
}

impl PatchStatus {
    #[must_use]
    pub fn is_converged(&self) -> bool {
        *self == Self::Converged
    }
}

#[derive(Debug, Clone)]
pub struct PatchMesh {
    pub index: usize,
    pub name: String,
    pub status: PatchStatus,
    pub triangles: Vec<Triangle>,
    pub residual_front: Front,
    pub diagnostics: MeshDiagnostics,
}

impl PatchMesh {
    fn empty(index: usize, patch: &Patch, status: PatchStatus) -> Self {
        Self {
            index,
            name: patch.name.clone(),
            status,
            triangles: Vec::new(),
            residual_front: Front::default(),
            diagnostics: MeshDiagnostics::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShellMesh {
    /// One entry per input patch, in input order.
    pub patches: Vec<PatchMesh>,
    pub diagnostics: MeshDiagnostics,
    pub cancelled: bool,
}

impl ShellMesh {
    pub fn triangles(&self) -> impl Iterator<Item = &Triangle> {
        self.patches.iter().flat_map(|p| p.triangles.iter())
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.patches.iter().map(|p| p.triangles.len()).sum()
    }

    /// `true` when every patch that was meshed converged.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        !self.cancelled
            && self
                .patches
                .iter()
                .all(|p| matches!(p.status, PatchStatus::Converged | PatchStatus::Skipped))
    }

    /// Welded indexed mesh of every patch.
    #[must_use]
    pub fn to_indexed_mesh(&self, tol: Tolerance) -> (IndexedMesh, usize) {
        let triangles: Vec<Triangle> = self.triangles().copied().collect();
        IndexedMesh::from_triangles(&triangles, tol)
    }
}

pub struct MeshSession<'o> {
    settings: MeshSettings,
    cancel: CancelToken,
    observer: Option<&'o mut dyn MeshObserver>,
}

impl<'o> MeshSession<'o> {
    /// Snapshots and validates `settings`.
    pub fn new(settings: MeshSettings) -> MeshResult<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            cancel: CancelToken::new(),
            observer: None,
        })
    }

    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Attaching an observer forces patches to run one after another.
    #[must_use]
    pub fn with_observer(mut self, observer: &'o mut dyn MeshObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Handle that cancels this session when triggered.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn settings(&self) -> &MeshSettings {
        &self.settings
    }

    /// Meshes one patch; `index` tags logs and snapshots.
    pub fn mesh_patch(&mut self, index: usize, patch: &Patch) -> PatchMesh {
        run_patch(
            &self.settings,
            &self.cancel,
            self.observer.as_deref_mut(),
            index,
            patch,
        )
    }

    pub fn mesh_shell(&mut self, patches: &[Patch]) -> ShellMesh {
        let trace = self.settings.trace_patch;
        log::info!("meshing {} patches", patches.len());

        let results = if self.observer.is_some() {
            let mut results = Vec::with_capacity(patches.len());
            for (index, patch) in patches.iter().enumerate() {
                let mesh = if trace.is_some_and(|t| t != index) || self.cancel.is_cancelled() {
                    PatchMesh::empty(index, patch, PatchStatus::Skipped)
                } else {
                    self.mesh_patch(index, patch)
                };
                results.push(mesh);
            }
            results
        } else {
            mesh_unobserved(&self.settings, &self.cancel, patches)
        };

        let mut diagnostics = MeshDiagnostics::new();
        for mesh in &results {
            diagnostics.merge(&mesh.diagnostics);
        }
        let cancelled = self.cancel.is_cancelled()
            || results.iter().any(|p| p.status == PatchStatus::Cancelled);
        log::info!("shell: {}", diagnostics.summary());

        ShellMesh {
            patches: results,
            diagnostics,
            cancelled,
        }
    }
}

fn mesh_or_skip(
    settings: &MeshSettings,
    cancel: &CancelToken,
    index: usize,
    patch: &Patch,
) -> PatchMesh {
    if settings.trace_patch.is_some_and(|t| t != index) || cancel.is_cancelled() {
        return PatchMesh::empty(index, patch, PatchStatus::Skipped);
    }
    run_patch(settings, cancel, None, index, patch)
}

#[cfg(feature = "parallel")]
fn mesh_unobserved(settings: &MeshSettings, cancel: &CancelToken, patches: &[Patch]) -> Vec<PatchMesh> {
    use rayon::prelude::*;

    patches
        .par_iter()
        .enumerate()
        .map(|(index, patch)| mesh_or_skip(settings, cancel, index, patch))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn mesh_unobserved(settings: &MeshSettings, cancel: &CancelToken, patches: &[Patch]) -> Vec<PatchMesh> {
    patches
        .iter()
        .enumerate()
        .map(|(index, patch)| mesh_or_skip(settings, cancel, index, patch))
        .collect()
}

fn run_patch(
    settings: &MeshSettings,
    cancel: &CancelToken,
    mut observer: Option<&mut (dyn MeshObserver + '_)>,
    index: usize,
    patch: &Patch,
) -> PatchMesh {
    crate::debug_log!("meshing patch {index} '{}'", patch.name);
    let mut metrics = MeshMetrics::default();
    metrics.begin();

    let mut diagnostics = MeshDiagnostics::new();
    diagnostics.patch_count = 1;

    let discretized = metrics.time(TimingBucket::Discretization, || {
        BoundaryDiscretizer::new(settings).discretize(patch)
    });
    let boundary = match discretized {
        Ok(boundary) => boundary,
        Err(err) => {
            diagnostics.add_warning(format!("patch {index} ('{}') rejected: {err}", patch.name));
            diagnostics.timing = metrics.end();
            let mut mesh = PatchMesh::empty(index, patch, PatchStatus::Rejected(err));
            mesh.diagnostics = diagnostics;
            return mesh;
        }
    };
    diagnostics.boundary_node_count = boundary.node_count;
    diagnostics.folded_segment_count = boundary.folded;
    diagnostics.nudged_normal_count = boundary.nudged;
    diagnostics.orientation_flip_count = boundary.orientation_flips;
    for warning in boundary.warnings {
        diagnostics.add_warning(format!("patch {index}: {warning}"));
    }

    let outcome = metrics.time(TimingBucket::FrontAdvance, || {
        let mut advancer = FrontAdvancer::new(settings, patch.oracle.as_ref())
            .with_cancel(cancel)
            .with_patch_index(index);
        if let Some(observer) = observer.as_deref_mut() {
            advancer = advancer.with_observer(observer);
        }
        advancer.run(boundary.front)
    });

    let stats = &outcome.stats;
    diagnostics.iteration_count = stats.iterations;
    diagnostics.closing_triangle_count = stats.closing;
    diagnostics.sharp_angle_count = stats.sharp;
    diagnostics.ideal_triangle_count = stats.ideal;
    diagnostics.apex_retry_count = stats.apex_retries;
    diagnostics.node_substitution_count = stats.substitutions;
    diagnostics.discarded_candidate_count = stats.discarded;
    diagnostics.residual_front_segments = outcome.front.len();

    let mut status = match outcome.state {
        AdvanceState::Converged => PatchStatus::Converged,
        AdvanceState::Unconverged(reason) => PatchStatus::Unconverged(reason),
        AdvanceState::Cancelled | AdvanceState::Running => PatchStatus::Cancelled,
    };
    if let Some(err) = &outcome.error {
        diagnostics.add_warning(format!("patch {index}: {err}"));
    }
    if let PatchStatus::Unconverged(reason) = status {
        diagnostics.add_warning(format!(
            "patch {index}: unconverged ({reason}): made {} triangles in {} iterations, {} segments remain",
            outcome.triangles.len(),
            stats.iterations,
            outcome.front.len()
        ));
    }

    let mut triangles = outcome.triangles;
    if settings.delaunay_enabled && status != PatchStatus::Cancelled {
        let report = metrics.time(TimingBucket::Delaunay, || {
            let mut improver = DelaunayImprover::from_settings(settings)
                .with_cancel(cancel)
                .with_patch_index(index);
            if let Some(observer) = observer.as_deref_mut() {
                improver = improver.with_observer(observer);
            }
            improver.improve(&mut triangles)
        });
        diagnostics.flip_count = report.flips;
        diagnostics.delaunay_pass_count = report.passes;
        diagnostics.rejected_flip_count = report.rejected;
        if report.cancelled {
            status = PatchStatus::Cancelled;
        }
    }

    metrics.time(TimingBucket::Export, || {
        if patch.reversed {
            for tri in &mut triangles {
                tri.reverse_orientation();
            }
        }
        if settings.mirror_xz {
            let mirrored: Vec<Triangle> = triangles.iter().map(Triangle::mirrored_xz).collect();
            triangles.extend(mirrored);
        }
    });

    diagnostics.triangle_count = triangles.len();
    if status.is_converged() {
        diagnostics.converged_patch_count = 1;
    }
    diagnostics.timing = metrics.end();
    log::info!("patch {index} ('{}'): {}", patch.name, diagnostics.summary());

    PatchMesh {
        index,
        name: patch.name.clone(),
        status,
        triangles,
        residual_front: outcome.front,
        diagnostics,
    }
}
