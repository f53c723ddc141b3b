//! Advancing-front surface mesher.
//!
//! Pipeline per patch: [`BoundaryDiscretizer`] builds the initial [`Front`],
//! [`FrontAdvancer`] grows triangles until the front is consumed,
//! [`DelaunayImprover`] flips poorly shaped pairs, and [`MeshSession`] ties
//! the steps together for a whole shell of patches.

mod advancer;
mod boundary;
mod cancel;
mod delaunay;
mod diagnostics;
mod distribution;
mod elements;
mod error;
mod export;
mod front;
mod metrics;
mod observer;
mod session;
mod settings;

#[cfg(test)]
mod tests;

pub use advancer::{
    AdvanceOutcome, AdvanceState, AdvanceStats, FrontAdvancer, MAX_APEX_ATTEMPTS, UnconvergedReason,
};
pub use boundary::{
    BoundaryCurve, BoundaryDiscretizer, BoundaryLoop, DiscretizedBoundary, LoopKind, MAX_BOUNDARY_NODES,
    NORMAL_NUDGE_FRACTION, Patch,
};
pub use cancel::CancelToken;
pub use delaunay::{DelaunayImprover, DelaunayReport, MAX_DELAUNAY_PASSES};
pub use diagnostics::MeshDiagnostics;
pub use distribution::{Distribution, EdgeSplit};
pub use elements::{Node, Segment, Triangle};
pub use error::{MeshError, MeshResult};
pub use export::IndexedMesh;
pub use front::{Adjacent, Front, FrontCrossing};
pub use metrics::{MeshMetrics, MeshTimingReport, TimingBucket};
pub use observer::{CollectingObserver, MeshObserver, MeshSnapshot, SnapshotPhase};
pub use session::{MeshSession, PatchMesh, PatchStatus, ShellMesh};
pub use settings::{DELAUNAY_FLIP_THRESHOLD_DEG, MeshSettings};
