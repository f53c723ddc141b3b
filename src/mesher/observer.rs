//! Step-wise observation of a meshing run.
//!
//! Snapshots borrow the live front and triangle list; an observer that needs
//! to keep them must copy. Nothing an observer does feeds back into the run,
//! except through a [`super::CancelToken`] it may hold.

use super::elements::{Segment, Triangle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotPhase {
    /// After one advancing-front iteration.
    Advancing,
    /// After one Delaunay pass.
    Delaunay,
}

#[derive(Debug, Clone, Copy)]
pub struct MeshSnapshot<'a> {
    pub patch: usize,
    pub phase: SnapshotPhase,
    /// Iteration or pass number, starting at 1.
    pub step: usize,
    pub front: &'a [Segment],
    pub triangles: &'a [Triangle],
}

pub trait MeshObserver {
    fn on_snapshot(&mut self, snapshot: &MeshSnapshot<'_>);
}

/// Keeps the counts of every snapshot it sees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectingObserver {
    /// `(phase, step, front segments, triangles)` per snapshot.
    pub frames: Vec<(SnapshotPhase, usize, usize, usize)>,
}

impl MeshObserver for CollectingObserver {
    fn on_snapshot(&mut self, snapshot: &MeshSnapshot<'_>) {
        self.frames.push((
            snapshot.phase,
            snapshot.step,
            snapshot.front.len(),
            snapshot.triangles.len(),
        ));
    }
}
