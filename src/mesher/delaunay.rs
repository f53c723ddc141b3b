//! Edge-flip improvement over a finished triangle list.
//!
//! Pairs sharing an edge whose opposite angles sum above the threshold get
//! the edge swapped for the other diagonal. Passes repeat until one makes no
//! flip or [`MAX_DELAUNAY_PASSES`] is reached.

use crate::geom::Tolerance;

use super::cancel::CancelToken;
use super::elements::Triangle;
use super::observer::{MeshObserver, MeshSnapshot, SnapshotPhase};
use super::settings::{DELAUNAY_FLIP_THRESHOLD_DEG, MeshSettings};

pub const MAX_DELAUNAY_PASSES: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DelaunayReport {
    pub flips: usize,
    pub passes: usize,
    /// Flips skipped because a new triangle would face the other way.
    pub rejected: usize,
    pub cancelled: bool,
}

pub struct DelaunayImprover<'a> {
    threshold_deg: f64,
    cancel: Option<&'a CancelToken>,
    observer: Option<&'a mut dyn MeshObserver>,
    patch: usize,
}

impl Default for DelaunayImprover<'_> {
    fn default() -> Self {
        Self::new(DELAUNAY_FLIP_THRESHOLD_DEG)
    }
}

impl<'a> DelaunayImprover<'a> {
    #[must_use]
    pub fn new(threshold_deg: f64) -> Self {
        Self {
            threshold_deg,
            cancel: None,
            observer: None,
            patch: 0,
        }
    }

    #[must_use]
    pub fn from_settings(settings: &MeshSettings) -> Self {
        Self::new(settings.flip_angle_threshold_deg)
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: &'a CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: &'a mut dyn MeshObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    #[must_use]
    pub fn with_patch_index(mut self, patch: usize) -> Self {
        self.patch = patch;
        self
    }

    /// Flips in place. Never fails; a cancelled run keeps the flips made so
    /// far.
    pub fn improve(mut self, triangles: &mut [Triangle]) -> DelaunayReport {
        let mut report = DelaunayReport::default();

        while report.passes < MAX_DELAUNAY_PASSES {
            if self.cancel.is_some_and(CancelToken::is_cancelled) {
                report.cancelled = true;
                break;
            }
            report.passes += 1;
            let (flips, rejected) = self.pass(triangles);
            report.flips += flips;
            report.rejected += rejected;

            if let Some(observer) = self.observer.as_deref_mut() {
                observer.on_snapshot(&MeshSnapshot {
                    patch: self.patch,
                    phase: SnapshotPhase::Delaunay,
                    step: report.passes,
                    front: &[],
                    triangles,
                });
            }
            if flips == 0 {
                break;
            }
        }

        log::debug!(
            "patch {}: {} delaunay flips in {} passes",
            self.patch,
            report.flips,
            report.passes
        );
        report
    }

    fn pass(&self, triangles: &mut [Triangle]) -> (usize, usize) {
        let eps = Tolerance::NODE.eps;
        let mut flips = 0;
        let mut rejected = 0;

        for i in 0..triangles.len() {
            let (head, tail) = triangles.split_at_mut(i + 1);
            let t1 = &mut head[i];
            for t2 in tail.iter_mut() {
                if t1.is_null() || t2.is_null() || !may_share_edge(t1, t2) {
                    continue;
                }
                for ie0 in 0..3 {
                    let edge = t1.edge(ie0);
                    let Some(ien) = t2.edge_index(&edge, eps) else {
                        continue;
                    };
                    if t1.angle_deg(ie0) + t2.angle_deg(ien) <= self.threshold_deg {
                        continue;
                    }
                    let a = t1.vertex(ie0);
                    let b = t2.vertex(ien);
                    let f1 = Triangle::new(a, edge.start, b);
                    let f2 = Triangle::new(a, b, edge.end);
                    if !keeps_orientation(&f1, t1, t2) || !keeps_orientation(&f2, t1, t2) {
                        rejected += 1;
                        continue;
                    }
                    t1.set_vertices(a, edge.start, b);
                    t2.set_vertices(a, b, edge.end);
                    flips += 1;
                    break;
                }
            }
        }
        (flips, rejected)
    }
}

/// Cheap reject: triangles sharing an edge have centroids closer than the
/// sum of their longest edges.
fn may_share_edge(t1: &Triangle, t2: &Triangle) -> bool {
    t1.centroid().distance_to(t2.centroid()) <= t1.max_edge_length() + t2.max_edge_length()
}

fn keeps_orientation(flipped: &Triangle, t1: &Triangle, t2: &Triangle) -> bool {
    !flipped.is_null()
        && flipped.normal().dot(t1.normal()) > 0.0
        && flipped.normal().dot(t2.normal()) > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Point3, Vec3};
    use crate::mesher::elements::Node;
    use crate::mesher::observer::CollectingObserver;

    fn node(x: f64, y: f64) -> Node {
        Node::new(Point3::new(x, y, 0.0), Vec3::Z)
    }

    fn thin_quad() -> Vec<Triangle> {
        let p0 = node(0.0, 0.0);
        let p1 = node(1.0, -0.2);
        let p2 = node(2.0, 0.0);
        let p3 = node(1.0, 0.2);
        vec![Triangle::new(p0, p1, p2), Triangle::new(p2, p3, p0)]
    }

    #[test]
    fn flips_long_diagonal_of_thin_quad() {
        let mut tris = thin_quad();
        let report = DelaunayImprover::default().improve(&mut tris);
        assert_eq!(report.flips, 1);
        assert_eq!(report.passes, 2);
        assert!(!report.cancelled);

        let p1 = node(1.0, -0.2);
        let p3 = node(1.0, 0.2);
        for tri in &tris {
            assert!(tri.has_vertex(&p1, 1e-9));
            assert!(tri.has_vertex(&p3, 1e-9));
            assert!(tri.normal().z > 0.99);
        }
    }

    #[test]
    fn second_run_is_idempotent() {
        let mut tris = thin_quad();
        let _ = DelaunayImprover::default().improve(&mut tris);
        let before = tris.clone();
        let report = DelaunayImprover::default().improve(&mut tris);
        assert_eq!(report.flips, 0);
        assert_eq!(report.passes, 1);
        assert_eq!(tris, before);
    }

    #[test]
    fn square_diagonal_is_left_alone() {
        let (a, b, c, d) = (node(0.0, 0.0), node(1.0, 0.0), node(1.0, 1.0), node(0.0, 1.0));
        let mut tris = vec![Triangle::new(a, b, c), Triangle::new(c, d, a)];
        let report = DelaunayImprover::default().improve(&mut tris);
        assert_eq!(report.flips, 0);
    }

    #[test]
    fn cancelled_token_stops_before_first_pass() {
        let token = CancelToken::new();
        token.cancel();
        let mut tris = thin_quad();
        let report = DelaunayImprover::default()
            .with_cancel(&token)
            .improve(&mut tris);
        assert!(report.cancelled);
        assert_eq!(report.passes, 0);
        assert_eq!(tris, thin_quad());
    }

    #[test]
    fn publishes_one_snapshot_per_pass() {
        let mut observer = CollectingObserver::default();
        let mut tris = thin_quad();
        let report = DelaunayImprover::default()
            .with_observer(&mut observer)
            .improve(&mut tris);
        assert_eq!(observer.frames.len(), report.passes);
        assert!(
            observer
                .frames
                .iter()
                .all(|f| f.0 == SnapshotPhase::Delaunay && f.2 == 0 && f.3 == 2)
        );
    }
}
