//! The advancing-front loop.
//!
//! Each iteration takes the segment under the cursor as base `B` and emits at
//! most one triangle on it:
//!
//! 1. closing shortcut when `B`, its predecessor and its successor already
//!    bound a triangle;
//! 2. reuse of the neighbour's far vertex at corners sharper than 60°;
//! 3. otherwise an equilateral apex projected onto the surface, shrunk on
//!    failed projections.
//!
//! The candidate apex is then corrected against nearby front nodes before the
//! front is updated. The loop ends when the front is empty or a halt
//! condition fires; a partial result is always returned.

use std::fmt;

use crate::geom::{SurfaceOracle, Tolerance};

use super::cancel::CancelToken;
use super::elements::{Node, Segment, Triangle};
use super::error::{MeshError, MeshResult};
use super::front::Front;
use super::observer::{MeshObserver, MeshSnapshot, SnapshotPhase};
use super::settings::MeshSettings;

/// Corners below this angle reuse the neighbour's far vertex.
const SHARP_ANGLE: f64 = std::f64::consts::FRAC_PI_3;
const SIN_60: f64 = 0.866_025_403_784_438_6;
/// Apex projection attempts before the patch fails.
pub const MAX_APEX_ATTEMPTS: usize = 10;
const APEX_SHRINK: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnconvergedReason {
    IterationCap,
    PanelCap,
    /// The apex projection ran out of retries.
    ProjectionFailure,
    /// Every remaining base segment produced a degenerate candidate.
    Stalled,
}

impl fmt::Display for UnconvergedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::IterationCap => "maximum number of iterations reached",
            Self::PanelCap => "maximum number of triangles reached",
            Self::ProjectionFailure => "apex projection failed",
            Self::Stalled => "no valid triangle could be built on the remaining front",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceState {
    Running,
    /// The front is empty.
    Converged,
    Unconverged(UnconvergedReason),
    Cancelled,
}

impl AdvanceState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self != Self::Running
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvanceStats {
    pub iterations: usize,
    pub closing: usize,
    pub sharp: usize,
    pub ideal: usize,
    pub apex_retries: usize,
    pub substitutions: usize,
    pub discarded: usize,
}

#[derive(Debug, Clone)]
pub struct AdvanceOutcome {
    pub state: AdvanceState,
    pub triangles: Vec<Triangle>,
    /// What is left of the front; empty when converged.
    pub front: Front,
    pub stats: AdvanceStats,
    /// Set when the loop stopped on a construction failure.
    pub error: Option<MeshError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Construction {
    Sharp,
    Ideal,
}

enum Step {
    Committed { cursor: usize },
    Discarded,
}

pub struct FrontAdvancer<'a> {
    settings: &'a MeshSettings,
    oracle: &'a dyn SurfaceOracle,
    cancel: Option<&'a CancelToken>,
    observer: Option<&'a mut dyn MeshObserver>,
    patch: usize,
}

impl<'a> FrontAdvancer<'a> {
    #[must_use]
    pub fn new(settings: &'a MeshSettings, oracle: &'a dyn SurfaceOracle) -> Self {
        Self {
            settings,
            oracle,
            cancel: None,
            observer: None,
            patch: 0,
        }
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

    /// Runs the loop to a terminal state, consuming `front`.
    pub fn run(mut self, mut front: Front) -> AdvanceOutcome {
        let mut triangles = Vec::new();
        let mut stats = AdvanceStats::default();
        let mut error = None;
        let mut cursor = 0usize;
        let mut stalled = 0usize;
        let mut state = AdvanceState::Running;

        while !state.is_terminal() {
            state = self.halt_state(&front, triangles.len(), stats.iterations, stalled);
            if state.is_terminal() {
                break;
            }

            stats.iterations += 1;
            cursor %= front.len();
            match self.step(&mut front, cursor, &mut triangles, &mut stats) {
                Ok(Step::Committed { cursor: next }) => {
                    cursor = next;
                    stalled = 0;
                }
                Ok(Step::Discarded) => {
                    cursor += 1;
                    stalled += 1;
                    stats.discarded += 1;
                }
                Err(err) => {
                    log::warn!("patch {}: {err}", self.patch);
                    error = Some(err);
                    state = AdvanceState::Unconverged(UnconvergedReason::ProjectionFailure);
                }
            }
            self.publish(stats.iterations, &front, &triangles);
        }

        match state {
            AdvanceState::Converged => log::debug!(
                "patch {}: converged with {} triangles in {} iterations",
                self.patch,
                triangles.len(),
                stats.iterations
            ),
            AdvanceState::Unconverged(reason) => log::warn!(
                "patch {}: unconverged ({reason}): made {} triangles in {} iterations, {} segments remain",
                self.patch,
                triangles.len(),
                stats.iterations,
                front.len()
            ),
            AdvanceState::Cancelled => log::info!(
                "patch {}: cancelled after {} iterations",
                self.patch,
                stats.iterations
            ),
            AdvanceState::Running => {}
        }

        AdvanceOutcome {
            state,
            triangles,
            front,
            stats,
            error,
        }
    }

    fn halt_state(&self, front: &Front, emitted: usize, iterations: usize, stalled: usize) -> AdvanceState {
        if front.is_empty() {
            return AdvanceState::Converged;
        }
        if self.cancel.is_some_and(CancelToken::is_cancelled) {
            return AdvanceState::Cancelled;
        }
        if self
            .settings
            .iteration_cap()
            .is_some_and(|cap| iterations >= cap)
        {
            return AdvanceState::Unconverged(UnconvergedReason::IterationCap);
        }
        if emitted >= self.settings.max_panel_count {
            return AdvanceState::Unconverged(UnconvergedReason::PanelCap);
        }
        if stalled > front.len() {
            return AdvanceState::Unconverged(UnconvergedReason::Stalled);
        }
        AdvanceState::Running
    }

    fn step(
        &self,
        front: &mut Front,
        i: usize,
        triangles: &mut Vec<Triangle>,
        stats: &mut AdvanceStats,
    ) -> MeshResult<Step> {
        let eps = Tolerance::NODE.eps;
        let Some(&base) = front.get(i) else {
            return Ok(Step::Discarded);
        };

        let prev = front.previous(i);
        let next = front.next(i);
        let prev_seg = prev.and_then(|p| front.get(p.index).copied());
        let next_seg = next.and_then(|n| front.get(n.index).copied());

        if let (Some(p), Some(n), Some(ps), Some(ns)) = (prev, next, prev_seg, next_seg) {
            let tri = Triangle::new(base.start, base.end, ns.end);
            // A three-segment hole winds against the surface and must not be closed.
            let closes = p.index != n.index && ps.start.is_same(&ns.end, eps);
            if closes && (tri.is_null() || faces_base(&tri, &base)) {
                front.remove_segments(&ns);
                front.remove_segments(&ps);
                front.remove_segments(&base);
                stats.closing += 1;
                if tri.is_null() {
                    stats.discarded += 1;
                } else {
                    triangles.push(tri);
                }
                return Ok(Step::Committed { cursor: i + 1 });
            }
        }

        let prev_angle = prev.map_or(f64::INFINITY, |p| p.angle);
        let next_angle = next.map_or(f64::INFINITY, |n| n.angle);
        let (candidate, construction) = match (prev_seg, next_seg) {
            (Some(ps), _) if prev_angle < SHARP_ANGLE && prev_angle < next_angle => (
                Triangle::new(base.start, base.end, ps.start),
                Construction::Sharp,
            ),
            (_, Some(ns)) if next_angle < SHARP_ANGLE => (
                Triangle::new(base.start, base.end, ns.end),
                Construction::Sharp,
            ),
            _ => (self.ideal_triangle(&base, stats)?, Construction::Ideal),
        };

        let tri = self.correct_locality(
            front,
            &base,
            candidate,
            construction,
            prev_seg.as_ref(),
            next_seg.as_ref(),
            stats,
        );

        if tri.is_null() || !faces_base(&tri, &base) {
            return Ok(Step::Discarded);
        }
        match construction {
            Construction::Sharp => stats.sharp += 1,
            Construction::Ideal => stats.ideal += 1,
        }

        front.remove_at(i);
        let mut cursor = i;
        let [a, b, apex] = *tri.vertices();
        for edge in [Segment::new(a, apex), Segment::new(apex, b)] {
            if let Some(existing) = front.is_segment(&edge, eps) {
                front.remove_at(existing);
                if existing < cursor {
                    cursor -= 1;
                }
            } else {
                front.insert_at(cursor, edge);
                cursor += 1;
            }
        }
        triangles.push(tri);
        Ok(Step::Committed { cursor })
    }

    /// Equilateral apex over `base`, projected onto the surface.
    fn ideal_triangle(&self, base: &Segment, stats: &mut AdvanceStats) -> MeshResult<Triangle> {
        let normal = base.average_normal();
        let inward = normal
            .cross(base.unit_dir())
            .normalized()
            .ok_or(MeshError::OracleProjectionFailure { attempts: 0 })?;
        let mid = base.mid_point();
        let mut height = (base.length() * SIN_60).min(self.settings.max_edge_length)
            * self.settings.growth_factor;

        for attempt in 0..MAX_APEX_ATTEMPTS {
            if attempt > 0 {
                stats.apex_retries += 1;
            }
            let target = mid.add_vec(inward.mul_scalar(height));
            if let Some(sample) = self.oracle.project(target, normal) {
                let apex = Node::new(sample.position, sample.normal.unwrap_or(normal))
                    .with_uv(sample.uv);
                return Ok(Triangle::new(base.start, base.end, apex));
            }
            height *= APEX_SHRINK;
        }
        Err(MeshError::OracleProjectionFailure {
            attempts: MAX_APEX_ATTEMPTS,
        })
    }

    /// Replaces the candidate apex by an existing front node when one lies
    /// inside the candidate, close to its apex, or behind an edge the
    /// candidate would cross. Interior coverage is re-checked once after a
    /// close-node substitution.
    #[allow(clippy::too_many_arguments)]
    fn correct_locality(
        &self,
        front: &Front,
        base: &Segment,
        candidate: Triangle,
        construction: Construction,
        prev: Option<&Segment>,
        next: Option<&Segment>,
        stats: &mut AdvanceStats,
    ) -> Triangle {
        let inside = front.nodes_in_triangle(&candidate);
        if let Some(node) = closest_inside_node(&inside, base) {
            stats.substitutions += 1;
            return Triangle::new(base.start, base.end, node);
        }

        let apex = candidate.vertex(2);
        let mut close = if construction == Construction::Ideal {
            let radius = self
                .settings
                .max_edge_length
                .min(base.length() * self.settings.search_radius_factor);
            front.nodes_around_center(apex.position, radius)
        } else {
            Vec::new()
        };
        let new_edges = [
            Segment::new(candidate.vertex(0), apex),
            Segment::new(apex, candidate.vertex(1)),
        ];
        for edge in &new_edges {
            for crossing in front.intersect(edge, self.settings.merge_distance) {
                if let Some(seg) = front.get(crossing.index) {
                    close.push(seg.start);
                    close.push(seg.end);
                }
            }
        }

        let Some(substitute) = best_close_node(&close, base, prev, next) else {
            return candidate;
        };
        stats.substitutions += 1;

        let inside = front.nodes_in_triangle(&substitute);
        match closest_inside_node(&inside, base) {
            Some(node) => Triangle::new(base.start, base.end, node),
            None => substitute,
        }
    }

    fn publish(&mut self, step: usize, front: &Front, triangles: &[Triangle]) {
        if let Some(observer) = self.observer.as_deref_mut() {
            observer.on_snapshot(&MeshSnapshot {
                patch: self.patch,
                phase: SnapshotPhase::Advancing,
                step,
                front: front.segments(),
                triangles,
            });
        }
    }
}

/// Interior node with the smallest distance sum to the base endpoints.
fn closest_inside_node(nodes: &[Node], base: &Segment) -> Option<Node> {
    let eps = Tolerance::NODE.eps;
    nodes
        .iter()
        .filter(|n| !n.is_same(&base.start, eps) && !n.is_same(&base.end, eps))
        .map(|n| (n.distance_to(&base.start) + n.distance_to(&base.end), *n))
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, n)| n)
}

/// `true` when `tri` is wound the same way as the surface under `base`.
fn faces_base(tri: &Triangle, base: &Segment) -> bool {
    tri.normal().dot(base.average_normal()) > 0.0
}

/// Closest admissible substitute: its connecting edges must not cross the
/// neighbouring segments and the triangle must face along the base normal.
fn best_close_node(
    nodes: &[Node],
    base: &Segment,
    prev: Option<&Segment>,
    next: Option<&Segment>,
) -> Option<Triangle> {
    let eps = Tolerance::NODE.eps;
    let mut best: Option<(f64, Triangle)> = None;

    for node in nodes {
        if node.is_same(&base.start, eps) || node.is_same(&base.end, eps) {
            continue;
        }
        let from_start = Segment::new(base.start, *node);
        let from_end = Segment::new(base.end, *node);
        if prev.is_some_and(|p| from_end.intersects_projected(p)) {
            continue;
        }
        if next.is_some_and(|n| from_start.intersects_projected(n)) {
            continue;
        }
        let tri = Triangle::new(base.start, base.end, *node);
        if tri.is_null() || !faces_base(&tri, base) {
            continue;
        }
        let dist = from_start.length() + from_end.length();
        if best.as_ref().is_none_or(|(d, _)| dist < *d) {
            best = Some((dist, tri));
        }
    }
    best.map(|(_, tri)| tri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{PlaneOracle, Point3, Vec3};

    fn polygon_front(points: &[(f64, f64)]) -> Front {
        let nodes: Vec<Node> = points
            .iter()
            .map(|&(x, y)| Node::new(Point3::new(x, y, 0.0), Vec3::Z))
            .collect();
        Front::new(
            (0..nodes.len())
                .map(|i| Segment::new(nodes[i], nodes[(i + 1) % nodes.len()]))
                .collect(),
        )
    }

    fn settings() -> MeshSettings {
        MeshSettings::default()
            .with_max_edge_length(f64::INFINITY)
            .with_delaunay(false)
    }

    #[test]
    fn triangle_front_closes_in_one_iteration() {
        let settings = settings();
        let oracle = PlaneOracle::xy();
        let front = polygon_front(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]);
        let outcome = FrontAdvancer::new(&settings, &oracle).run(front);
        assert_eq!(outcome.state, AdvanceState::Converged);
        assert_eq!(outcome.triangles.len(), 1);
        assert_eq!(outcome.stats.iterations, 1);
        assert_eq!(outcome.stats.closing, 1);
    }

    #[test]
    fn square_uses_one_substitution_then_closes() {
        let settings = settings().with_max_edge_length(2.0);
        let oracle = PlaneOracle::xy();
        let front = polygon_front(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        let outcome = FrontAdvancer::new(&settings, &oracle).run(front);
        assert_eq!(outcome.state, AdvanceState::Converged);
        assert_eq!(outcome.triangles.len(), 2);
        assert_eq!(outcome.stats.iterations, 2);
        assert_eq!(outcome.stats.substitutions, 1);
        assert_eq!(outcome.stats.closing, 1);
        assert!(outcome.front.is_empty());
    }

    #[test]
    fn clockwise_triangle_is_never_closed() {
        let settings = settings().with_max_panel_count(6);
        let oracle = PlaneOracle::xy();
        // A lone triangular hole: clockwise about +Z.
        let hole = [(0.0, 0.0), (0.5, 1.5), (1.0, 0.0)];
        let outcome = FrontAdvancer::new(&settings, &oracle).run(polygon_front(&hole));

        assert_ne!(outcome.state, AdvanceState::Converged);
        assert!(!outcome.triangles.is_empty());
        let center = Point3::new(0.5, 0.5, 0.0);
        for tri in &outcome.triangles {
            assert!(tri.normal().z > 0.0);
            assert!(!tri.contains_projection(center, 1e-9));
        }
    }

    #[test]
    fn zero_iteration_cap_returns_front_untouched() {
        let settings = settings().with_max_iterations(0);
        let oracle = PlaneOracle::xy();
        let front = polygon_front(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        let outcome = FrontAdvancer::new(&settings, &oracle).run(front.clone());
        assert_eq!(
            outcome.state,
            AdvanceState::Unconverged(UnconvergedReason::IterationCap)
        );
        assert!(outcome.triangles.is_empty());
        assert_eq!(outcome.front, front);
    }

    #[test]
    fn panel_cap_keeps_partial_triangles() {
        let settings = settings().with_max_panel_count(2);
        let oracle = PlaneOracle::xy();
        let points: Vec<(f64, f64)> = (0..12)
            .map(|k| {
                let a = std::f64::consts::TAU * f64::from(k) / 12.0;
                (a.cos(), a.sin())
            })
            .collect();
        let outcome = FrontAdvancer::new(&settings, &oracle).run(polygon_front(&points));
        assert_eq!(outcome.state, AdvanceState::Unconverged(UnconvergedReason::PanelCap));
        assert_eq!(outcome.triangles.len(), 2);
        assert!(!outcome.front.is_empty());
    }

    #[test]
    fn failed_projection_is_reported_as_unconverged() {
        let settings = settings();
        // Bounds exclude every interior apex of the square.
        let oracle = PlaneOracle::xy().with_bounds(crate::geom::UvBounds::new(
            crate::geom::UvPoint::new(5.0, 5.0),
            crate::geom::UvPoint::new(6.0, 6.0),
        ));
        let front = polygon_front(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        let outcome = FrontAdvancer::new(&settings, &oracle).run(front);
        assert_eq!(
            outcome.state,
            AdvanceState::Unconverged(UnconvergedReason::ProjectionFailure)
        );
        assert_eq!(
            outcome.error,
            Some(MeshError::OracleProjectionFailure {
                attempts: MAX_APEX_ATTEMPTS
            })
        );
        assert_eq!(outcome.stats.apex_retries, MAX_APEX_ATTEMPTS - 1);
        assert_eq!(outcome.front.len(), 4);
    }
}
