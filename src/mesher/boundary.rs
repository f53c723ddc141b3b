//! Boundary description and its discretization into the initial front.
//!
//! A [`Patch`] is a surface oracle plus closed loops of [`BoundaryCurve`]s,
//! all expressed in the surface's parameter space. The
//! [`BoundaryDiscretizer`] turns the loops into closed 3D segment cycles:
//! curves are split, split parameters are evaluated, short segments are
//! folded and every loop is oriented so that the meshed region lies on the
//! left of each segment.

use std::fmt;
use std::sync::Arc;

use crate::geom::{SurfaceOracle, Tolerance, UvBounds, UvPoint, Vec3};

use super::distribution::EdgeSplit;
use super::elements::{Node, Segment};
use super::error::{MeshError, MeshResult};
use super::front::Front;
use super::settings::MeshSettings;

/// Upper bound on boundary nodes per patch.
pub const MAX_BOUNDARY_NODES: usize = 3000;
/// Fraction of the patch parameter extent a node moves inward when its
/// normal is undefined.
pub const NORMAL_NUDGE_FRACTION: f64 = 0.05;
const ARC_LENGTH_BISECTION_STEPS: usize = 20;

// ─────────────────────────────────────────────────────────────────────────────
// Curves and loops
// ─────────────────────────────────────────────────────────────────────────────

/// Polyline in parameter space, parameterized over `[0, 1]` with one equal
/// share per span.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryCurve {
    vertices: Vec<UvPoint>,
    split: Option<Vec<f64>>,
}

impl BoundaryCurve {
    #[must_use]
    pub fn line(start: UvPoint, end: UvPoint) -> Self {
        Self {
            vertices: vec![start, end],
            split: None,
        }
    }

    pub fn polyline(vertices: Vec<UvPoint>) -> MeshResult<Self> {
        if vertices.len() < 2 {
            return Err(MeshError::MalformedBoundary(format!(
                "a curve needs at least 2 vertices, got {}",
                vertices.len()
            )));
        }
        if let Some(bad) = vertices.iter().find(|p| !p.is_finite()) {
            return Err(MeshError::MalformedBoundary(format!(
                "non-finite curve vertex ({}, {})",
                bad.u, bad.v
            )));
        }
        Ok(Self {
            vertices,
            split: None,
        })
    }

    /// Explicit split parameters in `[0, 1]`, strictly ascending. The curve
    /// ends are added when missing.
    pub fn with_split(mut self, params: Vec<f64>) -> MeshResult<Self> {
        if params.iter().any(|t| !(0.0..=1.0).contains(t)) {
            return Err(MeshError::MalformedBoundary(
                "split parameters must lie in [0, 1]".to_string(),
            ));
        }
        if params.windows(2).any(|w| w[1] <= w[0]) {
            return Err(MeshError::MalformedBoundary(
                "split parameters must be strictly ascending".to_string(),
            ));
        }
        let mut params = params;
        if params.first().is_none_or(|&t| t > 0.0) {
            params.insert(0, 0.0);
        }
        if params.last().is_none_or(|&t| t < 1.0) {
            params.push(1.0);
        }
        self.split = Some(params);
        Ok(self)
    }

    /// Split list placing `split.segments` segments along the surface arc
    /// length according to `split.distribution`.
    #[must_use]
    pub fn with_edge_split(mut self, split: &EdgeSplit, oracle: &dyn SurfaceOracle) -> Self {
        let total = self.arc_length(oracle);
        let params = split
            .fractions()
            .into_iter()
            .map(|f| {
                if f <= 0.0 {
                    0.0
                } else if f >= 1.0 {
                    1.0
                } else {
                    self.param_at_length(oracle, f * total)
                }
            })
            .collect();
        self.split = Some(params);
        self
    }

    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            vertices: self.vertices.iter().rev().copied().collect(),
            split: self
                .split
                .as_ref()
                .map(|s| s.iter().rev().map(|t| 1.0 - t).collect()),
        }
    }

    #[must_use]
    pub fn vertices(&self) -> &[UvPoint] {
        &self.vertices
    }

    #[must_use]
    pub fn split(&self) -> Option<&[f64]> {
        self.split.as_deref()
    }

    #[must_use]
    pub fn start(&self) -> UvPoint {
        self.vertices[0]
    }

    #[must_use]
    pub fn end(&self) -> UvPoint {
        self.vertices[self.vertices.len() - 1]
    }

    fn span_count(&self) -> usize {
        self.vertices.len() - 1
    }

    #[must_use]
    pub fn uv_at(&self, t: f64) -> UvPoint {
        let spans = self.span_count();
        let pos = t.clamp(0.0, 1.0) * spans as f64;
        let i = (pos.floor() as usize).min(spans - 1);
        self.vertices[i].lerp(self.vertices[i + 1], pos - i as f64)
    }

    /// Surface length of the whole curve.
    pub fn arc_length(&self, oracle: &dyn SurfaceOracle) -> f64 {
        self.vertices
            .windows(2)
            .map(|w| oracle.arc_length(w[0], w[1]))
            .sum()
    }

    fn length_to(&self, oracle: &dyn SurfaceOracle, t: f64) -> f64 {
        let spans = self.span_count();
        let pos = t.clamp(0.0, 1.0) * spans as f64;
        let i = (pos.floor() as usize).min(spans - 1);
        let full: f64 = self.vertices[..=i]
            .windows(2)
            .map(|w| oracle.arc_length(w[0], w[1]))
            .sum();
        full + oracle.arc_length(self.vertices[i], self.uv_at(t))
    }

    fn param_at_length(&self, oracle: &dyn SurfaceOracle, target: f64) -> f64 {
        let (mut lo, mut hi) = (0.0, 1.0);
        for _ in 0..ARC_LENGTH_BISECTION_STEPS {
            let mid = 0.5 * (lo + hi);
            if self.length_to(oracle, mid) < target {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        0.5 * (lo + hi)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    Outer,
    /// A hole.
    Inner,
}

/// Closed chain of curves; each curve starts where the previous one ends and
/// the last one returns to the first curve's start.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryLoop {
    pub curves: Vec<BoundaryCurve>,
    pub kind: LoopKind,
    /// Inner loops are split only at their curve vertices unless set.
    pub splittable: bool,
}

impl BoundaryLoop {
    #[must_use]
    pub fn outer(curves: Vec<BoundaryCurve>) -> Self {
        Self {
            curves,
            kind: LoopKind::Outer,
            splittable: true,
        }
    }

    #[must_use]
    pub fn inner(curves: Vec<BoundaryCurve>) -> Self {
        Self {
            curves,
            kind: LoopKind::Inner,
            splittable: false,
        }
    }

    /// One straight curve per polygon side.
    pub fn polygon(kind: LoopKind, points: &[UvPoint]) -> MeshResult<Self> {
        if points.len() < 3 {
            return Err(MeshError::MalformedBoundary(format!(
                "a polygon loop needs at least 3 points, got {}",
                points.len()
            )));
        }
        let curves = (0..points.len())
            .map(|i| BoundaryCurve::polyline(vec![points[i], points[(i + 1) % points.len()]]))
            .collect::<MeshResult<Vec<_>>>()?;
        Ok(match kind {
            LoopKind::Outer => Self::outer(curves),
            LoopKind::Inner => Self::inner(curves),
        })
    }

    #[must_use]
    pub fn splittable(mut self, splittable: bool) -> Self {
        self.splittable = splittable;
        self
    }

    /// Outer loop around a parameter rectangle, one [`EdgeSplit`] per side in
    /// the order bottom, right, top, left.
    #[must_use]
    pub fn four_sided(bounds: UvBounds, splits: [EdgeSplit; 4], oracle: &dyn SurfaceOracle) -> Self {
        let corners = [
            bounds.min,
            UvPoint::new(bounds.max.u, bounds.min.v),
            bounds.max,
            UvPoint::new(bounds.min.u, bounds.max.v),
        ];
        let curves = (0..4)
            .map(|i| BoundaryCurve::line(corners[i], corners[(i + 1) % 4]).with_edge_split(&splits[i], oracle))
            .collect();
        Self::outer(curves)
    }

    #[must_use]
    pub fn is_outer(&self) -> bool {
        self.kind == LoopKind::Outer
    }
}

/// One surface region to mesh.
#[derive(Clone)]
pub struct Patch {
    pub name: String,
    pub oracle: Arc<dyn SurfaceOracle + Send + Sync>,
    pub loops: Vec<BoundaryLoop>,
    /// Emit triangles facing against the surface normal.
    pub reversed: bool,
}

impl Patch {
    #[must_use]
    pub fn new(name: impl Into<String>, oracle: Arc<dyn SurfaceOracle + Send + Sync>) -> Self {
        Self {
            name: name.into(),
            oracle,
            loops: Vec::new(),
            reversed: false,
        }
    }

    #[must_use]
    pub fn with_loop(mut self, boundary: BoundaryLoop) -> Self {
        self.loops.push(boundary);
        self
    }

    #[must_use]
    pub fn with_reversed(mut self, reversed: bool) -> Self {
        self.reversed = reversed;
        self
    }
}

impl fmt::Debug for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Patch")
            .field("name", &self.name)
            .field("loops", &self.loops)
            .field("reversed", &self.reversed)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Discretization
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscretizedBoundary {
    pub front: Front,
    /// Segments per loop, in patch loop order.
    pub loop_sizes: Vec<usize>,
    pub node_count: usize,
    pub folded: usize,
    pub nudged: usize,
    pub orientation_flips: usize,
    pub warnings: Vec<String>,
}

pub struct BoundaryDiscretizer<'a> {
    settings: &'a MeshSettings,
}

impl<'a> BoundaryDiscretizer<'a> {
    #[must_use]
    pub fn new(settings: &'a MeshSettings) -> Self {
        Self { settings }
    }

    pub fn discretize(&self, patch: &Patch) -> MeshResult<DiscretizedBoundary> {
        if !patch.loops.iter().any(BoundaryLoop::is_outer) {
            return Err(MeshError::MalformedBoundary(format!(
                "patch '{}' has no outer loop",
                patch.name
            )));
        }
        let oracle = patch.oracle.as_ref();

        let mut loop_params = Vec::with_capacity(patch.loops.len());
        let mut total = 0usize;
        for boundary in &patch.loops {
            let params = self.loop_params(oracle, boundary, total)?;
            total += params.len();
            loop_params.push(params);
        }
        let Some(bounds) = UvBounds::from_points(loop_params.iter().flatten().copied()) else {
            return Err(MeshError::MalformedBoundary(format!(
                "patch '{}' has empty loops",
                patch.name
            )));
        };

        let mut out = DiscretizedBoundary::default();
        let min_length = self.settings.merge_distance.max(Tolerance::ZERO_LENGTH.eps);
        let mut segments = Vec::with_capacity(total);

        for (index, (boundary, params)) in patch.loops.iter().zip(&loop_params).enumerate() {
            let nodes = evaluate_loop(oracle, params, bounds, &mut out)?;
            let (mut nodes, folded) = fold_short_segments(nodes, min_length);
            out.folded += folded;
            if nodes.len() < 3 {
                return Err(MeshError::MalformedBoundary(format!(
                    "loop {index} of patch '{}' collapses to {} segments",
                    patch.name,
                    nodes.len()
                )));
            }

            let area = signed_area(&nodes);
            let wants_positive = boundary.kind == LoopKind::Outer;
            if area != 0.0 && (area > 0.0) != wants_positive {
                nodes.reverse();
                out.orientation_flips += 1;
                log::debug!("patch '{}': loop {index} reversed", patch.name);
            }

            let count = nodes.len();
            segments.extend((0..count).map(|i| Segment::new(nodes[i], nodes[(i + 1) % count])));
            out.loop_sizes.push(count);
            out.node_count += count;
        }

        out.front = Front::new(segments);
        log::debug!(
            "patch '{}': {} boundary nodes in {} loops ({} folded, {} nudged)",
            patch.name,
            out.node_count,
            out.loop_sizes.len(),
            out.folded,
            out.nudged
        );
        Ok(out)
    }

    /// Split parameters of a loop, the closing point excluded.
    fn loop_params(
        &self,
        oracle: &dyn SurfaceOracle,
        boundary: &BoundaryLoop,
        already: usize,
    ) -> MeshResult<Vec<UvPoint>> {
        let subdivide = boundary.is_outer() || boundary.splittable;
        let mut params = Vec::new();
        for curve in &boundary.curves {
            if let Some(split) = curve.split() {
                check_node_budget(already + params.len() + split.len())?;
                params.extend(split[..split.len() - 1].iter().map(|&t| curve.uv_at(t)));
                continue;
            }
            for span in curve.vertices().windows(2) {
                let (a, b) = (span[0], span[1]);
                let length = oracle.arc_length(a, b);
                let count = if subdivide { self.uniform_count(length) } else { 1 };
                check_node_budget(already + params.len() + count)?;
                params.push(a);
                for k in 1..count {
                    let target = length * k as f64 / count as f64;
                    params.push(a.lerp(b, span_param_at_length(oracle, a, b, target)));
                }
            }
        }
        Ok(params)
    }

    /// `max(1, round(length / max_edge_length))`, saturated above the node
    /// budget.
    fn uniform_count(&self, length: f64) -> usize {
        let n = (length / self.settings.max_edge_length).round();
        if !n.is_finite() || n < 1.0 {
            1
        } else if n > MAX_BOUNDARY_NODES as f64 {
            MAX_BOUNDARY_NODES + 1
        } else {
            n as usize
        }
    }
}

fn check_node_budget(count: usize) -> MeshResult<()> {
    if count > MAX_BOUNDARY_NODES {
        return Err(MeshError::MalformedBoundary(format!(
            "more than {MAX_BOUNDARY_NODES} boundary nodes"
        )));
    }
    Ok(())
}

fn span_param_at_length(oracle: &dyn SurfaceOracle, a: UvPoint, b: UvPoint, target: f64) -> f64 {
    let (mut lo, mut hi) = (0.0, 1.0);
    for _ in 0..ARC_LENGTH_BISECTION_STEPS {
        let mid = 0.5 * (lo + hi);
        if oracle.arc_length(a, a.lerp(b, mid)) < target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Evaluates every parameter. Undefined normals are read at a parameter
/// nudged into the patch; any still missing are copied from the nearest
/// preceding node.
fn evaluate_loop(
    oracle: &dyn SurfaceOracle,
    params: &[UvPoint],
    bounds: UvBounds,
    out: &mut DiscretizedBoundary,
) -> MeshResult<Vec<Node>> {
    let mut samples = Vec::with_capacity(params.len());
    for &uv in params {
        let sample = oracle
            .evaluate(uv)
            .ok_or(MeshError::OracleEvaluationFailure { u: uv.u, v: uv.v })?;
        let mut normal = sample.normal;
        if normal.is_none() {
            let nudged = bounds.clamp_inside(uv, NORMAL_NUDGE_FRACTION);
            normal = oracle.evaluate(nudged).and_then(|s| s.normal);
            out.nudged += 1;
            out.warnings.push(format!(
                "undefined normal at ({:.6}, {:.6}), read at ({:.6}, {:.6})",
                uv.u, uv.v, nudged.u, nudged.v
            ));
        }
        samples.push((sample.position, normal, uv));
    }

    let Some(first_known) = samples.iter().position(|s| s.1.is_some()) else {
        return Err(MeshError::MalformedBoundary(
            "no surface normal defined along loop".to_string(),
        ));
    };
    let count = samples.len();
    let mut last = Vec3::ZERO;
    for k in 0..count {
        let slot = &mut samples[(first_known + k) % count].1;
        if let Some(normal) = *slot {
            last = normal;
        } else {
            *slot = Some(last);
        }
    }

    Ok(samples
        .into_iter()
        .map(|(position, normal, uv)| {
            Node::new(position, normal.unwrap_or(last)).with_uv(Some(uv))
        })
        .collect())
}

/// Drops nodes closer than `min_length` to the last kept one, seam included.
fn fold_short_segments(nodes: Vec<Node>, min_length: f64) -> (Vec<Node>, usize) {
    let mut kept: Vec<Node> = Vec::with_capacity(nodes.len());
    let mut folded = 0;
    for node in nodes {
        match kept.last() {
            Some(last) if last.distance_to(&node) < min_length => folded += 1,
            _ => kept.push(node),
        }
    }
    while kept.len() > 1 && kept[kept.len() - 1].distance_to(&kept[0]) < min_length {
        kept.pop();
        folded += 1;
    }
    (kept, folded)
}

/// Loop area about the average node normal; positive when counter-clockwise.
fn signed_area(nodes: &[Node]) -> f64 {
    let Some(normal) = nodes
        .iter()
        .fold(Vec3::ZERO, |acc, n| acc + n.normal)
        .normalized()
    else {
        return 0.0;
    };
    let origin = nodes[0].position;
    let mut sum = Vec3::ZERO;
    for i in 0..nodes.len() {
        let a = nodes[i].position - origin;
        let b = nodes[(i + 1) % nodes.len()].position - origin;
        sum = sum + a.cross(b);
    }
    0.5 * sum.dot(normal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::PlaneOracle;
    use crate::mesher::distribution::Distribution;

    fn uv(u: f64, v: f64) -> UvPoint {
        UvPoint::new(u, v)
    }

    fn plane_patch(boundary: BoundaryLoop) -> Patch {
        Patch::new("plane", Arc::new(PlaneOracle::xy())).with_loop(boundary)
    }

    #[test]
    fn curve_reversal_mirrors_split() {
        let curve = BoundaryCurve::line(uv(0.0, 0.0), uv(1.0, 0.0))
            .with_split(vec![0.25, 0.5])
            .unwrap();
        assert_eq!(curve.split(), Some(&[0.0, 0.25, 0.5, 1.0][..]));
        let back = curve.reversed();
        assert_eq!(back.start(), uv(1.0, 0.0));
        assert_eq!(back.split(), Some(&[0.0, 0.5, 0.75, 1.0][..]));
    }

    #[test]
    fn rejects_unordered_split() {
        let curve = BoundaryCurve::line(uv(0.0, 0.0), uv(1.0, 0.0));
        assert!(curve.clone().with_split(vec![0.5, 0.25]).is_err());
        assert!(curve.with_split(vec![1.5]).is_err());
    }

    #[test]
    fn polyline_parameter_spans_are_equal() {
        let curve = BoundaryCurve::polyline(vec![uv(0.0, 0.0), uv(1.0, 0.0), uv(1.0, 3.0)]).unwrap();
        assert_eq!(curve.uv_at(0.5), uv(1.0, 0.0));
        assert_eq!(curve.uv_at(0.75), uv(1.0, 1.5));
        let oracle = PlaneOracle::xy();
        assert!((curve.arc_length(&oracle) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn edge_split_follows_distribution() {
        let oracle = PlaneOracle::xy();
        let curve = BoundaryCurve::line(uv(0.0, 0.0), uv(2.0, 0.0))
            .with_edge_split(&EdgeSplit::new(4, Distribution::Cosine), &oracle);
        let split = curve.split().unwrap();
        assert_eq!(split.len(), 5);
        for (i, t) in split.iter().enumerate() {
            let expected = Distribution::Cosine.fraction(i as f64 / 4.0);
            assert!((t - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn fold_removes_short_segments_and_seam() {
        let n = |x: f64| Node::new(crate::geom::Point3::new(x, 0.0, 0.0), Vec3::Z);
        let (kept, folded) = fold_short_segments(vec![n(0.0), n(1.0), n(1.0 + 1e-6), n(2.0), n(1e-7)], 1e-4);
        assert_eq!(kept.len(), 3);
        assert_eq!(folded, 2);
    }

    #[test]
    fn square_is_split_uniformly() {
        let settings = MeshSettings::default();
        let boundary = BoundaryLoop::polygon(
            LoopKind::Outer,
            &[uv(0.0, 0.0), uv(1.0, 0.0), uv(1.0, 1.0), uv(0.0, 1.0)],
        )
        .unwrap();
        let out = BoundaryDiscretizer::new(&settings)
            .discretize(&plane_patch(boundary))
            .unwrap();
        assert_eq!(out.node_count, 16);
        assert_eq!(out.loop_sizes, vec![16]);
        assert!(out.front.iter().all(|s| (s.length() - 0.25).abs() < 1e-5));
        assert_eq!(out.orientation_flips, 0);
    }

    #[test]
    fn patch_without_outer_loop_is_rejected() {
        let settings = MeshSettings::default();
        let hole = BoundaryLoop::polygon(LoopKind::Inner, &[uv(0.0, 0.0), uv(1.0, 0.0), uv(0.0, 1.0)]).unwrap();
        let err = BoundaryDiscretizer::new(&settings)
            .discretize(&plane_patch(hole))
            .unwrap_err();
        assert!(matches!(err, MeshError::MalformedBoundary(_)));
    }
}
