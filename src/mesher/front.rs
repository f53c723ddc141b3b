use crate::geom::{Point3, Tolerance};

use super::elements::{Node, Segment, Triangle};

/// Crossing searches ignore front segments whose midpoint is farther than
/// this multiple of the candidate length.
const INTERSECT_REACH: f64 = 3.0;

/// Adjacent segment found by [`Front::previous`] / [`Front::next`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adjacent {
    pub index: usize,
    /// Interior angle at the shared node, radians in `[0, 2π)`.
    pub angle: f64,
}

/// A front segment crossed by a candidate edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrontCrossing {
    pub index: usize,
    pub point: Point3,
}

/// The not-yet-meshed boundary: one or more closed cycles of segments.
///
/// Queries are linear scans. Adjacency is geometric (node coincidence within
/// [`Tolerance::NODE`]), so a node may be shared by several cycles that touch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Front {
    segments: Vec<Segment>,
}

impl Front {
    #[must_use]
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    /// Predecessor of segment `i` (ends where `i` starts) with the smallest
    /// interior angle.
    #[must_use]
    pub fn previous(&self, i: usize) -> Option<Adjacent> {
        let base = self.segments.get(i)?;
        let eps = Tolerance::NODE.eps;
        self.segments
            .iter()
            .enumerate()
            .filter(|(j, s)| *j != i && s.end.is_same(&base.start, eps))
            .map(|(j, s)| Adjacent {
                index: j,
                angle: base.angle_at_start(-s.unit_dir()),
            })
            .min_by(|a, b| a.angle.total_cmp(&b.angle))
    }

    /// Successor of segment `i` (starts where `i` ends) with the smallest
    /// interior angle.
    #[must_use]
    pub fn next(&self, i: usize) -> Option<Adjacent> {
        let base = self.segments.get(i)?;
        let eps = Tolerance::NODE.eps;
        self.segments
            .iter()
            .enumerate()
            .filter(|(j, s)| *j != i && s.start.is_same(&base.end, eps))
            .map(|(j, s)| Adjacent {
                index: j,
                angle: base.angle_at_end(s.unit_dir()),
            })
            .min_by(|a, b| a.angle.total_cmp(&b.angle))
    }

    pub fn insert_at(&mut self, index: usize, seg: Segment) {
        let index = index.min(self.segments.len());
        self.segments.insert(index, seg);
    }

    pub fn remove_at(&mut self, index: usize) -> Option<Segment> {
        (index < self.segments.len()).then(|| self.segments.remove(index))
    }

    /// Index of a segment geometrically equal to `seg`, either direction.
    #[must_use]
    pub fn is_segment(&self, seg: &Segment, eps: f64) -> Option<usize> {
        self.segments.iter().position(|s| s.is_same(seg, eps))
    }

    /// Removes every segment geometrically equal to `seg`; returns how many.
    pub fn remove_segments(&mut self, seg: &Segment) -> usize {
        let before = self.segments.len();
        self.segments
            .retain(|s| !s.is_same(seg, Tolerance::NODE.eps));
        before - self.segments.len()
    }

    /// Front nodes whose projection falls inside `tri`, its vertices excluded.
    #[must_use]
    pub fn nodes_in_triangle(&self, tri: &Triangle) -> Vec<Node> {
        if tri.is_null() {
            return Vec::new();
        }
        let eps = Tolerance::NODE.eps;
        let center = tri.centroid();
        let reach = 0.5 * tri.max_edge_length();
        self.segments
            .iter()
            .map(|s| s.start)
            .filter(|n| n.position.distance_to(center) <= reach)
            .filter(|n| !tri.has_vertex(n, eps))
            .filter(|n| tri.contains_projection(n.position, eps))
            .collect()
    }

    /// Front nodes strictly closer than `radius` to `center`.
    #[must_use]
    pub fn nodes_around_center(&self, center: Point3, radius: f64) -> Vec<Node> {
        self.segments
            .iter()
            .map(|s| s.start)
            .filter(|n| n.position.distance_to(center) < radius)
            .collect()
    }

    /// Front segments crossed by `candidate`, with the crossing points.
    #[must_use]
    pub fn intersect(&self, candidate: &Segment, tol: f64) -> Vec<FrontCrossing> {
        self.segments
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_same(candidate, Tolerance::NODE.eps))
            .filter_map(|(index, s)| {
                candidate
                    .projected_crossing(s, INTERSECT_REACH, tol)
                    .map(|point| FrontCrossing { index, point })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Vec3;

    fn node(x: f64, y: f64) -> Node {
        Node::new(Point3::new(x, y, 0.0), Vec3::Z)
    }

    fn polygon(points: &[(f64, f64)]) -> Front {
        let nodes: Vec<Node> = points.iter().map(|&(x, y)| node(x, y)).collect();
        let segments = (0..nodes.len())
            .map(|i| Segment::new(nodes[i], nodes[(i + 1) % nodes.len()]))
            .collect();
        Front::new(segments)
    }

    fn unit_square() -> Front {
        polygon(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)])
    }

    #[test]
    fn neighbours_of_square_side() {
        let front = unit_square();
        let prev = front.previous(0).unwrap();
        let next = front.next(0).unwrap();
        assert_eq!(prev.index, 3);
        assert_eq!(next.index, 1);
        assert!((prev.angle.to_degrees() - 90.0).abs() < 1e-9);
        assert!((next.angle.to_degrees() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn previous_prefers_smallest_angle_at_pinch() {
        // Two loops touching at the origin.
        let mut segments = unit_square().segments().to_vec();
        segments.extend(polygon(&[(0.0, 0.0), (-1.0, -1.0), (0.0, -1.0)]).segments().iter().copied());
        let front = Front::new(segments);
        let prev = front.previous(0).unwrap();
        // Candidates: (0,1)->(0,0) at 90° and (0,-1)->(0,0) at 270°.
        assert_eq!(prev.index, 3);
    }

    #[test]
    fn positional_mutation_keeps_order() {
        let mut front = unit_square();
        let removed = front.remove_at(1).unwrap();
        assert_eq!(front.len(), 3);
        front.insert_at(1, removed);
        assert_eq!(front, unit_square());
        assert!(front.remove_at(10).is_none());
    }

    #[test]
    fn is_segment_matches_either_direction() {
        let front = unit_square();
        let reversed = front.segments()[2].reversed();
        assert_eq!(front.is_segment(&reversed, 1e-6), Some(2));
        let diagonal = Segment::new(node(0.0, 0.0), node(1.0, 1.0));
        assert_eq!(front.is_segment(&diagonal, 1e-6), None);
    }

    #[test]
    fn remove_segments_by_geometry() {
        let mut front = unit_square();
        let target = front.segments()[0].reversed();
        assert_eq!(front.remove_segments(&target), 1);
        assert_eq!(front.len(), 3);
        assert_eq!(front.remove_segments(&target), 0);
    }

    #[test]
    fn spatial_queries_find_front_nodes() {
        let front = polygon(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.5, 0.5)]);
        let tri = Triangle::new(node(0.0, 0.0), node(2.0, 0.0), node(0.0, 2.0));
        let inside = front.nodes_in_triangle(&tri);
        assert_eq!(inside.len(), 1);
        assert_eq!(inside[0].position, Point3::new(0.5, 0.5, 0.0));

        let around = front.nodes_around_center(Point3::new(4.0, 3.5, 0.0), 1.0);
        assert_eq!(around.len(), 1);
        assert_eq!(around[0].position, Point3::new(4.0, 4.0, 0.0));
    }

    #[test]
    fn intersect_reports_crossed_segments() {
        let front = unit_square();
        let candidate = Segment::new(node(0.5, 0.5), node(1.5, 0.5));
        let hits = front.intersect(&candidate, 1e-6);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].index, 1);
        assert!((hits[0].point.x - 1.0).abs() < 1e-12);

        let inside = Segment::new(node(0.2, 0.2), node(0.8, 0.8));
        assert!(front.intersect(&inside, 1e-6).is_empty());
    }
}
