//! Nodes, segments and triangles.
//!
//! All three are plain `Copy` values. A node moves between the front and the
//! triangle list by copy, so no container ever aliases another's state.

use crate::geom::{Point3, Tolerance, UvPoint, Vec3};

// ─────────────────────────────────────────────────────────────────────────────
// Node
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub position: Point3,
    /// Unit surface normal.
    pub normal: Vec3,
    pub uv: Option<UvPoint>,
}

impl Node {
    #[must_use]
    pub const fn new(position: Point3, normal: Vec3) -> Self {
        Self {
            position,
            normal,
            uv: None,
        }
    }

    #[must_use]
    pub const fn with_uv(mut self, uv: Option<UvPoint>) -> Self {
        self.uv = uv;
        self
    }

    #[must_use]
    pub fn is_same(&self, other: &Self, eps: f64) -> bool {
        self.position.coincides(other.position, eps)
    }

    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        self.position.distance_to(other.position)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Segment
// ─────────────────────────────────────────────────────────────────────────────

/// Oriented pair of nodes. On the front the meshed side is on the left when
/// looking along the segment from above its average normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: Node,
    pub end: Node,
}

impl Segment {
    #[must_use]
    pub const fn new(start: Node, end: Node) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn length(&self) -> f64 {
        self.start.distance_to(&self.end)
    }

    #[must_use]
    pub fn vector(&self) -> Vec3 {
        self.end.position - self.start.position
    }

    /// Unit direction; zero for a degenerate segment.
    #[must_use]
    pub fn unit_dir(&self) -> Vec3 {
        self.vector().normalized().unwrap_or(Vec3::ZERO)
    }

    #[must_use]
    pub fn mid_point(&self) -> Point3 {
        self.start.position.midpoint(self.end.position)
    }

    #[must_use]
    pub fn average_normal(&self) -> Vec3 {
        (self.start.normal + self.end.normal)
            .normalized()
            .unwrap_or(self.start.normal)
    }

    #[must_use]
    pub const fn reversed(&self) -> Self {
        Self::new(self.end, self.start)
    }

    /// Geometric equality, endpoint order ignored.
    #[must_use]
    pub fn is_same(&self, other: &Self, eps: f64) -> bool {
        (self.start.is_same(&other.start, eps) && self.end.is_same(&other.end, eps))
            || (self.start.is_same(&other.end, eps) && self.end.is_same(&other.start, eps))
    }

    /// `true` when the segments have an endpoint in common.
    #[must_use]
    pub fn shares_node(&self, other: &Self, eps: f64) -> bool {
        self.start.is_same(&other.start, eps)
            || self.start.is_same(&other.end, eps)
            || self.end.is_same(&other.start, eps)
            || self.end.is_same(&other.end, eps)
    }

    /// Angle in `[0, 2π)` from this segment's direction to `dir`, measured
    /// counter-clockwise about the start node's normal.
    #[must_use]
    pub fn angle_at_start(&self, dir: Vec3) -> f64 {
        if self.start.normal == Vec3::ZERO {
            return 0.0;
        }
        self.unit_dir().oriented_angle_to(dir, self.start.normal)
    }

    /// Angle in `[0, 2π)` at the end node between the reversed segment and
    /// `dir`, measured clockwise about the end node's normal.
    #[must_use]
    pub fn angle_at_end(&self, dir: Vec3) -> f64 {
        if self.end.normal == Vec3::ZERO {
            return 0.0;
        }
        let back = -self.unit_dir();
        let ccw = back.oriented_angle_to(dir, self.end.normal);
        if ccw <= 0.0 {
            0.0
        } else {
            std::f64::consts::TAU - ccw
        }
    }

    /// Point where `other` crosses this segment, tested in this segment's
    /// local frame with `other`'s elevation along the average normal removed.
    ///
    /// Segments sharing an endpoint never cross. `reach` bounds the midpoint
    /// distance as a multiple of this segment's length; `precision` trims the
    /// ends of both segments so touching endpoints do not count.
    #[must_use]
    pub fn projected_crossing(&self, other: &Self, reach: f64, precision: f64) -> Option<Point3> {
        if self.shares_node(other, Tolerance::NODE.eps) {
            return None;
        }
        let length = self.length();
        if length <= Tolerance::ZERO_LENGTH.eps {
            return None;
        }
        let center = self.mid_point();
        if other.mid_point().distance_to(center) > reach * length {
            return None;
        }

        let k = self.average_normal();
        let i = self.unit_dir();
        let j = k.cross(i).normalized()?;

        let elevation = k.mul_scalar((other.mid_point() - center).dot(k));
        let a = other.start.position - center - elevation;
        let b = other.end.position - center - elevation;
        let (ax, ay) = (a.dot(i), a.dot(j));
        let (bx, by) = (b.dot(i), b.dot(j));

        let dy = by - ay;
        if dy.abs() <= Tolerance::ZERO_LENGTH.eps {
            return None;
        }
        let s = -ay / dy;
        let other_len = (bx - ax).hypot(dy);
        let s_margin = if other_len > 0.0 { precision / other_len } else { 1.0 };
        if s <= s_margin || s >= 1.0 - s_margin {
            return None;
        }
        let x = ax + s * (bx - ax);
        let half = 0.5 * length;
        if x <= -half + precision || x >= half - precision {
            return None;
        }
        Some(center.add_vec(self.vector().mul_scalar(x / length)))
    }

    /// Crossing test used to veto node substitution next to the base segment.
    #[must_use]
    pub fn intersects_projected(&self, other: &Self) -> bool {
        self.projected_crossing(other, 2.0, Tolerance::NODE.eps).is_some()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Triangle
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    vertices: [Node; 3],
    normal: Vec3,
    null: bool,
}

impl Triangle {
    /// Builds the triangle and caches its right-hand normal. Zero-area input
    /// yields a null triangle.
    #[must_use]
    pub fn new(a: Node, b: Node, c: Node) -> Self {
        let mut tri = Self {
            vertices: [a, b, c],
            normal: Vec3::ZERO,
            null: true,
        };
        tri.refresh();
        tri
    }

    fn refresh(&mut self) {
        let [a, b, c] = self.vertices;
        let cross = (b.position - a.position).cross(c.position - a.position);
        let scale = self.max_edge_length().powi(2);
        match cross.normalized() {
            Some(n) if cross.length() > Tolerance::ZERO_LENGTH.eps * scale.max(f64::MIN_POSITIVE) => {
                self.normal = n;
                self.null = false;
            }
            _ => {
                self.normal = Vec3::ZERO;
                self.null = true;
            }
        }
    }

    #[must_use]
    pub const fn vertices(&self) -> &[Node; 3] {
        &self.vertices
    }

    #[must_use]
    pub const fn vertex(&self, i: usize) -> Node {
        self.vertices[i % 3]
    }

    #[must_use]
    pub const fn normal(&self) -> Vec3 {
        self.normal
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.null
    }

    pub fn set_vertices(&mut self, a: Node, b: Node, c: Node) {
        self.vertices = [a, b, c];
        self.refresh();
    }

    /// Edge opposite vertex `i`.
    #[must_use]
    pub const fn edge(&self, i: usize) -> Segment {
        Segment::new(self.vertices[(i + 1) % 3], self.vertices[(i + 2) % 3])
    }

    /// Index of the vertex opposite the edge matching `seg`.
    #[must_use]
    pub fn edge_index(&self, seg: &Segment, eps: f64) -> Option<usize> {
        (0..3).find(|&i| self.edge(i).is_same(seg, eps))
    }

    /// Interior angle at vertex `i`, in degrees.
    #[must_use]
    pub fn angle_deg(&self, i: usize) -> f64 {
        let p = self.vertex(i).position;
        let a = self.vertex(i + 1).position - p;
        let b = self.vertex(i + 2).position - p;
        a.angle_to(b).to_degrees()
    }

    #[must_use]
    pub fn area(&self) -> f64 {
        let [a, b, c] = self.vertices;
        0.5 * (b.position - a.position).cross(c.position - a.position).length()
    }

    #[must_use]
    pub fn centroid(&self) -> Point3 {
        let [a, b, c] = self.vertices;
        let sum = a.position.to_vec3() + b.position.to_vec3() + c.position.to_vec3();
        Point3::ORIGIN.add_vec(sum.mul_scalar(1.0 / 3.0))
    }

    #[must_use]
    pub fn max_edge_length(&self) -> f64 {
        (0..3)
            .map(|i| self.edge(i).length())
            .fold(0.0_f64, f64::max)
    }

    #[must_use]
    pub fn has_vertex(&self, node: &Node, eps: f64) -> bool {
        self.vertices.iter().any(|v| v.is_same(node, eps))
    }

    /// `true` when the projection of `p` on the triangle plane lies inside
    /// the triangle or within `eps` of its border.
    #[must_use]
    pub fn contains_projection(&self, p: Point3, eps: f64) -> bool {
        if self.null {
            return false;
        }
        (0..3).all(|i| {
            let a = self.vertex(i).position;
            let b = self.vertex(i + 1).position;
            let edge = b - a;
            let len = edge.length();
            if len <= 0.0 {
                return false;
            }
            edge.cross(p - a).dot(self.normal) / len >= -eps
        })
    }

    /// Swaps the winding and flips every normal.
    pub fn reverse_orientation(&mut self) {
        self.vertices.swap(1, 2);
        for v in &mut self.vertices {
            v.normal = -v.normal;
        }
        self.refresh();
    }

    /// Mirror image about the XZ plane, wound to keep the outward side.
    #[must_use]
    pub fn mirrored_xz(&self) -> Self {
        let mirror = |n: Node| Node {
            position: Point3::new(n.position.x, -n.position.y, n.position.z),
            normal: Vec3::new(n.normal.x, -n.normal.y, n.normal.z),
            uv: n.uv,
        };
        let [a, b, c] = self.vertices;
        Self::new(mirror(a), mirror(c), mirror(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(x: f64, y: f64) -> Node {
        Node::new(Point3::new(x, y, 0.0), Vec3::Z)
    }

    #[test]
    fn corner_angles_follow_interior_side() {
        let base = Segment::new(node(0.0, 0.0), node(1.0, 0.0));
        let prev = Segment::new(node(0.0, 1.0), node(0.0, 0.0));
        let next = Segment::new(node(1.0, 0.0), node(1.0, 1.0));

        let at_start = base.angle_at_start(-prev.unit_dir());
        let at_end = base.angle_at_end(next.unit_dir());
        assert!((at_start.to_degrees() - 90.0).abs() < 1e-9);
        assert!((at_end.to_degrees() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn segment_equality_ignores_direction() {
        let s = Segment::new(node(0.0, 0.0), node(1.0, 0.0));
        assert!(s.is_same(&s.reversed(), 1e-6));
        assert!(!s.is_same(&Segment::new(node(0.0, 0.0), node(1.0, 0.1)), 1e-6));
    }

    #[test]
    fn crossing_segments_are_detected() {
        let a = Segment::new(node(0.0, 0.0), node(2.0, 0.0));
        let b = Segment::new(node(1.0, -1.0), node(1.0, 1.0));
        let hit = a.projected_crossing(&b, 3.0, 1e-6).unwrap();
        assert!((hit.x - 1.0).abs() < 1e-12);
        assert!(hit.y.abs() < 1e-12);

        let touching = Segment::new(node(2.0, 0.0), node(3.0, 1.0));
        assert!(a.projected_crossing(&touching, 3.0, 1e-6).is_none());

        let short = Segment::new(node(1.0, 0.5), node(1.0, 1.0));
        assert!(a.projected_crossing(&short, 3.0, 1e-6).is_none());
    }

    #[test]
    fn triangle_normal_and_angles() {
        let tri = Triangle::new(node(0.0, 0.0), node(1.0, 0.0), node(0.0, 1.0));
        assert!(!tri.is_null());
        assert!((tri.normal().z - 1.0).abs() < 1e-12);
        assert!((tri.angle_deg(0) - 90.0).abs() < 1e-9);
        assert!((tri.area() - 0.5).abs() < 1e-12);
        assert_eq!(tri.edge_index(&Segment::new(node(0.0, 1.0), node(1.0, 0.0)), 1e-6), Some(0));
    }

    #[test]
    fn collinear_triangle_is_null() {
        let tri = Triangle::new(node(0.0, 0.0), node(1.0, 0.0), node(2.0, 0.0));
        assert!(tri.is_null());
        assert!(!tri.contains_projection(Point3::new(0.5, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn containment_uses_plane_projection() {
        let tri = Triangle::new(node(0.0, 0.0), node(2.0, 0.0), node(0.0, 2.0));
        assert!(tri.contains_projection(Point3::new(0.5, 0.5, 3.0), 1e-6));
        assert!(!tri.contains_projection(Point3::new(1.5, 1.5, 0.0), 1e-6));
    }

    #[test]
    fn mirror_keeps_outward_side() {
        let tri = Triangle::new(
            Node::new(Point3::new(0.0, 1.0, 0.0), Vec3::Y),
            Node::new(Point3::new(0.0, 1.0, 1.0), Vec3::Y),
            Node::new(Point3::new(1.0, 1.0, 0.0), Vec3::Y),
        );
        assert!(tri.normal().y > 0.99);
        let m = tri.mirrored_xz();
        assert!(m.normal().y < -0.99);
        assert!(m.vertices().iter().all(|v| v.normal.y < 0.0));
    }
}
