use std::sync::atomic::{AtomicU32, Ordering};

use glam::DVec3;

use crate::geometry::winding::Winding;

/// Determinant magnitude below which three planes are treated as having no
/// single common point.
pub const INTERSECT_EPSILON: f64 = 0.000_000_2;

static NEXT_PLANE_ID: AtomicU32 = AtomicU32::new(0);

/// Stable identity of a plane, assigned once at construction.
///
/// Two planes with identical coefficients coming from different brushes are
/// *different* planes; only the id decides equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaneId(pub u32);

impl PlaneId {
    fn next() -> Self {
        PlaneId(NEXT_PLANE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Classification of a point set relative to a plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneSide {
    Front,
    Back,
    On,
    Cross,
}

/// Oriented half-space: points with `dot(normal, p - point) <= 0` are inside.
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    pub id: PlaneId,
    pub point: DVec3,
    pub normal: DVec3,
}

impl PartialEq for Plane {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Plane {}

impl Plane {
    /// Build a plane through `point`; `normal` is normalized.
    pub fn new(point: DVec3, normal: DVec3) -> Self {
        Self {
            id: PlaneId::next(),
            point,
            normal: normal.normalize_or_zero(),
        }
    }

    /// Plane through three points, normal `(v1 - v0) x (v2 - v0)`.
    pub fn from_points(v0: DVec3, v1: DVec3, v2: DVec3) -> Self {
        Self::new(v0, (v1 - v0).cross(v2 - v0))
    }

    /// Plane through three map-file points, normal `(p2 - p0) x (p1 - p0)`.
    ///
    /// Map editors list side points clockwise when viewed from outside the
    /// brush, so this yields an outward facing normal.
    pub fn from_points_quake_style(points: [DVec3; 3]) -> Self {
        Self::new(points[0], (points[2] - points[0]).cross(points[1] - points[0]))
    }

    /// Plane from the implicit form `a*x + b*y + c*z + d = 0`.
    pub fn from_abcd(abcd: [f64; 4]) -> Self {
        let n = DVec3::new(abcd[0], abcd[1], abcd[2]);
        let len_sq = n.length_squared();
        let point = if len_sq > 0.0 { n * (-abcd[3] / len_sq) } else { DVec3::ZERO };
        Self::new(point, n)
    }

    /// Axis-aligned plane `x[axis] = dist` with a positive normal.
    pub fn axial(axis: usize, dist: f64) -> Self {
        let mut abcd = [0.0, 0.0, 0.0, -dist];
        abcd[axis] = 1.0;
        Self::from_abcd(abcd)
    }

    /// The same surface facing the other way. Gets a fresh id.
    pub fn reversed(&self) -> Self {
        Self {
            id: PlaneId::next(),
            point: self.point,
            normal: -self.normal,
        }
    }

    /// Plane constant: `dot(normal, point)`.
    pub fn dist(&self) -> f64 {
        self.normal.dot(self.point)
    }

    /// Signed distance of `p`; positive is outside (in front).
    pub fn point_distance(&self, p: DVec3) -> f64 {
        self.normal.dot(p - self.point)
    }

    /// Whether the normal lies along one of the coordinate axes.
    pub fn is_axial(&self) -> bool {
        self.normal
            .to_array()
            .iter()
            .any(|c| (c.abs() - 1.0).abs() < 1e-9)
    }

    /// Intersect a ray approaching from the front side.
    ///
    /// Returns `None` when the ray runs parallel to or away from the plane, or
    /// when the plane lies behind the origin. The hit is pulled back along the
    /// ray by `epsilon` (in ray-parameter units).
    pub fn ray_intersect(&self, origin: DVec3, dir: DVec3, epsilon: f64) -> Option<DVec3> {
        let t = self.ray_parameter(origin, dir)?;
        Some(origin + (t - epsilon) * dir)
    }

    /// Unclamped ray parameter of the front-side hit, if any.
    pub(crate) fn ray_parameter(&self, origin: DVec3, dir: DVec3) -> Option<f64> {
        let vdn = dir.dot(self.normal);
        if vdn >= 0.0 {
            return None;
        }
        let t = -(origin.dot(self.normal) - self.dist()) / vdn;
        if t < 0.0 {
            return None;
        }
        Some(t)
    }

    /// The single point shared by `self`, `a` and `b`, if there is one.
    pub fn intersect_point(&self, a: &Plane, b: &Plane, epsilon: f64) -> Option<DVec3> {
        let (n1, n2, n3) = (self.normal, a.normal, b.normal);
        let det = n3.dot(n1.cross(n2));
        if det.abs() < epsilon {
            return None;
        }
        let (d1, d2, d3) = (self.dist(), a.dist(), b.dist());
        Some((d1 * n2.cross(n3) + d2 * n3.cross(n1) + d3 * n1.cross(n2)) / det)
    }

    /// Classify `winding` against this plane.
    ///
    /// Every point within `epsilon` of the plane is `On`; a winding with points
    /// strictly on both sides is `Cross`.
    pub fn side(&self, winding: &Winding, epsilon: f64) -> PlaneSide {
        let mut front = false;
        let mut back = false;
        for p in winding.points() {
            let d = self.point_distance(*p);
            if d > epsilon {
                front = true;
            } else if d < -epsilon {
                back = true;
            }
        }
        match (front, back) {
            (true, true) => PlaneSide::Cross,
            (true, false) => PlaneSide::Front,
            (false, true) => PlaneSide::Back,
            (false, false) => PlaneSide::On,
        }
    }
}
