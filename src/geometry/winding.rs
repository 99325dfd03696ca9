use glam::DVec3;

use crate::geometry::plane::Plane;

/// Edges shorter than this do not count towards a usable polygon.
pub const EDGE_EPSILON: f64 = 0.2;

/// Half-size of the base quad produced by [`Winding::from_plane`].
pub const HUGE_EXTENT: f64 = 1e10;

/// Direction vectors are divided by at least this length, so points sitting on
/// the centroid stay near zero instead of blowing up.
const MIN_DIRECTION_LENGTH: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VertexSide {
    Front,
    Back,
    On,
}

/// Ordered convex polygon lying on `plane`.
#[derive(Debug, Clone)]
pub struct Winding {
    plane: Plane,
    points: Vec<DVec3>,
}

impl Winding {
    /// Wrap an unordered coplanar point set and put it into canonical order.
    pub fn from_points(plane: Plane, points: Vec<DVec3>) -> Self {
        let mut winding = Self { plane, points };
        winding.wind();
        winding
    }

    /// A huge quad covering `plane`, used as the seed for portal clipping.
    pub fn from_plane(plane: Plane) -> Self {
        let n = plane.normal;
        let d = n.x * n.x + n.y * n.y;
        let mut left = if d == 0.0 {
            DVec3::X
        } else {
            DVec3::new(-n.y, n.x, 0.0) / d.sqrt()
        };
        let mut down = left.cross(n);
        left *= HUGE_EXTENT;
        down *= HUGE_EXTENT;

        let p = plane.point;
        Self::from_points(
            plane,
            vec![p - left + down, p + left + down, p + left - down, p - left - down],
        )
    }

    pub fn plane(&self) -> &Plane {
        &self.plane
    }

    pub fn points(&self) -> &[DVec3] {
        &self.points
    }

    pub fn into_points(self) -> Vec<DVec3> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Average of the vertices.
    pub fn center_of_mass(&self) -> Option<DVec3> {
        center_of_mass(&self.points)
    }

    /// Area of the polygon (assumes canonical convex order).
    pub fn area(&self) -> f64 {
        let Some(&p0) = self.points.first() else {
            return 0.0;
        };
        let mut sum = DVec3::ZERO;
        for pair in self.points[1..].windows(2) {
            sum += (pair[0] - p0).cross(pair[1] - p0);
        }
        sum.length() * 0.5
    }

    /// Reorder the vertices counter-clockwise around the plane normal.
    pub fn wind(&mut self) {
        wind_points(&self.plane, &mut self.points);
    }

    /// Keep the part of the winding in front of `plane`.
    ///
    /// A winding entirely on one side (either side) comes back unchanged, as
    /// does one whose clipped loop would exceed `len + 4` points.
    pub fn clip(self, plane: &Plane, epsilon: f64) -> Winding {
        let n = self.points.len();
        let (dists, sides, front, back) = classify(&self.points, plane, epsilon);
        if front == 0 || back == 0 {
            return self;
        }

        let max_points = n + 4;
        let mut clipped = Vec::with_capacity(max_points);
        for i in 0..n {
            if clipped.len() + 1 > max_points {
                return self;
            }
            let p1 = self.points[i];
            match sides[i] {
                VertexSide::On => {
                    clipped.push(p1);
                    continue;
                }
                VertexSide::Front => clipped.push(p1),
                VertexSide::Back => {}
            }
            let next = sides[(i + 1) % n];
            if next == VertexSide::On || next == sides[i] {
                continue;
            }
            if clipped.len() + 1 > max_points {
                return self;
            }
            let j = (i + 1) % n;
            clipped.push(crossing_point(plane, sides[i], p1, dists[i], self.points[j], dists[j]));
        }

        Winding::from_points(self.plane, clipped)
    }

    /// Cut the winding in two along `plane`, returning `(front, back)`.
    ///
    /// A winding lying on the plane goes wholly to the side its own normal
    /// faces. Fragments with fewer than three points are dropped.
    pub fn split(&self, plane: &Plane, epsilon: f64) -> (Option<Winding>, Option<Winding>) {
        let n = self.points.len();
        let (dists, sides, front, back) = classify(&self.points, plane, epsilon);

        if front == 0 && back == 0 {
            return if plane.normal.dot(self.plane.normal) > 0.0 {
                (Some(self.clone()), None)
            } else {
                (None, Some(self.clone()))
            };
        }
        if front == 0 {
            return (None, Some(self.clone()));
        }
        if back == 0 {
            return (Some(self.clone()), None);
        }

        let mut front_points = Vec::with_capacity(n + 2);
        let mut back_points = Vec::with_capacity(n + 2);
        for i in 0..n {
            let p1 = self.points[i];
            match sides[i] {
                VertexSide::On => {
                    front_points.push(p1);
                    back_points.push(p1);
                    continue;
                }
                VertexSide::Front => front_points.push(p1),
                VertexSide::Back => back_points.push(p1),
            }
            let next = sides[(i + 1) % n];
            if next == VertexSide::On || next == sides[i] {
                continue;
            }
            let j = (i + 1) % n;
            let mid = crossing_point(plane, sides[i], p1, dists[i], self.points[j], dists[j]);
            front_points.push(mid);
            back_points.push(mid);
        }

        let fragment = |points: Vec<DVec3>| {
            (points.len() >= 3).then(|| Winding::from_points(self.plane, points))
        };
        (fragment(front_points), fragment(back_points))
    }

    /// True when fewer than three edges are longer than [`EDGE_EPSILON`].
    pub fn is_very_small(&self) -> bool {
        let n = self.points.len();
        let mut edges = 0;
        for i in 0..n {
            let delta = self.points[(i + 1) % n] - self.points[i];
            if delta.length() > EDGE_EPSILON {
                edges += 1;
                if edges == 3 {
                    return false;
                }
            }
        }
        true
    }
}

/// Average of a point set, `None` when empty.
pub fn center_of_mass(points: &[DVec3]) -> Option<DVec3> {
    if points.is_empty() {
        return None;
    }
    let sum: DVec3 = points.iter().copied().sum();
    Some(sum / points.len() as f64)
}

fn direction(v: DVec3) -> DVec3 {
    v / v.length().max(MIN_DIRECTION_LENGTH)
}

/// Sort coplanar points into a counter-clockwise loop around `plane.normal`.
///
/// Each point is placed in one of four quadrants around the centroid relative
/// to a tangent through the first point, then each quadrant is ordered by its
/// cosine to the tangent. Avoids any inverse trig.
pub fn wind_points(plane: &Plane, points: &mut Vec<DVec3>) {
    if points.len() < 3 {
        return;
    }
    let Some(com) = center_of_mass(points) else {
        return;
    };
    let tangent = direction(points[0] - com);

    let mut quadrants: [Vec<(usize, f64)>; 4] = Default::default();
    for (i, p) in points.iter().enumerate() {
        let dir = direction(*p - com);
        let sin = plane.point_distance(tangent.cross(dir) + com);
        let cos = tangent.dot(dir);
        let quadrant = match (sin >= 0.0, cos >= 0.0) {
            (true, true) => 0,
            (true, false) => 1,
            (false, false) => 2,
            (false, true) => 3,
        };
        let key = if sin < 0.0 { -cos } else { cos };
        quadrants[quadrant].push((i, key));
    }

    let mut ordered = Vec::with_capacity(points.len());
    for quadrant in &mut quadrants {
        quadrant.sort_by(|a, b| b.1.total_cmp(&a.1));
        ordered.extend(quadrant.iter().map(|&(i, _)| points[i]));
    }
    *points = ordered;
}

fn classify(
    points: &[DVec3],
    plane: &Plane,
    epsilon: f64,
) -> (Vec<f64>, Vec<VertexSide>, usize, usize) {
    let mut dists = Vec::with_capacity(points.len());
    let mut sides = Vec::with_capacity(points.len());
    let (mut front, mut back) = (0, 0);
    for p in points {
        let d = plane.point_distance(*p);
        let side = if d > epsilon {
            front += 1;
            VertexSide::Front
        } else if d < -epsilon {
            back += 1;
            VertexSide::Back
        } else {
            VertexSide::On
        };
        dists.push(d);
        sides.push(side);
    }
    (dists, sides, front, back)
}

/// Point where edge `p1 -> p2` crosses `plane`.
///
/// Always interpolates from the front vertex so both fragments of a split get
/// bit-identical vertices. Components along an exactly axial normal snap to
/// the plane constant.
fn crossing_point(
    plane: &Plane,
    side1: VertexSide,
    p1: DVec3,
    d1: f64,
    p2: DVec3,
    d2: f64,
) -> DVec3 {
    let (from, d_from, to, d_to) = if side1 == VertexSide::Front {
        (p1, d1, p2, d2)
    } else {
        (p2, d2, p1, d1)
    };
    let t = d_from / (d_from - d_to);
    let dist = plane.dist();
    let mut mid = DVec3::ZERO;
    for j in 0..3 {
        mid[j] = if plane.normal[j] == 1.0 {
            dist
        } else if plane.normal[j] == -1.0 {
            -dist
        } else {
            from[j] + t * (to[j] - from[j])
        };
    }
    mid
}
