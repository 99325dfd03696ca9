use glam::DVec3;

use crate::geometry::plane::Plane;

/// Growable min/max box used while building the BSP.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub mins: DVec3,
    pub maxs: DVec3,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::empty()
    }
}

impl Bounds {
    pub fn new(mins: DVec3, maxs: DVec3) -> Self {
        Self { mins, maxs }
    }

    /// Inverted infinite box; including any point makes it valid.
    pub fn empty() -> Self {
        Self {
            mins: DVec3::INFINITY,
            maxs: DVec3::NEG_INFINITY,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::empty();
    }

    /// Whether nothing has been included yet.
    pub fn is_empty(&self) -> bool {
        self.mins.cmpgt(self.maxs).any()
    }

    /// Whether a point lies inside (or on the boundary of) the box.
    pub fn contains_point(&self, p: DVec3) -> bool {
        p.cmpge(self.mins).all() && p.cmple(self.maxs).all()
    }

    /// Grow the box so it contains `p`.
    pub fn include_point(&mut self, p: DVec3) {
        if self.contains_point(p) {
            return;
        }
        self.mins = self.mins.min(p);
        self.maxs = self.maxs.max(p);
    }

    /// Half-extents along each axis.
    pub fn half_size(&self) -> DVec3 {
        (self.maxs - self.mins) * 0.5
    }

    /// Return a copy grown by `amount` on every side.
    pub fn padded(&self, amount: f64) -> Bounds {
        Bounds {
            mins: self.mins - DVec3::splat(amount),
            maxs: self.maxs + DVec3::splat(amount),
        }
    }

    /// Return the smallest box that contains both `self` and `other`.
    pub fn merge(&self, other: &Bounds) -> Bounds {
        Bounds {
            mins: self.mins.min(other.mins),
            maxs: self.maxs.max(other.maxs),
        }
    }
}

/// Axis-aligned box swept through the world by the collision tracer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min_extent: DVec3,
    pub max_extent: DVec3,
    pub center: DVec3,
    /// The six corners other than `min_extent` and `max_extent`.
    pub other_verts: [DVec3; 6],
}

impl Aabb {
    /// Build a box from its extremes; expects `min <= max` componentwise.
    pub fn new(min_extent: DVec3, max_extent: DVec3) -> Self {
        Self {
            min_extent,
            max_extent,
            center: (min_extent + max_extent) * 0.5,
            other_verts: other_verts(min_extent, max_extent),
        }
    }

    /// Degenerate box at the origin.
    pub fn point() -> Self {
        Self::new(DVec3::ZERO, DVec3::ZERO)
    }

    /// Cube with half-extent `s` centred on the origin.
    pub fn cube(s: f64) -> Self {
        Self::new(DVec3::splat(-s), DVec3::splat(s))
    }

    /// All eight corners, `min_extent` and `max_extent` first.
    pub fn corners(&self) -> [DVec3; 8] {
        let o = &self.other_verts;
        [self.min_extent, self.max_extent, o[0], o[1], o[2], o[3], o[4], o[5]]
    }

    pub fn translated(&self, by: DVec3) -> Aabb {
        Aabb::new(self.min_extent + by, self.max_extent + by)
    }

    pub fn center_distance(&self, other: &Aabb) -> f64 {
        self.center.distance(other.center)
    }

    /// Move the box along the plane normal so its deepest corner rests on the plane.
    pub fn sit_against_plane(&self, plane: &Plane) -> Aabb {
        let closest = self
            .corners()
            .iter()
            .map(|c| plane.point_distance(*c))
            .fold(f64::INFINITY, f64::min);
        self.translated(closest * -plane.normal)
    }
}

fn other_verts(min: DVec3, max: DVec3) -> [DVec3; 6] {
    [
        // bottom layer (min y)
        DVec3::new(max.x, min.y, max.z),
        DVec3::new(min.x, min.y, max.z),
        DVec3::new(max.x, min.y, min.z),
        // top layer (max y)
        DVec3::new(min.x, max.y, min.z),
        DVec3::new(max.x, max.y, min.z),
        DVec3::new(min.x, max.y, max.z),
    ]
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn empty_bounds_grow() {
        let mut b = Bounds::empty();
        assert!(b.is_empty());
        b.include_point(DVec3::new(1.0, -2.0, 3.0));
        b.include_point(DVec3::new(-1.0, 2.0, 0.0));
        assert!(!b.is_empty());
        assert_eq!(b.mins, DVec3::new(-1.0, -2.0, 0.0));
        assert_eq!(b.maxs, DVec3::new(1.0, 2.0, 3.0));
        assert!(b.contains_point(DVec3::ZERO));
        assert!(!b.contains_point(DVec3::new(0.0, 0.0, 3.5)));

        b.clear();
        assert!(b.is_empty());
    }

    #[test]
    fn bounds_padding_and_merge() {
        let a = Bounds::new(DVec3::ZERO, DVec3::ONE);
        let p = a.padded(8.0);
        assert_eq!(p.mins, DVec3::splat(-8.0));
        assert_eq!(p.maxs, DVec3::splat(9.0));
        assert_eq!(p.half_size(), DVec3::splat(8.5));

        let m = a.merge(&Bounds::new(DVec3::splat(-1.0), DVec3::splat(0.5)));
        assert_eq!(m.mins, DVec3::splat(-1.0));
        assert_eq!(m.maxs, DVec3::ONE);
    }

    #[test]
    fn corners_are_distinct() {
        let b = Aabb::new(DVec3::new(-1.0, -2.0, -3.0), DVec3::new(1.0, 2.0, 3.0));
        let corners = b.corners();
        for i in 0..8 {
            for j in (i + 1)..8 {
                assert_ne!(corners[i], corners[j], "corner {i} repeats as {j}");
            }
            let c = corners[i];
            assert_relative_eq!(c.x.abs(), 1.0);
            assert_relative_eq!(c.y.abs(), 2.0);
            assert_relative_eq!(c.z.abs(), 3.0);
        }
    }

    #[test]
    fn translate_moves_center() {
        let b = Aabb::cube(4.0).translated(DVec3::new(10.0, 0.0, -2.0));
        assert_eq!(b.center, DVec3::new(10.0, 0.0, -2.0));
        assert_eq!(b.min_extent, DVec3::new(6.0, -4.0, -6.0));
        assert_relative_eq!(b.center_distance(&Aabb::point()), 104.0_f64.sqrt());
    }

    #[test]
    fn sit_against_floor() {
        let floor = Plane::new(DVec3::ZERO, DVec3::Y);
        let sunk = Aabb::cube(1.0).translated(DVec3::new(0.0, 0.5, 0.0));
        let rested = sunk.sit_against_plane(&floor);
        assert_relative_eq!(rested.min_extent.y, 0.0);
        assert_relative_eq!(rested.center.y, 1.0);
    }
}
