use glam::DVec3;

use crate::geometry::{Aabb, Brush, Plane};

/// Distance a traced box is kept away from the surface it hits.
pub const TRACE_EPSILON: f64 = 1.0 / 32.0;

/// Velocity components smaller than this are zeroed after clamping.
const VELOCITY_EPSILON: f64 = 0.000_01;

/// Static level geometry queried by the tracer.
#[derive(Debug, Clone, Default)]
pub struct World {
    brushes: Vec<Brush>,
}

impl World {
    pub fn new(brushes: Vec<Brush>) -> Self {
        Self { brushes }
    }

    pub fn brushes(&self) -> &[Brush] {
        &self.brushes
    }

    pub fn brush(&self, index: usize) -> Option<&Brush> {
        self.brushes.get(index)
    }

    pub fn is_empty(&self) -> bool {
        self.brushes.is_empty()
    }
}

/// Outcome of sweeping a box through the world.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceResult {
    pub collided: bool,
    /// Where the box centre ends up.
    pub end_point: DVec3,
    /// Portion of the requested move that was completed, in `[0, 1]`.
    pub path_fraction: f64,
    pub plane_hit: Option<Plane>,
    /// Index into [`World::brushes`].
    pub brush_hit: Option<usize>,
    pub surface_normal: Option<DVec3>,
}

impl TraceResult {
    fn clear(end_point: DVec3) -> Self {
        Self {
            collided: false,
            end_point,
            path_fraction: 1.0,
            plane_hit: None,
            brush_hit: None,
            surface_normal: None,
        }
    }
}

/// Sweep `aabb`, centred on `start`, towards `end`.
///
/// Rays are cast from the eight box corners along the move against every
/// brush; the earliest entry point wins. A box that ends up closer than
/// [`TRACE_EPSILON`] to the plane it hit is pushed back out along the normal.
pub fn trace(world: &World, start: DVec3, end: DVec3, aabb: &Aabb) -> TraceResult {
    let delta = end - start;
    let distance = delta.length();
    if distance == 0.0 || world.is_empty() {
        return TraceResult::clear(end);
    }
    let dir = delta / distance;
    let moved = aabb.translated(start - aabb.center);

    let mut best: Option<(f64, usize, usize)> = None;
    for (b, brush) in world.brushes().iter().enumerate() {
        for corner in moved.corners() {
            let Some(hit) = brush.get_ray_intersection(corner, dir, distance, TRACE_EPSILON) else {
                continue;
            };
            if best.is_none_or(|(fraction, _, _)| hit.fraction < fraction) {
                best = Some((hit.fraction, b, hit.plane_index));
            }
        }
    }

    let Some((fraction, brush, plane_index)) = best else {
        return TraceResult::clear(end);
    };
    let fraction = fraction.min(1.0);
    let plane = world.brushes[brush].planes()[plane_index];
    let end_box = moved.translated(fraction * delta);
    TraceResult {
        collided: true,
        end_point: rest_against(&end_box, &plane),
        path_fraction: fraction,
        plane_hit: Some(plane),
        brush_hit: Some(brush),
        surface_normal: Some(plane.normal),
    }
}

/// Centre of `end_box` once it sits [`TRACE_EPSILON`] in front of `plane`.
///
/// Boxes are only pushed out, never pulled in, and by at most the epsilon.
fn rest_against(end_box: &Aabb, plane: &Plane) -> DVec3 {
    let contact = end_box.sit_against_plane(plane);
    let push = (contact.center - end_box.center).dot(plane.normal) + TRACE_EPSILON;
    end_box.center + push.clamp(0.0, TRACE_EPSILON) * plane.normal
}

/// Remove the part of `velocity` pushing into the surface that was hit.
///
/// The result never has a larger magnitude than `velocity`. Returns the input
/// unchanged when the trace reports no surface.
pub fn clamp_velocity(velocity: DVec3, result: &TraceResult) -> DVec3 {
    let Some(normal) = result.surface_normal else {
        return velocity;
    };
    let mut clamped = velocity - velocity.dot(normal) * normal;
    for i in 0..3 {
        if clamped[i].abs() < VELOCITY_EPSILON {
            clamped[i] = 0.0;
        }
    }
    let old_speed = velocity.length();
    let new_speed = clamped.length();
    if new_speed > old_speed && old_speed > 0.0 {
        clamped = clamped / new_speed * old_speed;
    }
    clamped
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn box_brush(mins: DVec3, maxs: DVec3) -> Brush {
        Brush::new(vec![
            Plane::new(maxs, DVec3::X),
            Plane::new(mins, -DVec3::X),
            Plane::new(maxs, DVec3::Y),
            Plane::new(mins, -DVec3::Y),
            Plane::new(maxs, DVec3::Z),
            Plane::new(mins, -DVec3::Z),
        ])
    }

    fn cube_world() -> World {
        World::new(vec![box_brush(DVec3::splat(-16.0), DVec3::splat(16.0))])
    }

    #[test]
    fn empty_world_never_collides() {
        let end = DVec3::new(5.0, -3.0, 100.0);
        let r = trace(&World::default(), DVec3::ZERO, end, &Aabb::cube(4.0));
        assert!(!r.collided);
        assert_eq!(r.end_point, end);
        assert_eq!(r.path_fraction, 1.0);
        assert!(r.surface_normal.is_none() && r.plane_hit.is_none() && r.brush_hit.is_none());
    }

    #[test]
    fn zero_length_move_never_collides() {
        let p = DVec3::new(0.0, 0.0, 17.5);
        let r = trace(&cube_world(), p, p, &Aabb::cube(1.0));
        assert!(!r.collided);
        assert_eq!(r.end_point, p);
    }

    #[test]
    fn box_stops_against_cube_top() {
        let r = trace(
            &cube_world(),
            DVec3::new(0.0, 0.0, 20.0),
            DVec3::ZERO,
            &Aabb::cube(1.0),
        );
        assert!(r.collided);
        assert_eq!(r.surface_normal, Some(DVec3::Z));
        assert_eq!(r.brush_hit, Some(0));
        // the box bottom travels 3 units, less the surface gap
        assert_relative_eq!(r.path_fraction, (3.0 - TRACE_EPSILON) / 20.0, epsilon = 1e-12);
        assert_relative_eq!(r.end_point.z, 17.0 + TRACE_EPSILON, epsilon = 1e-9);
    }

    #[test]
    fn box_passing_beside_cube_is_clear() {
        let r = trace(
            &cube_world(),
            DVec3::new(20.0, 0.0, 20.0),
            DVec3::new(20.0, 0.0, -20.0),
            &Aabb::cube(2.0),
        );
        assert!(!r.collided);
        assert_eq!(r.path_fraction, 1.0);
    }

    #[test]
    fn short_move_stops_before_reaching() {
        let r = trace(
            &cube_world(),
            DVec3::new(0.0, 0.0, 20.0),
            DVec3::new(0.0, 0.0, 18.0),
            &Aabb::cube(1.0),
        );
        assert!(!r.collided);
        assert_eq!(r.end_point, DVec3::new(0.0, 0.0, 18.0));
    }

    #[test]
    fn nearest_brush_wins() {
        let world = World::new(vec![
            box_brush(DVec3::new(-8.0, -8.0, -64.0), DVec3::new(8.0, 8.0, -48.0)),
            box_brush(DVec3::new(-8.0, -8.0, -16.0), DVec3::new(8.0, 8.0, 0.0)),
        ]);
        let r = trace(&world, DVec3::new(0.0, 0.0, 10.0), DVec3::new(0.0, 0.0, -100.0), &Aabb::point());
        assert!(r.collided);
        assert_eq!(r.brush_hit, Some(1));
        assert_eq!(r.plane_hit, Some(world.brushes()[1].planes()[4]));
        assert_relative_eq!(r.end_point.z, TRACE_EPSILON, epsilon = 1e-9);
    }

    #[test]
    fn off_centre_box_is_recentred() {
        let aabb = Aabb::new(DVec3::ZERO, DVec3::splat(2.0));
        let r = trace(&cube_world(), DVec3::new(0.0, 0.0, 20.0), DVec3::ZERO, &aabb);
        assert!(r.collided);
        assert_relative_eq!(r.end_point.z, 17.0 + TRACE_EPSILON, epsilon = 1e-9);
    }

    #[test]
    fn box_inside_the_gap_is_pushed_out() {
        let start = DVec3::new(0.0, 0.0, 17.001);
        let r = trace(
            &cube_world(),
            start,
            start + DVec3::new(10.0, 0.0, -1.0),
            &Aabb::cube(1.0),
        );
        assert!(r.collided);
        assert_eq!(r.surface_normal, Some(DVec3::Z));
        assert_eq!(r.path_fraction, 0.0);
        assert_relative_eq!(r.end_point.x, 0.0);
        assert_relative_eq!(r.end_point.z, 17.0 + TRACE_EPSILON, epsilon = 1e-9);
    }

    #[test]
    fn resting_box_is_not_pulled_in() {
        let plane = Plane::new(DVec3::ZERO, DVec3::Z);
        let end_box = Aabb::cube(1.0).translated(DVec3::new(0.0, 0.0, 3.0));
        assert_eq!(rest_against(&end_box, &plane), end_box.center);
    }

    #[test]
    fn clamp_slides_along_surface() {
        let hit = trace(
            &cube_world(),
            DVec3::new(0.0, 0.0, 20.0),
            DVec3::new(5.0, 0.0, 0.0),
            &Aabb::cube(1.0),
        );
        assert!(hit.collided);
        let v = DVec3::new(5.0, 0.0, -20.0);
        let clamped = clamp_velocity(v, &hit);
        assert_relative_eq!(clamped.z, 0.0);
        assert_relative_eq!(clamped.x, 5.0);
        assert!(clamped.length() <= v.length());
    }

    #[test]
    fn clamp_never_speeds_up() {
        let result = TraceResult {
            collided: true,
            end_point: DVec3::ZERO,
            path_fraction: 0.0,
            plane_hit: None,
            brush_hit: None,
            surface_normal: Some(DVec3::new(1.0, 1.0, 0.0).normalize()),
        };
        for v in [
            DVec3::new(3.0, -4.0, 0.0),
            DVec3::new(-1.0, -1.0, 7.0),
            DVec3::new(0.000_001, 0.0, 0.0),
            DVec3::new(12.0, 0.5, -3.0),
        ] {
            let clamped = clamp_velocity(v, &result);
            assert!(clamped.length() <= v.length() + 1e-12);
            assert!(clamped.dot(result.surface_normal.unwrap()).abs() < 1e-4);
        }
    }

    #[test]
    fn clamp_without_contact_is_identity() {
        let v = DVec3::new(1.0, 2.0, 3.0);
        let r = trace(&World::default(), DVec3::ZERO, DVec3::X, &Aabb::point());
        assert_eq!(clamp_velocity(v, &r), v);
    }
}
