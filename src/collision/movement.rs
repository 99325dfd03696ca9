use glam::DVec3;
use tracing::debug;

use crate::collision::trace::{TraceResult, World, clamp_velocity, trace};
use crate::geometry::Aabb;

/// Downward acceleration, in units per second squared.
pub const GRAVITY: f64 = 30.0;

/// Bodies slower than this are not traced.
pub const MIN_SPEED: f64 = 0.000_001;

/// A moving box driven once per simulation tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub position: DVec3,
    pub velocity: DVec3,
    pub bounds: Aabb,
    pub gravity: bool,
}

impl Body {
    pub fn new(position: DVec3, bounds: Aabb) -> Self {
        Self {
            position,
            velocity: DVec3::ZERO,
            bounds,
            gravity: true,
        }
    }
}

/// Advance `body` by `dt` seconds against `world`.
///
/// When the move is blocked, the unused part of the tick is spent sliding along
/// the clamped velocity. Returns the trace of the requested move, or `None`
/// when the body was too slow to move.
pub fn step(world: &World, body: &mut Body, dt: f64) -> Option<TraceResult> {
    if body.gravity {
        body.velocity.y -= GRAVITY * dt;
    }
    if body.velocity.length() < MIN_SPEED {
        return None;
    }

    let target = body.position + body.velocity * dt;
    let result = trace(world, body.position, target, &body.bounds);
    body.position = result.end_point;
    if !result.collided {
        return Some(result);
    }

    body.velocity = clamp_velocity(body.velocity, &result);
    let remaining = (1.0 - result.path_fraction) * dt;
    if remaining > 0.0 && body.velocity.length() >= MIN_SPEED {
        let target = body.position + body.velocity * remaining;
        let slide = trace(world, body.position, target, &body.bounds);
        if slide.collided {
            debug!(normal = ?slide.surface_normal, "slide blocked");
            body.velocity = clamp_velocity(body.velocity, &slide);
        }
        body.position = slide.end_point;
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::collision::trace::TRACE_EPSILON;
    use crate::geometry::{Brush, Plane};

    fn floor_world() -> World {
        let mins = DVec3::new(-64.0, -16.0, -64.0);
        let maxs = DVec3::new(64.0, 0.0, 64.0);
        World::new(vec![Brush::new(vec![
            Plane::new(maxs, DVec3::X),
            Plane::new(mins, -DVec3::X),
            Plane::new(maxs, DVec3::Y),
            Plane::new(mins, -DVec3::Y),
            Plane::new(maxs, DVec3::Z),
            Plane::new(mins, -DVec3::Z),
        ])])
    }

    fn slab(x0: f64, x1: f64) -> Brush {
        let mins = DVec3::new(x0, -16.0, -64.0);
        let maxs = DVec3::new(x1, 0.0, 64.0);
        Brush::new(vec![
            Plane::new(maxs, DVec3::X),
            Plane::new(mins, -DVec3::X),
            Plane::new(maxs, DVec3::Y),
            Plane::new(mins, -DVec3::Y),
            Plane::new(maxs, DVec3::Z),
            Plane::new(mins, -DVec3::Z),
        ])
    }

    #[test]
    fn resting_body_without_gravity_stays_put() {
        let mut body = Body::new(DVec3::new(0.0, 5.0, 0.0), Aabb::cube(1.0));
        body.gravity = false;
        assert!(step(&floor_world(), &mut body, 0.1).is_none());
        assert_eq!(body.position, DVec3::new(0.0, 5.0, 0.0));
    }

    #[test]
    fn falling_body_lands_on_floor() {
        let world = floor_world();
        let mut body = Body::new(DVec3::new(0.0, 10.5, 0.0), Aabb::cube(1.0));
        let mut landed = false;
        for _ in 0..100 {
            if let Some(r) = step(&world, &mut body, 0.05) {
                landed |= r.collided;
            }
            assert!(body.position.y >= 1.0, "fell through: {:?}", body.position);
        }
        assert!(landed);
        assert_relative_eq!(body.position.y, 1.0 + TRACE_EPSILON, epsilon = 1e-9);
        assert_relative_eq!(body.velocity.y, 0.0);
    }

    #[test]
    fn sliding_along_floor_is_unobstructed() {
        let mut body = Body::new(DVec3::new(0.0, 1.0 + TRACE_EPSILON, 0.0), Aabb::cube(1.0));
        body.gravity = false;
        body.velocity = DVec3::new(10.0, 0.0, 0.0);
        let r = step(&floor_world(), &mut body, 0.1).unwrap();
        assert!(!r.collided);
        assert_relative_eq!(body.position.x, 1.0);
        assert_eq!(body.velocity, DVec3::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn grounded_body_walks_across_floor_seam() {
        let world = World::new(vec![slab(-64.0, 0.0), slab(0.0, 64.0)]);
        let mut body = Body::new(DVec3::new(-20.0, 1.0 + TRACE_EPSILON, 0.0), Aabb::cube(1.0));
        for _ in 0..60 {
            step(&world, &mut body, 1.0 / 60.0);
        }
        assert_relative_eq!(body.position.x, -20.0);

        body.velocity.x = 20.0;
        for _ in 0..90 {
            step(&world, &mut body, 1.0 / 60.0);
            assert!(body.position.y >= 1.0, "sank into the floor: {:?}", body.position);
            assert!(body.position.y <= 1.0 + TRACE_EPSILON + 1e-9);
        }
        assert_relative_eq!(body.velocity.x, 20.0);
        assert!(body.position.x > 5.0, "body stalled at {:?}", body.position);
    }
}
