pub mod aabb;
pub mod brush;
pub mod plane;
pub mod winding;

pub use aabb::{Aabb, Bounds};
pub use brush::{Brush, RayHit, Side, Surface, TextureAttributes};
pub use plane::{Plane, PlaneId, PlaneSide};
pub use winding::Winding;
