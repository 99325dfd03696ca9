pub mod movement;
pub mod trace;

pub use movement::{Body, GRAVITY, step};
pub use trace::{TRACE_EPSILON, TraceResult, World, clamp_velocity, trace};
