pub mod bsp;
pub mod collision;
pub mod config;
pub mod error;
pub mod geometry;
pub mod level;
pub mod map;
pub mod pipeline;

pub use collision::{Body, TraceResult, World, trace};
pub use config::{CliArgs, CompileConfig, LogFormat};
pub use error::{LevelError, Result};
pub use pipeline::{CompileStats, Compiler};
