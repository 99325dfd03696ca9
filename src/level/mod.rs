//! Compiled level files: record layout, emission from a parsed map, and
//! reading them back.

pub mod builder;
pub mod format;
pub mod loader;
pub mod writer;

pub use builder::{LevelBuilder, build_level};
pub use format::{ChunkType, LevelData};
pub use loader::{LoadedLevel, build_world, load_level, read_level};
pub use writer::{write_level, write_level_file};
