pub mod parser;
pub mod texture;

pub use parser::{
    EMPTY_TEXTURE, MapEntity, MapFile, Properties, format_entities, parse_map, read_map,
};
pub use texture::{TextureCache, UvProjector, calculate_uv};
