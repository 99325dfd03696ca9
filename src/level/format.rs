//! On-disk layout of a compiled level.
//!
//! A file is an 8 byte [`Header`], a directory of one [`DirectoryEntry`] per
//! [`ChunkType`] in [`ChunkType::ALL`] order, then the chunk payloads. Every
//! payload starts on a 4 byte boundary. All values are little-endian.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

pub const MAGIC: [u8; 4] = *b"TMF\x08";
pub const VERSION: u32 = 1;

pub const HEADER_SIZE: usize = std::mem::size_of::<Header>();
pub const DIRECTORY_SIZE: usize = std::mem::size_of::<DirectoryEntry>() * ChunkType::ALL.len();

/// Maximum texture name length, including the terminating NUL.
pub const TEXTURE_NAME_LEN: usize = 64;

/// Content and surface flag bits understood by the compiler.
pub const SURF_NODRAW: u32 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkType {
    Vertex,
    ModelVertex,
    Face,
    Model,
    Entity,
    Texture,
    Plane,
    BrushSide,
    Brush,
}

impl ChunkType {
    /// Directory order.
    pub const ALL: [ChunkType; 9] = [
        ChunkType::Vertex,
        ChunkType::ModelVertex,
        ChunkType::Face,
        ChunkType::Model,
        ChunkType::Entity,
        ChunkType::Texture,
        ChunkType::Plane,
        ChunkType::BrushSide,
        ChunkType::Brush,
    ];

    pub fn fourcc(self) -> [u8; 4] {
        match self {
            ChunkType::Vertex => *b"VERT",
            ChunkType::ModelVertex => *b"MVRT",
            ChunkType::Face => *b"FACE",
            ChunkType::Model => *b"MODL",
            ChunkType::Entity => *b"ENTS",
            ChunkType::Texture => *b"TXTR",
            ChunkType::Plane => *b"PLAN",
            ChunkType::BrushSide => *b"BSID",
            ChunkType::Brush => *b"BRSH",
        }
    }

    pub fn tag(self) -> u32 {
        u32::from_le_bytes(self.fourcc())
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.tag() == tag)
    }

    /// Position in the directory.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.fourcc()))
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct Header {
    pub magic: [u8; 4],
    pub version: u32,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DirectoryEntry {
    pub type_tag: u32,
    pub start: u32,
    pub length: u32,
}

impl DirectoryEntry {
    pub fn end(&self) -> u64 {
        self.start as u64 + self.length as u64
    }
}

/// Fixed-size record stored in a chunk.
pub trait Record: Pod {
    const CHUNK: ChunkType;
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub texcoord: Vec2,
}

/// Index into the vertex chunk; three per triangle.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ModelVertex {
    pub index: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Face {
    pub texture_index: i32,
    pub vertex_start: u32,
    pub vertex_count: u32,
    pub mesh_vertex_start: u32,
    pub mesh_vertex_count: u32,
    pub normal: Vec3,
}

/// Contiguous range of faces drawn together (`"model" "*N"`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Model {
    pub face_start: u32,
    pub face_count: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct Texture {
    pub name: [u8; TEXTURE_NAME_LEN],
}

impl Texture {
    /// NUL-padded name, truncated to fit.
    pub fn new(name: &str) -> Self {
        let mut buf = [0u8; TEXTURE_NAME_LEN];
        let len = name.len().min(TEXTURE_NAME_LEN - 1);
        buf[..len].copy_from_slice(&name.as_bytes()[..len]);
        Self { name: buf }
    }

    pub fn name(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(TEXTURE_NAME_LEN);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Plane {
    pub point: Vec3,
    pub normal: Vec3,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct BrushSide {
    pub plane_index: u32,
    pub surface_flags: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Brush {
    pub content_flags: u32,
    pub first_side: u32,
    pub side_count: u32,
}

impl Record for Vertex {
    const CHUNK: ChunkType = ChunkType::Vertex;
}
impl Record for ModelVertex {
    const CHUNK: ChunkType = ChunkType::ModelVertex;
}
impl Record for Face {
    const CHUNK: ChunkType = ChunkType::Face;
}
impl Record for Model {
    const CHUNK: ChunkType = ChunkType::Model;
}
impl Record for Texture {
    const CHUNK: ChunkType = ChunkType::Texture;
}
impl Record for Plane {
    const CHUNK: ChunkType = ChunkType::Plane;
}
impl Record for BrushSide {
    const CHUNK: ChunkType = ChunkType::BrushSide;
}
impl Record for Brush {
    const CHUNK: ChunkType = ChunkType::Brush;
}

/// Contents of every chunk of a compiled level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelData {
    pub vertices: Vec<Vertex>,
    pub model_vertices: Vec<ModelVertex>,
    pub faces: Vec<Face>,
    pub models: Vec<Model>,
    /// Entity key/values in map syntax, without brushes.
    pub entities: String,
    pub textures: Vec<Texture>,
    pub planes: Vec<Plane>,
    pub brush_sides: Vec<BrushSide>,
    pub brushes: Vec<Brush>,
}

impl LevelData {
    /// Raw payload of a chunk.
    pub fn chunk_bytes(&self, chunk: ChunkType) -> &[u8] {
        match chunk {
            ChunkType::Vertex => bytemuck::cast_slice(&self.vertices),
            ChunkType::ModelVertex => bytemuck::cast_slice(&self.model_vertices),
            ChunkType::Face => bytemuck::cast_slice(&self.faces),
            ChunkType::Model => bytemuck::cast_slice(&self.models),
            ChunkType::Entity => self.entities.as_bytes(),
            ChunkType::Texture => bytemuck::cast_slice(&self.textures),
            ChunkType::Plane => bytemuck::cast_slice(&self.planes),
            ChunkType::BrushSide => bytemuck::cast_slice(&self.brush_sides),
            ChunkType::Brush => bytemuck::cast_slice(&self.brushes),
        }
    }

    /// Texture names in table order.
    pub fn texture_names(&self) -> Vec<String> {
        self.textures.iter().map(Texture::name).collect()
    }
}

/// Round `n` up to the next multiple of 4.
pub fn align4(n: usize) -> usize {
    (n + 3) & !3
}
