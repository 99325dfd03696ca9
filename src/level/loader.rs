use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use tracing::{debug, info};

use crate::collision::World;
use crate::error::{LevelError, Result};
use crate::geometry::{self, Surface};
use crate::level::format::{
    ChunkType, DIRECTORY_SIZE, DirectoryEntry, HEADER_SIZE, Header, LevelData, MAGIC, Record,
    VERSION,
};
use crate::map::{Properties, parse_map};

/// A compiled level with its entities and collision world decoded.
#[derive(Debug)]
pub struct LoadedLevel {
    pub data: LevelData,
    pub entities: Vec<Properties>,
    pub world: World,
}

/// Memory-map and decode a compiled level file.
pub fn load_level(path: &Path) -> Result<LoadedLevel> {
    let file = File::open(path)?;
    // SAFETY: the mapping is only sound while no other process truncates or
    // rewrites the file. Level files are write-once compiler output, and all
    // records are copied out before the mapping drops.
    let mmap = unsafe { Mmap::map(&file)? };
    let data = read_level(&mmap)?;
    let entities = parse_entities(&data.entities)?;
    let world = build_world(&data)?;
    info!(
        path = %path.display(),
        faces = data.faces.len(),
        brushes = data.brushes.len(),
        entities = entities.len(),
        "loaded level"
    );
    Ok(LoadedLevel {
        data,
        entities,
        world,
    })
}

/// Decode every chunk of a compiled level.
pub fn read_level(bytes: &[u8]) -> Result<LevelData> {
    let directory = read_directory(bytes)?;
    let chunk = |c: ChunkType| chunk_slice(bytes, &directory, c);

    let entities = String::from_utf8(chunk(ChunkType::Entity).to_vec())
        .map_err(|e| LevelError::Format(format!("entity chunk is not UTF-8: {e}")))?;
    let level = LevelData {
        vertices: read_records(chunk(ChunkType::Vertex))?,
        model_vertices: read_records(chunk(ChunkType::ModelVertex))?,
        faces: read_records(chunk(ChunkType::Face))?,
        models: read_records(chunk(ChunkType::Model))?,
        entities,
        textures: read_records(chunk(ChunkType::Texture))?,
        planes: read_records(chunk(ChunkType::Plane))?,
        brush_sides: read_records(chunk(ChunkType::BrushSide))?,
        brushes: read_records(chunk(ChunkType::Brush))?,
    };
    validate(&level)?;
    debug!(
        vertices = level.vertices.len(),
        model_vertices = level.model_vertices.len(),
        textures = level.textures.len(),
        "decoded level chunks"
    );
    Ok(level)
}

/// Check the header and return the chunk directory in [`ChunkType::ALL`] order.
pub fn read_directory(bytes: &[u8]) -> Result<Vec<DirectoryEntry>> {
    if bytes.len() < HEADER_SIZE + DIRECTORY_SIZE {
        return Err(LevelError::Format(format!(
            "file is {} bytes, too short for a level header",
            bytes.len()
        )));
    }
    let header: Header = bytemuck::pod_read_unaligned(&bytes[..HEADER_SIZE]);
    if header.magic != MAGIC {
        return Err(LevelError::Format(format!("invalid magic {:?}", header.magic)));
    }
    if header.version != VERSION {
        return Err(LevelError::Format(format!(
            "unsupported version {} (expected {VERSION})",
            header.version
        )));
    }

    let entry_size = std::mem::size_of::<DirectoryEntry>();
    let mut directory = Vec::with_capacity(ChunkType::ALL.len());
    for chunk in ChunkType::ALL {
        let offset = HEADER_SIZE + chunk.index() * entry_size;
        let entry: DirectoryEntry = bytemuck::pod_read_unaligned(&bytes[offset..offset + entry_size]);
        if entry.type_tag != chunk.tag() {
            return Err(LevelError::Format(format!(
                "directory slot {} holds tag {:#010x}, expected {chunk}",
                chunk.index(),
                entry.type_tag
            )));
        }
        if entry.end() > bytes.len() as u64 {
            return Err(LevelError::Format(format!(
                "{chunk} chunk ({}..{}) runs past end of file ({} bytes)",
                entry.start,
                entry.end(),
                bytes.len()
            )));
        }
        directory.push(entry);
    }
    Ok(directory)
}

fn chunk_slice<'a>(bytes: &'a [u8], directory: &[DirectoryEntry], chunk: ChunkType) -> &'a [u8] {
    let entry = &directory[chunk.index()];
    &bytes[entry.start as usize..entry.end() as usize]
}

fn read_records<T: Record>(bytes: &[u8]) -> Result<Vec<T>> {
    let size = std::mem::size_of::<T>();
    if bytes.len() % size != 0 {
        return Err(LevelError::Format(format!(
            "{} chunk length {} is not a multiple of {size}",
            T::CHUNK,
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(size)
        .map(bytemuck::pod_read_unaligned)
        .collect())
}

/// Check that every index stored in the chunks points inside its target chunk.
fn validate(level: &LevelData) -> Result<()> {
    let in_range = |start: u32, count: u32, len: usize| start as u64 + count as u64 <= len as u64;

    for (i, face) in level.faces.iter().enumerate() {
        if !in_range(face.vertex_start, face.vertex_count, level.vertices.len())
            || !in_range(
                face.mesh_vertex_start,
                face.mesh_vertex_count,
                level.model_vertices.len(),
            )
        {
            return Err(LevelError::Format(format!("face {i} references missing vertices")));
        }
        if face.texture_index >= level.textures.len() as i32 {
            return Err(LevelError::Format(format!(
                "face {i} references missing texture {}",
                face.texture_index
            )));
        }
    }
    if let Some(i) = level
        .model_vertices
        .iter()
        .position(|m| m.index as usize >= level.vertices.len())
    {
        return Err(LevelError::Format(format!("model vertex {i} is out of range")));
    }
    for (i, model) in level.models.iter().enumerate() {
        if !in_range(model.face_start, model.face_count, level.faces.len()) {
            return Err(LevelError::Format(format!("model {i} references missing faces")));
        }
    }
    for (i, brush) in level.brushes.iter().enumerate() {
        if !in_range(brush.first_side, brush.side_count, level.brush_sides.len()) {
            return Err(LevelError::Format(format!("brush {i} references missing sides")));
        }
    }
    if let Some(i) = level
        .brush_sides
        .iter()
        .position(|s| s.plane_index as usize >= level.planes.len())
    {
        return Err(LevelError::Format(format!("brush side {i} references a missing plane")));
    }
    Ok(())
}

/// Parse the entity chunk text.
pub fn parse_entities(text: &str) -> Result<Vec<Properties>> {
    Ok(parse_map(text)?
        .entities
        .into_iter()
        .map(|e| e.properties)
        .collect())
}

/// Rebuild collision brushes from the Plane, BrushSide and Brush chunks.
pub fn build_world(level: &LevelData) -> Result<World> {
    let mut brushes = Vec::with_capacity(level.brushes.len());
    for (i, raw) in level.brushes.iter().enumerate() {
        let start = raw.first_side as usize;
        let sides = level
            .brush_sides
            .get(start..start + raw.side_count as usize)
            .ok_or_else(|| LevelError::Format(format!("brush {i} references missing sides")))?;
        let mut faces = Vec::with_capacity(sides.len());
        for side in sides {
            let plane = level.planes.get(side.plane_index as usize).ok_or_else(|| {
                LevelError::Format(format!("brush {i} references missing plane {}", side.plane_index))
            })?;
            let surface = Surface {
                content_flags: raw.content_flags,
                surface_flags: side.surface_flags,
                ..Default::default()
            };
            faces.push((
                geometry::Plane::new(plane.point.as_dvec3(), plane.normal.as_dvec3()),
                surface,
            ));
        }
        brushes.push(geometry::Brush::from_faces(faces));
    }
    Ok(World::new(brushes))
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::level::format::{self, BrushSide, Face, ModelVertex, Texture, Vertex};
    use crate::level::writer::write_level;

    fn cube_level() -> LevelData {
        let mut level = LevelData::default();
        for (axis, sign) in [(0, 1.0), (0, -1.0), (1, 1.0), (1, -1.0), (2, 1.0), (2, -1.0)] {
            let mut normal = Vec3::ZERO;
            normal[axis] = sign;
            level.brush_sides.push(BrushSide {
                plane_index: level.planes.len() as u32,
                surface_flags: 0,
            });
            level.planes.push(format::Plane {
                point: normal * 16.0,
                normal,
            });
        }
        level.brushes.push(format::Brush {
            content_flags: 1,
            first_side: 0,
            side_count: 6,
        });
        level.entities = "{\n\"classname\" \"worldspawn\"\n\"model\" \"*0\"\n}\n".into();
        level
    }

    #[test]
    fn round_trip() {
        let mut level = cube_level();
        level.vertices = vec![Vertex::default(); 3];
        level.model_vertices = (0..3).map(|index| ModelVertex { index }).collect();
        level.textures.push(Texture::new("stone"));
        level.faces.push(Face {
            texture_index: 0,
            vertex_start: 0,
            vertex_count: 3,
            mesh_vertex_start: 0,
            mesh_vertex_count: 3,
            normal: Vec3::Y,
        });
        level.models.push(format::Model {
            face_start: 0,
            face_count: 1,
        });
        let bytes = write_level(&level).unwrap();
        assert_eq!(read_level(&bytes).unwrap(), level);
    }

    #[test]
    fn rejects_bad_magic_and_truncation() {
        let mut bytes = write_level(&cube_level()).unwrap();
        assert!(matches!(read_level(&bytes[..20]), Err(LevelError::Format(_))));

        let len = bytes.len();
        assert!(matches!(read_level(&bytes[..len - 4]), Err(LevelError::Format(_))));

        bytes[0] = b'X';
        let err = read_level(&bytes).unwrap_err();
        assert!(err.to_string().contains("invalid magic"));
    }

    #[test]
    fn rejects_dangling_indices() {
        let mut level = cube_level();
        level.brush_sides[3].plane_index = 99;
        let bytes = write_level(&level).unwrap();
        assert!(matches!(read_level(&bytes), Err(LevelError::Format(_))));
    }

    #[test]
    fn world_from_chunks() {
        let level = cube_level();
        let world = build_world(&level).unwrap();
        assert_eq!(world.brushes().len(), 1);
        let brush = world.brush(0).unwrap();
        assert_eq!(brush.planes().len(), 6);
        assert_eq!(brush.contents(), 1);
        assert!(brush.point_in_brush(glam::DVec3::splat(15.0), 1e-5));
        assert!(!brush.point_in_brush(glam::DVec3::new(17.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn entity_text() {
        let entities = parse_entities(&cube_level().entities).unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].get("model"), Some("*0"));
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.tmf");
        std::fs::write(&path, write_level(&cube_level()).unwrap()).unwrap();
        let loaded = load_level(&path).unwrap();
        assert_eq!(loaded.entities[0].get("classname"), Some("worldspawn"));
        assert_eq!(loaded.world.brushes().len(), 1);
        assert!(load_level(&dir.path().join("missing.tmf")).is_err());
    }
}
