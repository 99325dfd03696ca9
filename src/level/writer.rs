use std::path::Path;

use tracing::debug;

use crate::error::{LevelError, Result};
use crate::level::format::{
    ChunkType, DIRECTORY_SIZE, DirectoryEntry, HEADER_SIZE, Header, LevelData, align4,
};

/// Serialize a level into the chunked binary format.
pub fn write_level(level: &LevelData) -> Result<Vec<u8>> {
    let mut directory = [DirectoryEntry::default(); ChunkType::ALL.len()];
    let mut offset = align4(HEADER_SIZE + DIRECTORY_SIZE);
    for chunk in ChunkType::ALL {
        let length = level.chunk_bytes(chunk).len();
        let start = u32::try_from(offset)
            .map_err(|_| LevelError::Format(format!("{chunk} chunk starts beyond 4 GiB")))?;
        let length_u32 = u32::try_from(length)
            .map_err(|_| LevelError::Format(format!("{chunk} chunk is larger than 4 GiB")))?;
        directory[chunk.index()] = DirectoryEntry {
            type_tag: chunk.tag(),
            start,
            length: length_u32,
        };
        offset = align4(offset + length);
    }

    let mut out = Vec::with_capacity(offset);
    out.extend_from_slice(bytemuck::bytes_of(&Header::default()));
    out.extend_from_slice(bytemuck::cast_slice(&directory));
    for chunk in ChunkType::ALL {
        let entry = &directory[chunk.index()];
        out.resize(entry.start as usize, 0);
        out.extend_from_slice(level.chunk_bytes(chunk));
    }
    out.resize(align4(out.len()), 0);
    Ok(out)
}

/// Write a level to `path`. Returns the number of bytes written.
pub fn write_level_file(level: &LevelData, path: &Path) -> Result<usize> {
    let bytes = write_level(level)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &bytes)?;
    debug!(path = %path.display(), bytes = bytes.len(), "wrote level");
    Ok(bytes.len())
}
