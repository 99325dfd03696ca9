use std::fmt::Write as _;
use std::path::Path;

use glam::DVec3;
use tracing::{debug, info};

use crate::error::{LevelError, Result};
use crate::geometry::{Brush, Plane, Surface, TextureAttributes};

/// Texture name the editor assigns to faces that should never be drawn.
pub const EMPTY_TEXTURE: &str = "__TB_empty";

/// Ordered key/value pairs of one entity. Keys are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties(Vec<(String, String)>);

impl Properties {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Set `key`, replacing an existing value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let i = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(i).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MapEntity {
    pub properties: Properties,
    pub brushes: Vec<Brush>,
}

impl MapEntity {
    pub fn classname(&self) -> Option<&str> {
        self.properties.get("classname")
    }
}

/// A parsed map source: entities in file order.
#[derive(Debug, Clone, Default)]
pub struct MapFile {
    pub entities: Vec<MapEntity>,
}

impl MapFile {
    /// Index of the last `worldspawn` entity.
    pub fn worldspawn_index(&self) -> Option<usize> {
        self.entities
            .iter()
            .rposition(|e| e.classname() == Some("worldspawn"))
    }

    /// Origins of every `info_player_start`, in engine axes.
    pub fn player_starts(&self) -> Vec<DVec3> {
        self.entities
            .iter()
            .filter(|e| e.classname() == Some("info_player_start"))
            .filter_map(|e| e.properties.get("origin"))
            .filter_map(|origin| {
                let v: Vec<f64> = origin
                    .split_whitespace()
                    .map(str::parse)
                    .collect::<std::result::Result<_, _>>()
                    .ok()?;
                (v.len() == 3).then(|| to_engine_axes([v[0], v[1], v[2]]))
            })
            .collect()
    }
}

/// Map editor `(x, y, z)` to engine `(y, z, x)`.
pub fn to_engine_axes(p: [f64; 3]) -> DVec3 {
    DVec3::new(p[1], p[2], p[0])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Top,
    Entity,
    Brush,
}

/// Parse map source text.
pub fn parse_map(text: &str) -> Result<MapFile> {
    let mut map = MapFile::default();
    let mut block = Block::Top;
    let mut entity = MapEntity::default();
    let mut sides: Vec<(Plane, Surface)> = Vec::new();

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        match (line, block) {
            ("{", Block::Top) => block = Block::Entity,
            ("{", Block::Entity) => block = Block::Brush,
            ("{", Block::Brush) => {
                return Err(LevelError::parse(line_no, "'{' inside a brush"));
            }
            ("}", Block::Brush) => {
                entity.brushes.push(Brush::from_faces(std::mem::take(&mut sides)));
                block = Block::Entity;
            }
            ("}", Block::Entity) => {
                map.entities.push(std::mem::take(&mut entity));
                block = Block::Top;
            }
            ("}", Block::Top) => {
                return Err(LevelError::parse(line_no, "'}' outside of any entity"));
            }
            (_, Block::Entity) => {
                let (key, value) = parse_key_value(line, line_no)?;
                entity.properties.insert(key, value);
            }
            (_, Block::Brush) => sides.push(parse_side(line, line_no)?),
            (_, Block::Top) => {
                return Err(LevelError::parse(line_no, format!("unexpected '{line}'")));
            }
        }
    }

    if block != Block::Top {
        return Err(LevelError::parse(
            text.lines().count(),
            "unterminated block at end of file",
        ));
    }
    debug!(entities = map.entities.len(), "parsed map");
    Ok(map)
}

/// Read and parse a map file.
pub fn read_map(path: &Path) -> Result<MapFile> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        LevelError::Input(format!("Failed to read map {}: {e}", path.display()))
    })?;
    let map = parse_map(&text)?;
    for start in map.player_starts() {
        info!(x = start.x, y = start.y, z = start.z, "player start");
    }
    Ok(map)
}

/// Parse a `"key" "value"` line.
pub fn parse_key_value(line: &str, line_no: usize) -> Result<(String, String)> {
    let inner = line
        .strip_prefix('"')
        .and_then(|l| l.strip_suffix('"'))
        .ok_or_else(|| LevelError::parse(line_no, "expected a quoted key/value pair"))?;
    let (key, value) = inner
        .split_once("\" \"")
        .ok_or_else(|| LevelError::parse(line_no, "expected a quoted key/value pair"))?;
    Ok((key.to_string(), value.to_string()))
}

/// Parse one brush side:
/// `( x y z ) ( x y z ) ( x y z ) TEXTURE offx offy angle scalex scaley [content surface]`.
pub fn parse_side(line: &str, line_no: usize) -> Result<(Plane, Surface)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let number = |i: usize| -> Result<f64> {
        let token = tokens
            .get(i)
            .ok_or_else(|| LevelError::parse(line_no, format!("missing field {i}")))?;
        token
            .parse()
            .map_err(|_| LevelError::parse(line_no, format!("bad number '{token}'")))
    };
    let flags = |i: usize| -> Result<u32> {
        match tokens.get(i) {
            None => Ok(0),
            Some(token) => token
                .parse::<i64>()
                .map(|v| v as u32)
                .map_err(|_| LevelError::parse(line_no, format!("bad flags '{token}'"))),
        }
    };

    let mut points = [DVec3::ZERO; 3];
    for (p, point) in points.iter_mut().enumerate() {
        let base = p * 5;
        if tokens.get(base) != Some(&"(") || tokens.get(base + 4) != Some(&")") {
            return Err(LevelError::parse(line_no, "expected '( x y z )'"));
        }
        *point = to_engine_axes([number(base + 1)?, number(base + 2)?, number(base + 3)?]);
    }

    let texture_name = tokens
        .get(15)
        .ok_or_else(|| LevelError::parse(line_no, "missing texture name"))?
        .to_string();
    let texture = TextureAttributes {
        offset_u: number(16)?,
        offset_v: number(17)?,
        angle: number(18)?,
        scale_u: number(19)?,
        scale_v: number(20)?,
    };
    let surface = Surface {
        content_flags: flags(21)?,
        surface_flags: flags(22)?,
        texture_name,
        texture,
    };
    Ok((Plane::from_points_quake_style(points), surface))
}

/// Write entities back out as map text, without brushes.
pub fn format_entities<'a>(entities: impl IntoIterator<Item = &'a Properties>) -> String {
    let mut out = String::new();
    for properties in entities {
        out.push_str("{\n");
        for (k, v) in properties.iter() {
            let _ = writeln!(out, "\"{k}\" \"{v}\"");
        }
        out.push_str("}\n");
    }
    out
}
