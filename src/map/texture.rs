use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use glam::{DVec2, DVec3};
use tracing::{debug, warn};

use crate::error::{LevelError, Result};
use crate::geometry::TextureAttributes;

/// Size assumed for textures missing from the cache.
pub const DEFAULT_TEXTURE_SIZE: (u32, u32) = (64, 64);

/// Projection axes: `(plane normal, u axis, v axis)` for floor, ceiling and
/// the four wall directions, in engine axes.
const BASE_AXES: [[DVec3; 3]; 6] = [
    [DVec3::new(0.0, 1.0, 0.0), DVec3::new(0.0, 0.0, 1.0), DVec3::new(-1.0, 0.0, 0.0)],
    [DVec3::new(0.0, -1.0, 0.0), DVec3::new(0.0, 0.0, 1.0), DVec3::new(-1.0, 0.0, 0.0)],
    [DVec3::new(0.0, 0.0, 1.0), DVec3::new(1.0, 0.0, 0.0), DVec3::new(0.0, -1.0, 0.0)],
    [DVec3::new(0.0, 0.0, -1.0), DVec3::new(1.0, 0.0, 0.0), DVec3::new(0.0, -1.0, 0.0)],
    [DVec3::new(1.0, 0.0, 0.0), DVec3::new(0.0, 0.0, 1.0), DVec3::new(0.0, -1.0, 0.0)],
    [DVec3::new(-1.0, 0.0, 0.0), DVec3::new(0.0, 0.0, 1.0), DVec3::new(0.0, -1.0, 0.0)],
];

/// Texture dimensions keyed by texture name.
#[derive(Debug, Clone, Default)]
pub struct TextureCache {
    sizes: HashMap<String, (u32, u32)>,
}

impl TextureCache {
    /// Location of the cache file inside a data directory.
    pub fn path_in(data_dir: &Path) -> PathBuf {
        data_dir.join("textures").join("texturecache.txt")
    }

    /// Load `<data_dir>/textures/texturecache.txt`.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = Self::path_in(data_dir);
        let text = std::fs::read_to_string(&path).map_err(|e| {
            LevelError::Input(format!("Failed to read texture cache {}: {e}", path.display()))
        })?;
        let cache = Self::parse(&text)?;
        debug!(textures = cache.len(), path = %path.display(), "loaded texture cache");
        Ok(cache)
    }

    /// Parse cache text: one `name width height` entry per line.
    pub fn parse(text: &str) -> Result<Self> {
        let mut sizes = HashMap::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let bad = || LevelError::Input(format!("Bad texture cache entry on line {}: '{line}'", i + 1));
            let mut fields = line.split_whitespace();
            let (Some(name), Some(w), Some(h)) = (fields.next(), fields.next(), fields.next()) else {
                return Err(bad());
            };
            let w = w.parse().map_err(|_| bad())?;
            let h = h.parse().map_err(|_| bad())?;
            sizes.insert(name.to_string(), (w, h));
        }
        Ok(Self { sizes })
    }

    pub fn insert(&mut self, name: impl Into<String>, size: (u32, u32)) {
        self.sizes.insert(name.into(), size);
    }

    pub fn get(&self, name: &str) -> Option<(u32, u32)> {
        self.sizes.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

/// Planar texture coordinates of `point` on a face with `normal`.
pub fn calculate_uv(
    texture_size: (u32, u32),
    normal: DVec3,
    point: DVec3,
    attributes: &TextureAttributes,
) -> DVec2 {
    let mut best = 0;
    let mut best_dot = 0.0;
    for (i, axes) in BASE_AXES.iter().enumerate() {
        let dot = axes[0].dot(normal);
        if dot > best_dot {
            best_dot = dot;
            best = i;
        }
    }
    let mut u_axis = BASE_AXES[best][1];
    let mut v_axis = BASE_AXES[best][2];

    let sv = first_nonzero(u_axis);
    let tv = first_nonzero(v_axis);
    let (sin, cos) = attributes.angle.to_radians().sin_cos();
    for axis in [&mut u_axis, &mut v_axis] {
        let (s, t) = (axis[sv], axis[tv]);
        axis[sv] = cos * s - sin * t;
        axis[tv] = sin * s + cos * t;
    }

    let u = attributes.offset_u + (u_axis / scale(attributes.scale_u)).dot(point);
    let v = attributes.offset_v + (v_axis / scale(attributes.scale_v)).dot(point);
    DVec2::new(u / texture_size.0 as f64, v / texture_size.1 as f64)
}

fn first_nonzero(v: DVec3) -> usize {
    if v.x != 0.0 {
        0
    } else if v.y != 0.0 {
        1
    } else {
        2
    }
}

/// Editors write 0 for "unscaled".
fn scale(s: f64) -> f64 {
    if s == 0.0 { 1.0 } else { s }
}

/// Texture coordinate generator for one compile.
///
/// Falls back to [`DEFAULT_TEXTURE_SIZE`] for unknown textures and warns once
/// per missing name, and once per compile about rotated textures.
#[derive(Debug, Default)]
pub struct UvProjector {
    cache: TextureCache,
    missing: HashSet<String>,
    warned_angle: bool,
}

impl UvProjector {
    pub fn new(cache: TextureCache) -> Self {
        Self {
            cache,
            ..Default::default()
        }
    }

    pub fn texture_size(&mut self, name: &str) -> (u32, u32) {
        if let Some(size) = self.cache.get(name) {
            return size;
        }
        if self.missing.insert(name.to_string()) {
            warn!(texture = name, "texture not in cache, assuming 64x64");
        }
        DEFAULT_TEXTURE_SIZE
    }

    pub fn uv(
        &mut self,
        texture_name: &str,
        attributes: &TextureAttributes,
        normal: DVec3,
        point: DVec3,
    ) -> DVec2 {
        if attributes.angle != 0.0 && !self.warned_angle {
            warn!("texture angles are currently unstable and may not produce good results");
            self.warned_angle = true;
        }
        let size = self.texture_size(texture_name);
        calculate_uv(size, normal, point, attributes)
    }

    /// Names that were requested but not found in the cache.
    pub fn missing(&self) -> impl Iterator<Item = &str> {
        self.missing.iter().map(String::as_str)
    }
}
