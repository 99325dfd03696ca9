use std::collections::HashMap;

use glam::DVec3;
use tracing::debug;

use crate::bsp::Tree;
use crate::geometry::{self, Surface};
use crate::level::format::{
    self, BrushSide, Face, LevelData, Model, ModelVertex, SURF_NODRAW, Texture, Vertex,
};
use crate::map::{EMPTY_TEXTURE, MapFile, UvProjector, format_entities};

/// Whether a side produces renderable geometry.
pub fn is_drawn(surface: &Surface) -> bool {
    surface.texture_name != EMPTY_TEXTURE && surface.surface_flags & SURF_NODRAW == 0
}

/// Accumulates chunk records for one level.
#[derive(Debug)]
pub struct LevelBuilder<'a> {
    level: LevelData,
    texture_index: HashMap<String, i32>,
    projector: &'a mut UvProjector,
}

impl<'a> LevelBuilder<'a> {
    pub fn new(projector: &'a mut UvProjector) -> Self {
        Self {
            level: LevelData::default(),
            texture_index: HashMap::new(),
            projector,
        }
    }

    /// Append collision records for `brushes`: one plane and one side per
    /// bounding plane, one brush record per brush.
    pub fn add_brushes(&mut self, brushes: &[geometry::Brush]) {
        for brush in brushes {
            let first_side = self.level.brush_sides.len() as u32;
            for (plane, surface) in brush.planes().iter().zip(brush.surfaces()) {
                let plane_index = self.level.planes.len() as u32;
                self.level.planes.push(format::Plane {
                    point: plane.point.as_vec3(),
                    normal: plane.normal.as_vec3(),
                });
                self.level.brush_sides.push(BrushSide {
                    plane_index,
                    surface_flags: surface.surface_flags,
                });
            }
            self.level.brushes.push(format::Brush {
                content_flags: brush.contents(),
                first_side,
                side_count: brush.planes().len() as u32,
            });
        }
    }

    /// Index of `name` in the texture table, adding it on first use.
    pub fn texture(&mut self, name: &str) -> i32 {
        if let Some(&index) = self.texture_index.get(name) {
            return index;
        }
        let index = self.level.textures.len() as i32;
        self.level.textures.push(Texture::new(name));
        self.texture_index.insert(name.to_string(), index);
        index
    }

    /// Emit a convex polygon as a triangle fan.
    ///
    /// Returns `false` when the surface is hidden or the polygon is degenerate.
    pub fn add_face(&mut self, points: &[DVec3], normal: DVec3, surface: &Surface) -> bool {
        if points.len() < 3 || !is_drawn(surface) {
            return false;
        }
        let texture_index = self.texture(&surface.texture_name);
        let vertex_start = self.level.vertices.len() as u32;
        let mesh_vertex_start = self.level.model_vertices.len() as u32;

        for &point in points {
            let uv = self
                .projector
                .uv(&surface.texture_name, &surface.texture, normal, point);
            self.level.vertices.push(Vertex {
                position: point.as_vec3(),
                normal: normal.as_vec3(),
                texcoord: uv.as_vec2(),
            });
        }
        for i in 2..points.len() as u32 {
            for index in [vertex_start, vertex_start + i - 1, vertex_start + i] {
                self.level.model_vertices.push(ModelVertex { index });
            }
        }

        self.level.faces.push(Face {
            texture_index,
            vertex_start,
            vertex_count: points.len() as u32,
            mesh_vertex_start,
            mesh_vertex_count: (self.level.model_vertices.len() as u32) - mesh_vertex_start,
            normal: normal.as_vec3(),
        });
        true
    }

    /// Close a model over every face added since `face_start`. Returns its index.
    pub fn finish_model(&mut self, face_start: u32) -> usize {
        let face_count = self.level.faces.len() as u32 - face_start;
        self.level.models.push(Model {
            face_start,
            face_count,
        });
        self.level.models.len() - 1
    }

    pub fn face_count(&self) -> u32 {
        self.level.faces.len() as u32
    }

    pub fn finish(self, entities: String) -> LevelData {
        LevelData {
            entities,
            ..self.level
        }
    }
}

/// Turn a parsed map into chunk data.
///
/// The worldspawn model is drawn from the fragments of `world_tree`, which must
/// have been built from the worldspawn brushes. Every other entity with brushes
/// becomes a model drawn from its brush sides. Brush entities get a
/// `"model" "*N"` key and lose their brushes.
pub fn build_level(mut map: MapFile, world_tree: &Tree, projector: &mut UvProjector) -> LevelData {
    let world = map.worldspawn_index();
    let mut builder = LevelBuilder::new(projector);

    for (i, entity) in map.entities.iter_mut().enumerate() {
        let is_world = Some(i) == world;
        if !is_world && entity.brushes.is_empty() {
            continue;
        }
        let brushes = std::mem::take(&mut entity.brushes);
        builder.add_brushes(&brushes);

        let face_start = builder.face_count();
        if is_world {
            for face in world_tree.faces() {
                let Some(brush) = brushes.get(face.source.brush) else {
                    continue;
                };
                let Some(surface) = brush.surfaces().get(face.source.side) else {
                    continue;
                };
                builder.add_face(face.winding.points(), face.plane().normal, surface);
            }
        } else {
            for brush in &brushes {
                for side in brush.sides() {
                    builder.add_face(side.winding.points(), side.plane.normal, &side.surface);
                }
            }
        }
        let model = builder.finish_model(face_start);
        debug!(
            entity = i,
            classname = entity.classname().unwrap_or_default(),
            model,
            faces = builder.face_count() - face_start,
            "emitted model"
        );
        entity.properties.insert("model", format!("*{model}"));
    }

    let entities = format_entities(map.entities.iter().map(|e| &e.properties));
    builder.finish(entities)
}
