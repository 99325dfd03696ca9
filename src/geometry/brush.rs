use std::sync::OnceLock;

use glam::DVec3;
use tracing::warn;

use crate::geometry::plane::{INTERSECT_EPSILON, Plane};
use crate::geometry::winding::Winding;

/// Tolerance for [`Brush::point_in_brush`] when deriving brush vertices.
pub const POINT_EPSILON: f64 = 0.000_01;

/// Tolerance used by [`Brush::get_ray_intersection`] when deciding whether an
/// exact plane hit lies on the brush boundary.
pub const BOUNDARY_EPSILON: f64 = 0.001;

/// Vertices closer than this collapse into one when grouping per-plane points.
const VERTEX_MERGE_EPSILON: f64 = 0.000_001;

/// Texture projection parameters of a brush side, as authored in the map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureAttributes {
    pub scale_u: f64,
    pub scale_v: f64,
    pub offset_u: f64,
    pub offset_v: f64,
    /// Rotation in degrees.
    pub angle: f64,
}

impl Default for TextureAttributes {
    fn default() -> Self {
        Self {
            scale_u: 1.0,
            scale_v: 1.0,
            offset_u: 0.0,
            offset_v: 0.0,
            angle: 0.0,
        }
    }
}

/// Material and solidity metadata attached to one bounding plane.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Surface {
    pub content_flags: u32,
    pub surface_flags: u32,
    pub texture_name: String,
    pub texture: TextureAttributes,
}

/// One face of a brush: its plane, the wound polygon and the surface data.
///
/// `winding` is empty when the plane does not contribute a face (degenerate or
/// redundant plane).
#[derive(Debug, Clone)]
pub struct Side {
    pub plane: Plane,
    pub winding: Winding,
    pub surface: Surface,
}

/// Closest hit of a ray against a brush.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: DVec3,
    /// Travelled distance divided by the ray's maximum distance.
    pub fraction: f64,
    /// Index into [`Brush::planes`] of the plane that was hit.
    pub plane_index: usize,
}

/// Convex solid bounded by a set of planes.
#[derive(Debug, Clone)]
pub struct Brush {
    planes: Vec<Plane>,
    surfaces: Vec<Surface>,
    sides: OnceLock<Vec<Side>>,
}

impl Brush {
    /// Brush with default surfaces on every plane.
    pub fn new(planes: Vec<Plane>) -> Self {
        let surfaces = vec![Surface::default(); planes.len()];
        Self {
            planes,
            surfaces,
            sides: OnceLock::new(),
        }
    }

    /// Brush from `(plane, surface)` pairs in authoring order.
    pub fn from_faces(faces: Vec<(Plane, Surface)>) -> Self {
        let (planes, surfaces) = faces.into_iter().unzip();
        Self {
            planes,
            surfaces,
            sides: OnceLock::new(),
        }
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    /// Bitwise OR of every side's content flags.
    pub fn contents(&self) -> u32 {
        self.surfaces.iter().fold(0, |acc, s| acc | s.content_flags)
    }

    /// Whether `point` lies inside every bounding plane, within `epsilon`.
    pub fn point_in_brush(&self, point: DVec3, epsilon: f64) -> bool {
        self.planes.iter().all(|p| p.point_distance(point) <= epsilon)
    }

    /// Corner points of the brush, grouped by the plane they lie on.
    ///
    /// Group `i` holds the vertices of plane `i` in no particular order; planes
    /// that do not touch the solid get an empty group.
    pub fn generate_vertices(&self) -> Vec<Vec<DVec3>> {
        let n = self.planes.len();
        let mut groups = Vec::with_capacity(n);
        for p1 in &self.planes {
            let mut points: Vec<DVec3> = Vec::new();
            for j in 0..n {
                for k in j..n {
                    let Some(point) =
                        p1.intersect_point(&self.planes[j], &self.planes[k], INTERSECT_EPSILON)
                    else {
                        continue;
                    };
                    if !self.point_in_brush(point, POINT_EPSILON) {
                        continue;
                    }
                    if points.iter().any(|q| q.distance(point) < VERTEX_MERGE_EPSILON) {
                        continue;
                    }
                    points.push(point);
                }
            }
            groups.push(points);
        }
        groups
    }

    /// Wind each vertex group into a polygon on its plane.
    ///
    /// Groups with fewer than three points become empty windings.
    pub fn wind(&self, groups: Vec<Vec<DVec3>>) -> Vec<Winding> {
        self.planes
            .iter()
            .zip(groups)
            .map(|(plane, points)| {
                if points.len() < 3 {
                    Winding::from_points(*plane, Vec::new())
                } else {
                    Winding::from_points(*plane, points)
                }
            })
            .collect()
    }

    /// Build one [`Side`] per plane.
    pub fn make_faces(&self) -> Vec<Side> {
        let windings = self.wind(self.generate_vertices());
        windings
            .into_iter()
            .zip(&self.surfaces)
            .map(|(winding, surface)| {
                if let [v0, v1, v2, ..] = winding.points() {
                    if !check_ccw(*v0, *v1, *v2, winding.plane()) {
                        warn!(texture = %surface.texture_name, "bad normal detected on brush side");
                    }
                }
                Side {
                    plane: *winding.plane(),
                    winding,
                    surface: surface.clone(),
                }
            })
            .collect()
    }

    /// Sides of the brush, computed on first use.
    pub fn sides(&self) -> &[Side] {
        self.sides.get_or_init(|| self.make_faces())
    }

    /// Closest point where a ray enters the brush.
    ///
    /// `dir` must be normalized. Hits further than `max_distance` or outside
    /// the brush are ignored. The reported point is pulled back towards the
    /// origin by `epsilon` units (never past the origin).
    pub fn get_ray_intersection(
        &self,
        origin: DVec3,
        dir: DVec3,
        max_distance: f64,
        epsilon: f64,
    ) -> Option<RayHit> {
        if max_distance <= 0.0 {
            return None;
        }
        let mut best: Option<(f64, usize)> = None;
        for (i, plane) in self.planes.iter().enumerate() {
            let Some(t) = plane.ray_parameter(origin, dir) else {
                continue;
            };
            if t > max_distance {
                continue;
            }
            let exact = origin + t * dir;
            let inside = self
                .planes
                .iter()
                .enumerate()
                .all(|(j, other)| j == i || other.point_distance(exact) <= BOUNDARY_EPSILON);
            if !inside {
                continue;
            }
            if best.is_none_or(|(bt, _)| t < bt) {
                best = Some((t, i));
            }
        }

        best.map(|(t, plane_index)| {
            let travelled = (t - epsilon).max(0.0);
            RayHit {
                point: origin + travelled * dir,
                fraction: travelled / max_distance,
                plane_index,
            }
        })
    }
}

/// Whether the triangle `v0 v1 v2` winds counter-clockwise around `plane.normal`.
pub fn check_ccw(v0: DVec3, v1: DVec3, v2: DVec3, plane: &Plane) -> bool {
    (v1 - v0).cross(v2 - v0).dot(plane.normal) >= 0.0
}
