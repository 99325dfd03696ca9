use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::bsp::{BspFace, face_bsp, make_tree_portals};
use crate::config::CompileConfig;
use crate::error::{LevelError, Result};
use crate::level::{LevelData, build_level, write_level_file};
use crate::map::{TextureCache, UvProjector, read_map};

/// Counts and timings of a completed compile.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompileStats {
    pub vertices: usize,
    pub model_vertices: usize,
    pub faces: usize,
    pub models: usize,
    pub textures: usize,
    pub planes: usize,
    pub brush_sides: usize,
    pub brushes: usize,
    pub bsp_nodes: usize,
    pub bsp_leaves: usize,
    pub portals: usize,
    pub missing_textures: usize,
    pub bytes_written: usize,
    pub parse_secs: f64,
    pub bsp_secs: f64,
    pub generate_secs: f64,
    pub write_secs: f64,
    pub total_secs: f64,
}

impl CompileStats {
    fn record_level(&mut self, level: &LevelData) {
        self.vertices = level.vertices.len();
        self.model_vertices = level.model_vertices.len();
        self.faces = level.faces.len();
        self.models = level.models.len();
        self.textures = level.textures.len();
        self.planes = level.planes.len();
        self.brush_sides = level.brush_sides.len();
        self.brushes = level.brushes.len();
    }
}

/// Compiler orchestrator -- drives parse, BSP, emit and write.
pub struct Compiler;

impl Compiler {
    /// Compile `config.map` into `config.output`.
    pub fn run(config: &CompileConfig) -> Result<CompileStats> {
        let start = Instant::now();
        let mut stats = CompileStats::default();

        info!(map = %config.map.display(), "Starting compile");

        let cache = match &config.data_dir {
            Some(dir) => TextureCache::load(dir)?,
            None => {
                warn!("no data directory given, all textures assumed 64x64");
                TextureCache::default()
            }
        };
        let mut projector = UvProjector::new(cache);

        info!("Stage 1/4: Parse");
        let stage = Instant::now();
        let map = read_map(&config.map)?;
        let world = map
            .worldspawn_index()
            .ok_or_else(|| LevelError::Input("map has no worldspawn entity".into()))?;
        map.entities
            .par_iter()
            .flat_map_iter(|e| e.brushes.iter())
            .for_each(|brush| {
                brush.sides();
            });
        stats.parse_secs = stage.elapsed().as_secs_f64();
        info!(
            entities = map.entities.len(),
            world_brushes = map.entities[world].brushes.len(),
            "Parsed map"
        );

        info!("Stage 2/4: BSP");
        let stage = Instant::now();
        let faces = BspFace::from_brushes(&map.entities[world].brushes);
        let face_count = faces.len();
        let mut tree = face_bsp(faces);
        if config.portals {
            make_tree_portals(&mut tree);
        }
        stats.bsp_nodes = tree.node_count();
        stats.bsp_leaves = tree.leaf_count();
        stats.portals = tree.portal_count();
        stats.bsp_secs = stage.elapsed().as_secs_f64();
        info!(
            structural_faces = face_count,
            fragments = tree.faces().len(),
            nodes = stats.bsp_nodes,
            leaves = stats.bsp_leaves,
            portals = stats.portals,
            "Built world BSP"
        );

        info!("Stage 3/4: Generate");
        let stage = Instant::now();
        let level = build_level(map, &tree, &mut projector);
        stats.record_level(&level);
        stats.missing_textures = projector.missing().count();
        stats.generate_secs = stage.elapsed().as_secs_f64();

        info!(output = %config.output.display(), "Stage 4/4: Write");
        let stage = Instant::now();
        stats.bytes_written = write_level_file(&level, &config.output)?;
        stats.write_secs = stage.elapsed().as_secs_f64();

        stats.total_secs = start.elapsed().as_secs_f64();
        if let Some(path) = &config.report {
            write_report(&stats, path)?;
        }
        info!(
            faces = stats.faces,
            brushes = stats.brushes,
            bytes = stats.bytes_written,
            elapsed = ?start.elapsed(),
            "Compile complete"
        );
        Ok(stats)
    }
}

/// Write statistics as pretty JSON.
pub fn write_report(stats: &CompileStats, path: &Path) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut file, stats).map_err(std::io::Error::from)?;
    file.flush()?;
    info!(path = %path.display(), "Wrote compile report");
    Ok(())
}

/// Print the statistics block.
pub fn print_stats(stats: &CompileStats) {
    println!("==== STATS ====");
    println!("Vertices: {}", stats.vertices);
    println!("ModelVertices: {}", stats.model_vertices);
    println!("Faces: {}", stats.faces);
    println!("Models: {}", stats.models);
    println!("Textures: {}", stats.textures);
    println!("Planes: {}", stats.planes);
    println!("BrushSides: {}", stats.brush_sides);
    println!("Brushes: {}", stats.brushes);
    println!("BSP nodes: {} ({} leaves)", stats.bsp_nodes, stats.bsp_leaves);
    println!("Portals: {}", stats.portals);
    if stats.missing_textures > 0 {
        println!("Missing textures: {}", stats.missing_textures);
    }
    println!("Map parse time: {:.6} s", stats.parse_secs);
    println!("BSP time: {:.6} s", stats.bsp_secs);
    println!("Map generate time: {:.6} s", stats.generate_secs);
    println!("Serialize+write time: {:.6} s", stats.write_secs);
}
