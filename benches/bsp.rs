use criterion::{Criterion, criterion_group, criterion_main};
use glam::DVec3;
use tremor_level::bsp::{BspFace, face_bsp, make_tree_portals};
use tremor_level::geometry::{Brush, Plane};

fn box_brush(mins: DVec3, maxs: DVec3) -> Brush {
    Brush::new(vec![
        Plane::new(maxs, DVec3::X),
        Plane::new(mins, -DVec3::X),
        Plane::new(maxs, DVec3::Y),
        Plane::new(mins, -DVec3::Y),
        Plane::new(maxs, DVec3::Z),
        Plane::new(mins, -DVec3::Z),
    ])
}

/// A floor slab with an `n x n` field of pillars, crossing the block grid.
fn pillar_field(n: usize) -> Vec<Brush> {
    let spacing = 192.0;
    let extent = spacing * n as f64;
    let mut brushes = vec![box_brush(
        DVec3::new(-64.0, -16.0, -64.0),
        DVec3::new(extent, 0.0, extent),
    )];
    for i in 0..n {
        for j in 0..n {
            let x = i as f64 * spacing;
            let z = j as f64 * spacing;
            brushes.push(box_brush(
                DVec3::new(x, 0.0, z),
                DVec3::new(x + 32.0, 128.0 + 16.0 * ((i + j) % 4) as f64, z + 32.0),
            ));
        }
    }
    brushes
}

fn bench_brush_sides(c: &mut Criterion) {
    let brushes = pillar_field(12);

    c.bench_function("brush_sides_145", |b| {
        b.iter(|| {
            brushes
                .iter()
                .map(|brush| brush.make_faces().len())
                .sum::<usize>()
        });
    });
}

fn bench_face_bsp(c: &mut Criterion) {
    // ~870 structural faces spread over several 1024 unit blocks
    let faces = BspFace::from_brushes(&pillar_field(12));

    c.bench_function("face_bsp_pillars_12x12", |b| {
        b.iter(|| face_bsp(faces.clone()));
    });
}

fn bench_portals(c: &mut Criterion) {
    let faces = BspFace::from_brushes(&pillar_field(6));
    let tree = face_bsp(faces);

    c.bench_function("tree_portals_pillars_6x6", |b| {
        b.iter(|| {
            let mut tree = tree.clone();
            make_tree_portals(&mut tree);
            tree.portal_count()
        });
    });
}

criterion_group!(benches, bench_brush_sides, bench_face_bsp, bench_portals);
criterion_main!(benches);
