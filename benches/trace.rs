use criterion::{Criterion, criterion_group, criterion_main};
use glam::DVec3;
use tremor_level::collision::{Body, World, step, trace};
use tremor_level::geometry::{Aabb, Brush, Plane};

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

/// Floor plus a ring of crates, 65 brushes in total.
fn crate_yard() -> World {
    let mut brushes = vec![box_brush(
        DVec3::new(-1024.0, -16.0, -1024.0),
        DVec3::new(1024.0, 0.0, 1024.0),
    )];
    for i in 0..64 {
        let angle = i as f64 / 64.0 * std::f64::consts::TAU;
        let center = DVec3::new(angle.cos() * 512.0, 24.0, angle.sin() * 512.0);
        brushes.push(box_brush(center - DVec3::splat(24.0), center + DVec3::splat(24.0)));
    }
    World::new(brushes)
}

fn bench_trace(c: &mut Criterion) {
    let world = crate_yard();
    let bounds = Aabb::cube(16.0);
    let targets: Vec<DVec3> = (0..256)
        .map(|i| {
            let angle = i as f64 / 256.0 * std::f64::consts::TAU;
            DVec3::new(angle.cos() * 800.0, 8.0 * (i % 8) as f64, angle.sin() * 800.0)
        })
        .collect();

    c.bench_function("trace_radial_256x65", |b| {
        b.iter(|| {
            targets
                .iter()
                .filter(|&&end| trace(&world, DVec3::new(0.0, 32.0, 0.0), end, &bounds).collided)
                .count()
        });
    });
}

fn bench_movement(c: &mut Criterion) {
    let world = crate_yard();

    c.bench_function("body_step_falling_60", |b| {
        b.iter(|| {
            let mut body = Body::new(DVec3::new(100.0, 200.0, 0.0), Aabb::cube(16.0));
            body.velocity = DVec3::new(40.0, 0.0, 10.0);
            for _ in 0..60 {
                step(&world, &mut body, 1.0 / 60.0);
            }
            body.position
        });
    });
}

criterion_group!(benches, bench_trace, bench_movement);
criterion_main!(benches);
