//! Benchmarks for collision detection and world stepping.
//!
//! Run with: cargo bench -p phys-core

#![allow(
    missing_docs,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    clippy::unwrap_used
)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use phys_core::{
    intersect, AllPairs, Behavior, BroadPhase, HeightMap, PhysicsConfig, PhysicsWorld, Shape,
    TerrainParams,
};

/// Rolling-hills height samples.
fn hill_samples(size: usize) -> Vec<f32> {
    (0..size * size)
        .map(|i| {
            let x = (i % size) as f32 / size as f32;
            let z = (i / size) as f32 / size as f32;
            (x * std::f32::consts::TAU * 2.0).sin() * (z * std::f32::consts::TAU).cos()
        })
        .collect()
}

fn terrain_world(segments: usize) -> PhysicsWorld {
    let mut world = PhysicsWorld::new(PhysicsConfig::default()).unwrap();
    let samples = hill_samples(64);
    let heights = HeightMap::new(&samples, 64, 64).unwrap();
    let half = segments as f64 * 0.5;
    world
        .create_terrain(
            &heights,
            TerrainParams::new(segments, segments, 1.0)
                .with_height_scale(2.0)
                .with_offset(Vector3::new(-half, 0.0, -half)),
        )
        .unwrap();
    world
}

fn scatter_bodies(world: &mut PhysicsWorld, count: usize, extent: f64, rng: &mut StdRng) {
    for i in 0..count {
        let shape = match i % 3 {
            0 => Shape::sphere(rng.gen_range(0.3..0.8)),
            1 => Shape::cuboid(Vector3::new(0.4, 0.4, 0.4)),
            _ => Shape::capsule(0.4, 0.3),
        };
        let handle = world.create_object(shape, Behavior::RigidBody).unwrap();
        world.body_mut(handle).unwrap().set_position(Point3::new(
            rng.gen_range(-extent..extent),
            rng.gen_range(2.0..8.0),
            rng.gen_range(-extent..extent),
        ));
    }
}

fn bench_terrain_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("terrain_query");

    for segments in [32, 128, 256] {
        let world = terrain_world(segments);
        let ground = world.terrain().body().unwrap().proxy().world_shape().clone();
        let mut rng = StdRng::seed_from_u64(1);
        let half = segments as f64 * 0.5;
        let probes: Vec<Shape> = (0..256)
            .map(|_| {
                Shape::sphere(0.5).at(Point3::new(
                    rng.gen_range(-half..half),
                    rng.gen_range(-2.0..2.0),
                    rng.gen_range(-half..half),
                ))
            })
            .collect();

        group.throughput(Throughput::Elements(probes.len() as u64));
        group.bench_with_input(BenchmarkId::new("sphere", segments), &probes, |b, probes| {
            b.iter(|| {
                probes
                    .iter()
                    .filter(|p| intersect(black_box(p), black_box(&ground)).is_some())
                    .count()
            });
        });
    }

    group.finish();
}

fn bench_broad_phase(c: &mut Criterion) {
    let mut group = c.benchmark_group("broad_phase");

    for count in [50, 200, 800] {
        let mut rng = StdRng::seed_from_u64(2);
        let extent = (count as f64).sqrt() * 2.0;
        let bounds: Vec<_> = (0..count)
            .map(|slot| {
                let center = Point3::new(
                    rng.gen_range(-extent..extent),
                    rng.gen_range(0.0..4.0),
                    rng.gen_range(-extent..extent),
                );
                (slot, phys_core::Aabb::from_center(center, Vector3::new(0.5, 0.5, 0.5)))
            })
            .collect();

        group.bench_with_input(BenchmarkId::new("all_pairs", count), &bounds, |b, bounds| {
            let mut broad_phase = AllPairs::new();
            b.iter(|| broad_phase.find_pairs(black_box(bounds), None).len());
        });
    }

    group.finish();
}

fn bench_world_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_step");
    group.sample_size(20);

    for count in [10, 50, 200] {
        group.bench_function(BenchmarkId::new("bodies_on_terrain", count), |b| {
            b.iter_batched(
                || {
                    let mut world = terrain_world(64);
                    let mut rng = StdRng::seed_from_u64(3);
                    scatter_bodies(&mut world, count, 20.0, &mut rng);
                    world
                },
                |mut world| {
                    for _ in 0..10 {
                        world.update(1.0 / 60.0).unwrap();
                    }
                    world
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_terrain_queries,
    bench_broad_phase,
    bench_world_step,
);
criterion_main!(benches);
