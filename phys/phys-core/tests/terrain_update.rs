//! Terrain creation and partial heightmap updates through the world.

use approx::assert_relative_eq;
use nalgebra::{Point3, Vector3};
use phys_core::{
    intersect, Aabb, Behavior, HeightMap, PhysError, PhysicsConfig, PhysicsWorld, Shape,
    TerrainParams,
};

const SEGMENTS: usize = 16;

fn flat_world(offset: Vector3<f64>) -> PhysicsWorld {
    let mut world = PhysicsWorld::new(PhysicsConfig::default()).unwrap();
    let samples = vec![0.0_f32; 16];
    let heights = HeightMap::new(&samples, 4, 4).unwrap();
    world
        .create_terrain(
            &heights,
            TerrainParams::new(SEGMENTS, SEGMENTS, 1.0).with_offset(offset),
        )
        .unwrap();
    world
}

fn grid_heights(world: &PhysicsWorld) -> Vec<f64> {
    let terrain = world.terrain();
    let mut out = Vec::new();
    for iz in 0..=SEGMENTS {
        for ix in 0..=SEGMENTS {
            out.push(terrain.height(ix, iz).unwrap());
        }
    }
    out
}

#[test]
fn test_update_leaves_points_outside_region_untouched() {
    let offset = Vector3::new(-2.0, 1.0, 3.0);
    let mut world = flat_world(offset);
    let before = grid_heights(&world);

    let raised = vec![2.0_f32; 16];
    let heights = HeightMap::new(&raised, 4, 4).unwrap();
    // World X 1.5..6.2 and Z 5.0..9.0 cover columns 4..=8 and rows 2..=6.
    let region = Aabb::new(Point3::new(1.5, -10.0, 5.0), Point3::new(6.2, 10.0, 9.0));
    world.update_terrain_heightmap(&heights, &region).unwrap();
    let after = grid_heights(&world);

    for iz in 0..=SEGMENTS {
        for ix in 0..=SEGMENTS {
            let i = iz * (SEGMENTS + 1) + ix;
            let inside = (4..=8).contains(&ix) && (2..=6).contains(&iz);
            if inside {
                assert_relative_eq!(after[i], 2.0, epsilon = 1e-12);
            } else {
                assert_eq!(after[i], before[i], "vertex ({ix}, {iz}) changed");
            }
        }
    }

    let bounds = *world.terrain().aabb().unwrap();
    let mesh = world.terrain().mesh().unwrap();
    for p in mesh.points() {
        assert!(bounds.contains_point(&(p + offset)));
    }
    assert_relative_eq!(bounds.min.y, 1.0, epsilon = 1e-12);
    assert_relative_eq!(bounds.max.y, 3.0, epsilon = 1e-12);
}

#[test]
fn test_raised_terrain_is_found_by_queries() {
    let mut world = flat_world(Vector3::zeros());
    let raised = vec![2.0_f32; 16];
    let heights = HeightMap::new(&raised, 4, 4).unwrap();
    let region = Aabb::new(Point3::new(3.5, -1.0, 2.0), Point3::new(8.2, 1.0, 6.0));
    world.update_terrain_heightmap(&heights, &region).unwrap();

    let ground = world.terrain().body().unwrap().proxy().world_shape();

    let on_plateau = Shape::sphere(0.5).at(Point3::new(6.0, 2.3, 4.0));
    let hit = intersect(&on_plateau, ground).unwrap();
    assert_relative_eq!(hit.point.y, 2.0, epsilon = 1e-9);
    assert_relative_eq!(hit.normal, -Vector3::y(), epsilon = 1e-9);
    assert_relative_eq!(hit.dist, -0.2, epsilon = 1e-9);

    let on_flat = Shape::sphere(0.5).at(Point3::new(12.0, 0.3, 12.0));
    let hit = intersect(&on_flat, ground).unwrap();
    assert_relative_eq!(hit.point.y, 0.0, epsilon = 1e-9);

    // Far above the old flat surface, but now inside the plateau.
    let buried = Shape::sphere(0.5).at(Point3::new(6.0, 1.8, 4.0));
    assert!(intersect(&buried, ground).is_some());
}

#[test]
fn test_region_outside_grid_changes_nothing() {
    let mut world = flat_world(Vector3::zeros());
    let before = grid_heights(&world);

    let raised = vec![5.0_f32; 16];
    let heights = HeightMap::new(&raised, 4, 4).unwrap();
    let region = Aabb::new(Point3::new(40.0, -1.0, 40.0), Point3::new(50.0, 1.0, 50.0));
    world.update_terrain_heightmap(&heights, &region).unwrap();

    assert_eq!(grid_heights(&world), before);
}

#[test]
fn test_bodies_rest_on_edited_terrain() {
    let mut world = flat_world(Vector3::zeros());
    let raised = vec![1.0_f32; 16];
    let heights = HeightMap::new(&raised, 4, 4).unwrap();
    let region = Aabb::new(Point3::new(4.0, -1.0, 4.0), Point3::new(12.0, 1.0, 12.0));
    world.update_terrain_heightmap(&heights, &region).unwrap();

    let ball = world
        .create_object(Shape::sphere(0.5), Behavior::RigidBody)
        .unwrap();
    world
        .body_mut(ball)
        .unwrap()
        .set_position(Point3::new(8.0, 4.0, 8.0));

    for _ in 0..300 {
        world.update(1.0 / 60.0).unwrap();
    }
    let y = world.body(ball).unwrap().position().y;
    assert_relative_eq!(y, 1.5, epsilon = 0.02);
}

#[test]
fn test_invalid_terrain_requests_are_rejected() {
    let mut world = PhysicsWorld::new(PhysicsConfig::default()).unwrap();
    let samples = vec![0.0_f32; 16];
    let heights = HeightMap::new(&samples, 4, 4).unwrap();
    let region = Aabb::new(Point3::new(0.0, -1.0, 0.0), Point3::new(1.0, 1.0, 1.0));

    assert_eq!(
        world.update_terrain_heightmap(&heights, &region),
        Err(PhysError::TerrainNotCreated)
    );
    assert!(world
        .create_terrain(&heights, TerrainParams::new(0, 4, 1.0))
        .is_err());
    assert!(!world.terrain().is_created());

    assert!(HeightMap::new(&samples, 5, 4).is_err());
    assert!(HeightMap::new(&samples, 0, 0).is_err());
}
