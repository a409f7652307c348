//! End-to-end world scenarios.
//!
//! Each test drives a [`PhysicsWorld`] through whole ticks and checks a
//! property that must hold for any caller: static and living invariants,
//! momentum conservation, resting stability and handle safety.

use approx::assert_relative_eq;
use nalgebra::{Matrix3, Point3, Vector3};
use phys_core::{
    compute_mass_properties, intersect, is_supported, Behavior, HeightMap, Material,
    MaterialTable, PhysicsConfig, PhysicsWorld, Shape, ShapeKind, StepStats, TerrainParams,
};

const DT: f64 = 1.0 / 60.0;

fn default_world() -> PhysicsWorld {
    PhysicsWorld::new(PhysicsConfig::default()).unwrap()
}

fn run(world: &mut PhysicsWorld, ticks: usize) -> Vec<StepStats> {
    (0..ticks).map(|_| world.update(DT).unwrap()).collect()
}

fn flat_terrain(world: &mut PhysicsWorld) {
    let samples = vec![0.0_f32; 16];
    let heights = HeightMap::new(&samples, 4, 4).unwrap();
    world
        .create_terrain(
            &heights,
            TerrainParams::new(8, 8, 1.0).with_offset(Vector3::new(-4.0, 0.0, -4.0)),
        )
        .unwrap();
}

/// Closed unit cube as a triangle mesh, wound counter-clockwise from outside.
fn cube_mesh() -> Shape {
    let points = (0..8_u32)
        .map(|i| {
            let side = |bit: u32| if i & bit == 0 { -0.5 } else { 0.5 };
            Point3::new(side(1), side(2), side(4))
        })
        .collect();
    let indices = vec![
        0, 2, 1, 1, 2, 3, 4, 5, 6, 5, 7, 6, 0, 4, 2, 2, 4, 6, 1, 3, 5, 3, 7, 5, 0, 1, 4, 1, 5, 4,
        2, 6, 3, 3, 6, 7,
    ];
    Shape::mesh(points, indices).unwrap()
}

#[test]
fn test_static_bodies_never_move_or_gain_mass() {
    let mut world = default_world();
    let ground = world
        .create_object(Shape::ground_plane(0.0), Behavior::Static)
        .unwrap();
    let pillar = world
        .create_object(Shape::cuboid(Vector3::new(0.5, 2.0, 0.5)), Behavior::Static)
        .unwrap();
    world
        .body_mut(pillar)
        .unwrap()
        .set_position(Point3::new(0.0, 2.0, 0.0));
    let ball = world
        .create_object(Shape::sphere(0.5), Behavior::RigidBody)
        .unwrap();
    world
        .body_mut(ball)
        .unwrap()
        .set_position(Point3::new(0.2, 5.0, 0.0));

    for _ in 0..200 {
        world.update(DT).unwrap();
        for handle in [ground, pillar] {
            let body = world.body(handle).unwrap();
            assert_eq!(body.inv_mass(), 0.0);
            assert_eq!(*body.inv_inertia(), Matrix3::zeros());
            assert_eq!(body.momentum(), Vector3::zeros());
        }
        assert_eq!(
            world.body(pillar).unwrap().position(),
            Point3::new(0.0, 2.0, 0.0)
        );
    }
}

#[test]
fn test_living_bodies_never_spin() {
    let mut world = default_world();
    world
        .create_object(Shape::ground_plane(0.0), Behavior::Static)
        .unwrap();
    let player = world
        .create_object(Shape::capsule(0.5, 0.5), Behavior::Living)
        .unwrap();
    {
        let body = world.body_mut(player).unwrap();
        body.set_position(Point3::new(0.0, 3.0, 0.0));
        body.set_velocity(Vector3::new(1.0, 0.0, 0.5));
        body.set_angular_momentum(Vector3::new(3.0, -2.0, 1.0));
        body.apply_torque(Vector3::new(0.0, 10.0, 0.0));
    }

    for _ in 0..200 {
        world.update(DT).unwrap();
        let body = world.body(player).unwrap();
        assert_eq!(body.angular_velocity(), Vector3::zeros());
        assert_eq!(body.angular_momentum(), Vector3::zeros());
    }
}

#[test]
fn test_living_body_lands_and_reports_ground() {
    let mut world = default_world();
    world
        .create_object(Shape::ground_plane(0.0), Behavior::Static)
        .unwrap();
    let player = world
        .create_object(Shape::capsule(0.5, 0.5), Behavior::Living)
        .unwrap();
    world
        .body_mut(player)
        .unwrap()
        .set_position(Point3::new(0.0, 3.0, 0.0));

    world.update(DT).unwrap();
    assert!(!world.body(player).unwrap().living_on_ground());

    let stats = run(&mut world, 120);
    assert!(stats.iter().rev().take(30).all(|s| s.living == 1));

    let body = world.body(player).unwrap();
    assert!(body.living_on_ground());
    assert_relative_eq!(body.position().y, 1.0, epsilon = 1e-3);
    assert_eq!(body.rotation(), nalgebra::UnitQuaternion::identity());
}

#[test]
fn test_living_body_lands_on_terrain() {
    let mut world = default_world();
    flat_terrain(&mut world);
    let player = world
        .create_object(Shape::capsule(0.5, 0.5), Behavior::Living)
        .unwrap();
    world
        .body_mut(player)
        .unwrap()
        .set_position(Point3::new(0.3, 3.0, 0.2));

    world.update(DT).unwrap();
    assert!(!world.body(player).unwrap().living_on_ground());

    let stats = run(&mut world, 120);
    assert!(stats.iter().rev().take(30).all(|s| s.living == 1));

    let body = world.body(player).unwrap();
    assert!(body.living_on_ground());
    assert_relative_eq!(body.position().y, 1.0, epsilon = 0.02);
    assert_eq!(body.angular_momentum(), Vector3::zeros());
}

#[test]
fn test_sphere_mass_round_trip() {
    let r = 1.5;
    let props = compute_mass_properties(&Shape::sphere(r));
    let volume = 4.0 / 3.0 * std::f64::consts::PI * r * r * r;
    assert_relative_eq!(props.volume, volume, epsilon = 1e-9);

    let inertia = props.inertia_body().unwrap();
    assert_relative_eq!(
        inertia,
        Matrix3::from_diagonal_element(0.4 * volume * r * r),
        epsilon = 1e-9
    );
}

#[test]
fn test_elastic_collision_conserves_momentum() {
    let config = PhysicsConfig::default()
        .zero_gravity()
        .with_materials(MaterialTable::new(Material::elastic()));
    let mut world = PhysicsWorld::new(config).unwrap();

    let big = world
        .create_object(Shape::sphere(1.0), Behavior::RigidBody)
        .unwrap();
    let small = world
        .create_object(Shape::sphere(0.5), Behavior::RigidBody)
        .unwrap();
    for (handle, x, vx) in [(big, -3.0, 3.0), (small, 3.0, -1.0)] {
        let body = world.body_mut(handle).unwrap();
        body.set_damping(1.0).unwrap();
        body.set_position(Point3::new(x, 0.0, 0.0));
        body.set_velocity(Vector3::new(vx, 0.0, 0.0));
    }

    let before = world.total_linear_momentum();
    let stats = run(&mut world, 120);
    let after = world.total_linear_momentum();

    assert!(stats.iter().any(|s| s.colliding == 1));
    assert_relative_eq!(before, after, epsilon = 1e-9);
    assert!(world.body(small).unwrap().velocity().x > 0.0);
}

#[test]
fn test_dropped_sphere_comes_to_rest_on_plane() {
    let mut world = default_world();
    world
        .create_object(Shape::plane(Vector3::y(), 0.0), Behavior::Static)
        .unwrap();
    let ball = world
        .create_object(Shape::sphere(1.0), Behavior::RigidBody)
        .unwrap();
    world
        .body_mut(ball)
        .unwrap()
        .set_position(Point3::new(0.0, 5.0, 0.0));

    let stats = run(&mut world, 300);

    // The first impact bounces.
    assert!(stats.iter().any(|s| s.colliding > 0));

    // Settled contacts go through the resting branch only.
    let settled = &stats[240..];
    assert!(settled.iter().all(|s| s.colliding == 0));
    assert!(settled.iter().any(|s| s.resting > 0));

    let body = world.body(ball).unwrap();
    assert_relative_eq!(body.position().y, 1.0, epsilon = 0.02);
    assert!(body.velocity().norm() < 0.25);
}

#[test]
fn test_dropped_box_stops_sinking() {
    let mut world = default_world();
    world
        .create_object(Shape::ground_plane(0.0), Behavior::Static)
        .unwrap();
    let crate_box = world
        .create_object(Shape::cuboid(Vector3::new(0.5, 0.5, 0.5)), Behavior::RigidBody)
        .unwrap();
    world
        .body_mut(crate_box)
        .unwrap()
        .set_position(Point3::new(0.0, 2.0, 0.0));

    run(&mut world, 240);
    let mut lowest = f64::INFINITY;
    for _ in 0..120 {
        world.update(DT).unwrap();
        let body = world.body(crate_box).unwrap();
        lowest = lowest.min(body.aabb().min.y);
        assert!(body.velocity().y.abs() < 0.25);
    }

    // Penetration stays bounded by one tick of gravity.
    assert!(lowest > -0.02, "box sank to {lowest}");
    // A level landing produces no torque.
    assert_relative_eq!(
        world.body(crate_box).unwrap().angular_momentum().norm(),
        0.0,
        epsilon = 1e-9
    );
}

#[test]
fn test_dropped_mesh_rests_on_plane() {
    let mut world = default_world();
    world
        .create_object(Shape::ground_plane(0.0), Behavior::Static)
        .unwrap();
    let block = world
        .create_object(cube_mesh(), Behavior::RigidBody)
        .unwrap();
    assert_relative_eq!(world.body(block).unwrap().mass(), 1.0, epsilon = 1e-9);
    world
        .body_mut(block)
        .unwrap()
        .set_position(Point3::new(0.0, 2.0, 0.0));

    let stats = run(&mut world, 240);
    assert!(stats.iter().any(|s| s.colliding > 0));
    assert!(stats[180..].iter().any(|s| s.contacts > 0));

    let body = world.body(block).unwrap();
    assert_relative_eq!(body.position().y, 0.5, epsilon = 0.02);
    assert!(body.aabb().min.y > -0.02);
    assert!(body.velocity().norm() < 0.25);
}

#[test]
fn test_dropped_mesh_rests_on_terrain() {
    let mut world = default_world();
    flat_terrain(&mut world);
    let block = world
        .create_object(cube_mesh(), Behavior::RigidBody)
        .unwrap();
    world
        .body_mut(block)
        .unwrap()
        .set_position(Point3::new(0.3, 2.0, 0.2));

    let stats = run(&mut world, 240);
    assert!(stats[180..].iter().any(|s| s.contacts > 0));

    let body = world.body(block).unwrap();
    assert_relative_eq!(body.position().y, 0.5, epsilon = 0.02);
    assert!(body.velocity().norm() < 0.25);
}

#[test]
fn test_capsule_pairs_report_no_contact() {
    let a = Shape::capsule(1.0, 0.5);
    let b = Shape::capsule(1.0, 0.5).at(Point3::new(0.5, 0.0, 0.0));
    assert!(intersect(&a, &b).is_none());
    assert!(!is_supported(ShapeKind::Capsule, ShapeKind::Capsule));

    // The pair is still found by the broad phase; it just never resolves.
    let mut world = PhysicsWorld::new(PhysicsConfig::default().zero_gravity()).unwrap();
    world.create_object(a, Behavior::RigidBody).unwrap();
    world.create_object(b, Behavior::RigidBody).unwrap();
    let stats = world.update(DT).unwrap();
    assert_eq!(stats.candidate_pairs, 1);
    assert_eq!(stats.contacts, 0);
}

#[test]
fn test_released_handles_go_stale() {
    let mut world = default_world();
    let first = world
        .create_object(Shape::sphere(1.0), Behavior::RigidBody)
        .unwrap();
    world.release(first).unwrap();
    world.update(DT).unwrap();

    assert!(world.body(first).is_none());
    assert!(world.release(first).unwrap_err().is_invalid_handle());
    assert!(world.show_helper(first, true).is_err());

    let second = world
        .create_object(Shape::sphere(1.0), Behavior::RigidBody)
        .unwrap();
    assert_eq!(second.index(), first.index());
    assert!(world.body(first).is_none());
    assert!(world.body(second).is_some());
}
