//! Contact resolution.
//!
//! Contacts are resolved one at a time, in broad-phase order, directly on
//! body momenta. There is no contact caching and no iteration.
//!
//! # General contacts
//!
//! With `n` the contact normal (from A toward B), `r` the contact point
//! relative to each body's center of mass and `vrel = n · (vB − vA)`:
//!
//! - `vrel > tolerance`: separating, nothing happens.
//! - `|vrel| <= tolerance`: resting. Approaching relative normal velocity is
//!   removed from linear momentum, without restitution.
//! - otherwise: colliding. The impulse
//!   `j = −(1 + e) vrel / (1/mA + 1/mB + D_A + D_B)` is applied to both
//!   momenta and angular momenta, with `D = n · ((I⁻¹ (r × n)) × r)`.
//!
//! Both cases then apply friction, pulling the bodies' tangential contact
//! velocities together and decaying angular momentum, and push
//! interpenetrating bodies apart by a fraction of the overlap.
//!
//! # Living contacts
//!
//! A living body touching a static one only loses its momentum into the
//! ground. Idle living bodies on walkable ground also lose tangential
//! momentum, and interpenetration is corrected almost fully each tick.

use nalgebra::Vector3;
use phys_types::{Behavior, PhysicsConfig};

use crate::body::PhysObject;
use crate::narrow_phase::Intersection;

/// What the solver did with a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactOutcome {
    /// The bodies were already moving apart.
    Separating,
    /// Near-zero normal velocity; resolved by velocity projection.
    Resting,
    /// Resolved by an impulse with restitution.
    Colliding,
    /// A living body against static ground.
    Living,
    /// Neither body can move.
    Immovable,
}

/// Resolve a contact between `a` and `b`. The normal of `hit` points from
/// `a` toward `b`.
pub fn resolve_contact(
    a: &mut PhysObject,
    b: &mut PhysObject,
    hit: &Intersection,
    config: &PhysicsConfig,
) -> ContactOutcome {
    match (a.behavior(), b.behavior()) {
        (Behavior::Static, Behavior::Static) => ContactOutcome::Immovable,
        (Behavior::Living, Behavior::Static) => {
            resolve_living_contact(a, hit, config);
            ContactOutcome::Living
        }
        (Behavior::Static, Behavior::Living) => {
            resolve_living_contact(b, &hit.flipped(), config);
            ContactOutcome::Living
        }
        _ => resolve_general_contact(a, b, hit, config),
    }
}

/// Angular contribution `n · ((I⁻¹ (r × n)) × r)` of one body.
fn angular_term(body: &PhysObject, r: &Vector3<f64>, n: &Vector3<f64>) -> f64 {
    n.dot(&(body.inv_inertia * r.cross(n)).cross(r))
}

fn resolve_general_contact(
    a: &mut PhysObject,
    b: &mut PhysObject,
    hit: &Intersection,
    config: &PhysicsConfig,
) -> ContactOutcome {
    let inv_mass_sum = a.inv_mass + b.inv_mass;
    if inv_mass_sum <= 0.0 {
        return ContactOutcome::Immovable;
    }

    let n = hit.normal;
    let ra = hit.point - a.pos;
    let rb = hit.point - b.pos;
    let relative = b.point_velocity(&hit.point) - a.point_velocity(&hit.point);
    let vrel = n.dot(&relative);

    let tolerance = config.resting_tolerance;
    if vrel > tolerance {
        return ContactOutcome::Separating;
    }

    let material = config
        .materials
        .combine(a.proxy().material(), b.proxy().material());

    let (outcome, impulse) = if vrel.abs() <= tolerance {
        if vrel < 0.0 {
            let j = -vrel / inv_mass_sum;
            apply_linear_impulse(a, b, &(n * j));
        }
        (ContactOutcome::Resting, None)
    } else {
        let denom = inv_mass_sum + angular_term(a, &ra, &n) + angular_term(b, &rb, &n);
        let j = -(1.0 + material.restitution) * vrel / denom;
        let impulse = n * j;
        apply_linear_impulse(a, b, &impulse);
        (ContactOutcome::Colliding, Some(impulse))
    };

    apply_friction(a, b, &ra, &rb, &(relative - n * vrel), material.friction);

    // The normal torque goes in after friction so its decay leaves it whole.
    if let Some(impulse) = impulse {
        if a.behavior().can_rotate() {
            a.angular_momentum -= ra.cross(&impulse);
        }
        if b.behavior().can_rotate() {
            b.angular_momentum += rb.cross(&impulse);
        }
    }

    a.refresh_derived();
    b.refresh_derived();

    if hit.dist < 0.0 && !config.paused {
        let correction = -hit.dist * config.penetration_correction / inv_mass_sum;
        a.translate(&(-n * (correction * a.inv_mass)));
        b.translate(&(n * (correction * b.inv_mass)));
    }

    outcome
}

/// Apply `impulse` to `b` and its opposite to `a`. Immovable sides keep
/// zero momentum.
fn apply_linear_impulse(a: &mut PhysObject, b: &mut PhysObject, impulse: &Vector3<f64>) {
    if a.inv_mass > 0.0 {
        a.momentum -= impulse;
    }
    if b.inv_mass > 0.0 {
        b.momentum += impulse;
    }
}

/// Pull tangential contact velocities together by `friction` and decay
/// angular momentum by the same fraction.
fn apply_friction(
    a: &mut PhysObject,
    b: &mut PhysObject,
    ra: &Vector3<f64>,
    rb: &Vector3<f64>,
    tangential: &Vector3<f64>,
    friction: f64,
) {
    if friction <= 0.0 {
        return;
    }
    let f = tangential * (friction / (a.inv_mass + b.inv_mass));
    if a.inv_mass > 0.0 {
        a.momentum += f;
    }
    if b.inv_mass > 0.0 {
        b.momentum -= f;
    }

    let keep = 1.0 - friction;
    if a.behavior().can_rotate() {
        a.angular_momentum = (a.angular_momentum + ra.cross(&f)) * keep;
    }
    if b.behavior().can_rotate() {
        b.angular_momentum = (b.angular_momentum - rb.cross(&f)) * keep;
    }
}

/// Living body against static ground. The normal points from the living
/// body toward the ground.
fn resolve_living_contact(living: &mut PhysObject, hit: &Intersection, config: &PhysicsConfig) {
    let n = hit.normal;
    let up = config.up();

    let into_ground = living.momentum.dot(&n);
    if into_ground > 0.0 {
        living.momentum -= n * into_ground;
    }

    let on_ground = up.dot(&-n) >= config.living_ground_slope;
    if on_ground && !living.living_moving() {
        let tangential = living.momentum - n * living.momentum.dot(&n);
        living.momentum -= tangential * config.living_ground_friction;
    }

    if hit.dist < 0.0 && !config.paused {
        living.translate(&(n * (hit.dist * config.living_penetration_correction)));
    }

    if on_ground {
        living.living_on_ground = true;
    }
    living.angular_momentum = Vector3::zeros();
    living.refresh_derived();
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::narrow_phase::intersect;
    use crate::shape::Shape;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, UnitQuaternion};
    use phys_types::{Material, MaterialTable};

    fn elastic_config() -> PhysicsConfig {
        PhysicsConfig::default()
            .zero_gravity()
            .with_materials(MaterialTable::new(Material::elastic()))
    }

    fn ball(x: f64, vx: f64) -> PhysObject {
        PhysObject::new(Shape::sphere(1.0), Behavior::RigidBody)
            .unwrap()
            .with_position(Point3::new(x, 0.0, 0.0))
            .with_velocity(Vector3::new(vx, 0.0, 0.0))
    }

    fn contact(a: &PhysObject, b: &PhysObject) -> Intersection {
        intersect(a.proxy().world_shape(), b.proxy().world_shape()).unwrap()
    }

    #[test]
    fn test_elastic_collision_swaps_velocities() {
        let mut a = ball(0.0, 2.0);
        let mut b = ball(1.9, -1.0);
        let before = a.momentum() + b.momentum();
        let hit = contact(&a, &b);

        let outcome = resolve_contact(&mut a, &mut b, &hit, &elastic_config());
        assert_eq!(outcome, ContactOutcome::Colliding);
        assert_relative_eq!(a.momentum() + b.momentum(), before, epsilon = 1e-9);
        assert_relative_eq!(a.velocity().x, -1.0, epsilon = 1e-9);
        assert_relative_eq!(b.velocity().x, 2.0, epsilon = 1e-9);
        // Overlap is pushed apart symmetrically.
        assert!(a.position().x < 0.0);
        assert!(b.position().x > 1.9);
    }

    #[test]
    fn test_separating_contact_is_left_alone() {
        let mut a = ball(0.0, -1.0);
        let mut b = ball(1.9, 1.0);
        let hit = contact(&a, &b);
        let outcome = resolve_contact(&mut a, &mut b, &hit, &elastic_config());
        assert_eq!(outcome, ContactOutcome::Separating);
        assert_relative_eq!(a.velocity().x, -1.0, epsilon = 1e-12);
        assert_eq!(a.position(), Point3::origin());
    }

    #[test]
    fn test_static_pair_is_immovable() {
        let mut a = PhysObject::new(Shape::sphere(1.0), Behavior::Static).unwrap();
        let mut b = PhysObject::new(Shape::sphere(1.0), Behavior::Static)
            .unwrap()
            .with_position(Point3::new(1.0, 0.0, 0.0));
        let hit = contact(&a, &b);
        let outcome = resolve_contact(&mut a, &mut b, &hit, &PhysicsConfig::default());
        assert_eq!(outcome, ContactOutcome::Immovable);
        assert_eq!(b.position(), Point3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_resting_contact_cancels_approach() {
        let mut ground = PhysObject::new(Shape::ground_plane(0.0), Behavior::Static).unwrap();
        let mut sphere = PhysObject::new(Shape::sphere(1.0), Behavior::RigidBody)
            .unwrap()
            .with_position(Point3::new(0.0, 0.99, 0.0))
            .with_velocity(Vector3::new(0.0, -0.1, 0.0));
        let hit = contact(&sphere, &ground);
        let config = PhysicsConfig::default();

        let outcome = resolve_contact(&mut sphere, &mut ground, &hit, &config);
        assert_eq!(outcome, ContactOutcome::Resting);
        assert_relative_eq!(sphere.velocity().y, 0.0, epsilon = 1e-12);
        assert_eq!(ground.momentum(), Vector3::zeros());
        // A fifth of the 0.01 overlap is corrected.
        assert_relative_eq!(sphere.position().y, 0.992, epsilon = 1e-12);
    }

    #[test]
    fn test_paused_skips_position_push() {
        let mut ground = PhysObject::new(Shape::ground_plane(0.0), Behavior::Static).unwrap();
        let mut sphere = PhysObject::new(Shape::sphere(1.0), Behavior::RigidBody)
            .unwrap()
            .with_position(Point3::new(0.0, 0.9, 0.0));
        let hit = contact(&sphere, &ground);
        let config = PhysicsConfig::default().paused(true);
        resolve_contact(&mut sphere, &mut ground, &hit, &config);
        assert_eq!(sphere.position().y, 0.9);
    }

    #[test]
    fn test_friction_slows_sliding_body() {
        let mut ground = PhysObject::new(Shape::ground_plane(0.0), Behavior::Static).unwrap();
        let mut sphere = PhysObject::new(Shape::sphere(1.0), Behavior::RigidBody)
            .unwrap()
            .with_position(Point3::new(0.0, 0.99, 0.0))
            .with_velocity(Vector3::new(2.0, -0.1, 0.0));
        let hit = contact(&sphere, &ground);
        resolve_contact(&mut sphere, &mut ground, &hit, &PhysicsConfig::default());
        // Default friction 0.1 removes a tenth of the sliding speed.
        assert_relative_eq!(sphere.velocity().x, 1.8, epsilon = 1e-9);
        // Dragging the bottom backwards spins the sphere forward, about -Z.
        assert!(sphere.angular_momentum().z < 0.0);
    }

    #[test]
    fn test_off_center_impact_keeps_full_normal_torque() {
        let config = PhysicsConfig::default();
        let mut ground = PhysObject::new(Shape::ground_plane(0.0), Behavior::Static).unwrap();
        let cube = Shape::cuboid(Vector3::new(0.5, 0.5, 0.5));
        let mut tilted = PhysObject::new(cube, Behavior::RigidBody)
            .unwrap()
            .with_rotation(UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.3))
            .with_position(Point3::new(0.0, 0.6, 0.0))
            .with_velocity(Vector3::new(0.0, -3.0, 0.0));
        let hit = contact(&tilted, &ground);
        assert!(hit.is_penetrating());

        // Straight down with no spin: nothing slides at the contact.
        let n = hit.normal;
        let r = hit.point - tilted.position();
        let vrel = n.dot(&-tilted.velocity());
        let restitution = config
            .materials
            .combine(tilted.proxy().material(), ground.proxy().material())
            .restitution;
        let denom = tilted.inv_mass() + n.dot(&(tilted.inv_inertia() * r.cross(&n)).cross(&r));
        let j = -(1.0 + restitution) * vrel / denom;

        let outcome = resolve_contact(&mut tilted, &mut ground, &hit, &config);
        assert_eq!(outcome, ContactOutcome::Colliding);
        assert_relative_eq!(tilted.angular_momentum(), -r.cross(&(n * j)), epsilon = 1e-9);
        assert!(tilted.angular_momentum().z < -0.7);
    }

    #[test]
    fn test_living_contact_sets_ground_flag() {
        let mut ground = PhysObject::new(Shape::ground_plane(0.0), Behavior::Static).unwrap();
        let mut player = PhysObject::new(Shape::capsule(0.5, 0.5), Behavior::Living)
            .unwrap()
            .with_position(Point3::new(0.0, 0.9, 0.0))
            .with_velocity(Vector3::new(1.0, -3.0, 0.0));
        let hit = contact(&player, &ground);
        assert_relative_eq!(hit.dist, -0.1, epsilon = 1e-12);

        // Ground first: the solver flips the contact for the living side.
        let outcome =
            resolve_contact(&mut ground, &mut player, &hit.flipped(), &PhysicsConfig::default());
        assert_eq!(outcome, ContactOutcome::Living);
        assert!(player.living_on_ground());
        assert_relative_eq!(player.velocity().y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(player.velocity().x, 0.5, epsilon = 1e-12);
        assert_relative_eq!(player.position().y, 0.995, epsilon = 1e-12);
        assert_eq!(player.angular_velocity(), Vector3::zeros());
    }

    #[test]
    fn test_moving_living_body_keeps_tangential_momentum() {
        let mut ground = PhysObject::new(Shape::ground_plane(0.0), Behavior::Static).unwrap();
        let mut player = PhysObject::new(Shape::capsule(0.5, 0.5), Behavior::Living)
            .unwrap()
            .with_position(Point3::new(0.0, 0.95, 0.0))
            .with_velocity(Vector3::new(1.0, 0.0, 0.0));
        player.set_living_moving(true);
        let hit = contact(&player, &ground);
        resolve_contact(&mut player, &mut ground, &hit, &PhysicsConfig::default());
        assert_relative_eq!(player.velocity().x, 1.0, epsilon = 1e-12);
        assert!(player.living_on_ground());
    }

    #[test]
    fn test_wall_contact_is_not_ground() {
        let mut wall = PhysObject::new(Shape::plane(-Vector3::x(), -2.0), Behavior::Static).unwrap();
        let mut player = PhysObject::new(Shape::capsule(0.5, 0.5), Behavior::Living)
            .unwrap()
            .with_position(Point3::new(2.4, 0.0, 0.0));
        let hit = contact(&player, &wall);
        resolve_contact(&mut player, &mut wall, &hit, &PhysicsConfig::default());
        assert!(!player.living_on_ground());
    }
}
