//! Per-body dynamical state and the behavior state machine.
//!
//! A [`PhysObject`] stores momentum as ground truth. Velocity, angular
//! velocity, inverse mass and world inverse inertia are derived from it and
//! from the current orientation, and are refreshed by [`PhysObject::update`]
//! and by the solver after it applies impulses.

use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};
use phys_types::{Behavior, MassProperties, MaterialId, PhysError, Result};
use tracing::warn;

use crate::aabb::Aabb;
use crate::debug::DebugHandle;
use crate::integrators::{damp, integrate_rotation};
use crate::mass::compute_mass_properties;
use crate::mesh::TerrainMesh;
use crate::shape::Shape;
use crate::transform::Transform;

/// Damping assigned to bodies built outside a world.
pub const DEFAULT_DAMPING: f64 = 0.99;

// =============================================================================
// Proxy
// =============================================================================

/// A body's collision representation: its local shape, the world-space
/// working copy and the cached world bounds.
///
/// Primitive shapes get a fresh world copy every refresh. Mesh kinds have no
/// copy; the local shape receives the body transform in place and serves as
/// its own world shape.
#[derive(Debug, Clone)]
pub struct Proxy {
    shape: Shape,
    world: Option<Shape>,
    aabb: Aabb,
    material: MaterialId,
    debug: Option<DebugHandle>,
}

impl Proxy {
    fn new(shape: Shape) -> Self {
        Self {
            aabb: shape.aabb(),
            shape,
            world: None,
            material: MaterialId::DEFAULT,
            debug: None,
        }
    }

    /// Shape in body-local coordinates.
    #[must_use]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Shape in world coordinates as of the last refresh.
    #[must_use]
    pub fn world_shape(&self) -> &Shape {
        self.world.as_ref().unwrap_or(&self.shape)
    }

    /// World bounds as of the last refresh.
    #[must_use]
    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    /// Surface material.
    #[must_use]
    pub fn material(&self) -> MaterialId {
        self.material
    }

    /// Debug renderable, if one was created.
    #[must_use]
    pub fn debug_handle(&self) -> Option<DebugHandle> {
        self.debug
    }

    pub(crate) fn set_debug_handle(&mut self, handle: Option<DebugHandle>) {
        self.debug = handle;
    }

    pub(crate) fn terrain_mesh_mut(&mut self) -> Option<&mut TerrainMesh> {
        match &mut self.shape {
            Shape::TerrainMesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    fn refresh(&mut self, transform: &Transform) {
        if self.shape.set_mesh_transform(transform) {
            self.world = None;
        } else {
            self.world = self.shape.transformed(transform);
        }
        self.aabb = self.world_shape().aabb();
    }
}

// =============================================================================
// PhysObject
// =============================================================================

/// One simulated body.
///
/// # Example
///
/// ```
/// use phys_core::{PhysObject, Shape};
/// use phys_types::Behavior;
/// use nalgebra::{Point3, Vector3};
///
/// let mut ball = PhysObject::new(Shape::sphere(1.0), Behavior::RigidBody)
///     .unwrap()
///     .with_position(Point3::new(0.0, 5.0, 0.0));
///
/// ball.update(1.0 / 60.0, &Vector3::new(0.0, -9.81, 0.0));
/// assert!(ball.momentum().y < 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct PhysObject {
    behavior: Behavior,

    pub(crate) pos: Point3<f64>,
    pub(crate) rotation: UnitQuaternion<f64>,
    scale: Vector3<f64>,

    pub(crate) momentum: Vector3<f64>,
    pub(crate) angular_momentum: Vector3<f64>,
    pub(crate) velocity: Vector3<f64>,
    pub(crate) angular_velocity: Vector3<f64>,

    mass: f64,
    mass_override: Option<f64>,
    pub(crate) inv_mass: f64,
    mass_props: MassProperties,
    pub(crate) inv_inertia: Matrix3<f64>,

    damping: f64,
    gravity_enabled: bool,
    force: Vector3<f64>,
    torque: Vector3<f64>,

    proxy: Proxy,

    pub(crate) living_on_ground: bool,
    living_moving: bool,
    trash: bool,
    helper_shown: bool,
}

impl PhysObject {
    /// Create a body at the origin, at rest.
    ///
    /// The mass defaults to the shape's volume (unit density). Fails if the
    /// shape is malformed, or if a dynamic behavior is requested for a shape
    /// without volume.
    pub fn new(shape: Shape, behavior: Behavior) -> Result<Self> {
        shape.validate()?;
        let mass_props = compute_mass_properties(&shape);
        if behavior.is_dynamic() && !mass_props.is_weighted() {
            return Err(PhysError::invalid_mass(format!(
                "{behavior:?} body needs a shape with volume, got {}",
                mass_props.volume
            )));
        }

        let mut body = Self {
            behavior,
            pos: Point3::origin(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            momentum: Vector3::zeros(),
            angular_momentum: Vector3::zeros(),
            velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            mass: mass_props.volume,
            mass_override: None,
            inv_mass: 0.0,
            mass_props,
            inv_inertia: Matrix3::zeros(),
            damping: DEFAULT_DAMPING,
            gravity_enabled: true,
            force: Vector3::zeros(),
            torque: Vector3::zeros(),
            proxy: Proxy::new(shape),
            living_on_ground: false,
            living_moving: false,
            trash: false,
            helper_shown: false,
        };
        body.apply_behavior();
        body.refresh_proxy();
        Ok(body)
    }

    /// Place the body's center of mass.
    #[must_use]
    pub fn with_position(mut self, pos: Point3<f64>) -> Self {
        self.set_position(pos);
        self
    }

    /// Set the orientation.
    #[must_use]
    pub fn with_rotation(mut self, rotation: UnitQuaternion<f64>) -> Self {
        self.set_rotation(rotation);
        self
    }

    /// Set the initial linear velocity.
    #[must_use]
    pub fn with_velocity(mut self, velocity: Vector3<f64>) -> Self {
        self.set_velocity(velocity);
        self
    }

    /// Set the surface material.
    #[must_use]
    pub fn with_material(mut self, material: MaterialId) -> Self {
        self.proxy.material = material;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Behavior mode.
    #[must_use]
    pub fn behavior(&self) -> Behavior {
        self.behavior
    }

    /// World position of the center of mass.
    #[must_use]
    pub fn position(&self) -> Point3<f64> {
        self.pos
    }

    /// Orientation.
    #[must_use]
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        self.rotation
    }

    /// Per-axis scale of the shape.
    #[must_use]
    pub fn scale(&self) -> Vector3<f64> {
        self.scale
    }

    /// Linear momentum.
    #[must_use]
    pub fn momentum(&self) -> Vector3<f64> {
        self.momentum
    }

    /// Angular momentum.
    #[must_use]
    pub fn angular_momentum(&self) -> Vector3<f64> {
        self.angular_momentum
    }

    /// Linear velocity, derived from momentum.
    #[must_use]
    pub fn velocity(&self) -> Vector3<f64> {
        self.velocity
    }

    /// Angular velocity, derived from angular momentum.
    #[must_use]
    pub fn angular_velocity(&self) -> Vector3<f64> {
        self.angular_velocity
    }

    /// Mass.
    #[must_use]
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Inverse mass; zero for static bodies.
    #[must_use]
    pub fn inv_mass(&self) -> f64 {
        self.inv_mass
    }

    /// World-space inverse inertia; zero for static bodies.
    #[must_use]
    pub fn inv_inertia(&self) -> &Matrix3<f64> {
        &self.inv_inertia
    }

    /// Shape-derived mass properties at unit density.
    #[must_use]
    pub fn mass_properties(&self) -> &MassProperties {
        &self.mass_props
    }

    /// Momentum damping factor per second.
    #[must_use]
    pub fn damping(&self) -> f64 {
        self.damping
    }

    /// Whether gravity acts on this body.
    #[must_use]
    pub fn gravity_enabled(&self) -> bool {
        self.gravity_enabled
    }

    /// Collision proxy.
    #[must_use]
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    pub(crate) fn proxy_mut(&mut self) -> &mut Proxy {
        &mut self.proxy
    }

    /// Cached world bounds.
    #[must_use]
    pub fn aabb(&self) -> &Aabb {
        &self.proxy.aabb
    }

    /// Whether a living body touched walkable ground during the last tick.
    #[must_use]
    pub fn living_on_ground(&self) -> bool {
        self.living_on_ground
    }

    /// Whether a living body is commanding its own movement.
    #[must_use]
    pub fn living_moving(&self) -> bool {
        self.living_moving
    }

    /// Whether the body was released and awaits removal.
    #[must_use]
    pub fn is_trash(&self) -> bool {
        self.trash
    }

    /// Whether the debug helper should be visible.
    #[must_use]
    pub fn helper_shown(&self) -> bool {
        self.helper_shown
    }

    /// Kinetic energy `(v·P + w·L) / 2`.
    #[must_use]
    pub fn kinetic_energy(&self) -> f64 {
        0.5 * (self.velocity.dot(&self.momentum)
            + self.angular_velocity.dot(&self.angular_momentum))
    }

    /// Velocity of the material point at world position `p`.
    #[must_use]
    pub fn point_velocity(&self, p: &Point3<f64>) -> Vector3<f64> {
        self.velocity + self.angular_velocity.cross(&(p - self.pos))
    }

    // =========================================================================
    // Mutators
    // =========================================================================

    /// Move the center of mass.
    pub fn set_position(&mut self, pos: Point3<f64>) {
        self.pos = pos;
        self.refresh_proxy();
    }

    /// Set the orientation.
    pub fn set_rotation(&mut self, rotation: UnitQuaternion<f64>) {
        self.rotation = rotation;
        self.refresh_derived();
        self.refresh_proxy();
    }

    /// Set the per-axis scale. Components must be positive and finite.
    pub fn set_scale(&mut self, scale: Vector3<f64>) -> Result<()> {
        if !scale.iter().all(|s| s.is_finite() && *s > 0.0) {
            warn!(?scale, "rejected non-positive body scale");
            return Err(PhysError::invalid_shape(format!(
                "scale must be positive, got {scale:?}"
            )));
        }
        self.scale = scale;
        self.refresh_proxy();
        Ok(())
    }

    /// Set linear momentum. Ignored for static bodies.
    pub fn set_momentum(&mut self, momentum: Vector3<f64>) {
        if self.behavior.is_dynamic() {
            self.momentum = momentum;
            self.refresh_derived();
        }
    }

    /// Set linear velocity through momentum. Ignored for static bodies.
    pub fn set_velocity(&mut self, velocity: Vector3<f64>) {
        self.set_momentum(velocity * self.mass);
    }

    /// Set angular momentum. Ignored unless the body can rotate.
    pub fn set_angular_momentum(&mut self, angular_momentum: Vector3<f64>) {
        if self.behavior.can_rotate() {
            self.angular_momentum = angular_momentum;
            self.refresh_derived();
        }
    }

    /// Set the mass. Must be positive and finite.
    pub fn set_mass(&mut self, mass: f64) -> Result<()> {
        if !(mass.is_finite() && mass > 0.0) {
            warn!(mass, "rejected non-positive body mass");
            return Err(PhysError::invalid_mass(format!("mass must be positive, got {mass}")));
        }
        self.mass_override = Some(mass);
        self.mass = mass;
        self.apply_behavior();
        Ok(())
    }

    /// Set the damping factor in `[0, 1]`.
    pub fn set_damping(&mut self, damping: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&damping) {
            warn!(damping, "rejected damping outside [0, 1]");
            return Err(PhysError::invalid_config(format!(
                "damping must be in [0, 1], got {damping}"
            )));
        }
        self.damping = damping;
        Ok(())
    }

    /// Enable or disable gravity for this body.
    pub fn set_gravity_enabled(&mut self, enabled: bool) {
        self.gravity_enabled = enabled;
    }

    /// Set the surface material.
    pub fn set_material(&mut self, material: MaterialId) {
        self.proxy.material = material;
    }

    /// Tell the solver whether a living body is commanding movement. Idle
    /// living bodies get ground friction.
    pub fn set_living_moving(&mut self, moving: bool) {
        self.living_moving = moving;
    }

    pub(crate) fn set_helper_shown(&mut self, shown: bool) {
        self.helper_shown = shown;
    }

    /// Switch behavior mode. Static zeroes the inverse mass, the inverse
    /// inertia and all momenta; living zeroes the angular state.
    pub fn set_behavior(&mut self, behavior: Behavior) -> Result<()> {
        if behavior.is_dynamic() && !self.mass_props.is_weighted() {
            warn!(?behavior, "rejected dynamic behavior for a shape without volume");
            return Err(PhysError::invalid_mass(format!(
                "{behavior:?} body needs a shape with volume, got {}",
                self.mass_props.volume
            )));
        }
        self.behavior = behavior;
        self.apply_behavior();
        self.refresh_proxy();
        Ok(())
    }

    /// Replace the shape and recompute its mass properties. An explicit
    /// mass set with [`PhysObject::set_mass`] is kept.
    pub fn set_shape(&mut self, shape: Shape) -> Result<()> {
        if let Err(err) = shape.validate() {
            warn!(%err, "rejected body shape");
            return Err(err);
        }
        let mass_props = compute_mass_properties(&shape);
        if self.behavior.is_dynamic() && !mass_props.is_weighted() {
            warn!(behavior = ?self.behavior, "rejected shape without volume for dynamic body");
            return Err(PhysError::invalid_mass(format!(
                "shape volume {} is too small for a dynamic body",
                mass_props.volume
            )));
        }

        let material = self.proxy.material;
        let debug = self.proxy.debug;
        self.proxy = Proxy::new(shape);
        self.proxy.material = material;
        self.proxy.debug = debug;
        self.mass_props = mass_props;
        self.mass = self.mass_override.unwrap_or(mass_props.volume);
        self.apply_behavior();
        self.refresh_proxy();
        Ok(())
    }

    /// Add a force for the next tick. Ignored for static bodies.
    pub fn apply_force(&mut self, force: Vector3<f64>) {
        if self.behavior.is_dynamic() {
            self.force += force;
        }
    }

    /// Add a torque for the next tick. Ignored unless the body can rotate.
    pub fn apply_torque(&mut self, torque: Vector3<f64>) {
        if self.behavior.can_rotate() {
            self.torque += torque;
        }
    }

    /// Mark for removal at the start of the next world update.
    pub fn release(&mut self) {
        self.trash = true;
    }

    // =========================================================================
    // Integration
    // =========================================================================

    /// Advance the body by `dt` under `gravity`.
    ///
    /// In order: world inverse inertia from the current orientation, derived
    /// velocities, position and orientation, external force and damping into
    /// momentum, torque into angular momentum, then the world proxy.
    pub fn update(&mut self, dt: f64, gravity: &Vector3<f64>) {
        self.living_on_ground = false;

        self.refresh_derived();

        self.pos += self.velocity * dt;
        integrate_rotation(&mut self.rotation, &self.angular_velocity, dt);

        if self.behavior.is_dynamic() {
            let mut force = self.force;
            if self.gravity_enabled {
                force += gravity * self.mass;
            }
            self.momentum = damp(&(self.momentum + force * dt), self.damping, dt);
        }

        if self.behavior.can_rotate() {
            self.angular_momentum += self.torque * dt;
        } else {
            self.angular_momentum = Vector3::zeros();
        }

        self.force = Vector3::zeros();
        self.torque = Vector3::zeros();
        self.refresh_proxy();
    }

    /// Recompute inverse inertia and velocities from the current orientation
    /// and momenta.
    pub(crate) fn refresh_derived(&mut self) {
        if self.inv_mass > 0.0 && self.behavior.can_rotate() {
            let r = self.rotation.to_rotation_matrix();
            let scale = self.mass_props.volume * self.inv_mass;
            self.inv_inertia =
                r.matrix() * self.mass_props.inv_inertia_body * r.matrix().transpose() * scale;
        } else {
            self.inv_inertia = Matrix3::zeros();
        }

        self.velocity = self.momentum * self.inv_mass;
        self.angular_velocity = self.inv_inertia * self.angular_momentum;
        if self.behavior == Behavior::Living {
            self.angular_momentum = Vector3::zeros();
            self.angular_velocity = Vector3::zeros();
        }
    }

    /// Shift the body without touching its momentum.
    pub(crate) fn translate(&mut self, delta: &Vector3<f64>) {
        self.pos += delta;
        self.refresh_proxy();
    }

    /// Rebuild the world-space proxy from the current pose.
    pub(crate) fn refresh_proxy(&mut self) {
        let rotation = if self.behavior == Behavior::Living {
            UnitQuaternion::identity()
        } else {
            self.rotation
        };
        let transform = Transform::for_body(
            &self.pos,
            rotation,
            self.scale,
            &self.mass_props.center_of_mass,
        );
        self.proxy.refresh(&transform);
    }

    fn apply_behavior(&mut self) {
        match self.behavior {
            Behavior::Static => {
                self.inv_mass = 0.0;
                self.momentum = Vector3::zeros();
                self.angular_momentum = Vector3::zeros();
            }
            Behavior::RigidBody => {
                self.inv_mass = 1.0 / self.mass;
            }
            Behavior::Living => {
                self.inv_mass = 1.0 / self.mass;
                self.angular_momentum = Vector3::zeros();
                self.torque = Vector3::zeros();
            }
        }
        self.refresh_derived();
    }
}
