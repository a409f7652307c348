//! The body pool and the per-tick pipeline.
//!
//! [`PhysicsWorld`] owns every body, the terrain and the optional debug
//! renderer. Bodies are addressed by generation-checked [`BodyHandle`]s.
//!
//! One call to [`PhysicsWorld::update`] runs:
//!
//! 1. sweep bodies released since the last tick
//! 2. integrate every body and the terrain
//! 3. broad phase over world bounds
//! 4. narrow phase on world shapes, then contact resolution in pair order
//! 5. refresh debug helpers
//!
//! # Example
//!
//! ```
//! use phys_core::{PhysicsWorld, Shape};
//! use phys_types::{Behavior, PhysicsConfig};
//! use nalgebra::Point3;
//!
//! let mut world = PhysicsWorld::new(PhysicsConfig::default()).unwrap();
//! world.create_object(Shape::ground_plane(0.0), Behavior::Static).unwrap();
//! let ball = world.create_object(Shape::sphere(1.0), Behavior::RigidBody).unwrap();
//! world.body_mut(ball).unwrap().set_position(Point3::new(0.0, 5.0, 0.0));
//!
//! for _ in 0..30 {
//!     world.update(1.0 / 60.0).unwrap();
//! }
//! assert!(world.body(ball).unwrap().position().y < 5.0);
//! ```

use nalgebra::Vector3;
use phys_types::{Behavior, BodyHandle, PhysError, PhysicsConfig, Result, TerrainParams};
use tracing::{debug, trace, warn};

use crate::aabb::Aabb;
use crate::body::PhysObject;
use crate::broad_phase::{AllPairs, BroadPhase, PairTarget};
use crate::debug::{behavior_color, DebugRenderer};
use crate::narrow_phase::intersect;
use crate::shape::Shape;
use crate::solver::{resolve_contact, ContactOutcome};
use crate::terrain::{HeightMap, PhysTerrain};

/// Counters for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepStats {
    /// Bodies integrated.
    pub integrated: usize,
    /// Released bodies removed from the pool before integrating.
    pub swept: usize,
    /// Pairs reported by the broad phase.
    pub candidate_pairs: usize,
    /// Candidate pairs whose shapes actually touch.
    pub contacts: usize,
    /// Contacts that were already separating.
    pub separating: usize,
    /// Contacts resolved on the resting branch.
    pub resting: usize,
    /// Contacts resolved with a restitution impulse.
    pub colliding: usize,
    /// Living bodies against static ground.
    pub living: usize,
    /// Contacts between two static bodies.
    pub immovable: usize,
}

impl StepStats {
    fn record(&mut self, outcome: ContactOutcome) {
        self.contacts += 1;
        match outcome {
            ContactOutcome::Separating => self.separating += 1,
            ContactOutcome::Resting => self.resting += 1,
            ContactOutcome::Colliding => self.colliding += 1,
            ContactOutcome::Living => self.living += 1,
            ContactOutcome::Immovable => self.immovable += 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Slot {
    body: Option<PhysObject>,
    generation: u32,
}

/// The physics subsystem: body pool, terrain, broad phase and solver.
pub struct PhysicsWorld {
    config: PhysicsConfig,
    slots: Vec<Slot>,
    free: Vec<usize>,
    terrain: PhysTerrain,
    broad_phase: Box<dyn BroadPhase>,
    debug: Option<Box<dyn DebugRenderer>>,
    step_count: u64,
}

impl std::fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("config", &self.config)
            .field("bodies", &self.body_count())
            .field("terrain", &self.terrain.is_created())
            .field("debug_renderer", &self.debug.is_some())
            .field("step_count", &self.step_count)
            .finish_non_exhaustive()
    }
}

impl PhysicsWorld {
    /// Create an empty world. Fails if `config` does not validate.
    pub fn new(config: PhysicsConfig) -> Result<Self> {
        if let Err(err) = config.validate() {
            warn!(%err, "rejected physics config");
            return Err(err);
        }
        Ok(Self {
            terrain: PhysTerrain::new(config.terrain_y_bounds_bias),
            config,
            slots: Vec::new(),
            free: Vec::new(),
            broad_phase: Box::new(AllPairs::new()),
            debug: None,
            step_count: 0,
        })
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Replace the configuration. The terrain keeps the bounds bias it was
    /// built with.
    pub fn set_config(&mut self, config: PhysicsConfig) -> Result<()> {
        if let Err(err) = config.validate() {
            warn!(%err, "rejected physics config");
            return Err(err);
        }
        self.config = config;
        Ok(())
    }

    /// Freeze or resume motion.
    pub fn set_paused(&mut self, paused: bool) {
        self.config.paused = paused;
    }

    /// Whether motion is frozen.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.config.paused
    }

    /// Swap the broad-phase algorithm.
    pub fn set_broad_phase(&mut self, broad_phase: Box<dyn BroadPhase>) {
        self.broad_phase = broad_phase;
    }

    /// Number of completed [`PhysicsWorld::update`] calls.
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    // =========================================================================
    // Pool
    // =========================================================================

    /// Create a body at the origin with the world's default damping.
    pub fn create_object(&mut self, shape: Shape, behavior: Behavior) -> Result<BodyHandle> {
        let mut body = match PhysObject::new(shape, behavior) {
            Ok(body) => body,
            Err(err) => {
                warn!(%err, ?behavior, "rejected body");
                return Err(err);
            }
        };
        body.set_damping(self.config.default_damping)?;
        self.insert(body)
    }

    /// Move an already built body into the pool.
    pub fn insert(&mut self, body: PhysObject) -> Result<BodyHandle> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.body = Some(body);
            return Ok(BodyHandle::new(handle_index(index)?, slot.generation));
        }

        let index = handle_index(self.slots.len())?;
        self.slots.push(Slot {
            body: Some(body),
            generation: 0,
        });
        Ok(BodyHandle::new(index, 0))
    }

    /// Mark a body for removal. It stays readable until the next
    /// [`PhysicsWorld::update`] sweeps it.
    pub fn release(&mut self, handle: BodyHandle) -> Result<()> {
        if let Some(body) = self.body_mut(handle) {
            body.release();
            Ok(())
        } else {
            warn!(%handle, "release of a stale body handle");
            Err(PhysError::InvalidHandle(handle))
        }
    }

    /// Whether `handle` still names a body.
    #[must_use]
    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.body(handle).is_some()
    }

    /// Look up a body.
    #[must_use]
    pub fn body(&self, handle: BodyHandle) -> Option<&PhysObject> {
        let slot = self.slots.get(handle.index() as usize)?;
        if slot.generation == handle.generation() {
            slot.body.as_ref()
        } else {
            None
        }
    }

    /// Look up a body mutably.
    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut PhysObject> {
        lookup_mut(&mut self.slots, handle)
    }

    /// Number of bodies in the pool, released-but-unswept ones included.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.slots.iter().filter(|s| s.body.is_some()).count()
    }

    /// Handles of every body in the pool, in slot order.
    pub fn handles(&self) -> impl Iterator<Item = BodyHandle> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let index = u32::try_from(index).ok()?;
            slot.body
                .as_ref()
                .map(|_| BodyHandle::new(index, slot.generation))
        })
    }

    /// Every body with its handle, in slot order.
    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &PhysObject)> + '_ {
        self.handles()
            .filter_map(move |handle| self.body(handle).map(|body| (handle, body)))
    }

    // =========================================================================
    // Terrain
    // =========================================================================

    /// The terrain.
    #[must_use]
    pub fn terrain(&self) -> &PhysTerrain {
        &self.terrain
    }

    /// Build or replace the terrain.
    pub fn create_terrain(&mut self, heights: &HeightMap<'_>, params: TerrainParams) -> Result<()> {
        self.terrain.create(heights, params)
    }

    /// Resample the terrain inside a world-space region.
    pub fn update_terrain_heightmap(
        &mut self,
        heights: &HeightMap<'_>,
        region: &Aabb,
    ) -> Result<()> {
        self.terrain.update_heightmap(heights, region)
    }

    // =========================================================================
    // Debug helpers
    // =========================================================================

    /// Attach a debug renderer. Helpers are recreated in it for every body
    /// whose helper is shown.
    pub fn set_debug_renderer(&mut self, renderer: Box<dyn DebugRenderer>) {
        self.take_debug_renderer();
        self.debug = Some(renderer);

        let Some(renderer) = self.debug.as_mut() else {
            return;
        };
        for body in self.slots.iter_mut().filter_map(|s| s.body.as_mut()) {
            if body.helper_shown() {
                let helper =
                    renderer.create_helper(body.proxy().world_shape(), behavior_color(body.behavior()));
                renderer.show(helper, true);
                body.proxy_mut().set_debug_handle(Some(helper));
            }
        }
    }

    /// Detach the debug renderer, destroying the helpers it owns.
    pub fn take_debug_renderer(&mut self) -> Option<Box<dyn DebugRenderer>> {
        let mut renderer = self.debug.take()?;
        for body in self.slots.iter_mut().filter_map(|s| s.body.as_mut()) {
            if let Some(helper) = body.proxy().debug_handle() {
                renderer.destroy_helper(helper);
                body.proxy_mut().set_debug_handle(None);
            }
        }
        Some(renderer)
    }

    /// Whether a debug renderer is attached.
    #[must_use]
    pub fn has_debug_renderer(&self) -> bool {
        self.debug.is_some()
    }

    /// Show or hide a body's debug helper. The helper is created on first
    /// show once a renderer is attached.
    pub fn show_helper(&mut self, handle: BodyHandle, visible: bool) -> Result<()> {
        let Some(body) = lookup_mut(&mut self.slots, handle) else {
            warn!(%handle, "helper toggle on a stale body handle");
            return Err(PhysError::InvalidHandle(handle));
        };
        body.set_helper_shown(visible);

        let Some(renderer) = self.debug.as_mut() else {
            return Ok(());
        };
        let helper = match body.proxy().debug_handle() {
            Some(helper) => helper,
            None if visible => {
                let helper =
                    renderer.create_helper(body.proxy().world_shape(), behavior_color(body.behavior()));
                body.proxy_mut().set_debug_handle(Some(helper));
                helper
            }
            None => return Ok(()),
        };
        renderer.show(helper, visible);
        Ok(())
    }

    // =========================================================================
    // Stepping
    // =========================================================================

    /// Advance the simulation by `dt` seconds.
    ///
    /// `dt` must be finite and non-negative; zero runs detection and
    /// resolution without motion. While paused, bodies integrate with a zero
    /// timestep and interpenetration is not pushed apart.
    pub fn update(&mut self, dt: f64) -> Result<StepStats> {
        if !dt.is_finite() || dt < 0.0 {
            warn!(dt, "rejected timestep");
            return Err(PhysError::InvalidTimestep(dt));
        }

        let mut stats = StepStats {
            swept: self.sweep(),
            ..StepStats::default()
        };

        let step = if self.config.paused { 0.0 } else { dt };
        let gravity = self.config.gravity;
        for body in self.slots.iter_mut().filter_map(|s| s.body.as_mut()) {
            body.update(step, &gravity);
            stats.integrated += 1;
        }
        if let Some(terrain) = self.terrain.body_mut() {
            terrain.update(step, &gravity);
        }

        let bounds: Vec<(usize, Aabb)> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.body.as_ref().map(|b| (index, *b.aabb())))
            .collect();
        let terrain_bounds = self.terrain.aabb().copied();
        let pairs = self.broad_phase.find_pairs(&bounds, terrain_bounds.as_ref());
        stats.candidate_pairs = pairs.len();

        for pair in pairs {
            let outcome = match pair.b {
                PairTarget::Body(other) => self.resolve_body_pair(pair.a, other),
                PairTarget::Terrain => self.resolve_terrain_pair(pair.a),
            };
            if let Some(outcome) = outcome {
                stats.record(outcome);
            }
        }

        self.refresh_helpers();
        self.step_count += 1;

        trace!(
            step = self.step_count,
            integrated = stats.integrated,
            swept = stats.swept,
            pairs = stats.candidate_pairs,
            contacts = stats.contacts,
            resting = stats.resting,
            colliding = stats.colliding,
            living = stats.living,
            "physics step"
        );
        Ok(stats)
    }

    fn sweep(&mut self) -> usize {
        let mut swept = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if !slot.body.as_ref().is_some_and(PhysObject::is_trash) {
                continue;
            }
            let helper = slot.body.take().and_then(|b| b.proxy().debug_handle());
            if let (Some(helper), Some(renderer)) = (helper, self.debug.as_mut()) {
                renderer.destroy_helper(helper);
            }
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(index);
            swept += 1;
        }
        if swept > 0 {
            debug!(swept, "swept released bodies");
        }
        swept
    }

    fn resolve_body_pair(&mut self, a: usize, b: usize) -> Option<ContactOutcome> {
        if a == b {
            return None;
        }
        let (lo, hi) = (a.min(b), a.max(b));
        let (left, right) = self.slots.split_at_mut(hi);
        let first = left.get_mut(lo)?.body.as_mut()?;
        let second = right.first_mut()?.body.as_mut()?;
        let (body_a, body_b) = if a < b { (first, second) } else { (second, first) };

        let hit = intersect(body_a.proxy().world_shape(), body_b.proxy().world_shape())?;
        Some(resolve_contact(body_a, body_b, &hit, &self.config))
    }

    fn resolve_terrain_pair(&mut self, a: usize) -> Option<ContactOutcome> {
        let body = self.slots.get_mut(a)?.body.as_mut()?;
        let terrain = self.terrain.body_mut()?;

        let hit = intersect(body.proxy().world_shape(), terrain.proxy().world_shape())?;
        Some(resolve_contact(body, terrain, &hit, &self.config))
    }

    fn refresh_helpers(&mut self) {
        let Some(renderer) = self.debug.as_mut() else {
            return;
        };
        for body in self.slots.iter().filter_map(|s| s.body.as_ref()) {
            if let Some(helper) = body.proxy().debug_handle() {
                renderer.update_helper(helper, body.proxy().world_shape());
            }
        }
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Sum of linear momenta over all bodies.
    #[must_use]
    pub fn total_linear_momentum(&self) -> Vector3<f64> {
        self.slots
            .iter()
            .filter_map(|s| s.body.as_ref())
            .map(PhysObject::momentum)
            .fold(Vector3::zeros(), |acc, p| acc + p)
    }

    /// Sum of kinetic energies over all bodies.
    #[must_use]
    pub fn total_kinetic_energy(&self) -> f64 {
        self.slots
            .iter()
            .filter_map(|s| s.body.as_ref())
            .map(PhysObject::kinetic_energy)
            .sum()
    }
}

fn lookup_mut(slots: &mut [Slot], handle: BodyHandle) -> Option<&mut PhysObject> {
    let slot = slots.get_mut(handle.index() as usize)?;
    if slot.generation == handle.generation() {
        slot.body.as_mut()
    } else {
        None
    }
}

fn handle_index(index: usize) -> Result<u32> {
    u32::try_from(index).map_err(|_| PhysError::invalid_config("body pool is full"))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::cast_precision_loss
)]
mod tests {
    use super::*;
    use crate::debug::{DebugColor, DebugHandle};
    use approx::assert_relative_eq;
    use nalgebra::Point3;
    use std::cell::RefCell;
    use std::rc::Rc;

    const DT: f64 = 1.0 / 60.0;

    #[derive(Debug, Default)]
    struct HelperLog {
        next: u64,
        live: Vec<u64>,
        shown: Vec<u64>,
        updates: usize,
    }

    struct RecordingRenderer(Rc<RefCell<HelperLog>>);

    impl DebugRenderer for RecordingRenderer {
        fn create_helper(&mut self, _shape: &Shape, _color: DebugColor) -> DebugHandle {
            let mut log = self.0.borrow_mut();
            log.next += 1;
            let id = log.next;
            log.live.push(id);
            DebugHandle(id)
        }

        fn update_helper(&mut self, _handle: DebugHandle, _shape: &Shape) {
            self.0.borrow_mut().updates += 1;
        }

        fn show(&mut self, handle: DebugHandle, visible: bool) {
            let mut log = self.0.borrow_mut();
            log.shown.retain(|&id| id != handle.0);
            if visible {
                log.shown.push(handle.0);
            }
        }

        fn is_shown(&self, handle: DebugHandle) -> bool {
            self.0.borrow().shown.contains(&handle.0)
        }

        fn destroy_helper(&mut self, handle: DebugHandle) {
            let mut log = self.0.borrow_mut();
            log.live.retain(|&id| id != handle.0);
            log.shown.retain(|&id| id != handle.0);
        }
    }

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(PhysicsConfig::default()).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = PhysicsConfig::default();
        config.default_damping = 1.5;
        let err = PhysicsWorld::new(config).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_create_uses_config_damping() {
        let mut w = PhysicsWorld::new(PhysicsConfig::default().with_default_damping(0.5)).unwrap();
        let h = w.create_object(Shape::sphere(1.0), Behavior::RigidBody).unwrap();
        assert_eq!(w.body(h).unwrap().damping(), 0.5);
    }

    #[test]
    fn test_rejected_body_leaves_pool_untouched() {
        let mut w = world();
        assert!(w.create_object(Shape::sphere(-1.0), Behavior::RigidBody).is_err());
        assert!(w
            .create_object(Shape::ground_plane(0.0), Behavior::RigidBody)
            .is_err());
        assert_eq!(w.body_count(), 0);
    }

    #[test]
    fn test_release_is_deferred_until_update() {
        let mut w = world();
        let h = w.create_object(Shape::sphere(1.0), Behavior::RigidBody).unwrap();
        w.release(h).unwrap();

        assert!(w.body(h).is_some_and(PhysObject::is_trash));
        assert_eq!(w.body_count(), 1);

        let stats = w.update(DT).unwrap();
        assert_eq!(stats.swept, 1);
        assert_eq!(stats.integrated, 0);
        assert!(w.body(h).is_none());
        assert_eq!(w.body_count(), 0);
    }

    #[test]
    fn test_reused_slot_gets_new_generation() {
        let mut w = world();
        let old = w.create_object(Shape::sphere(1.0), Behavior::RigidBody).unwrap();
        w.release(old).unwrap();
        w.update(DT).unwrap();

        let new = w.create_object(Shape::sphere(2.0), Behavior::RigidBody).unwrap();
        assert_eq!(new.index(), old.index());
        assert_ne!(new.generation(), old.generation());
        assert!(w.body(old).is_none());
        assert!(w.body_mut(old).is_none());
        assert!(w.release(old).unwrap_err().is_invalid_handle());
        assert!(w.contains(new));
    }

    #[test]
    fn test_handles_in_slot_order() {
        let mut w = world();
        let a = w.create_object(Shape::sphere(1.0), Behavior::Static).unwrap();
        let b = w.create_object(Shape::sphere(1.0), Behavior::Static).unwrap();
        let c = w.create_object(Shape::sphere(1.0), Behavior::Static).unwrap();
        w.release(b).unwrap();
        w.update(0.0).unwrap();

        assert_eq!(w.handles().collect::<Vec<_>>(), vec![a, c]);
        assert_eq!(w.bodies().count(), 2);
    }

    #[test]
    fn test_rejects_bad_timestep() {
        let mut w = world();
        assert_eq!(w.update(-0.1), Err(PhysError::InvalidTimestep(-0.1)));
        assert!(w.update(f64::NAN).is_err());
        assert!(w.update(f64::INFINITY).is_err());
        assert_eq!(w.step_count(), 0);
    }

    #[test]
    fn test_zero_timestep_still_detects() {
        let mut w = world();
        w.create_object(Shape::sphere(1.0), Behavior::RigidBody).unwrap();
        let b = w.create_object(Shape::sphere(1.0), Behavior::RigidBody).unwrap();
        w.body_mut(b).unwrap().set_position(Point3::new(1.5, 0.0, 0.0));

        let stats = w.update(0.0).unwrap();
        assert_eq!(stats.candidate_pairs, 1);
        assert_eq!(stats.contacts, 1);
        assert_eq!(stats.resting, 1);
    }

    #[test]
    fn test_paused_world_does_not_move() {
        let mut w = world();
        w.set_paused(true);
        let h = w.create_object(Shape::sphere(1.0), Behavior::RigidBody).unwrap();
        w.body_mut(h).unwrap().set_position(Point3::new(0.0, 5.0, 0.0));

        for _ in 0..10 {
            w.update(DT).unwrap();
        }
        assert_eq!(w.body(h).unwrap().position(), Point3::new(0.0, 5.0, 0.0));
        assert!(w.is_paused());

        w.set_paused(false);
        w.update(DT).unwrap();
        assert!(w.body(h).unwrap().momentum().y < 0.0);
    }

    #[test]
    fn test_free_fall_momentum() {
        let mut w = world();
        let h = w.create_object(Shape::sphere(1.0), Behavior::RigidBody).unwrap();
        let mass = w.body(h).unwrap().mass();
        w.body_mut(h).unwrap().set_damping(1.0).unwrap();

        for _ in 0..60 {
            w.update(DT).unwrap();
        }
        assert_relative_eq!(w.total_linear_momentum().y, -9.81 * mass, epsilon = 1e-9);
        assert!(w.total_kinetic_energy() > 0.0);
    }

    #[test]
    fn test_forces_reach_bodies_through_world() {
        let mut w = PhysicsWorld::new(PhysicsConfig::default().zero_gravity()).unwrap();
        let h = w.create_object(Shape::sphere(1.0), Behavior::RigidBody).unwrap();
        w.body_mut(h).unwrap().set_damping(1.0).unwrap();
        w.body_mut(h).unwrap().apply_force(Vector3::new(60.0, 0.0, 0.0));

        w.update(DT).unwrap();
        assert_relative_eq!(w.body(h).unwrap().momentum().x, 1.0, epsilon = 1e-12);

        // Accumulators are cleared each tick.
        w.update(DT).unwrap();
        assert_relative_eq!(w.body(h).unwrap().momentum().x, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_static_pairs_are_immovable() {
        let mut w = world();
        w.create_object(Shape::ground_plane(0.0), Behavior::Static).unwrap();
        let rock = w.create_object(Shape::sphere(1.0), Behavior::Static).unwrap();

        let stats = w.update(DT).unwrap();
        assert_eq!(stats.immovable, 1);
        assert_eq!(w.body(rock).unwrap().position(), Point3::origin());
    }

    #[test]
    fn test_helpers_follow_bodies() {
        let log = Rc::new(RefCell::new(HelperLog::default()));
        let mut w = world();
        let h = w.create_object(Shape::sphere(1.0), Behavior::RigidBody).unwrap();

        // Toggling before a renderer exists only records the flag.
        w.show_helper(h, true).unwrap();
        assert!(w.body(h).unwrap().helper_shown());
        assert!(w.body(h).unwrap().proxy().debug_handle().is_none());

        w.set_debug_renderer(Box::new(RecordingRenderer(Rc::clone(&log))));
        assert!(w.has_debug_renderer());
        assert_eq!(log.borrow().live.len(), 1);
        assert_eq!(log.borrow().shown.len(), 1);

        w.update(DT).unwrap();
        assert_eq!(log.borrow().updates, 1);

        w.show_helper(h, false).unwrap();
        assert!(log.borrow().shown.is_empty());
        assert_eq!(log.borrow().live.len(), 1);

        w.release(h).unwrap();
        w.update(DT).unwrap();
        assert!(log.borrow().live.is_empty());
        assert!(w.show_helper(h, true).is_err());
    }

    #[test]
    fn test_take_renderer_destroys_helpers() {
        let log = Rc::new(RefCell::new(HelperLog::default()));
        let mut w = world();
        w.set_debug_renderer(Box::new(RecordingRenderer(Rc::clone(&log))));
        let h = w.create_object(Shape::sphere(1.0), Behavior::Static).unwrap();
        w.show_helper(h, true).unwrap();
        assert_eq!(log.borrow().live.len(), 1);

        assert!(w.take_debug_renderer().is_some());
        assert!(log.borrow().live.is_empty());
        assert!(w.body(h).unwrap().proxy().debug_handle().is_none());
        assert!(w.take_debug_renderer().is_none());
    }

    #[test]
    fn test_renderer_does_not_change_results() {
        let run = |with_renderer: bool| {
            let mut w = world();
            w.create_object(Shape::ground_plane(0.0), Behavior::Static).unwrap();
            let h = w.create_object(Shape::sphere(1.0), Behavior::RigidBody).unwrap();
            w.body_mut(h).unwrap().set_position(Point3::new(0.0, 3.0, 0.0));
            if with_renderer {
                let log = Rc::new(RefCell::new(HelperLog::default()));
                w.set_debug_renderer(Box::new(RecordingRenderer(log)));
                w.show_helper(h, true).unwrap();
            }
            for _ in 0..120 {
                w.update(DT).unwrap();
            }
            w.body(h).unwrap().position()
        };
        assert_eq!(run(false), run(true));
    }

    #[test]
    fn test_terrain_update_before_create_fails() {
        let mut w = world();
        let samples = [0.0_f32; 4];
        let heights = HeightMap::new(&samples, 2, 2).unwrap();
        let region = Aabb::new(Point3::new(0.0, -1.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        assert_eq!(
            w.update_terrain_heightmap(&heights, &region),
            Err(PhysError::TerrainNotCreated)
        );
    }

    #[test]
    fn test_body_rests_on_terrain() {
        let mut w = world();
        let samples = [0.0_f32; 16];
        let heights = HeightMap::new(&samples, 4, 4).unwrap();
        let params = TerrainParams::new(8, 8, 1.0).with_offset(Vector3::new(-4.0, 0.0, -4.0));
        w.create_terrain(&heights, params).unwrap();
        assert!(w.terrain().is_created());

        let h = w.create_object(Shape::sphere(0.5), Behavior::RigidBody).unwrap();
        w.body_mut(h).unwrap().set_position(Point3::new(0.3, 2.0, 0.2));

        let mut terrain_contacts = 0;
        for _ in 0..300 {
            terrain_contacts += w.update(DT).unwrap().contacts;
        }
        assert!(terrain_contacts > 0);
        let y = w.body(h).unwrap().position().y;
        assert!(y > 0.4 && y < 0.55, "sphere settled at {y}");
    }
}
