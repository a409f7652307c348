//! Optional debug visualization collaborator.
//!
//! The world never depends on a renderer to simulate correctly. When one is
//! attached with [`PhysicsWorld::set_debug_renderer`](crate::PhysicsWorld::set_debug_renderer),
//! bodies whose helper is shown get a renderable created from their world
//! shape, refreshed after every tick and destroyed when the body is swept.

use phys_types::Behavior;

use crate::shape::Shape;

/// RGBA color in `[0, 1]`.
pub type DebugColor = [f32; 4];

/// Opaque id of a renderable owned by a [`DebugRenderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DebugHandle(pub u64);

/// Receiver of shape snapshots for visualization.
pub trait DebugRenderer {
    /// Build a renderable for `shape`.
    fn create_helper(&mut self, shape: &Shape, color: DebugColor) -> DebugHandle;

    /// Refresh a renderable's geometry after its body moved.
    fn update_helper(&mut self, handle: DebugHandle, shape: &Shape);

    /// Toggle visibility.
    fn show(&mut self, handle: DebugHandle, visible: bool);

    /// Current visibility.
    fn is_shown(&self, handle: DebugHandle) -> bool;

    /// Drop a renderable.
    fn destroy_helper(&mut self, handle: DebugHandle);
}

/// Default helper color for a behavior mode.
#[must_use]
pub fn behavior_color(behavior: Behavior) -> DebugColor {
    match behavior {
        Behavior::Static => [0.6, 0.6, 0.6, 1.0],
        Behavior::RigidBody => [0.2, 0.8, 0.2, 1.0],
        Behavior::Living => [0.2, 0.4, 1.0, 1.0],
    }
}
