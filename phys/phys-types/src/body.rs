//! Body identity, behavior modes and shape-derived mass properties.

use nalgebra::{Matrix3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Generation-checked reference to a body owned by the physics pool.
///
/// The `index` names a pool slot; `generation` is bumped every time that slot
/// is reclaimed, so a handle kept across the release of its body resolves to
/// nothing instead of aliasing whatever reuses the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyHandle {
    index: u32,
    generation: u32,
}

impl BodyHandle {
    /// Create a handle from a slot index and generation.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index in the pool.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot this handle was issued for.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl std::fmt::Display for BodyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Body({}v{})", self.index, self.generation)
    }
}

/// Behavior mode of a body.
///
/// Transitions are always explicit; nothing in the core changes a body's
/// mode on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Behavior {
    /// Immovable: zero inverse mass and zero inverse inertia.
    #[default]
    Static,
    /// Free 6-DOF body under gravity.
    RigidBody,
    /// Character body: gravity applies, angular state is zeroed every tick.
    Living,
}

impl Behavior {
    /// Whether bodies in this mode respond to forces and impulses.
    #[must_use]
    pub const fn is_dynamic(self) -> bool {
        matches!(self, Self::RigidBody | Self::Living)
    }

    /// Whether bodies in this mode are allowed to rotate.
    #[must_use]
    pub const fn can_rotate(self) -> bool {
        matches!(self, Self::RigidBody)
    }
}

/// Mass properties derived from a shape at unit density.
///
/// The body-space inertia is stored inverted because that is the form the
/// integrator and the solver consume. A zero matrix means the shape carries
/// no usable inertia (planes, terrain).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MassProperties {
    /// Inverse inertia tensor in body space, computed at unit density.
    pub inv_inertia_body: Matrix3<f64>,
    /// Volume of the shape (mass at unit density).
    pub volume: f64,
    /// Center of mass in the shape's local coordinates.
    pub center_of_mass: Vector3<f64>,
}

impl Default for MassProperties {
    fn default() -> Self {
        Self::unweighted()
    }
}

impl MassProperties {
    /// Volumes at or below this are treated as degenerate.
    pub const MIN_VOLUME: f64 = 1e-9;

    /// Create mass properties from an inverse body inertia, volume and COM.
    #[must_use]
    pub const fn new(
        inv_inertia_body: Matrix3<f64>,
        volume: f64,
        center_of_mass: Vector3<f64>,
    ) -> Self {
        Self {
            inv_inertia_body,
            volume,
            center_of_mass,
        }
    }

    /// Placeholder properties for shapes without a meaningful mass
    /// (planes and terrain): unit volume, no inertia.
    #[must_use]
    pub fn unweighted() -> Self {
        Self {
            inv_inertia_body: Matrix3::zeros(),
            volume: 1.0,
            center_of_mass: Vector3::zeros(),
        }
    }

    /// Build from a non-inverted body inertia. A singular inertia yields a
    /// zero inverse.
    #[must_use]
    pub fn from_inertia(inertia: Matrix3<f64>, volume: f64, center_of_mass: Vector3<f64>) -> Self {
        Self {
            inv_inertia_body: inertia.try_inverse().unwrap_or_else(Matrix3::zeros),
            volume,
            center_of_mass,
        }
    }

    /// Whether these properties may back a dynamic body.
    #[must_use]
    pub fn is_weighted(&self) -> bool {
        self.volume.is_finite() && self.volume > Self::MIN_VOLUME
    }

    /// The body-space inertia tensor, if the inverse is invertible.
    #[must_use]
    pub fn inertia_body(&self) -> Option<Matrix3<f64>> {
        self.inv_inertia_body.try_inverse()
    }
}
