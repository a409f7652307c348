//! Core data types for the rigid-body physics core.
//!
//! This crate holds the plain data shared between the physics core and its
//! callers:
//!
//! - [`BodyHandle`] - Generation-checked reference to a pooled body
//! - [`Behavior`] - The three body modes (static, rigid body, living)
//! - [`MassProperties`] - Shape-derived inverse inertia, volume, center of mass
//! - [`PhysicsConfig`] / [`TerrainParams`] - Tunables for the solver and the terrain proxy
//! - [`Material`] / [`MaterialTable`] - Per-body restitution and friction
//! - [`PhysError`] - Configuration errors reported by the core
//!
//! # Design Philosophy
//!
//! These types carry no simulation behavior. Validation and combination rules
//! live here because they only depend on the data itself.
//!
//! # Coordinate System
//!
//! - X: right
//! - Y: up
//! - Z: forward (terrain grids span the XZ plane)
//! - Right-handed
//!
//! # Example
//!
//! ```
//! use phys_types::{Behavior, PhysicsConfig};
//!
//! let config = PhysicsConfig::default();
//! assert!(config.validate().is_ok());
//! assert!(config.gravity.y < 0.0);
//! assert!(Behavior::RigidBody.is_dynamic());
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::missing_errors_doc,        // Error docs added where non-obvious
)]

mod body;
mod config;
mod error;
mod material;

pub use body::{Behavior, BodyHandle, MassProperties};
pub use config::{PhysicsConfig, TerrainParams, TreeSplit};
pub use error::PhysError;
pub use material::{Material, MaterialId, MaterialTable};

// Re-export math types for convenience
pub use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};

/// Result type for physics operations.
pub type Result<T> = std::result::Result<T, PhysError>;
