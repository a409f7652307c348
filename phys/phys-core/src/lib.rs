//! Real-time rigid-body physics core.
//!
//! This crate simulates bodies in three behavior modes (static, rigid body
//! and living/character), detects contacts between a closed set of collision
//! shapes and resolves them with a single-pass impulse solver. A heightfield
//! terrain proxy with partial resampling sits alongside the body pool.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       PhysicsWorld                          │
//! │  Body pool (generation handles), terrain, debug renderer    │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │ update(dt)
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  PhysObject::update: momentum → velocity → pose → proxy     │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  BroadPhase: world AABB overlaps (bodies, then terrain)     │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  intersect: world shapes → {point, normal, dist}            │
//! │  resolve_contact: impulses, friction, penetration push      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Mesh and terrain shapes answer queries through a [`SpatialTree`] over
//! their triangles.
//!
//! # Quick Start
//!
//! ```
//! use phys_core::{PhysicsWorld, Shape};
//! use phys_types::{Behavior, PhysicsConfig};
//! use nalgebra::Point3;
//!
//! let mut world = PhysicsWorld::new(PhysicsConfig::default())?;
//! world.create_object(Shape::ground_plane(0.0), Behavior::Static)?;
//!
//! let ball = world.create_object(Shape::sphere(1.0), Behavior::RigidBody)?;
//! if let Some(body) = world.body_mut(ball) {
//!     body.set_position(Point3::new(0.0, 5.0, 0.0));
//! }
//!
//! for _ in 0..300 {
//!     world.update(1.0 / 60.0)?;
//! }
//!
//! let y = world.body(ball).map(|b| b.position().y);
//! assert!(y.is_some_and(|y| (y - 1.0).abs() < 0.05));
//! # Ok::<(), phys_types::PhysError>(())
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,       // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,           // mul_add style changes aren't always clearer
    clippy::missing_errors_doc,         // Error docs added where non-obvious
    clippy::option_if_let_else,         // if-let is often more readable than map_or_else
    clippy::doc_markdown,               // Not all technical terms need backticks
)]

// Geometry primitives
pub mod aabb;
pub mod transform;

// Shapes and their mass properties
pub mod mass;
pub mod shape;

// Triangle meshes and their acceleration structure
pub mod mesh;
pub mod spatial_tree;

// Collision detection
pub mod broad_phase;
pub mod narrow_phase;

// Bodies, integration and contact resolution
pub mod body;
pub mod integrators;
pub mod solver;

// Terrain, pool and visualization hook
pub mod debug;
pub mod terrain;
pub mod world;

pub use aabb::Aabb;
pub use body::{PhysObject, Proxy, DEFAULT_DAMPING};
pub use broad_phase::{AllPairs, BroadPhase, CandidatePair, PairTarget};
pub use debug::{behavior_color, DebugColor, DebugHandle, DebugRenderer};
pub use mass::compute_mass_properties;
pub use mesh::{TerrainMesh, TriangleMesh, TriangleSource};
pub use narrow_phase::{intersect, is_supported, Intersection};
pub use shape::{Shape, ShapeKind};
pub use solver::{resolve_contact, ContactOutcome};
pub use spatial_tree::SpatialTree;
pub use terrain::{HeightMap, PhysTerrain};
pub use transform::Transform;
pub use world::{PhysicsWorld, StepStats};

// Re-export the data types callers need alongside the core.
pub use phys_types::{
    Behavior, BodyHandle, MassProperties, Material, MaterialId, MaterialTable, PhysError,
    PhysicsConfig, Result, TerrainParams, TreeSplit,
};
