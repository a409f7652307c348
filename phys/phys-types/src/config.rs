//! Configuration types for the physics core.
//!
//! [`PhysicsConfig`] tunes the integrator and the contact solver;
//! [`TerrainParams`] describes how a heightfield is turned into a grid mesh.

use nalgebra::Vector3;

use crate::material::MaterialTable;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Main configuration for the physics world.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PhysicsConfig {
    /// Gravitational acceleration (m/s²). Y is up.
    pub gravity: Vector3<f64>,
    /// Relative normal speed below which a contact is treated as resting (m/s).
    pub resting_tolerance: f64,
    /// Fraction of interpenetration removed per tick for general contacts.
    pub penetration_correction: f64,
    /// Fraction of interpenetration removed per tick for living bodies on ground.
    pub living_penetration_correction: f64,
    /// Fraction of tangential momentum an idle living body loses per ground contact.
    pub living_ground_friction: f64,
    /// Minimum cosine between the contact normal and "up" for a living
    /// contact to count as standing on ground.
    pub living_ground_slope: f64,
    /// Momentum damping assigned to new bodies (`P *= damping^dt`).
    pub default_damping: f64,
    /// Vertical padding added to terrain tree bounds so height edits stay
    /// inside the existing hierarchy.
    pub terrain_y_bounds_bias: f64,
    /// Freeze motion: integration runs with a zero timestep and positional
    /// interpenetration correction is skipped.
    pub paused: bool,
    /// Materials addressable by body material ids.
    pub materials: MaterialTable,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vector3::new(0.0, -9.81, 0.0),
            resting_tolerance: 0.25,
            penetration_correction: 0.2,
            living_penetration_correction: 0.95,
            living_ground_friction: 0.5,
            living_ground_slope: 0.5,
            default_damping: 0.99,
            terrain_y_bounds_bias: 1.0,
            paused: false,
            materials: MaterialTable::default(),
        }
    }
}

impl PhysicsConfig {
    /// Set the gravity vector.
    #[must_use]
    pub fn gravity(mut self, gravity: Vector3<f64>) -> Self {
        self.gravity = gravity;
        self
    }

    /// Disable gravity (zero-G environment).
    #[must_use]
    pub fn zero_gravity(mut self) -> Self {
        self.gravity = Vector3::zeros();
        self
    }

    /// Set the resting-contact tolerance.
    #[must_use]
    pub fn with_resting_tolerance(mut self, tolerance: f64) -> Self {
        self.resting_tolerance = tolerance;
        self
    }

    /// Set the damping new bodies start with.
    #[must_use]
    pub fn with_default_damping(mut self, damping: f64) -> Self {
        self.default_damping = damping;
        self
    }

    /// Replace the material table.
    #[must_use]
    pub fn with_materials(mut self, materials: MaterialTable) -> Self {
        self.materials = materials;
        self
    }

    /// Start paused.
    #[must_use]
    pub fn paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }

    /// Unit "up" direction: opposite to gravity, or +Y without gravity.
    #[must_use]
    pub fn up(&self) -> Vector3<f64> {
        let norm = self.gravity.norm();
        if norm > 1e-12 {
            -self.gravity / norm
        } else {
            Vector3::y()
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.gravity.iter().all(|g| g.is_finite()) {
            return Err(crate::PhysError::invalid_config("gravity must be finite"));
        }
        if !self.resting_tolerance.is_finite() || self.resting_tolerance < 0.0 {
            return Err(crate::PhysError::invalid_config(
                "resting_tolerance must be non-negative",
            ));
        }
        for (name, value) in [
            ("penetration_correction", self.penetration_correction),
            (
                "living_penetration_correction",
                self.living_penetration_correction,
            ),
            ("living_ground_friction", self.living_ground_friction),
            ("living_ground_slope", self.living_ground_slope),
            ("default_damping", self.default_damping),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(crate::PhysError::invalid_config(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }
        if !self.terrain_y_bounds_bias.is_finite() || self.terrain_y_bounds_bias < 0.0 {
            return Err(crate::PhysError::invalid_config(
                "terrain_y_bounds_bias must be non-negative",
            ));
        }
        self.materials.validate()
    }
}

/// Subdivision scheme of the spatial tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TreeSplit {
    /// Split X and Z in half (four children). Suits heightfields.
    #[default]
    Quad,
    /// Split all three axes in half (eight children).
    Oct,
}

impl TreeSplit {
    /// Number of child cells per split.
    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Self::Quad => 4,
            Self::Oct => 8,
        }
    }
}

/// Terrain generation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TerrainParams {
    /// Number of grid cells along X.
    pub segments_x: usize,
    /// Number of grid cells along Z.
    pub segments_z: usize,
    /// Edge length of one grid cell (m).
    pub segment_size: f64,
    /// Multiplier applied to height samples.
    pub height_scale: f64,
    /// World position of grid vertex (0, 0) at height zero.
    pub offset: Vector3<f64>,
    /// Leaf capacity of the terrain's spatial tree.
    pub max_tris_per_leaf: usize,
    /// Subdivision scheme of the terrain's spatial tree.
    pub split: TreeSplit,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            segments_x: 64,
            segments_z: 64,
            segment_size: 1.0,
            height_scale: 1.0,
            offset: Vector3::zeros(),
            max_tris_per_leaf: 32,
            split: TreeSplit::Quad,
        }
    }
}

impl TerrainParams {
    /// Create parameters for a grid of `segments_x` by `segments_z` cells.
    #[must_use]
    pub fn new(segments_x: usize, segments_z: usize, segment_size: f64) -> Self {
        Self {
            segments_x,
            segments_z,
            segment_size,
            ..Default::default()
        }
    }

    /// Set the height multiplier.
    #[must_use]
    pub fn with_height_scale(mut self, height_scale: f64) -> Self {
        self.height_scale = height_scale;
        self
    }

    /// Set the world offset of the grid origin.
    #[must_use]
    pub fn with_offset(mut self, offset: Vector3<f64>) -> Self {
        self.offset = offset;
        self
    }

    /// Set the tree leaf capacity.
    #[must_use]
    pub fn with_max_tris_per_leaf(mut self, max: usize) -> Self {
        self.max_tris_per_leaf = max;
        self
    }

    /// Total number of grid vertices.
    #[must_use]
    pub fn point_count(&self) -> usize {
        (self.segments_x + 1) * (self.segments_z + 1)
    }

    /// Total number of triangles (two per cell).
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.segments_x * self.segments_z * 2
    }

    /// Validate the parameters.
    pub fn validate(&self) -> crate::Result<()> {
        if self.segments_x == 0 || self.segments_z == 0 {
            return Err(crate::PhysError::invalid_terrain(format!(
                "segment counts must be positive, got {}x{}",
                self.segments_x, self.segments_z
            )));
        }
        if !self.segment_size.is_finite() || self.segment_size <= 0.0 {
            return Err(crate::PhysError::invalid_terrain(format!(
                "segment_size must be positive, got {}",
                self.segment_size
            )));
        }
        if !self.height_scale.is_finite() {
            return Err(crate::PhysError::invalid_terrain(
                "height_scale must be finite",
            ));
        }
        if !self.offset.iter().all(|v| v.is_finite()) {
            return Err(crate::PhysError::invalid_terrain("offset must be finite"));
        }
        if self.max_tris_per_leaf == 0 {
            return Err(crate::PhysError::invalid_terrain(
                "max_tris_per_leaf must be at least 1",
            ));
        }
        Ok(())
    }
}
