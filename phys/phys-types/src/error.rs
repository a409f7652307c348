//! Error types for physics operations.

use thiserror::Error;

use crate::BodyHandle;

/// Errors reported by the physics core.
///
/// All of these are configuration errors: the call that produced one is a
/// no-op and leaves the previous state untouched. Missing narrow-phase
/// coverage and numeric degeneracies are never reported as errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PhysError {
    /// The handle was never issued, or its body has been swept from the pool.
    #[error("invalid body handle: {0}")]
    InvalidHandle(BodyHandle),

    /// Invalid timestep.
    #[error("invalid timestep: {0} (must be non-negative and finite)")]
    InvalidTimestep(f64),

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Shape parameters are out of range.
    #[error("invalid shape: {reason}")]
    InvalidShape {
        /// Description of what's wrong.
        reason: String,
    },

    /// Invalid mass properties.
    #[error("invalid mass properties: {reason}")]
    InvalidMassProperties {
        /// Description of what's wrong.
        reason: String,
    },

    /// Terrain or height source parameters are out of range.
    #[error("invalid terrain: {reason}")]
    InvalidTerrain {
        /// Description of what's wrong.
        reason: String,
    },

    /// The terrain was edited before it was created.
    #[error("terrain has not been created")]
    TerrainNotCreated,
}

impl PhysError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid shape error.
    #[must_use]
    pub fn invalid_shape(reason: impl Into<String>) -> Self {
        Self::InvalidShape {
            reason: reason.into(),
        }
    }

    /// Create an invalid mass properties error.
    #[must_use]
    pub fn invalid_mass(reason: impl Into<String>) -> Self {
        Self::InvalidMassProperties {
            reason: reason.into(),
        }
    }

    /// Create an invalid terrain error.
    #[must_use]
    pub fn invalid_terrain(reason: impl Into<String>) -> Self {
        Self::InvalidTerrain {
            reason: reason.into(),
        }
    }

    /// Check if this is a configuration error.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }

    /// Check if this error concerns a stale or unknown handle.
    #[must_use]
    pub fn is_invalid_handle(&self) -> bool {
        matches!(self, Self::InvalidHandle(_))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PhysError::InvalidHandle(BodyHandle::new(3, 7));
        assert!(err.to_string().contains("3"));
        assert!(err.to_string().contains("7"));

        let err = PhysError::InvalidTimestep(-0.5);
        assert!(err.to_string().contains("-0.5"));

        let err = PhysError::invalid_terrain("zero segments");
        assert!(err.to_string().contains("zero segments"));

        assert_eq!(
            PhysError::TerrainNotCreated.to_string(),
            "terrain has not been created"
        );
    }

    #[test]
    fn test_error_predicates() {
        let err = PhysError::invalid_config("bad value");
        assert!(err.is_config_error());
        assert!(!err.is_invalid_handle());

        let err = PhysError::InvalidHandle(BodyHandle::new(0, 0));
        assert!(err.is_invalid_handle());
        assert!(!err.is_config_error());
    }
}
