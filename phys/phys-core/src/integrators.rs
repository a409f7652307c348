//! Time integration helpers for body state.
//!
//! Bodies carry momentum rather than velocity, so the helpers here work on
//! momenta and world-frame angular velocity.
//!
//! # Example
//!
//! ```
//! use phys_core::integrators::integrate_rotation;
//! use nalgebra::{UnitQuaternion, Vector3};
//!
//! let mut rotation = UnitQuaternion::identity();
//! let omega = Vector3::new(0.0, std::f64::consts::PI, 0.0);
//!
//! // Half a turn about Y in one second.
//! integrate_rotation(&mut rotation, &omega, 1.0);
//! assert!((rotation.angle() - std::f64::consts::PI).abs() < 1e-9);
//! ```

use nalgebra::{Quaternion, UnitQuaternion, Vector3};

/// Below this rotation angle per step the first-order exponential is used.
pub const SMALL_ANGLE: f64 = 1e-3;

/// Advance an orientation by a world-frame angular velocity.
///
/// The increment is the quaternion exponential of `omega * dt`, applied on
/// the left. Small angles use the first-order form `(1, omega * dt / 2)`,
/// renormalized; larger ones build the exact axis-angle rotation.
pub fn integrate_rotation(rotation: &mut UnitQuaternion<f64>, omega: &Vector3<f64>, dt: f64) {
    let scaled = omega * dt;
    let angle = scaled.norm();
    if angle <= 0.0 {
        return;
    }

    let delta = if angle < SMALL_ANGLE {
        UnitQuaternion::new_normalize(Quaternion::from_parts(1.0, scaled * 0.5))
    } else {
        UnitQuaternion::from_scaled_axis(scaled)
    };
    *rotation = delta * *rotation;
}

/// Exponential momentum damping: `P * damping^dt`.
#[must_use]
pub fn damp(momentum: &Vector3<f64>, damping: f64, dt: f64) -> Vector3<f64> {
    momentum * damping.powf(dt)
}
