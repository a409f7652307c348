//! Affine transform from a body's local frame to the world.

use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector3};

/// Scale components smaller than this are clamped when inverting.
const MIN_SCALE: f64 = 1e-12;

/// Rotation, non-uniform scale and translation applied as
/// `x' = R * (S ⊙ x) + t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Translation applied last.
    pub translation: Vector3<f64>,
    /// Rotation applied after scaling.
    pub rotation: UnitQuaternion<f64>,
    /// Per-axis scale applied first, in local coordinates.
    pub scale: Vector3<f64>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    /// The identity transform.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Create a transform from its parts.
    #[must_use]
    pub const fn new(
        translation: Vector3<f64>,
        rotation: UnitQuaternion<f64>,
        scale: Vector3<f64>,
    ) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Transform of a body whose local center of mass `com` sits at world
    /// position `pos`.
    #[must_use]
    pub fn for_body(
        pos: &Point3<f64>,
        rotation: UnitQuaternion<f64>,
        scale: Vector3<f64>,
        com: &Vector3<f64>,
    ) -> Self {
        let translation = pos.coords - rotation * scale.component_mul(com);
        Self::new(translation, rotation, scale)
    }

    /// Transform a point.
    #[must_use]
    pub fn transform_point(&self, p: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation * self.scale.component_mul(&p.coords) + self.translation)
    }

    /// Transform a direction (no translation).
    #[must_use]
    pub fn transform_vector(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * self.scale.component_mul(v)
    }

    /// Transform a surface normal (inverse-transpose), unnormalized.
    #[must_use]
    pub fn transform_normal(&self, n: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * n.component_div(&self.safe_scale())
    }

    /// Map a world point back into local coordinates.
    #[must_use]
    pub fn inverse_transform_point(&self, p: &Point3<f64>) -> Point3<f64> {
        let local = self.rotation.inverse() * (p.coords - self.translation);
        Point3::from(local.component_div(&self.safe_scale()))
    }

    /// Largest absolute scale component.
    #[must_use]
    pub fn max_scale(&self) -> f64 {
        self.scale.abs().max()
    }

    /// Homogeneous 4x4 matrix.
    #[must_use]
    pub fn to_homogeneous(&self) -> Matrix4<f64> {
        let mut m = self.rotation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&self.scale);
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        m
    }

    /// Homogeneous matrix of the inverse transform. Degenerate scale
    /// components are clamped rather than producing infinities.
    #[must_use]
    pub fn inverse_homogeneous(&self) -> Matrix4<f64> {
        let inv_scale = Vector3::new(1.0, 1.0, 1.0).component_div(&self.safe_scale());
        let inv_rot = self.rotation.inverse();
        Matrix4::new_nonuniform_scaling(&inv_scale)
            * inv_rot.to_homogeneous()
            * Matrix4::new_translation(&(-self.translation))
    }

    fn safe_scale(&self) -> Vector3<f64> {
        self.scale.map(|s| {
            if s.abs() < MIN_SCALE {
                MIN_SCALE.copysign(s)
            } else {
                s
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> Transform {
        Transform::new(
            Vector3::new(1.0, -2.0, 3.0),
            UnitQuaternion::from_euler_angles(0.3, -0.7, 1.1),
            Vector3::new(2.0, 0.5, 1.5),
        )
    }

    #[test]
    fn test_matrix_matches_direct_transform() {
        let t = sample();
        let p = Point3::new(0.4, -1.2, 2.5);
        let m = t.to_homogeneous();
        assert_relative_eq!(m.transform_point(&p), t.transform_point(&p), epsilon = 1e-12);
    }

    #[test]
    fn test_inverse_round_trip() {
        let t = sample();
        let p = Point3::new(-3.0, 0.25, 7.0);
        let world = t.transform_point(&p);
        assert_relative_eq!(t.inverse_transform_point(&world), p, epsilon = 1e-10);

        let back = t.inverse_homogeneous().transform_point(&world);
        assert_relative_eq!(back, p, epsilon = 1e-10);
    }

    #[test]
    fn test_body_transform_places_com_at_position() {
        let com = Vector3::new(0.5, 0.0, -0.25);
        let pos = Point3::new(10.0, 2.0, 0.0);
        let rot = UnitQuaternion::from_euler_angles(0.0, 1.0, 0.0);
        let t = Transform::for_body(&pos, rot, Vector3::new(1.0, 1.0, 1.0), &com);
        assert_relative_eq!(t.transform_point(&Point3::from(com)), pos, epsilon = 1e-12);
    }

    #[test]
    fn test_normal_stays_perpendicular_under_nonuniform_scale() {
        let t = sample();
        let tangent = Vector3::new(1.0, 1.0, 0.0);
        let normal = Vector3::new(1.0, -1.0, 0.0);
        let wt = t.transform_vector(&tangent);
        let wn = t.transform_normal(&normal);
        assert_relative_eq!(wt.dot(&wn), 0.0, epsilon = 1e-12);
    }
}
