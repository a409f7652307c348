//! Mass properties of shapes at unit density.
//!
//! Every formula returns the volume (equal to the mass at density 1), the
//! center of mass in the shape's local frame and the inverse of the inertia
//! tensor about that center. A body with mass `M` scales the inverse
//! inertia by `V / M`.
//!
//! Planes and terrain carry no meaningful mass; they get
//! [`MassProperties::unweighted`] and are only usable on static bodies.

use std::f64::consts::PI;

use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};
use phys_types::MassProperties;

use crate::mesh::TriangleMesh;
use crate::shape::Shape;

/// Compute mass properties of a shape at unit density.
#[must_use]
pub fn compute_mass_properties(shape: &Shape) -> MassProperties {
    match shape {
        Shape::Sphere { center, radius } => sphere(center, *radius),
        Shape::Box {
            center,
            half_extents,
            rotation,
        } => cuboid(center, half_extents, rotation),
        Shape::Capsule {
            center,
            axis,
            radius,
            half_height,
        } => capsule(center, axis, *radius, *half_height),
        Shape::Cylinder { p0, p1, radius } => cylinder(p0, p1, *radius),
        Shape::Mesh(mesh) => triangle_mesh(mesh),
        Shape::Plane { .. } | Shape::TerrainMesh(_) => MassProperties::unweighted(),
    }
}

fn sphere(center: &Point3<f64>, r: f64) -> MassProperties {
    let volume = 4.0 / 3.0 * PI * r.powi(3);
    let i = 0.4 * volume * r * r;
    MassProperties::from_inertia(Matrix3::from_diagonal_element(i), volume, center.coords)
}

fn cuboid(
    center: &Point3<f64>,
    half_extents: &Vector3<f64>,
    rotation: &UnitQuaternion<f64>,
) -> MassProperties {
    let size = half_extents * 2.0;
    let volume = size.x * size.y * size.z;
    let c = volume / 12.0;
    let local = Matrix3::from_diagonal(&Vector3::new(
        c * (size.y * size.y + size.z * size.z),
        c * (size.x * size.x + size.z * size.z),
        c * (size.x * size.x + size.y * size.y),
    ));
    let r = rotation.to_rotation_matrix();
    let inertia = r.matrix() * local * r.matrix().transpose();
    MassProperties::from_inertia(inertia, volume, center.coords)
}

/// Inertia of a body symmetric about unit axis `d`: `a` about the
/// transverse axes, `b` about `d` itself.
fn axisymmetric(d: &Vector3<f64>, transverse: f64, axial: f64) -> Matrix3<f64> {
    let ddt = d * d.transpose();
    (Matrix3::identity() - ddt) * transverse + ddt * axial
}

fn unit_or_y(v: &Vector3<f64>) -> Vector3<f64> {
    v.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::y)
}

fn cylinder(p0: &Point3<f64>, p1: &Point3<f64>, r: f64) -> MassProperties {
    let axis = p1 - p0;
    let h = axis.norm();
    let volume = PI * r * r * h;
    let transverse = volume * (3.0 * r * r + h * h) / 12.0;
    let axial = 0.5 * volume * r * r;
    let inertia = axisymmetric(&unit_or_y(&axis), transverse, axial);
    MassProperties::from_inertia(inertia, volume, nalgebra::center(p0, p1).coords)
}

fn capsule(center: &Point3<f64>, axis: &Vector3<f64>, r: f64, half_height: f64) -> MassProperties {
    let h = 2.0 * half_height;
    let cyl_volume = PI * r * r * h;
    let caps_volume = 4.0 / 3.0 * PI * r.powi(3);

    // Cylinder about its own center, plus both hemispheres shifted to the
    // segment ends (parallel axis theorem on each half).
    let axial = 0.5 * cyl_volume * r * r + 0.4 * caps_volume * r * r;
    let transverse = cyl_volume * (3.0 * r * r + h * h) / 12.0
        + caps_volume * (0.4 * r * r + 0.25 * h * h + 0.375 * h * r);

    let inertia = axisymmetric(&unit_or_y(axis), transverse, axial);
    MassProperties::from_inertia(inertia, cyl_volume + caps_volume, center.coords)
}

/// Canonical covariance of the unit tetrahedron `(0, e1, e2, e3)`.
fn canonical_covariance() -> Matrix3<f64> {
    Matrix3::new(2.0, 1.0, 1.0, 1.0, 2.0, 1.0, 1.0, 1.0, 2.0) / 120.0
}

/// Mass properties of a closed, outward-wound mesh.
///
/// The solid is decomposed into tetrahedra joining the origin to each
/// triangle. Each contributes `det(A) * A * C * Aᵀ` to the covariance, with
/// `A` the matrix of its three vertices. The covariance is shifted to the
/// center of mass and turned into inertia as `tr(C) * I - C`.
fn triangle_mesh(mesh: &TriangleMesh) -> MassProperties {
    let canonical = canonical_covariance();
    let mut covariance = Matrix3::zeros();
    let mut volume = 0.0;
    let mut weighted_center = Vector3::zeros();

    for tri in mesh.triangles() {
        let a = Matrix3::from_columns(&[tri[0].coords, tri[1].coords, tri[2].coords]);
        let det = a.determinant();
        covariance += a * canonical * a.transpose() * det;
        let tet_volume = det / 6.0;
        volume += tet_volume;
        weighted_center += (tri[0].coords + tri[1].coords + tri[2].coords) * (tet_volume / 4.0);
    }

    // Inward winding yields a negative volume; the magnitude is what counts.
    if volume < 0.0 {
        volume = -volume;
        covariance = -covariance;
        weighted_center = -weighted_center;
    }
    if volume <= MassProperties::MIN_VOLUME {
        return MassProperties::new(Matrix3::zeros(), volume, Vector3::zeros());
    }

    let com = weighted_center / volume;
    let shifted = covariance - com * com.transpose() * volume;
    let inertia = Matrix3::identity() * shifted.trace() - shifted;
    MassProperties::from_inertia(inertia, volume, com)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Closed box mesh with outward winding.
    fn box_mesh(h: Vector3<f64>, offset: Vector3<f64>) -> Shape {
        let mut points = Vec::new();
        for i in 0..8 {
            let sx = if i & 1 == 0 { -h.x } else { h.x };
            let sy = if i & 2 == 0 { -h.y } else { h.y };
            let sz = if i & 4 == 0 { -h.z } else { h.z };
            points.push(Point3::new(sx, sy, sz) + offset);
        }
        let indices = vec![
            0, 2, 1, 1, 2, 3, // -z
            4, 5, 6, 5, 7, 6, // +z
            0, 1, 4, 1, 5, 4, // -y
            2, 6, 3, 3, 6, 7, // +y
            0, 4, 2, 2, 4, 6, // -x
            1, 3, 5, 3, 7, 5, // +x
        ];
        Shape::mesh(points, indices).unwrap()
    }

    #[test]
    fn test_sphere_round_trip() {
        let r = 1.5;
        let props = compute_mass_properties(&Shape::sphere(r));
        let volume = 4.0 / 3.0 * PI * r.powi(3);
        assert_relative_eq!(props.volume, volume, epsilon = 1e-12);

        let inertia = props.inertia_body().unwrap();
        let expected = Matrix3::from_diagonal_element(0.4 * volume * r * r);
        assert_relative_eq!(inertia, expected, epsilon = 1e-9);
    }

    #[test]
    fn test_box_inertia() {
        let props = compute_mass_properties(&Shape::cuboid(Vector3::new(1.0, 0.5, 0.25)));
        // 2 x 1 x 0.5
        assert_relative_eq!(props.volume, 1.0, epsilon = 1e-12);
        let inertia = props.inertia_body().unwrap();
        assert_relative_eq!(inertia[(0, 0)], (1.0 + 0.25) / 12.0, epsilon = 1e-12);
        assert_relative_eq!(inertia[(1, 1)], (4.0 + 0.25) / 12.0, epsilon = 1e-12);
        assert_relative_eq!(inertia[(2, 2)], (4.0 + 1.0) / 12.0, epsilon = 1e-12);
    }

    #[test]
    fn test_mesh_matches_box_formula() {
        let h = Vector3::new(1.0, 0.5, 0.25);
        let mesh = compute_mass_properties(&box_mesh(h, Vector3::zeros()));
        let solid = compute_mass_properties(&Shape::cuboid(h));
        assert_relative_eq!(mesh.volume, solid.volume, epsilon = 1e-9);
        assert_relative_eq!(mesh.center_of_mass, Vector3::zeros(), epsilon = 1e-9);
        assert_relative_eq!(
            mesh.inertia_body().unwrap(),
            solid.inertia_body().unwrap(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_mesh_center_of_mass_shift() {
        let h = Vector3::new(0.5, 0.5, 0.5);
        let offset = Vector3::new(3.0, -2.0, 1.0);
        let mesh = compute_mass_properties(&box_mesh(h, offset));
        assert_relative_eq!(mesh.center_of_mass, offset, epsilon = 1e-9);

        // Inertia is taken about the center of mass, so it is offset-invariant.
        let centered = compute_mass_properties(&box_mesh(h, Vector3::zeros()));
        assert_relative_eq!(
            mesh.inertia_body().unwrap(),
            centered.inertia_body().unwrap(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_cylinder_axis_orientation() {
        let props =
            compute_mass_properties(&Shape::cylinder(Point3::origin(), Point3::new(0.0, 2.0, 0.0), 1.0));
        let volume = PI * 2.0;
        assert_relative_eq!(props.volume, volume, epsilon = 1e-12);
        assert_relative_eq!(props.center_of_mass, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
        let inertia = props.inertia_body().unwrap();
        assert_relative_eq!(inertia[(1, 1)], 0.5 * volume, epsilon = 1e-9);
        assert_relative_eq!(inertia[(0, 0)], volume * (3.0 + 4.0) / 12.0, epsilon = 1e-9);
    }

    #[test]
    fn test_capsule_reduces_to_sphere() {
        let capsule = compute_mass_properties(&Shape::capsule(0.0, 1.0));
        let sphere = compute_mass_properties(&Shape::sphere(1.0));
        assert_relative_eq!(capsule.volume, sphere.volume, epsilon = 1e-12);
        assert_relative_eq!(
            capsule.inv_inertia_body,
            sphere.inv_inertia_body,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_unweighted_shapes() {
        let plane = compute_mass_properties(&Shape::ground_plane(0.0));
        assert_eq!(plane.volume, 1.0);
        assert_eq!(plane.inv_inertia_body, Matrix3::zeros());
    }
}
