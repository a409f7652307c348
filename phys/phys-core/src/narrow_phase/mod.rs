//! Narrow-phase intersection tests.
//!
//! [`intersect`] is total over every pair of [`ShapeKind`]s. Pairs are put in
//! canonical order (by kind) before dispatch; when the arguments arrive
//! swapped, the result is flipped so the normal still points from the first
//! argument toward the second.
//!
//! # Coverage
//!
//! |          | Sphere | Box | Capsule | Cylinder | Plane | Mesh | Terrain |
//! |----------|:------:|:---:|:-------:|:--------:|:-----:|:----:|:-------:|
//! | Sphere   |   ✓    |  ✓  |    ✓    |          |   ✓   |  ✓   |    ✓    |
//! | Box      |        |     |    ✓    |          |   ✓   |  ✓   |    ✓    |
//! | Capsule  |        |     |         |          |   ✓   |  ✓   |    ✓    |
//! | Plane    |        |     |         |          |       |  ✓   |         |
//! | Mesh     |        |     |         |          |       |  ✓   |    ✓    |
//!
//! Every other pair reports no contact. Callers must tolerate the gaps; see
//! [`is_supported`].
//!
//! # Example
//!
//! ```
//! use phys_core::{intersect, Shape};
//! use nalgebra::{Point3, Vector3};
//!
//! let ball = Shape::sphere(1.0).at(Point3::new(0.0, 0.9, 0.0));
//! let ground = Shape::ground_plane(0.0);
//!
//! let hit = intersect(&ball, &ground).unwrap();
//! assert!(hit.is_penetrating());
//! assert!((hit.normal - Vector3::new(0.0, -1.0, 0.0)).norm() < 1e-12);
//!
//! // Swapped arguments flip the normal.
//! let hit = intersect(&ground, &ball).unwrap();
//! assert!((hit.normal - Vector3::y()).norm() < 1e-12);
//! ```

pub mod geometry;
mod mesh;
pub mod primitive;
pub mod triangle;

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::shape::{Shape, ShapeKind};
use primitive::{BoxGeom, CapsuleGeom};

pub use mesh::{mesh_mesh, plane_mesh, primitive_mesh, vertex_reach};

/// Contact between two shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Intersection {
    /// Contact point in world space.
    pub point: Point3<f64>,
    /// Unit normal pointing from the first shape toward the second.
    pub normal: Vector3<f64>,
    /// Signed separation; negative means interpenetration.
    pub dist: f64,
}

impl Intersection {
    /// Create a contact.
    #[must_use]
    pub const fn new(point: Point3<f64>, normal: Vector3<f64>, dist: f64) -> Self {
        Self {
            point,
            normal,
            dist,
        }
    }

    /// The same contact seen from the other shape.
    #[must_use]
    pub fn flipped(self) -> Self {
        Self {
            normal: -self.normal,
            ..self
        }
    }

    /// Whether the shapes overlap.
    #[must_use]
    pub fn is_penetrating(&self) -> bool {
        self.dist < 0.0
    }
}

/// Whether a pair of kinds has a real test behind it.
#[must_use]
pub fn is_supported(a: ShapeKind, b: ShapeKind) -> bool {
    use ShapeKind as K;
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    matches!(
        (lo, hi),
        (
            K::Sphere,
            K::Sphere | K::Box | K::Capsule | K::Plane | K::Mesh | K::TerrainMesh
        ) | (K::Box, K::Capsule | K::Plane | K::Mesh | K::TerrainMesh)
            | (K::Capsule, K::Plane | K::Mesh | K::TerrainMesh)
            | (K::Plane, K::Mesh)
            | (K::Mesh, K::Mesh | K::TerrainMesh)
    )
}

/// Test two world-space shapes for contact.
///
/// The returned normal points from `a` toward `b`. Unsupported pairs return
/// `None`, the same as separated shapes.
#[must_use]
pub fn intersect(a: &Shape, b: &Shape) -> Option<Intersection> {
    if a.kind() <= b.kind() {
        intersect_ordered(a, b)
    } else {
        intersect_ordered(b, a).map(Intersection::flipped)
    }
}

/// Dispatch a pair with `a.kind() <= b.kind()`.
fn intersect_ordered(a: &Shape, b: &Shape) -> Option<Intersection> {
    match (a, b) {
        (
            Shape::Sphere {
                center: ca,
                radius: ra,
            },
            other,
        ) => match other {
            Shape::Sphere {
                center: cb,
                radius: rb,
            } => primitive::sphere_sphere(ca, *ra, cb, *rb),
            Shape::Box {
                center,
                half_extents,
                rotation,
            } => primitive::sphere_box(
                ca,
                *ra,
                &BoxGeom {
                    center,
                    half_extents,
                    rotation,
                },
            ),
            Shape::Capsule {
                center,
                axis,
                radius,
                half_height,
            } => primitive::sphere_capsule(
                ca,
                *ra,
                &CapsuleGeom {
                    center,
                    axis,
                    radius: *radius,
                    half_height: *half_height,
                },
            ),
            Shape::Plane { normal, distance } => primitive::sphere_plane(ca, *ra, normal, *distance),
            Shape::Mesh(m) => primitive_mesh(a, m),
            Shape::TerrainMesh(t) => primitive_mesh(a, t),
            Shape::Cylinder { .. } => None,
        },

        (
            Shape::Box {
                center,
                half_extents,
                rotation,
            },
            other,
        ) => {
            let geom = BoxGeom {
                center,
                half_extents,
                rotation,
            };
            match other {
                Shape::Capsule {
                    center,
                    axis,
                    radius,
                    half_height,
                } => primitive::box_capsule(
                    &geom,
                    &CapsuleGeom {
                        center,
                        axis,
                        radius: *radius,
                        half_height: *half_height,
                    },
                ),
                Shape::Plane { normal, distance } => primitive::box_plane(&geom, normal, *distance),
                Shape::Mesh(m) => primitive_mesh(a, m),
                Shape::TerrainMesh(t) => primitive_mesh(a, t),
                _ => None,
            }
        }

        (
            Shape::Capsule {
                center,
                axis,
                radius,
                half_height,
            },
            other,
        ) => match other {
            Shape::Plane { normal, distance } => primitive::capsule_plane(
                &CapsuleGeom {
                    center,
                    axis,
                    radius: *radius,
                    half_height: *half_height,
                },
                normal,
                *distance,
            ),
            Shape::Mesh(m) => primitive_mesh(a, m),
            Shape::TerrainMesh(t) => primitive_mesh(a, t),
            _ => None,
        },

        (Shape::Plane { normal, distance }, Shape::Mesh(m)) => plane_mesh(normal, *distance, m),

        (Shape::Mesh(m), Shape::Mesh(n)) => {
            let (mb, nb) = (m.world_aabb(), n.world_aabb());
            let reach = vertex_reach(&mb).min(vertex_reach(&nb));
            mesh_mesh(m, &mb, n, &nb, reach)
        }
        (Shape::Mesh(m), Shape::TerrainMesh(t)) => {
            let mb = m.world_aabb();
            mesh_mesh(m, &mb, t, &t.world_aabb(), vertex_reach(&mb))
        }

        _ => None,
    }
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
    use crate::mesh::TerrainMesh;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;
    use phys_types::TreeSplit;

    fn sample(kind: ShapeKind) -> Shape {
        match kind {
            ShapeKind::Sphere => Shape::sphere(1.0),
            ShapeKind::Box => Shape::cuboid(Vector3::new(1.0, 1.0, 1.0)),
            ShapeKind::Capsule => Shape::capsule(0.5, 0.5),
            ShapeKind::Cylinder => {
                Shape::cylinder(Point3::new(0.0, -1.0, 0.0), Point3::new(0.0, 1.0, 0.0), 1.0)
            }
            ShapeKind::Plane => Shape::ground_plane(0.5),
            ShapeKind::Mesh => Shape::mesh(
                vec![
                    Point3::new(-4.0, 0.0, -4.0),
                    Point3::new(-4.0, 0.0, 4.0),
                    Point3::new(4.0, 0.0, -4.0),
                ],
                vec![0, 1, 2],
            )
            .unwrap(),
            ShapeKind::TerrainMesh => {
                let mut points = Vec::new();
                for iz in 0..=4 {
                    for ix in 0..=4 {
                        points.push(Point3::new(ix as f64 * 2.0 - 4.0, 0.0, iz as f64 * 2.0 - 4.0));
                    }
                }
                Shape::TerrainMesh(
                    TerrainMesh::new(points, 4, 4, 2.0, TreeSplit::Quad, 4, 1.0).unwrap(),
                )
            }
        }
    }

    #[test]
    fn test_supported_matrix() {
        let mut pairs = 0;
        let mut supported = 0;
        for (i, a) in ShapeKind::ALL.iter().enumerate() {
            for b in &ShapeKind::ALL[i..] {
                pairs += 1;
                if is_supported(*a, *b) {
                    supported += 1;
                }
                assert_eq!(is_supported(*a, *b), is_supported(*b, *a));
            }
        }
        assert_eq!(pairs, 28);
        assert_eq!(supported, 16);
    }

    #[test]
    fn test_overlapping_samples_match_coverage() {
        // Every sample straddles the origin, so supported pairs must report
        // contact and unsupported pairs must not.
        for a in ShapeKind::ALL {
            for b in ShapeKind::ALL {
                let hit = intersect(&sample(a), &sample(b));
                assert_eq!(
                    hit.is_some(),
                    is_supported(a, b),
                    "{a:?} vs {b:?} disagrees with coverage"
                );
            }
        }
    }

    #[test]
    fn test_swapped_arguments_flip_normal() {
        let sphere = Shape::sphere(1.0).at(Point3::new(0.0, 0.5, 0.0));
        let cube = Shape::Box {
            center: Point3::new(0.3, -0.8, 0.0),
            half_extents: Vector3::new(1.0, 0.5, 1.0),
            rotation: UnitQuaternion::from_euler_angles(0.1, 0.0, 0.2),
        };
        let ab = intersect(&sphere, &cube).unwrap();
        let ba = intersect(&cube, &sphere).unwrap();
        assert_relative_eq!(ab.normal, -ba.normal, epsilon = 1e-12);
        assert_relative_eq!(ab.point, ba.point, epsilon = 1e-12);
        assert_eq!(ab.dist, ba.dist);
    }

    #[test]
    fn test_capsule_capsule_reports_no_contact() {
        let a = Shape::capsule(1.0, 0.5);
        let b = Shape::capsule(1.0, 0.5).at(Point3::new(0.2, 0.0, 0.0));
        assert!(!is_supported(ShapeKind::Capsule, ShapeKind::Capsule));
        assert!(intersect(&a, &b).is_none());
    }

    #[test]
    fn test_box_box_reports_no_contact() {
        let a = Shape::cuboid(Vector3::new(1.0, 1.0, 1.0));
        let b = a.clone();
        assert!(intersect(&a, &b).is_none());
    }

    #[test]
    fn test_mesh_contact_flips_when_mesh_is_first() {
        let terrain = sample(ShapeKind::TerrainMesh);
        let ball = Shape::sphere(1.0).at(Point3::new(0.5, 0.8, 0.5));
        let hit = intersect(&terrain, &ball).unwrap();
        assert_relative_eq!(hit.normal, Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(hit.dist, -0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_mesh_against_plane_flips_when_mesh_is_first() {
        let mesh = sample(ShapeKind::Mesh);
        let plane = sample(ShapeKind::Plane);
        let hit = intersect(&mesh, &plane).unwrap();
        assert_relative_eq!(hit.normal, -Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(hit.dist, -0.5, epsilon = 1e-12);
        let back = intersect(&plane, &mesh).unwrap();
        assert_relative_eq!(back.normal, Vector3::y(), epsilon = 1e-12);
    }

    #[test]
    fn test_intersection_helpers() {
        let hit = Intersection::new(Point3::origin(), Vector3::x(), -0.1);
        assert!(hit.is_penetrating());
        let flipped = hit.flipped();
        assert_eq!(flipped.normal, -Vector3::x());
        assert_eq!(flipped.dist, hit.dist);
        assert!(!Intersection::new(Point3::origin(), Vector3::x(), 0.0).is_penetrating());
    }
}
