//! The closed set of collision shapes.
//!
//! A body stores its shape in local coordinates. Each tick the primitive
//! kinds are copied into a world-space working shape with
//! [`Shape::transformed`]; the two mesh kinds instead receive the transform
//! in place through [`Shape::set_mesh_transform`], so their trees are never
//! cloned.

use nalgebra::{Point3, UnitQuaternion, Vector3};
use phys_types::{PhysError, Result};

use crate::aabb::Aabb;
use crate::mesh::{TerrainMesh, TriangleMesh};
use crate::transform::Transform;

/// Half-size used for the unbounded extent of a plane's solid half-space.
pub const PLANE_EXTENT: f64 = 1.0e6;

/// Normals within this of a coordinate axis are treated as axis-aligned.
const AXIS_ALIGNED_EPSILON: f64 = 1e-9;

/// Tag of a [`Shape`], ordered for canonical pair dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShapeKind {
    /// [`Shape::Sphere`]
    Sphere,
    /// [`Shape::Box`]
    Box,
    /// [`Shape::Capsule`]
    Capsule,
    /// [`Shape::Cylinder`]
    Cylinder,
    /// [`Shape::Plane`]
    Plane,
    /// [`Shape::Mesh`]
    Mesh,
    /// [`Shape::TerrainMesh`]
    TerrainMesh,
}

impl ShapeKind {
    /// Every kind, in dispatch order.
    pub const ALL: [Self; 7] = [
        Self::Sphere,
        Self::Box,
        Self::Capsule,
        Self::Cylinder,
        Self::Plane,
        Self::Mesh,
        Self::TerrainMesh,
    ];

    /// Whether the kind is backed by triangles and a spatial tree.
    #[must_use]
    pub const fn is_mesh(self) -> bool {
        matches!(self, Self::Mesh | Self::TerrainMesh)
    }
}

/// Collision shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Sphere.
    Sphere {
        /// Center.
        center: Point3<f64>,
        /// Radius.
        radius: f64,
    },
    /// Oriented box.
    Box {
        /// Center.
        center: Point3<f64>,
        /// Half-size along each of the box's own axes.
        half_extents: Vector3<f64>,
        /// Orientation of the box's axes.
        rotation: UnitQuaternion<f64>,
    },
    /// Capsule: a segment swept by a sphere.
    Capsule {
        /// Midpoint of the core segment.
        center: Point3<f64>,
        /// Unit direction of the core segment.
        axis: Vector3<f64>,
        /// Radius of the swept sphere.
        radius: f64,
        /// Half the length of the core segment.
        half_height: f64,
    },
    /// Solid cylinder between two cap centers.
    Cylinder {
        /// First cap center.
        p0: Point3<f64>,
        /// Second cap center.
        p1: Point3<f64>,
        /// Radius.
        radius: f64,
    },
    /// Half-space `normal · x <= distance`; the normal points out of the solid.
    Plane {
        /// Unit outward normal.
        normal: Vector3<f64>,
        /// Offset along the normal.
        distance: f64,
    },
    /// Triangle mesh.
    Mesh(TriangleMesh),
    /// Terrain heightfield grid.
    TerrainMesh(TerrainMesh),
}

impl Shape {
    /// Sphere at the origin.
    #[must_use]
    pub fn sphere(radius: f64) -> Self {
        Self::Sphere {
            center: Point3::origin(),
            radius,
        }
    }

    /// Axis-aligned box at the origin.
    #[must_use]
    pub fn cuboid(half_extents: Vector3<f64>) -> Self {
        Self::Box {
            center: Point3::origin(),
            half_extents,
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Upright (Y-axis) capsule at the origin.
    #[must_use]
    pub fn capsule(half_height: f64, radius: f64) -> Self {
        Self::Capsule {
            center: Point3::origin(),
            axis: Vector3::y(),
            radius,
            half_height,
        }
    }

    /// Cylinder between two cap centers.
    #[must_use]
    pub fn cylinder(p0: Point3<f64>, p1: Point3<f64>, radius: f64) -> Self {
        Self::Cylinder { p0, p1, radius }
    }

    /// Plane with the given outward normal (normalized here) and offset.
    #[must_use]
    pub fn plane(normal: Vector3<f64>, distance: f64) -> Self {
        let len = normal.norm();
        let normal = if len > 0.0 { normal / len } else { normal };
        Self::Plane { normal, distance }
    }

    /// Horizontal ground at height `y`, solid below.
    #[must_use]
    pub fn ground_plane(y: f64) -> Self {
        Self::plane(Vector3::y(), y)
    }

    /// Triangle mesh from points and a flat index list.
    pub fn mesh(points: Vec<Point3<f64>>, indices: Vec<u32>) -> Result<Self> {
        TriangleMesh::new(points, indices).map(Self::Mesh)
    }

    /// Move a primitive's local center. Planes and mesh kinds are unchanged.
    #[must_use]
    pub fn at(mut self, position: Point3<f64>) -> Self {
        match &mut self {
            Self::Sphere { center, .. }
            | Self::Box { center, .. }
            | Self::Capsule { center, .. } => *center = position,
            Self::Cylinder { p0, p1, .. } => {
                let mid = nalgebra::center(p0, p1);
                let offset = position - mid;
                *p0 += offset;
                *p1 += offset;
            }
            Self::Plane { .. } | Self::Mesh(_) | Self::TerrainMesh(_) => {}
        }
        self
    }

    /// Tag of the active variant.
    #[must_use]
    pub fn kind(&self) -> ShapeKind {
        match self {
            Self::Sphere { .. } => ShapeKind::Sphere,
            Self::Box { .. } => ShapeKind::Box,
            Self::Capsule { .. } => ShapeKind::Capsule,
            Self::Cylinder { .. } => ShapeKind::Cylinder,
            Self::Plane { .. } => ShapeKind::Plane,
            Self::Mesh(_) => ShapeKind::Mesh,
            Self::TerrainMesh(_) => ShapeKind::TerrainMesh,
        }
    }

    /// Check dimensions are finite and in range.
    pub fn validate(&self) -> Result<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        let finite_point = |p: &Point3<f64>| p.coords.iter().all(|c| c.is_finite());
        match self {
            Self::Sphere { center, radius } => {
                if !positive(*radius) || !finite_point(center) {
                    return Err(PhysError::invalid_shape(format!(
                        "sphere radius must be positive, got {radius}"
                    )));
                }
            }
            Self::Box {
                center,
                half_extents,
                ..
            } => {
                if !half_extents.iter().all(|&h| positive(h)) || !finite_point(center) {
                    return Err(PhysError::invalid_shape(format!(
                        "box half extents must be positive, got {half_extents:?}"
                    )));
                }
            }
            Self::Capsule {
                center,
                axis,
                radius,
                half_height,
            } => {
                if !positive(*radius)
                    || !half_height.is_finite()
                    || *half_height < 0.0
                    || !finite_point(center)
                {
                    return Err(PhysError::invalid_shape(format!(
                        "capsule needs positive radius and non-negative half height, got r={radius} h={half_height}"
                    )));
                }
                if !positive(axis.norm()) {
                    return Err(PhysError::invalid_shape("capsule axis must be non-zero"));
                }
            }
            Self::Cylinder { p0, p1, radius } => {
                if !positive(*radius) || !finite_point(p0) || !finite_point(p1) {
                    return Err(PhysError::invalid_shape(format!(
                        "cylinder radius must be positive, got {radius}"
                    )));
                }
                if !positive((p1 - p0).norm()) {
                    return Err(PhysError::invalid_shape("cylinder end points coincide"));
                }
            }
            Self::Plane { normal, distance } => {
                if !positive(normal.norm()) || !distance.is_finite() {
                    return Err(PhysError::invalid_shape("plane normal must be non-zero"));
                }
            }
            Self::Mesh(_) | Self::TerrainMesh(_) => {}
        }
        Ok(())
    }

    /// Bounding box. For the mesh kinds this is in world space under the
    /// stored transform; for primitives it is in the shape's own frame.
    #[must_use]
    pub fn aabb(&self) -> Aabb {
        match self {
            Self::Sphere { center, radius } => {
                Aabb::from_center(*center, Vector3::new(*radius, *radius, *radius))
            }
            Self::Box {
                center,
                half_extents,
                rotation,
            } => {
                let r = rotation.to_rotation_matrix();
                let m = r.matrix().abs();
                Aabb::from_center(*center, m * half_extents)
            }
            Self::Capsule {
                center,
                axis,
                radius,
                half_height,
            } => {
                let (a, b) = capsule_segment(center, axis, *half_height);
                Aabb::new(a.inf(&b), a.sup(&b)).expanded(*radius)
            }
            Self::Cylinder { p0, p1, radius } => {
                // Tight bounds of the two cap discs.
                let d = p1 - p0;
                let len2 = d.norm_squared().max(f64::MIN_POSITIVE);
                let e = d.map(|c| radius * (1.0 - c * c / len2).max(0.0).sqrt());
                Aabb::new(p0.inf(p1) - e, p0.sup(p1) + e)
            }
            Self::Plane { normal, distance } => plane_aabb(normal, *distance),
            Self::Mesh(mesh) => mesh.world_aabb(),
            Self::TerrainMesh(mesh) => mesh.world_aabb(),
        }
    }

    /// World-space copy of a primitive under `t`. Mesh kinds return `None`;
    /// use [`Shape::set_mesh_transform`] for those.
    ///
    /// Non-uniform scale is applied exactly to box half extents, capsule and
    /// cylinder axes, and plane normals; radii take the largest scale
    /// component.
    #[must_use]
    pub fn transformed(&self, t: &Transform) -> Option<Self> {
        let max_scale = t.max_scale();
        let shape = match self {
            Self::Sphere { center, radius } => Self::Sphere {
                center: t.transform_point(center),
                radius: radius * max_scale,
            },
            Self::Box {
                center,
                half_extents,
                rotation,
            } => {
                // Scale acts in the body frame; project it onto the box axes.
                let r = rotation.to_rotation_matrix();
                let axis_scale = Vector3::from_fn(|i, _| {
                    let axis = r.matrix().column(i).into_owned();
                    t.scale.component_mul(&axis).norm()
                });
                Self::Box {
                    center: t.transform_point(center),
                    half_extents: half_extents.component_mul(&axis_scale),
                    rotation: t.rotation * rotation,
                }
            }
            Self::Capsule {
                center,
                axis,
                radius,
                half_height,
            } => {
                let segment = t.transform_vector(&(axis * *half_height));
                let len = segment.norm();
                let world_axis = if len > 0.0 {
                    segment / len
                } else {
                    t.rotation * axis
                };
                Self::Capsule {
                    center: t.transform_point(center),
                    axis: world_axis,
                    radius: radius * max_scale,
                    half_height: len,
                }
            }
            Self::Cylinder { p0, p1, radius } => Self::Cylinder {
                p0: t.transform_point(p0),
                p1: t.transform_point(p1),
                radius: radius * max_scale,
            },
            Self::Plane { normal, distance } => {
                let on_plane = Point3::from(normal * *distance);
                let world_normal = t.transform_normal(normal);
                let len = world_normal.norm();
                let world_normal = if len > 0.0 {
                    world_normal / len
                } else {
                    *normal
                };
                Self::Plane {
                    normal: world_normal,
                    distance: world_normal.dot(&t.transform_point(&on_plane).coords),
                }
            }
            Self::Mesh(_) | Self::TerrainMesh(_) => return None,
        };
        Some(shape)
    }

    /// Store a new transform on a mesh kind. Returns `false` for primitives.
    pub fn set_mesh_transform(&mut self, t: &Transform) -> bool {
        match self {
            Self::Mesh(mesh) => mesh.set_transform(t),
            Self::TerrainMesh(mesh) => mesh.set_transform(t),
            _ => return false,
        }
        true
    }
}

/// End points of a capsule's core segment.
#[must_use]
pub fn capsule_segment(
    center: &Point3<f64>,
    axis: &Vector3<f64>,
    half_height: f64,
) -> (Point3<f64>, Point3<f64>) {
    let h = axis * half_height;
    (center - h, center + h)
}

/// Bounds of a plane's solid half-space, clipped to [`PLANE_EXTENT`]. Only
/// an axis-aligned normal yields a finite side.
fn plane_aabb(normal: &Vector3<f64>, distance: f64) -> Aabb {
    let mut min = Point3::new(-PLANE_EXTENT, -PLANE_EXTENT, -PLANE_EXTENT);
    let mut max = Point3::new(PLANE_EXTENT, PLANE_EXTENT, PLANE_EXTENT);
    for i in 0..3 {
        if (normal[i].abs() - 1.0).abs() < AXIS_ALIGNED_EPSILON {
            if normal[i] > 0.0 {
                max[i] = distance;
            } else {
                min[i] = -distance;
            }
        }
    }
    Aabb::new(min, max)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_kind_order_is_total() {
        let mut kinds = ShapeKind::ALL.to_vec();
        kinds.sort();
        assert_eq!(kinds, ShapeKind::ALL.to_vec());
        assert!(ShapeKind::Sphere < ShapeKind::TerrainMesh);
        assert!(ShapeKind::Mesh.is_mesh());
        assert!(!ShapeKind::Plane.is_mesh());
    }

    #[test]
    fn test_validation() {
        assert!(Shape::sphere(1.0).validate().is_ok());
        assert!(Shape::sphere(0.0).validate().is_err());
        assert!(Shape::sphere(f64::NAN).validate().is_err());
        assert!(Shape::cuboid(Vector3::new(1.0, -1.0, 1.0)).validate().is_err());
        assert!(Shape::capsule(0.0, 0.5).validate().is_ok());
        assert!(Shape::cylinder(Point3::origin(), Point3::origin(), 1.0)
            .validate()
            .is_err());
        assert!(Shape::plane(Vector3::zeros(), 0.0).validate().is_err());
    }

    #[test]
    fn test_primitive_bounds() {
        let aabb = Shape::capsule(1.0, 0.5).aabb();
        assert_relative_eq!(aabb.min, Point3::new(-0.5, -1.5, -0.5));
        assert_relative_eq!(aabb.max, Point3::new(0.5, 1.5, 0.5));

        let cyl = Shape::cylinder(Point3::origin(), Point3::new(0.0, 2.0, 0.0), 1.0).aabb();
        assert_relative_eq!(cyl.min, Point3::new(-1.0, 0.0, -1.0));
        assert_relative_eq!(cyl.max, Point3::new(1.0, 2.0, 1.0));

        let rotated = Shape::Box {
            center: Point3::origin(),
            half_extents: Vector3::new(1.0, 1.0, 1.0),
            rotation: UnitQuaternion::from_euler_angles(0.0, std::f64::consts::FRAC_PI_4, 0.0),
        }
        .aabb();
        assert_relative_eq!(rotated.max.x, std::f64::consts::SQRT_2, epsilon = 1e-12);
        assert_relative_eq!(rotated.max.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_ground_plane_bounds_cover_solid_side() {
        let aabb = Shape::ground_plane(2.0).aabb();
        assert_eq!(aabb.max.y, 2.0);
        assert_eq!(aabb.min.y, -PLANE_EXTENT);
        assert_eq!(aabb.max.x, PLANE_EXTENT);
    }

    #[test]
    fn test_transformed_primitives() {
        let t = Transform::new(
            Vector3::new(0.0, 5.0, 0.0),
            UnitQuaternion::from_euler_angles(0.0, 0.0, std::f64::consts::FRAC_PI_2),
            Vector3::new(1.0, 2.0, 1.0),
        );

        // Capsule along local Y: scaled by 2 then rotated onto -X.
        let cap = Shape::capsule(1.0, 0.5).transformed(&t).unwrap();
        if let Shape::Capsule {
            center,
            axis,
            half_height,
            radius,
        } = cap
        {
            assert_relative_eq!(center, Point3::new(0.0, 5.0, 0.0), epsilon = 1e-12);
            assert_relative_eq!(axis.x.abs(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(half_height, 2.0, epsilon = 1e-12);
            assert_relative_eq!(radius, 1.0, epsilon = 1e-12);
        } else {
            panic!("expected capsule");
        }

        // Ground plane lifted with the body.
        let plane = Shape::ground_plane(0.0)
            .transformed(&Transform::new(
                Vector3::new(0.0, 3.0, 0.0),
                UnitQuaternion::identity(),
                Vector3::new(1.0, 1.0, 1.0),
            ))
            .unwrap();
        assert_eq!(plane, Shape::plane(Vector3::y(), 3.0));
    }

    #[test]
    fn test_mesh_kinds_are_not_cloned() {
        let mut mesh = Shape::mesh(
            vec![
                Point3::origin(),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 0.0, 1.0),
            ],
            vec![0, 2, 1],
        )
        .unwrap();
        let t = Transform::new(
            Vector3::new(4.0, 0.0, 0.0),
            UnitQuaternion::identity(),
            Vector3::new(1.0, 1.0, 1.0),
        );
        assert!(mesh.transformed(&t).is_none());
        assert!(mesh.set_mesh_transform(&t));
        assert_relative_eq!(mesh.aabb().min.x, 4.0, epsilon = 1e-12);
        assert!(!Shape::sphere(1.0).set_mesh_transform(&t));
    }
}
