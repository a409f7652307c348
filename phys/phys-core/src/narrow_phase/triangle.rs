//! Primitive-against-triangle tests used by mesh and terrain queries.
//!
//! Triangles are one-sided: a primitive whose center has crossed behind the
//! face is pushed back out along the face normal rather than through it.

use nalgebra::{Point3, Vector3};

use super::geometry::{closest_point_on_triangle, closest_points_segment_triangle, EPSILON};
use super::primitive::{BoxGeom, CapsuleGeom};
use super::Intersection;
use crate::mesh::triangle_normal;

/// Sphere against triangle. The normal points from the sphere toward the
/// triangle.
#[must_use]
pub fn sphere_triangle(
    center: &Point3<f64>,
    radius: f64,
    tri: &[Point3<f64>; 3],
) -> Option<Intersection> {
    let closest = closest_point_on_triangle(tri, center);
    let diff = center - closest;
    let len = diff.norm();
    if len > radius {
        return None;
    }

    let face = triangle_normal(tri);
    if face.dot(&diff) >= 0.0 {
        let normal = if len > EPSILON { -diff / len } else { -face };
        Some(Intersection::new(closest, normal, len - radius))
    } else {
        Some(Intersection::new(closest, -face, -(len + radius)))
    }
}

/// Vertex against triangle. Only a vertex that sits behind the face, no
/// deeper than `reach`, and projects inside the triangle is in contact. The
/// normal points from the vertex toward the triangle.
#[must_use]
pub fn point_triangle(
    p: &Point3<f64>,
    tri: &[Point3<f64>; 3],
    reach: f64,
) -> Option<Intersection> {
    let face = triangle_normal(tri);
    let height = face.dot(&(p - tri[0]));
    if height > 0.0 || height < -reach {
        return None;
    }
    let foot = p - face * height;
    if (closest_point_on_triangle(tri, &foot) - foot).norm_squared() > EPSILON {
        return None;
    }
    Some(Intersection::new(foot, -face, height))
}

/// Capsule against triangle.
#[must_use]
pub fn capsule_triangle(c: &CapsuleGeom<'_>, tri: &[Point3<f64>; 3]) -> Option<Intersection> {
    let (a, b) = c.segment();
    let (on_segment, on_triangle) = closest_points_segment_triangle(&a, &b, tri);
    if (on_segment - on_triangle).norm_squared() > EPSILON {
        return sphere_triangle(&on_segment, c.radius, tri);
    }

    // The core segment pierces the face: push the deeper end back out.
    let face = triangle_normal(tri);
    let da = face.dot(&(a - tri[0]));
    let db = face.dot(&(b - tri[0]));
    let (end, depth) = if da <= db { (a, da) } else { (b, db) };
    Some(Intersection::new(end - face * depth, -face, depth - c.radius))
}

/// Box against triangle by the separating axis theorem over the face
/// normal, the three box axes and the nine edge cross products.
///
/// The face normal is tested one-sided; the other axes pick whichever
/// direction separates least. The contact point is the triangle point
/// nearest the box center.
#[must_use]
pub fn box_triangle(b: &BoxGeom<'_>, tri: &[Point3<f64>; 3]) -> Option<Intersection> {
    let face = triangle_normal(tri);
    let center = b.center.coords;

    // Face axis: how far the box reaches behind the plane.
    let plane = face.dot(&tri[0].coords);
    let reach = b.projected_radius(&face);
    let center_height = face.dot(&center);
    if center_height + reach < plane {
        // Fully behind the face.
        return None;
    }
    let mut best_overlap = plane - (center_height - reach);
    if best_overlap < 0.0 {
        return None;
    }
    let mut best_normal = -face;

    let box_axes = [
        b.rotation * Vector3::x(),
        b.rotation * Vector3::y(),
        b.rotation * Vector3::z(),
    ];
    let edges = [tri[1] - tri[0], tri[2] - tri[1], tri[0] - tri[2]];
    let cross_axes = box_axes
        .iter()
        .flat_map(|u| edges.iter().map(move |e| u.cross(e)));

    for axis in box_axes.iter().copied().chain(cross_axes) {
        let Some(axis) = axis.try_normalize(EPSILON) else {
            continue;
        };
        let projections = tri.map(|p| axis.dot(&p.coords));
        let tri_min = projections.iter().copied().fold(f64::INFINITY, f64::min);
        let tri_max = projections.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let c = axis.dot(&center);
        let r = b.projected_radius(&axis);

        let below = tri_max - (c - r);
        let above = (c + r) - tri_min;
        if below < 0.0 || above < 0.0 {
            return None;
        }
        let (overlap, normal) = if below < above {
            (below, -axis)
        } else {
            (above, axis)
        };
        if overlap < best_overlap {
            best_overlap = overlap;
            best_normal = normal;
        }
    }

    let point = closest_point_on_triangle(tri, b.center);
    Some(Intersection::new(point, best_normal, -best_overlap))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;

    fn ground_tri() -> [Point3<f64>; 3] {
        [
            Point3::new(-10.0, 0.0, -10.0),
            Point3::new(-10.0, 0.0, 10.0),
            Point3::new(10.0, 0.0, -10.0),
        ]
    }

    #[test]
    fn test_sphere_resting_on_face() {
        let hit = sphere_triangle(&Point3::new(-2.0, 0.9, -2.0), 1.0, &ground_tri()).unwrap();
        assert_relative_eq!(hit.normal, -Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(hit.dist, -0.1, epsilon = 1e-12);
        assert!(sphere_triangle(&Point3::new(-2.0, 1.1, -2.0), 1.0, &ground_tri()).is_none());
    }

    #[test]
    fn test_sphere_behind_face_is_pushed_up() {
        let hit = sphere_triangle(&Point3::new(-2.0, -0.3, -2.0), 1.0, &ground_tri()).unwrap();
        assert_relative_eq!(hit.normal, -Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(hit.dist, -1.3, epsilon = 1e-12);
    }

    #[test]
    fn test_vertex_below_face() {
        let hit = point_triangle(&Point3::new(-2.0, -0.2, -2.0), &ground_tri(), 0.5).unwrap();
        assert_relative_eq!(hit.normal, -Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(hit.dist, -0.2, epsilon = 1e-12);
        assert_relative_eq!(hit.point, Point3::new(-2.0, 0.0, -2.0), epsilon = 1e-12);
    }

    #[test]
    fn test_vertex_outside_reach_or_face() {
        // Above the face.
        assert!(point_triangle(&Point3::new(-2.0, 0.1, -2.0), &ground_tri(), 0.5).is_none());
        // Deeper than the reach.
        assert!(point_triangle(&Point3::new(-2.0, -0.6, -2.0), &ground_tri(), 0.5).is_none());
        // Below the plane of the face but beside the triangle.
        assert!(point_triangle(&Point3::new(8.0, -0.1, 8.0), &ground_tri(), 0.5).is_none());
    }

    #[test]
    fn test_capsule_standing_on_face() {
        let center = Point3::new(-2.0, 1.4, -2.0);
        let axis = Vector3::y();
        let cap = CapsuleGeom {
            center: &center,
            axis: &axis,
            radius: 0.5,
            half_height: 1.0,
        };
        let hit = capsule_triangle(&cap, &ground_tri()).unwrap();
        assert_relative_eq!(hit.normal, -Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(hit.dist, -0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_capsule_piercing_face() {
        let center = Point3::new(-2.0, 0.5, -2.0);
        let axis = Vector3::y();
        let cap = CapsuleGeom {
            center: &center,
            axis: &axis,
            radius: 0.5,
            half_height: 1.0,
        };
        let hit = capsule_triangle(&cap, &ground_tri()).unwrap();
        assert_relative_eq!(hit.normal, -Vector3::y(), epsilon = 1e-12);
        // Lower end at y = -0.5, plus the radius.
        assert_relative_eq!(hit.dist, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_box_on_face() {
        let center = Point3::new(-2.0, 0.45, -2.0);
        let half = Vector3::new(0.5, 0.5, 0.5);
        let rot = UnitQuaternion::identity();
        let b = BoxGeom {
            center: &center,
            half_extents: &half,
            rotation: &rot,
        };
        let hit = box_triangle(&b, &ground_tri()).unwrap();
        assert_relative_eq!(hit.normal, -Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(hit.dist, -0.05, epsilon = 1e-12);
        assert_relative_eq!(hit.point, Point3::new(-2.0, 0.0, -2.0), epsilon = 1e-12);

        let lifted = Point3::new(-2.0, 0.6, -2.0);
        let b = BoxGeom {
            center: &lifted,
            ..b
        };
        assert!(box_triangle(&b, &ground_tri()).is_none());
    }

    #[test]
    fn test_box_beside_triangle_is_separated() {
        let center = Point3::new(15.0, 0.0, 0.0);
        let half = Vector3::new(0.5, 0.5, 0.5);
        let rot = UnitQuaternion::identity();
        let b = BoxGeom {
            center: &center,
            half_extents: &half,
            rotation: &rot,
        };
        assert!(box_triangle(&b, &ground_tri()).is_none());
    }
}
