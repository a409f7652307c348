//! Pair tests between primitive shapes.
//!
//! Every function works on world-space geometry and reports the normal
//! pointing from its first shape toward its second. Pairs written in terms
//! of another pair reuse that test and flip the result.

use nalgebra::{Point3, UnitQuaternion, Vector3};

use super::geometry::{closest_point_on_segment, EPSILON};
use super::Intersection;
use crate::shape::capsule_segment;

/// Alternating-projection rounds used to find the capsule point nearest a box.
const BOX_SEGMENT_ITERATIONS: usize = 4;

/// Oriented box in world space.
#[derive(Debug, Clone, Copy)]
pub struct BoxGeom<'a> {
    /// Center.
    pub center: &'a Point3<f64>,
    /// Half extents along the box axes.
    pub half_extents: &'a Vector3<f64>,
    /// Orientation of the box axes.
    pub rotation: &'a UnitQuaternion<f64>,
}

impl BoxGeom<'_> {
    /// The eight corners.
    #[must_use]
    pub fn corners(&self) -> [Point3<f64>; 8] {
        let h = self.half_extents;
        std::array::from_fn(|i| {
            let local = Vector3::new(
                if i & 1 == 0 { -h.x } else { h.x },
                if i & 2 == 0 { -h.y } else { h.y },
                if i & 4 == 0 { -h.z } else { h.z },
            );
            self.center + self.rotation * local
        })
    }

    /// Closest point of the solid box to `p`.
    #[must_use]
    pub fn clamp_point(&self, p: &Point3<f64>) -> Point3<f64> {
        let local = self.rotation.inverse() * (p - self.center);
        let clamped = local.zip_map(self.half_extents, |v, h| v.clamp(-h, h));
        self.center + self.rotation * clamped
    }

    /// Half-length of the box's projection onto a unit axis.
    #[must_use]
    pub fn projected_radius(&self, axis: &Vector3<f64>) -> f64 {
        let local = self.rotation.inverse() * axis;
        local.abs().dot(self.half_extents)
    }
}

/// Capsule in world space.
#[derive(Debug, Clone, Copy)]
pub struct CapsuleGeom<'a> {
    /// Midpoint of the core segment.
    pub center: &'a Point3<f64>,
    /// Unit axis.
    pub axis: &'a Vector3<f64>,
    /// Radius.
    pub radius: f64,
    /// Half length of the core segment.
    pub half_height: f64,
}

impl CapsuleGeom<'_> {
    /// End points of the core segment.
    #[must_use]
    pub fn segment(&self) -> (Point3<f64>, Point3<f64>) {
        capsule_segment(self.center, self.axis, self.half_height)
    }
}

// =============================================================================
// Sphere
// =============================================================================

/// Sphere against sphere.
#[must_use]
pub fn sphere_sphere(
    ca: &Point3<f64>,
    ra: f64,
    cb: &Point3<f64>,
    rb: f64,
) -> Option<Intersection> {
    let d = cb - ca;
    let len = d.norm();
    let dist = len - ra - rb;
    if dist > 0.0 {
        return None;
    }
    let normal = if len > EPSILON { d / len } else { Vector3::y() };
    let point = ca + normal * (ra + 0.5 * dist);
    Some(Intersection::new(point, normal, dist))
}

/// Sphere against oriented box.
#[must_use]
pub fn sphere_box(center: &Point3<f64>, radius: f64, b: &BoxGeom<'_>) -> Option<Intersection> {
    let local = b.rotation.inverse() * (center - b.center);
    let clamped = local.zip_map(b.half_extents, |v, h| v.clamp(-h, h));
    let diff = local - clamped;
    let len = diff.norm();

    if len > EPSILON {
        let dist = len - radius;
        if dist > 0.0 {
            return None;
        }
        let normal = b.rotation * (-diff / len);
        let point = b.center + b.rotation * clamped;
        return Some(Intersection::new(point, normal, dist));
    }

    // Center inside the box: leave through the nearest face.
    let depth = b.half_extents - local.abs();
    let axis = depth.imin();
    let mut outward = Vector3::zeros();
    outward[axis] = if local[axis] >= 0.0 { 1.0 } else { -1.0 };
    let outward = b.rotation * outward;
    let point = center + outward * depth[axis];
    Some(Intersection::new(point, -outward, -(depth[axis] + radius)))
}

/// Sphere against capsule.
#[must_use]
pub fn sphere_capsule(
    center: &Point3<f64>,
    radius: f64,
    c: &CapsuleGeom<'_>,
) -> Option<Intersection> {
    let (a, b) = c.segment();
    let nearest = closest_point_on_segment(&a, &b, center);
    sphere_sphere(center, radius, &nearest, c.radius)
}

/// Sphere against plane.
#[must_use]
pub fn sphere_plane(
    center: &Point3<f64>,
    radius: f64,
    normal: &Vector3<f64>,
    distance: f64,
) -> Option<Intersection> {
    let s = normal.dot(&center.coords) - distance;
    let dist = s - radius;
    if dist > 0.0 {
        return None;
    }
    Some(Intersection::new(center - normal * s, -normal, dist))
}

// =============================================================================
// Box
// =============================================================================

/// Box against capsule: find the capsule point nearest the box, then test
/// it as a sphere.
#[must_use]
pub fn box_capsule(b: &BoxGeom<'_>, c: &CapsuleGeom<'_>) -> Option<Intersection> {
    let (s0, s1) = c.segment();
    let mut on_segment = closest_point_on_segment(&s0, &s1, b.center);
    for _ in 0..BOX_SEGMENT_ITERATIONS {
        let on_box = b.clamp_point(&on_segment);
        let next = closest_point_on_segment(&s0, &s1, &on_box);
        let moved = (next - on_segment).norm_squared();
        on_segment = next;
        if moved < EPSILON {
            break;
        }
    }
    sphere_box(&on_segment, c.radius, b).map(Intersection::flipped)
}

/// Box against plane. The contact point is the mean of the penetrating
/// corners projected onto the plane.
#[must_use]
pub fn box_plane(b: &BoxGeom<'_>, normal: &Vector3<f64>, distance: f64) -> Option<Intersection> {
    let mut deepest = f64::INFINITY;
    let mut sum = Vector3::zeros();
    let mut count = 0u32;
    for corner in b.corners() {
        let s = normal.dot(&corner.coords) - distance;
        deepest = deepest.min(s);
        if s <= 0.0 {
            sum += (corner - normal * s).coords;
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }
    let point = Point3::from(sum / f64::from(count));
    Some(Intersection::new(point, -normal, deepest))
}

// =============================================================================
// Capsule
// =============================================================================

/// Capsule against plane. Both ends touching yields their midpoint.
#[must_use]
pub fn capsule_plane(
    c: &CapsuleGeom<'_>,
    normal: &Vector3<f64>,
    distance: f64,
) -> Option<Intersection> {
    let (a, b) = c.segment();
    let mut deepest = f64::INFINITY;
    let mut sum = Vector3::zeros();
    let mut count = 0u32;
    for end in [a, b] {
        let s = normal.dot(&end.coords) - distance;
        let dist = s - c.radius;
        deepest = deepest.min(dist);
        if dist <= 0.0 {
            sum += (end - normal * s).coords;
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }
    let point = Point3::from(sum / f64::from(count));
    Some(Intersection::new(point, -normal, deepest))
}
