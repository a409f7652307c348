//! Mesh queries.
//!
//! For a primitive, its world bounds are mapped into the mesh's local space,
//! the spatial tree yields candidate triangles, and each candidate is moved
//! back to world space and tested. The deepest contact wins.
//!
//! Planes and other meshes are tested by their vertices instead: a plane
//! against every mesh vertex, and mesh against mesh (or terrain) by pushing
//! each vertex out through the nearest face it sits behind.

use nalgebra::{Point3, Vector3};

use super::primitive::{BoxGeom, CapsuleGeom};
use super::triangle::{box_triangle, capsule_triangle, point_triangle, sphere_triangle};
use super::Intersection;
use crate::aabb::Aabb;
use crate::mesh::TriangleSource;
use crate::shape::Shape;

/// Vertex contacts this close to the deepest one in depth or normal are
/// treated as the same contact.
const MERGE_TOLERANCE: f64 = 1e-9;

/// Test a primitive against every candidate triangle of a mesh. Only
/// spheres, boxes and capsules are supported; other shapes yield `None`.
#[must_use]
pub fn primitive_mesh<M: TriangleSource>(shape: &Shape, mesh: &M) -> Option<Intersection> {
    let mut deepest: Option<Intersection> = None;
    let query = shape.aabb();

    mesh.for_each_candidate(&query, |_, tri| {
        let hit = match shape {
            Shape::Sphere { center, radius } => sphere_triangle(center, *radius, &tri),
            Shape::Box {
                center,
                half_extents,
                rotation,
            } => box_triangle(
                &BoxGeom {
                    center,
                    half_extents,
                    rotation,
                },
                &tri,
            ),
            Shape::Capsule {
                center,
                axis,
                radius,
                half_height,
            } => capsule_triangle(
                &CapsuleGeom {
                    center,
                    axis,
                    radius: *radius,
                    half_height: *half_height,
                },
                &tri,
            ),
            _ => None,
        };
        if let Some(hit) = hit {
            if deepest.as_ref().map_or(true, |d| hit.dist < d.dist) {
                deepest = Some(hit);
            }
        }
    });

    deepest
}

/// Plane against every vertex of a mesh, the way a box is tested by its
/// corners. Penetrating vertices are projected onto the plane and averaged.
/// The normal points from the plane toward the mesh.
#[must_use]
pub fn plane_mesh<M: TriangleSource>(
    normal: &Vector3<f64>,
    distance: f64,
    mesh: &M,
) -> Option<Intersection> {
    let mut deepest = f64::INFINITY;
    let mut sum = Vector3::zeros();
    let mut count = 0u32;
    mesh.for_each_world_vertex(|p| {
        let s = normal.dot(&p.coords) - distance;
        deepest = deepest.min(s);
        if s <= 0.0 {
            sum += (p - normal * s).coords;
            count += 1;
        }
    });
    if count == 0 {
        return None;
    }
    let point = Point3::from(sum / f64::from(count));
    Some(Intersection::new(point, *normal, deepest))
}

/// How deep a vertex may sit behind a face of the other shape and still be
/// pushed back out through it: half the thinnest side of the bounds.
#[must_use]
pub fn vertex_reach(bounds: &Aabb) -> f64 {
    bounds.half_extents().min().max(0.0)
}

/// Mesh against mesh or terrain by vertex penetration in both directions.
///
/// Each vertex of one shape near the other's bounds is tested against the
/// other's nearby triangles and pushed out through the nearest face it sits
/// behind. The direction with the deeper vertex wins, and the vertices
/// sharing its depth and normal are averaged into the contact point. The
/// normal points from `a` toward `b`.
#[must_use]
pub fn mesh_mesh<A, B>(
    a: &A,
    a_bounds: &Aabb,
    b: &B,
    b_bounds: &Aabb,
    reach: f64,
) -> Option<Intersection>
where
    A: TriangleSource,
    B: TriangleSource,
{
    let forward = vertices_into(a, b, b_bounds, reach);
    let backward = vertices_into(b, a, a_bounds, reach).map(Intersection::flipped);
    match (forward, backward) {
        (Some(f), Some(r)) if r.dist < f.dist - MERGE_TOLERANCE => Some(r),
        (Some(f), _) => Some(f),
        (None, r) => r,
    }
}

/// Vertices of `source` against the faces of `target`. The normal points
/// from `source` toward `target`.
fn vertices_into<S, T>(
    source: &S,
    target: &T,
    target_bounds: &Aabb,
    reach: f64,
) -> Option<Intersection>
where
    S: TriangleSource,
    T: TriangleSource,
{
    let zone = target_bounds.expanded(reach);
    let mut hits = Vec::new();
    source.for_each_world_vertex(|v| {
        if zone.contains_point(&v) {
            if let Some(hit) = nearest_face(&v, target, reach) {
                hits.push(hit);
            }
        }
    });

    let deepest = hits.iter().copied().min_by(|x, y| x.dist.total_cmp(&y.dist))?;
    let mut sum = Vector3::zeros();
    let mut count = 0u32;
    for hit in &hits {
        if hit.dist <= deepest.dist + MERGE_TOLERANCE
            && hit.normal.dot(&deepest.normal) >= 1.0 - MERGE_TOLERANCE
        {
            sum += hit.point.coords;
            count += 1;
        }
    }
    let point = Point3::from(sum / f64::from(count.max(1)));
    Some(Intersection::new(point, deepest.normal, deepest.dist))
}

/// The shallowest face of `target` that `v` sits behind.
fn nearest_face<T: TriangleSource>(
    v: &Point3<f64>,
    target: &T,
    reach: f64,
) -> Option<Intersection> {
    let query = Aabb::from_center(*v, Vector3::repeat(reach));
    let mut nearest: Option<Intersection> = None;
    target.for_each_candidate(&query, |_, tri| {
        if let Some(hit) = point_triangle(v, &tri, reach) {
            if nearest.as_ref().map_or(true, |n| hit.dist > n.dist) {
                nearest = Some(hit);
            }
        }
    });
    nearest
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
    use crate::mesh::{TerrainMesh, TriangleMesh};
    use crate::transform::Transform;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;
    use phys_types::TreeSplit;

    const CUBE_INDICES: [u32; 36] = [
        0, 2, 1, 1, 2, 3, 4, 5, 6, 5, 7, 6, 0, 4, 2, 2, 4, 6, 1, 3, 5, 3, 7, 5, 0, 1, 4, 1, 5, 4,
        2, 6, 3, 3, 6, 7,
    ];

    fn cube(center: Point3<f64>, half: f64) -> TriangleMesh {
        let points = (0..8)
            .map(|i| {
                let side = |bit: u32| if i & bit == 0 { -half } else { half };
                Point3::new(side(1), side(2), side(4))
            })
            .collect();
        let mut mesh = TriangleMesh::new(points, CUBE_INDICES.to_vec()).unwrap();
        mesh.set_transform(&Transform::new(
            center.coords,
            UnitQuaternion::identity(),
            Vector3::new(1.0, 1.0, 1.0),
        ));
        mesh
    }

    fn bumpy_terrain() -> TerrainMesh {
        let n = 8;
        let mut points = Vec::new();
        for iz in 0..=n {
            for ix in 0..=n {
                let y = if ix == 4 && iz == 4 { 1.0 } else { 0.0 };
                points.push(Point3::new(ix as f64, y, iz as f64));
            }
        }
        TerrainMesh::new(points, n, n, 1.0, TreeSplit::Quad, 4, 1.0).unwrap()
    }

    #[test]
    fn test_deepest_contact_wins() {
        let terrain = bumpy_terrain();
        let sphere = Shape::sphere(0.5).at(Point3::new(4.0, 1.3, 4.0));
        let hit = primitive_mesh(&sphere, &terrain).unwrap();
        // The peak vertex is the deepest feature.
        assert_relative_eq!(hit.point, Point3::new(4.0, 1.0, 4.0), epsilon = 1e-12);
        assert_relative_eq!(hit.dist, -0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_far_shape_has_no_candidates() {
        let terrain = bumpy_terrain();
        let sphere = Shape::sphere(0.5).at(Point3::new(40.0, 0.0, 40.0));
        assert!(primitive_mesh(&sphere, &terrain).is_none());
    }

    #[test]
    fn test_transformed_mesh_is_queried_in_world_space() {
        let points = vec![
            Point3::new(-5.0, 0.0, -5.0),
            Point3::new(-5.0, 0.0, 5.0),
            Point3::new(5.0, 0.0, -5.0),
        ];
        let mut mesh = TriangleMesh::new(points, vec![0, 1, 2]).unwrap();
        mesh.set_transform(&Transform::new(
            Vector3::new(0.0, 10.0, 0.0),
            UnitQuaternion::identity(),
            Vector3::new(1.0, 1.0, 1.0),
        ));

        let above = Shape::sphere(1.0).at(Point3::new(-1.0, 10.8, -1.0));
        let hit = primitive_mesh(&above, &mesh).unwrap();
        assert_relative_eq!(hit.dist, -0.2, epsilon = 1e-12);
        assert_relative_eq!(hit.normal, -Vector3::y(), epsilon = 1e-12);

        let at_origin = Shape::sphere(1.0).at(Point3::new(-1.0, 0.8, -1.0));
        assert!(primitive_mesh(&at_origin, &mesh).is_none());
    }

    #[test]
    fn test_unsupported_shape_yields_nothing() {
        let terrain = bumpy_terrain();
        let cylinder = Shape::cylinder(Point3::new(4.0, 0.0, 4.0), Point3::new(4.0, 2.0, 4.0), 0.5);
        assert!(primitive_mesh(&cylinder, &terrain).is_none());
    }

    #[test]
    fn test_plane_meets_lowest_vertices() {
        let sinking = cube(Point3::new(0.0, 0.45, 0.0), 0.5);
        let hit = plane_mesh(&Vector3::y(), 0.0, &sinking).unwrap();
        assert_relative_eq!(hit.normal, Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(hit.dist, -0.05, epsilon = 1e-12);
        // Four bottom corners average to the middle of the face.
        assert_relative_eq!(hit.point, Point3::origin(), epsilon = 1e-12);

        let lifted = cube(Point3::new(0.0, 0.6, 0.0), 0.5);
        assert!(plane_mesh(&Vector3::y(), 0.0, &lifted).is_none());
    }

    #[test]
    fn test_cube_mesh_on_terrain() {
        let terrain = bumpy_terrain();
        let block = cube(Point3::new(2.3, 0.45, 2.6), 0.5);
        let bounds = block.world_aabb();
        let hit = mesh_mesh(
            &block,
            &bounds,
            &terrain,
            &terrain.world_aabb(),
            vertex_reach(&bounds),
        )
        .unwrap();
        assert_relative_eq!(hit.normal, -Vector3::y(), epsilon = 1e-9);
        assert_relative_eq!(hit.dist, -0.05, epsilon = 1e-9);
        assert_relative_eq!(hit.point, Point3::new(2.3, 0.0, 2.6), epsilon = 1e-9);
    }

    #[test]
    fn test_stacked_cube_meshes() {
        let lower = cube(Point3::origin(), 0.5);
        let upper = cube(Point3::new(0.2, 0.95, 0.1), 0.5);
        let (lb, ub) = (lower.world_aabb(), upper.world_aabb());
        let reach = vertex_reach(&lb).min(vertex_reach(&ub));
        assert_relative_eq!(reach, 0.5, epsilon = 1e-12);

        let hit = mesh_mesh(&lower, &lb, &upper, &ub, reach).unwrap();
        assert_relative_eq!(hit.normal, Vector3::y(), epsilon = 1e-9);
        assert_relative_eq!(hit.dist, -0.05, epsilon = 1e-9);
        assert_relative_eq!(hit.point.y, 0.45, epsilon = 1e-9);

        let apart = cube(Point3::new(0.0, 1.2, 0.0), 0.5);
        let ab = apart.world_aabb();
        assert!(mesh_mesh(&lower, &lb, &apart, &ab, reach).is_none());
    }
}
