//! Triangle-soup shapes: arbitrary meshes and the terrain grid.
//!
//! Both kinds own their vertex buffers and a [`SpatialTree`] built in local
//! space. Unlike the primitive shapes they are never cloned into a world
//! copy each tick: the owning body stores its current transform on the mesh
//! instead, and queries map the probe volume into local space and the
//! candidate triangles back out.
//!
//! # Example
//!
//! ```
//! use phys_core::{TriangleMesh, TriangleSource};
//! use nalgebra::Point3;
//!
//! // Two triangles forming a unit quad in the XZ plane.
//! let points = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.0, 0.0, 1.0),
//!     Point3::new(1.0, 0.0, 1.0),
//! ];
//! let mesh = TriangleMesh::new(points, vec![0, 2, 1, 1, 2, 3]).unwrap();
//! assert_eq!(mesh.triangle_count(), 2);
//! assert!(mesh.world_triangle(1).is_some());
//! ```

use nalgebra::{Matrix4, Point3, Vector3};
use phys_types::{PhysError, Result, TreeSplit};

use crate::aabb::Aabb;
use crate::spatial_tree::SpatialTree;
use crate::transform::Transform;

/// Leaf capacity for trees of free-form meshes.
pub const DEFAULT_MESH_LEAF_SIZE: usize = 16;

const EPSILON: f64 = 1e-12;

/// Bounds of a triangle.
#[must_use]
pub fn triangle_aabb(tri: &[Point3<f64>; 3]) -> Aabb {
    Aabb::from_points(tri.iter())
}

/// Unit face normal from counter-clockwise winding, or +Y for a degenerate
/// triangle.
#[must_use]
pub fn triangle_normal(tri: &[Point3<f64>; 3]) -> Vector3<f64> {
    let n = (tri[1] - tri[0]).cross(&(tri[2] - tri[0]));
    let len = n.norm();
    if len > EPSILON {
        n / len
    } else {
        Vector3::y()
    }
}

/// A shape made of indexed triangles with a spatial tree.
///
/// Implemented by [`TriangleMesh`] and [`TerrainMesh`] so the narrow phase
/// can query both the same way.
pub trait TriangleSource {
    /// The tree over this shape's triangles (local space).
    fn tree(&self) -> &SpatialTree;

    /// Vertices of a triangle in local space.
    fn local_triangle(&self, id: u32) -> Option<[Point3<f64>; 3]>;

    /// Local-to-world matrix.
    fn matrix(&self) -> &Matrix4<f64>;

    /// World-to-local matrix.
    fn inverse_matrix(&self) -> &Matrix4<f64>;

    /// Number of triangles.
    fn triangle_count(&self) -> usize;

    /// Vertex positions in local space.
    fn local_points(&self) -> &[Point3<f64>];

    /// Visit every vertex in world space.
    fn for_each_world_vertex<F>(&self, mut visit: F)
    where
        F: FnMut(Point3<f64>),
        Self: Sized,
    {
        let m = self.matrix();
        for p in self.local_points() {
            visit(m.transform_point(p));
        }
    }

    /// Vertices of a triangle in world space.
    fn world_triangle(&self, id: u32) -> Option<[Point3<f64>; 3]> {
        let m = self.matrix();
        self.local_triangle(id)
            .map(|tri| tri.map(|p| m.transform_point(&p)))
    }

    /// Visit the world-space triangles that may touch a world-space volume.
    fn for_each_candidate<F>(&self, world_query: &Aabb, mut visit: F)
    where
        F: FnMut(u32, [Point3<f64>; 3]),
        Self: Sized,
    {
        let local_query = world_query.transformed(self.inverse_matrix());
        self.tree().for_each_overlapping(&local_query, |id| {
            if let Some(tri) = self.world_triangle(id) {
                visit(id, tri);
            }
        });
    }
}

/// Placement shared by both mesh kinds: the transform and its matrices.
#[derive(Debug, Clone, PartialEq)]
struct Placement {
    transform: Transform,
    matrix: Matrix4<f64>,
    inverse: Matrix4<f64>,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            transform: Transform::identity(),
            matrix: Matrix4::identity(),
            inverse: Matrix4::identity(),
        }
    }
}

impl Placement {
    fn set(&mut self, transform: &Transform) {
        self.transform = *transform;
        self.matrix = transform.to_homogeneous();
        self.inverse = transform.inverse_homogeneous();
    }
}

// =============================================================================
// Triangle mesh
// =============================================================================

/// Arbitrary (possibly non-convex) triangle mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleMesh {
    points: Vec<Point3<f64>>,
    indices: Vec<u32>,
    tree: SpatialTree,
    bounds: Aabb,
    placement: Placement,
}

impl TriangleMesh {
    /// Build a mesh from local-space points and a flat index list (three
    /// indices per triangle, counter-clockwise seen from outside).
    pub fn new(points: Vec<Point3<f64>>, indices: Vec<u32>) -> Result<Self> {
        Self::with_tree_params(points, indices, TreeSplit::Oct, DEFAULT_MESH_LEAF_SIZE)
    }

    /// Like [`TriangleMesh::new`], choosing the tree layout.
    pub fn with_tree_params(
        points: Vec<Point3<f64>>,
        indices: Vec<u32>,
        split: TreeSplit,
        max_tris_per_leaf: usize,
    ) -> Result<Self> {
        if indices.is_empty() || indices.len() % 3 != 0 {
            return Err(PhysError::invalid_shape(format!(
                "mesh index count must be a positive multiple of 3, got {}",
                indices.len()
            )));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= points.len()) {
            return Err(PhysError::invalid_shape(format!(
                "mesh index {bad} out of range for {} points",
                points.len()
            )));
        }
        if !points.iter().all(|p| p.coords.iter().all(|c| c.is_finite())) {
            return Err(PhysError::invalid_shape("mesh points must be finite"));
        }

        let mut mesh = Self {
            bounds: Aabb::from_points(points.iter()),
            points,
            indices,
            tree: SpatialTree::default(),
            placement: Placement::default(),
        };
        let tri_bounds = mesh.triangle_bounds();
        mesh.tree = SpatialTree::build(&tri_bounds, split, max_tris_per_leaf, 0.0);
        Ok(mesh)
    }

    /// Local-space vertices.
    #[must_use]
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// Flat triangle index list.
    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Local-space bounds of all points.
    #[must_use]
    pub fn local_bounds(&self) -> Aabb {
        self.bounds
    }

    /// Current local-to-world transform.
    #[must_use]
    pub fn transform(&self) -> &Transform {
        &self.placement.transform
    }

    /// Move the mesh by replacing its stored transform. The tree is untouched.
    pub fn set_transform(&mut self, transform: &Transform) {
        self.placement.set(transform);
    }

    /// World-space bounds under the stored transform.
    #[must_use]
    pub fn world_aabb(&self) -> Aabb {
        self.bounds.transformed(&self.placement.matrix)
    }

    /// Iterate over all local-space triangles.
    pub fn triangles(&self) -> impl Iterator<Item = [Point3<f64>; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| {
            [
                self.points[t[0] as usize],
                self.points[t[1] as usize],
                self.points[t[2] as usize],
            ]
        })
    }

    fn triangle_bounds(&self) -> Vec<Aabb> {
        self.triangles().map(|t| triangle_aabb(&t)).collect()
    }
}

impl TriangleSource for TriangleMesh {
    fn tree(&self) -> &SpatialTree {
        &self.tree
    }

    fn local_triangle(&self, id: u32) -> Option<[Point3<f64>; 3]> {
        let base = id as usize * 3;
        let t = self.indices.get(base..base + 3)?;
        Some([
            *self.points.get(t[0] as usize)?,
            *self.points.get(t[1] as usize)?,
            *self.points.get(t[2] as usize)?,
        ])
    }

    fn matrix(&self) -> &Matrix4<f64> {
        &self.placement.matrix
    }

    fn inverse_matrix(&self) -> &Matrix4<f64> {
        &self.placement.inverse
    }

    fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn local_points(&self) -> &[Point3<f64>] {
        &self.points
    }
}

// =============================================================================
// Terrain mesh
// =============================================================================

/// Regular grid of `(segments_x + 1) * (segments_z + 1)` points spanning the
/// XZ plane, with heights in Y.
///
/// Triangle indices are implicit. Cell `(ix, iz)` has corners
/// `a = (ix, iz)`, `b = (ix + 1, iz)`, `c = (ix, iz + 1)`, `d = (ix + 1, iz + 1)`
/// and is split into triangles `(a, c, b)` and `(b, c, d)`, both facing +Y.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainMesh {
    points: Vec<Point3<f64>>,
    segments_x: usize,
    segments_z: usize,
    segment_size: f64,
    tree: SpatialTree,
    bounds: Aabb,
    placement: Placement,
}

impl TerrainMesh {
    /// Build the grid from row-major points (X fastest) and its spatial tree.
    pub fn new(
        points: Vec<Point3<f64>>,
        segments_x: usize,
        segments_z: usize,
        segment_size: f64,
        split: TreeSplit,
        max_tris_per_leaf: usize,
        y_bias: f64,
    ) -> Result<Self> {
        if segments_x == 0 || segments_z == 0 {
            return Err(PhysError::invalid_terrain("terrain needs at least one cell"));
        }
        let expected = (segments_x + 1) * (segments_z + 1);
        if points.len() != expected {
            return Err(PhysError::invalid_terrain(format!(
                "expected {expected} grid points, got {}",
                points.len()
            )));
        }

        let mut mesh = Self {
            bounds: Aabb::from_points(points.iter()),
            points,
            segments_x,
            segments_z,
            segment_size,
            tree: SpatialTree::default(),
            placement: Placement::default(),
        };
        let tri_bounds = mesh.triangle_bounds();
        mesh.tree = SpatialTree::build(&tri_bounds, split, max_tris_per_leaf, y_bias);
        Ok(mesh)
    }

    /// Number of cells along X.
    #[must_use]
    pub fn segments_x(&self) -> usize {
        self.segments_x
    }

    /// Number of cells along Z.
    #[must_use]
    pub fn segments_z(&self) -> usize {
        self.segments_z
    }

    /// Cell edge length.
    #[must_use]
    pub fn segment_size(&self) -> f64 {
        self.segment_size
    }

    /// All grid points, row-major with X fastest.
    #[must_use]
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// Index of grid vertex `(ix, iz)` in [`TerrainMesh::points`].
    #[must_use]
    pub fn point_index(&self, ix: usize, iz: usize) -> usize {
        iz * (self.segments_x + 1) + ix
    }

    /// Grid vertex `(ix, iz)`.
    #[must_use]
    pub fn point(&self, ix: usize, iz: usize) -> Option<Point3<f64>> {
        if ix > self.segments_x || iz > self.segments_z {
            return None;
        }
        self.points.get(self.point_index(ix, iz)).copied()
    }

    /// Overwrite the height of grid vertex `(ix, iz)`. Out-of-range
    /// coordinates are ignored.
    pub fn set_height(&mut self, ix: usize, iz: usize, y: f64) {
        if ix > self.segments_x || iz > self.segments_z {
            return;
        }
        let idx = self.point_index(ix, iz);
        if let Some(p) = self.points.get_mut(idx) {
            p.y = y;
        }
    }

    /// Local-space bounds of all points (as of the last recompute).
    #[must_use]
    pub fn local_bounds(&self) -> Aabb {
        self.bounds
    }

    /// Recompute the bounds over every point.
    pub fn recompute_bounds(&mut self) -> Aabb {
        self.bounds = Aabb::from_points(self.points.iter());
        self.bounds
    }

    /// Rebuild the spatial tree from scratch.
    pub fn rebuild_tree(&mut self) {
        let tri_bounds = self.triangle_bounds();
        self.tree.rebuild(&tri_bounds);
    }

    /// Grow tree bounds over a local-space region after a height edit.
    pub fn refit_tree(&mut self, region: &Aabb) {
        let tri_bounds = self.triangle_bounds();
        self.tree.refit_region(region, &tri_bounds);
    }

    /// Current local-to-world transform.
    #[must_use]
    pub fn transform(&self) -> &Transform {
        &self.placement.transform
    }

    /// Replace the stored transform.
    pub fn set_transform(&mut self, transform: &Transform) {
        self.placement.set(transform);
    }

    /// World-space bounds under the stored transform.
    #[must_use]
    pub fn world_aabb(&self) -> Aabb {
        self.bounds.transformed(&self.placement.matrix)
    }

    /// Point indices of a triangle.
    #[must_use]
    pub fn triangle_indices(&self, id: u32) -> Option<[usize; 3]> {
        let id = id as usize;
        if id >= self.segments_x * self.segments_z * 2 {
            return None;
        }
        let cell = id / 2;
        let (ix, iz) = (cell % self.segments_x, cell / self.segments_x);
        let a = self.point_index(ix, iz);
        let b = self.point_index(ix + 1, iz);
        let c = self.point_index(ix, iz + 1);
        let d = self.point_index(ix + 1, iz + 1);
        Some(if id % 2 == 0 { [a, c, b] } else { [b, c, d] })
    }

    fn triangle_bounds(&self) -> Vec<Aabb> {
        (0..self.segments_x * self.segments_z * 2)
            .filter_map(|id| u32::try_from(id).ok())
            .filter_map(|id| self.local_triangle(id))
            .map(|t| triangle_aabb(&t))
            .collect()
    }
}

impl TriangleSource for TerrainMesh {
    fn tree(&self) -> &SpatialTree {
        &self.tree
    }

    fn local_triangle(&self, id: u32) -> Option<[Point3<f64>; 3]> {
        let [a, b, c] = self.triangle_indices(id)?;
        Some([
            *self.points.get(a)?,
            *self.points.get(b)?,
            *self.points.get(c)?,
        ])
    }

    fn matrix(&self) -> &Matrix4<f64> {
        &self.placement.matrix
    }

    fn inverse_matrix(&self) -> &Matrix4<f64> {
        &self.placement.inverse
    }

    fn triangle_count(&self) -> usize {
        self.segments_x * self.segments_z * 2
    }

    fn local_points(&self) -> &[Point3<f64>] {
        &self.points
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
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;

    fn flat_grid(n: usize) -> TerrainMesh {
        let mut points = Vec::new();
        for iz in 0..=n {
            for ix in 0..=n {
                points.push(Point3::new(ix as f64, 0.0, iz as f64));
            }
        }
        TerrainMesh::new(points, n, n, 1.0, TreeSplit::Quad, 4, 1.0).unwrap()
    }

    #[test]
    fn test_mesh_rejects_bad_indices() {
        let points = vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)];
        assert!(TriangleMesh::new(points.clone(), vec![0, 1]).is_err());
        assert!(TriangleMesh::new(points.clone(), vec![0, 1, 5]).is_err());
        assert!(TriangleMesh::new(points, vec![]).is_err());
    }

    #[test]
    fn test_terrain_triangles_face_up() {
        let grid = flat_grid(3);
        assert_eq!(grid.triangle_count(), 18);
        for id in 0..18 {
            let tri = grid.local_triangle(id).unwrap();
            assert_relative_eq!(triangle_normal(&tri), Vector3::y(), epsilon = 1e-12);
        }
        assert!(grid.local_triangle(18).is_none());
    }

    #[test]
    fn test_terrain_cell_layout() {
        let grid = flat_grid(2);
        // Cell (1, 0) is the second cell of the first row.
        let [a, c, b] = grid.triangle_indices(2).unwrap();
        assert_eq!(a, grid.point_index(1, 0));
        assert_eq!(c, grid.point_index(1, 1));
        assert_eq!(b, grid.point_index(2, 0));
        let [b2, c2, d] = grid.triangle_indices(3).unwrap();
        assert_eq!((b2, c2), (b, c));
        assert_eq!(d, grid.point_index(2, 1));
    }

    #[test]
    fn test_transform_moves_world_triangles() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        let mut mesh = TriangleMesh::new(points, vec![0, 2, 1]).unwrap();
        mesh.set_transform(&Transform::new(
            Vector3::new(0.0, 3.0, 0.0),
            UnitQuaternion::identity(),
            Vector3::new(2.0, 2.0, 2.0),
        ));

        let tri = mesh.world_triangle(0).unwrap();
        assert_relative_eq!(tri[2], Point3::new(2.0, 3.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(mesh.world_aabb().max, Point3::new(2.0, 3.0, 2.0), epsilon = 1e-12);

        let mut hits = Vec::new();
        let probe = Aabb::from_center(Point3::new(0.5, 3.0, 0.5), Vector3::new(0.1, 0.1, 0.1));
        mesh.for_each_candidate(&probe, |id, _| hits.push(id));
        assert_eq!(hits, vec![0]);

        let far = Aabb::from_center(Point3::new(0.5, 0.0, 0.5), Vector3::new(0.1, 0.1, 0.1));
        let mut misses = 0;
        mesh.for_each_candidate(&far, |_, _| misses += 1);
        assert_eq!(misses, 0);
    }

    #[test]
    fn test_set_height_and_bounds() {
        let mut grid = flat_grid(4);
        grid.set_height(2, 2, 3.5);
        grid.set_height(9, 9, 100.0);
        let bounds = grid.recompute_bounds();
        assert_eq!(bounds.max.y, 3.5);
        assert_eq!(grid.point(2, 2).unwrap().y, 3.5);
        assert!(grid.point(5, 0).is_none());
    }
}
