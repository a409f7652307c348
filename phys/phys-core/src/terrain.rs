//! Terrain heightfield proxy.
//!
//! The terrain is a static body whose shape is a [`TerrainMesh`] sampled
//! from a caller-owned height buffer. Grid vertex `(ix, iz)` sits at
//! `offset + (ix * segment_size, height * height_scale, iz * segment_size)`,
//! with the height read at texture coordinate `(ix / segments_x,
//! iz / segments_z)`.
//!
//! After [`PhysTerrain::create`], [`PhysTerrain::update_heightmap`] resamples
//! only the grid vertices inside a world-space region. The spatial tree is
//! refit around the region, or rebuilt when the new heights leave its padded
//! root bounds.
//!
//! # Example
//!
//! ```
//! use phys_core::{HeightMap, PhysTerrain};
//! use phys_types::TerrainParams;
//!
//! let samples = vec![0.5_f32; 16];
//! let heights = HeightMap::new(&samples, 4, 4).unwrap();
//!
//! let mut terrain = PhysTerrain::default();
//! terrain
//!     .create(&heights, TerrainParams::new(8, 8, 1.0).with_height_scale(2.0))
//!     .unwrap();
//! assert_eq!(terrain.height(3, 3), Some(1.0));
//! ```

use std::ops::RangeInclusive;

use nalgebra::Point3;
use phys_types::{Behavior, PhysError, Result, TerrainParams};
use tracing::{debug, warn};

use crate::aabb::Aabb;
use crate::body::PhysObject;
use crate::mesh::{TerrainMesh, TriangleSource};
use crate::shape::Shape;

/// Default vertical padding of terrain tree bounds.
pub const DEFAULT_Y_BOUNDS_BIAS: f64 = 1.0;

// =============================================================================
// Height source
// =============================================================================

/// Read-only view of a caller-owned grid of height samples, row-major with
/// X fastest. Sampling wraps around at the edges.
#[derive(Debug, Clone, Copy)]
pub struct HeightMap<'a> {
    samples: &'a [f32],
    width: usize,
    height: usize,
}

impl<'a> HeightMap<'a> {
    /// Wrap a sample buffer of `width * height` values.
    pub fn new(samples: &'a [f32], width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            warn!(width, height, "rejected empty heightmap");
            return Err(PhysError::invalid_terrain(format!(
                "heightmap must be non-empty, got {width}x{height}"
            )));
        }
        let Some(expected) = width.checked_mul(height) else {
            warn!(width, height, "rejected heightmap whose size overflows");
            return Err(PhysError::invalid_terrain(format!(
                "heightmap {width}x{height} is too large"
            )));
        };
        if samples.len() != expected {
            warn!(
                width,
                height,
                samples = samples.len(),
                "rejected heightmap with wrong sample count"
            );
            return Err(PhysError::invalid_terrain(format!(
                "heightmap {width}x{height} needs {expected} samples, got {}",
                samples.len()
            )));
        }
        Ok(Self {
            samples,
            width,
            height,
        })
    }

    /// Width in samples.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in samples.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Bilinear sample at texture coordinate `(u, v)`, with texel centers at
    /// half-pixel offsets and wrap-around addressing.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn sample(&self, u: f64, v: f64) -> f64 {
        let px = u * self.width as f64 - 0.5;
        let py = v * self.height as f64 - 0.5;
        let (x0, y0) = (px.floor(), py.floor());
        let (fx, fy) = (px - x0, py - y0);
        let (x0, y0) = (x0 as i64, y0 as i64);

        let top = lerp(self.texel(x0, y0), self.texel(x0 + 1, y0), fx);
        let bottom = lerp(self.texel(x0, y0 + 1), self.texel(x0 + 1, y0 + 1), fx);
        lerp(top, bottom, fy)
    }

    fn texel(&self, x: i64, y: i64) -> f64 {
        let wrap = |i: i64, n: usize| {
            let n = i64::try_from(n).unwrap_or(i64::MAX);
            usize::try_from(i.rem_euclid(n)).unwrap_or(0)
        };
        let idx = wrap(y, self.height) * self.width + wrap(x, self.width);
        self.samples.get(idx).map_or(0.0, |&s| f64::from(s))
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Grid indices `i` with `min <= i <= max`, clamped to `[0, segments]`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn index_range(min: f64, max: f64, segments: usize) -> Option<RangeInclusive<usize>> {
    let lo = min.ceil().max(0.0);
    let hi = max.floor().min(segments as f64);
    if lo <= hi {
        Some(lo as usize..=hi as usize)
    } else {
        None
    }
}

// =============================================================================
// Terrain body
// =============================================================================

/// The terrain: a static body over a sampled heightfield grid.
#[derive(Debug, Clone)]
pub struct PhysTerrain {
    params: TerrainParams,
    y_bias: f64,
    body: Option<PhysObject>,
}

impl Default for PhysTerrain {
    fn default() -> Self {
        Self::new(DEFAULT_Y_BOUNDS_BIAS)
    }
}

impl PhysTerrain {
    /// An empty terrain whose tree bounds will be padded by `y_bias`.
    #[must_use]
    pub fn new(y_bias: f64) -> Self {
        Self {
            params: TerrainParams::default(),
            y_bias,
            body: None,
        }
    }

    /// Whether [`PhysTerrain::create`] has succeeded.
    #[must_use]
    pub fn is_created(&self) -> bool {
        self.body.is_some()
    }

    /// Parameters of the current grid.
    #[must_use]
    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    /// The terrain body, once created.
    #[must_use]
    pub fn body(&self) -> Option<&PhysObject> {
        self.body.as_ref()
    }

    pub(crate) fn body_mut(&mut self) -> Option<&mut PhysObject> {
        self.body.as_mut()
    }

    /// The grid mesh, once created.
    #[must_use]
    pub fn mesh(&self) -> Option<&TerrainMesh> {
        match self.body.as_ref()?.proxy().shape() {
            Shape::TerrainMesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    /// Local height of grid vertex `(ix, iz)`.
    #[must_use]
    pub fn height(&self, ix: usize, iz: usize) -> Option<f64> {
        self.mesh()?.point(ix, iz).map(|p| p.y)
    }

    /// World bounds of the terrain, once created.
    #[must_use]
    pub fn aabb(&self) -> Option<&Aabb> {
        self.body.as_ref().map(PhysObject::aabb)
    }

    /// Build the grid from a height source, replacing any previous terrain.
    ///
    /// Invalid parameters are logged and leave the previous terrain intact.
    pub fn create(&mut self, heights: &HeightMap<'_>, params: TerrainParams) -> Result<()> {
        if let Err(err) = params.validate() {
            warn!(%err, "terrain creation rejected");
            return Err(err);
        }

        let mut points = Vec::with_capacity(params.point_count());
        for iz in 0..=params.segments_z {
            for ix in 0..=params.segments_x {
                points.push(grid_point(heights, &params, ix, iz));
            }
        }

        let mesh = TerrainMesh::new(
            points,
            params.segments_x,
            params.segments_z,
            params.segment_size,
            params.split,
            params.max_tris_per_leaf,
            self.y_bias,
        )?;
        let tree = mesh.tree();
        debug!(
            segments_x = params.segments_x,
            segments_z = params.segments_z,
            nodes = tree.node_count(),
            leaves = tree.leaf_count(),
            "terrain created"
        );

        let body = PhysObject::new(Shape::TerrainMesh(mesh), Behavior::Static)?
            .with_position(Point3::from(params.offset));
        self.params = params;
        self.body = Some(body);
        Ok(())
    }

    /// Resample the grid vertices whose world XZ position lies inside
    /// `region`. Vertices outside keep their heights; the bounds are
    /// recomputed over the whole grid.
    ///
    /// Fails with [`PhysError::TerrainNotCreated`] before
    /// [`PhysTerrain::create`].
    pub fn update_heightmap(&mut self, heights: &HeightMap<'_>, region: &Aabb) -> Result<()> {
        let params = self.params;
        let Some(body) = self.body.as_mut() else {
            warn!("terrain heightmap update before creation");
            return Err(PhysError::TerrainNotCreated);
        };
        let Some(mesh) = body.proxy_mut().terrain_mesh_mut() else {
            return Err(PhysError::TerrainNotCreated);
        };

        let inv = 1.0 / params.segment_size;
        let columns = index_range(
            (region.min.x - params.offset.x) * inv,
            (region.max.x - params.offset.x) * inv,
            params.segments_x,
        );
        let rows = index_range(
            (region.min.z - params.offset.z) * inv,
            (region.max.z - params.offset.z) * inv,
            params.segments_z,
        );

        if let (Some(columns), Some(rows)) = (columns, rows) {
            for iz in rows {
                for ix in columns.clone() {
                    let y = grid_point(heights, &params, ix, iz).y;
                    mesh.set_height(ix, iz, y);
                }
            }
        }

        let bounds = mesh.recompute_bounds();
        if mesh.tree().root_bounds().contains(&bounds) {
            let local_region = Aabb::new(
                region.min - params.offset,
                region.max - params.offset,
            );
            mesh.refit_tree(&local_region);
        } else {
            debug!("terrain heights left tree bounds, rebuilding");
            mesh.rebuild_tree();
        }

        body.refresh_proxy();
        Ok(())
    }
}

/// Local-space grid vertex `(ix, iz)`.
#[allow(clippy::cast_precision_loss)]
fn grid_point(
    heights: &HeightMap<'_>,
    params: &TerrainParams,
    ix: usize,
    iz: usize,
) -> Point3<f64> {
    let u = ix as f64 / params.segments_x as f64;
    let v = iz as f64 / params.segments_z as f64;
    Point3::new(
        ix as f64 * params.segment_size,
        heights.sample(u, v) * params.height_scale,
        iz as f64 * params.segment_size,
    )
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
    use nalgebra::Vector3;

    #[test]
    fn test_heightmap_validation() {
        let samples = [0.0_f32; 6];
        assert!(HeightMap::new(&samples, 2, 3).is_ok());
        assert!(HeightMap::new(&samples, 4, 2).is_err());
        assert!(HeightMap::new(&samples, 0, 6).is_err());
        // The product overflows instead of wrapping to a matching length.
        let err = HeightMap::new(&samples, usize::MAX, 2).unwrap_err();
        assert!(matches!(err, PhysError::InvalidTerrain { .. }));
    }

    #[test]
    fn test_bilinear_wraps() {
        let samples = [0.0_f32, 1.0];
        let map = HeightMap::new(&samples, 2, 1).unwrap();
        // Texel centers.
        assert_relative_eq!(map.sample(0.25, 0.5), 0.0, epsilon = 1e-12);
        assert_relative_eq!(map.sample(0.75, 0.5), 1.0, epsilon = 1e-12);
        // Halfway between the last and (wrapped) first texel.
        assert_relative_eq!(map.sample(0.0, 0.5), 0.5, epsilon = 1e-12);
        assert_relative_eq!(map.sample(1.0, 0.5), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_index_range_clamps() {
        assert_eq!(index_range(1.2, 3.9, 10), Some(2..=3));
        assert_eq!(index_range(-5.0, 2.0, 10), Some(0..=2));
        assert_eq!(index_range(8.0, 50.0, 10), Some(8..=10));
        assert_eq!(index_range(11.0, 50.0, 10), None);
        assert_eq!(index_range(1.2, 1.8, 10), None);
        assert_eq!(index_range(f64::NAN, 1.0, 10), None);
    }

    #[test]
    fn test_create_places_grid() {
        let samples = [2.0_f32; 4];
        let map = HeightMap::new(&samples, 2, 2).unwrap();
        let mut terrain = PhysTerrain::default();
        let params = TerrainParams::new(4, 2, 0.5)
            .with_height_scale(3.0)
            .with_offset(Vector3::new(10.0, 0.0, -1.0));
        terrain.create(&map, params).unwrap();

        let mesh = terrain.mesh().unwrap();
        assert_eq!(mesh.points().len(), 15);
        assert_eq!(terrain.height(4, 2), Some(6.0));
        let aabb = terrain.aabb().unwrap();
        assert_relative_eq!(aabb.min, Point3::new(10.0, 6.0, -1.0), epsilon = 1e-12);
        assert_relative_eq!(aabb.max, Point3::new(12.0, 6.0, 0.0), epsilon = 1e-12);
        assert_eq!(terrain.body().unwrap().behavior(), Behavior::Static);
    }

    #[test]
    fn test_invalid_params_keep_previous_terrain() {
        let samples = [1.0_f32; 4];
        let map = HeightMap::new(&samples, 2, 2).unwrap();
        let mut terrain = PhysTerrain::default();
        terrain.create(&map, TerrainParams::new(2, 2, 1.0)).unwrap();

        let err = terrain.create(&map, TerrainParams::new(0, 2, 1.0)).unwrap_err();
        assert!(matches!(err, PhysError::InvalidTerrain { .. }));
        assert_eq!(terrain.params().segments_x, 2);
        assert!(terrain.is_created());
    }

    #[test]
    fn test_update_before_create_fails() {
        let samples = [1.0_f32; 4];
        let map = HeightMap::new(&samples, 2, 2).unwrap();
        let mut terrain = PhysTerrain::default();
        let region = Aabb::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        assert_eq!(
            terrain.update_heightmap(&map, &region),
            Err(PhysError::TerrainNotCreated)
        );
    }

    #[test]
    fn test_partial_update_touches_only_region() {
        let flat = [0.0_f32; 4];
        let raised = [5.0_f32; 4];
        let mut terrain = PhysTerrain::default();
        terrain
            .create(&HeightMap::new(&flat, 2, 2).unwrap(), TerrainParams::new(8, 8, 1.0))
            .unwrap();

        let region = Aabb::new(Point3::new(1.5, -10.0, 2.5), Point3::new(4.0, 10.0, 3.5));
        terrain
            .update_heightmap(&HeightMap::new(&raised, 2, 2).unwrap(), &region)
            .unwrap();

        for iz in 0..=8 {
            for ix in 0..=8 {
                let inside = (2..=4).contains(&ix) && iz == 3;
                let expected = if inside { 5.0 } else { 0.0 };
                assert_eq!(terrain.height(ix, iz), Some(expected), "vertex ({ix}, {iz})");
            }
        }
        assert_eq!(terrain.aabb().unwrap().max.y, 5.0);

        // The raised vertices are reachable through the tree.
        let mesh = terrain.mesh().unwrap();
        let probe = Aabb::from_center(Point3::new(3.0, 5.0, 3.0), Vector3::new(0.1, 0.1, 0.1));
        let mut hits = 0;
        mesh.for_each_candidate(&probe, |_, _| hits += 1);
        assert!(hits > 0);
    }
}
