//! Quad/oct-subdivided bounding volume hierarchy over triangles.
//!
//! The tree sits between the broad phase (which pairs a body with a mesh or
//! the terrain) and the triangle tests of the narrow phase. It never owns
//! geometry: leaves hold triangle ids that index into the owning mesh.
//!
//! # Algorithm
//!
//! The tree is built top-down:
//! 1. Bound every triangle
//! 2. Split the node's bounds at its center into four cells (X/Z, for
//!    heightfields) or eight cells (X/Y/Z)
//! 3. Assign each triangle to the cell containing its centroid
//! 4. Recurse into non-empty cells until a node holds at most
//!    `max_tris_per_leaf` triangles
//!
//! Node bounds are expressed in the mesh's local space and padded
//! vertically by a bias, so callers query with a volume mapped into that
//! space. Queries are depth-first and prune every subtree whose bounds miss
//! the query volume.
//!
//! # Example
//!
//! ```
//! use phys_core::{Aabb, SpatialTree};
//! use phys_types::TreeSplit;
//! use nalgebra::{Point3, Vector3};
//!
//! let bounds: Vec<Aabb> = (0..100)
//!     .map(|i| Aabb::from_center(Point3::new(f64::from(i), 0.0, 0.0), Vector3::new(0.5, 0.1, 0.5)))
//!     .collect();
//! let tree = SpatialTree::build(&bounds, TreeSplit::Quad, 8, 0.0);
//!
//! // Whole leaves are returned; exact triangle tests are the caller's job.
//! let hits = tree.query(&Aabb::from_center(Point3::new(10.0, 0.0, 0.0), Vector3::new(0.2, 1.0, 0.2)));
//! assert!(hits.contains(&10));
//! assert!(hits.len() <= 16);
//! ```

use phys_types::TreeSplit;

use crate::aabb::Aabb;

/// Depth at which subdivision stops regardless of leaf size.
const MAX_DEPTH: usize = 16;

/// Contents of a tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNodeKind {
    /// Indices of child nodes in the node arena.
    Branch {
        /// Child node indices (only non-empty cells get a child).
        children: Vec<usize>,
    },
    /// Triangle ids stored in this leaf.
    Leaf {
        /// Triangle ids into the owning mesh.
        triangles: Vec<u32>,
    },
}

/// A node of the spatial tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    /// Bounds of every triangle below this node, padded vertically.
    pub bounds: Aabb,
    /// Branch or leaf payload.
    pub kind: TreeNodeKind,
}

/// Bounding volume hierarchy over the triangles of one mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialTree {
    /// Node arena; index 0 is the root.
    nodes: Vec<TreeNode>,
    split: TreeSplit,
    max_tris_per_leaf: usize,
    y_bias: f64,
}

impl Default for SpatialTree {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            split: TreeSplit::Quad,
            max_tris_per_leaf: 32,
            y_bias: 0.0,
        }
    }
}

impl SpatialTree {
    /// Build a tree over triangles given by their local-space bounds.
    ///
    /// Triangle ids are the positions in `triangle_bounds`.
    #[must_use]
    pub fn build(
        triangle_bounds: &[Aabb],
        split: TreeSplit,
        max_tris_per_leaf: usize,
        y_bias: f64,
    ) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            split,
            max_tris_per_leaf: max_tris_per_leaf.max(1),
            y_bias,
        };
        if triangle_bounds.is_empty() {
            return tree;
        }

        let ids: Vec<u32> = (0..triangle_bounds.len())
            .map(|i| u32::try_from(i).unwrap_or(u32::MAX))
            .collect();
        tree.build_recursive(triangle_bounds, ids, 0);
        tree
    }

    /// Rebuild in place with the same settings.
    pub fn rebuild(&mut self, triangle_bounds: &[Aabb]) {
        *self = Self::build(
            triangle_bounds,
            self.split,
            self.max_tris_per_leaf,
            self.y_bias,
        );
    }

    fn build_recursive(&mut self, triangle_bounds: &[Aabb], ids: Vec<u32>, depth: usize) -> usize {
        let bounds = ids
            .iter()
            .fold(Aabb::empty(), |acc, &id| acc.union(&triangle_bounds[id as usize]))
            .padded_y(self.y_bias);

        let node_idx = self.nodes.len();
        if ids.len() <= self.max_tris_per_leaf || depth >= MAX_DEPTH {
            self.nodes.push(TreeNode {
                bounds,
                kind: TreeNodeKind::Leaf { triangles: ids },
            });
            return node_idx;
        }

        // Bucket by centroid into the node's cells.
        let center = bounds.center();
        let mut cells: Vec<Vec<u32>> = vec![Vec::new(); self.split.arity()];
        for &id in &ids {
            let c = triangle_bounds[id as usize].center();
            let mut cell = usize::from(c.x >= center.x) | (usize::from(c.z >= center.z) << 1);
            if self.split == TreeSplit::Oct {
                cell |= usize::from(c.y >= center.y) << 2;
            }
            cells[cell].push(id);
        }

        // All centroids coincide; further splitting cannot separate them.
        if cells.iter().filter(|c| !c.is_empty()).count() <= 1 {
            self.nodes.push(TreeNode {
                bounds,
                kind: TreeNodeKind::Leaf { triangles: ids },
            });
            return node_idx;
        }

        self.nodes.push(TreeNode {
            bounds,
            kind: TreeNodeKind::Branch {
                children: Vec::new(),
            },
        });

        let children: Vec<usize> = cells
            .into_iter()
            .filter(|c| !c.is_empty())
            .map(|cell| self.build_recursive(triangle_bounds, cell, depth + 1))
            .collect();

        self.nodes[node_idx].kind = TreeNodeKind::Branch { children };
        node_idx
    }

    /// Grow the bounds of every node whose footprint touches `region` so
    /// that they again enclose their triangles. Bounds never shrink.
    ///
    /// Used after a height edit that stays within the root bounds, so the
    /// hierarchy itself does not have to be rebuilt.
    pub fn refit_region(&mut self, region: &Aabb, triangle_bounds: &[Aabb]) {
        if !self.nodes.is_empty() {
            self.refit_recursive(0, region, triangle_bounds);
        }
    }

    fn refit_recursive(&mut self, node_idx: usize, region: &Aabb, triangle_bounds: &[Aabb]) -> Aabb {
        if !self.nodes[node_idx].bounds.overlaps_xz(region) {
            return self.nodes[node_idx].bounds;
        }

        let grown = match &self.nodes[node_idx].kind {
            TreeNodeKind::Leaf { triangles } => triangles
                .iter()
                .filter_map(|&id| triangle_bounds.get(id as usize))
                .fold(Aabb::empty(), |acc, b| acc.union(b))
                .padded_y(self.y_bias),
            TreeNodeKind::Branch { children } => {
                let children = children.clone();
                children.into_iter().fold(Aabb::empty(), |acc, child| {
                    acc.union(&self.refit_recursive(child, region, triangle_bounds))
                })
            }
        };

        let node = &mut self.nodes[node_idx];
        node.bounds = node.bounds.union(&grown);
        node.bounds
    }

    /// Visit the id of every triangle in a leaf whose bounds overlap `query`.
    pub fn for_each_overlapping<F>(&self, query: &Aabb, mut visit: F)
    where
        F: FnMut(u32),
    {
        if self.nodes.is_empty() {
            return;
        }
        let mut stack = vec![0usize];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if !node.bounds.overlaps(query) {
                continue;
            }
            match &node.kind {
                TreeNodeKind::Branch { children } => stack.extend(children.iter().rev()),
                TreeNodeKind::Leaf { triangles } => triangles.iter().for_each(|&t| visit(t)),
            }
        }
    }

    /// Collect the ids of candidate triangles for a query volume.
    #[must_use]
    pub fn query(&self, query: &Aabb) -> Vec<u32> {
        let mut out = Vec::new();
        self.for_each_overlapping(query, |t| out.push(t));
        out
    }

    /// Bounds of the root node (empty for an empty tree).
    #[must_use]
    pub fn root_bounds(&self) -> Aabb {
        self.nodes.first().map_or_else(Aabb::empty, |n| n.bounds)
    }

    /// All nodes; index 0 is the root.
    #[must_use]
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Total number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of leaf nodes.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n.kind, TreeNodeKind::Leaf { .. }))
            .count()
    }

    /// Largest number of triangles held by one leaf.
    #[must_use]
    pub fn max_leaf_size(&self) -> usize {
        self.nodes
            .iter()
            .filter_map(|n| match &n.kind {
                TreeNodeKind::Leaf { triangles } => Some(triangles.len()),
                TreeNodeKind::Branch { .. } => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Subdivision scheme.
    #[must_use]
    pub fn split(&self) -> TreeSplit {
        self.split
    }

    /// Leaf capacity the tree was built with.
    #[must_use]
    pub fn max_tris_per_leaf(&self) -> usize {
        self.max_tris_per_leaf
    }

    /// Whether the tree holds no triangles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};

    fn grid_bounds(n: usize) -> Vec<Aabb> {
        let mut out = Vec::new();
        for z in 0..n {
            for x in 0..n {
                out.push(Aabb::new(
                    Point3::new(x as f64, 0.0, z as f64),
                    Point3::new(x as f64 + 1.0, 0.0, z as f64 + 1.0),
                ));
            }
        }
        out
    }

    #[test]
    fn test_leaves_respect_capacity() {
        let bounds = grid_bounds(16);
        let tree = SpatialTree::build(&bounds, TreeSplit::Quad, 4, 0.0);
        assert!(tree.max_leaf_size() <= 4);
        assert!(tree.leaf_count() >= 256 / 4);

        // Every triangle lives in exactly one leaf.
        let mut seen = vec![0u32; bounds.len()];
        for node in tree.nodes() {
            if let TreeNodeKind::Leaf { triangles } = &node.kind {
                for &t in triangles {
                    seen[t as usize] += 1;
                }
            }
        }
        assert!(seen.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_query_matches_brute_force() {
        let bounds = grid_bounds(12);
        for split in [TreeSplit::Quad, TreeSplit::Oct] {
            let tree = SpatialTree::build(&bounds, split, 3, 0.0);
            let query = Aabb::new(Point3::new(2.5, -1.0, 4.5), Point3::new(5.2, 1.0, 6.1));

            let mut hits = tree.query(&query);
            hits.sort_unstable();

            // Leaves may return extra candidates, never fewer.
            let expected: Vec<u32> = (0..bounds.len())
                .filter(|&i| bounds[i].overlaps(&query))
                .map(|i| i as u32)
                .collect();
            for id in &expected {
                assert!(hits.contains(id), "missing triangle {id}");
            }
        }
    }

    #[test]
    fn test_y_bias_pads_bounds() {
        let bounds = grid_bounds(2);
        let tree = SpatialTree::build(&bounds, TreeSplit::Quad, 1, 2.0);
        let root = tree.root_bounds();
        assert_eq!(root.min.y, -2.0);
        assert_eq!(root.max.y, 2.0);

        // A query hovering within the padding still reaches the leaves.
        let query = Aabb::from_center(Point3::new(0.5, 1.5, 0.5), Vector3::new(0.1, 0.1, 0.1));
        assert_eq!(tree.query(&query), vec![0]);
    }

    #[test]
    fn test_degenerate_centroids_terminate() {
        let same = vec![Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0)); 50];
        let tree = SpatialTree::build(&same, TreeSplit::Oct, 4, 0.0);
        assert_eq!(tree.leaf_count(), 1);
        assert_eq!(tree.max_leaf_size(), 50);
    }

    #[test]
    fn test_refit_region_grows_touched_nodes() {
        let mut bounds = grid_bounds(8);
        let mut tree = SpatialTree::build(&bounds, TreeSplit::Quad, 2, 0.0);

        bounds[0].max.y = 5.0;
        let region = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 1.0));
        tree.refit_region(&region, &bounds);

        assert_eq!(tree.root_bounds().max.y, 5.0);
        let query = Aabb::from_center(Point3::new(0.5, 4.0, 0.5), Vector3::new(0.1, 0.1, 0.1));
        assert!(tree.query(&query).contains(&0));
    }

    #[test]
    fn test_empty_tree() {
        let tree = SpatialTree::build(&[], TreeSplit::Quad, 4, 0.0);
        assert!(tree.is_empty());
        assert!(tree.root_bounds().is_empty());
        assert!(tree.query(&Aabb::default()).is_empty());
    }
}
