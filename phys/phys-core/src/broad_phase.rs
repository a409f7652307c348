//! Broad-phase pair generation.
//!
//! The broad phase only looks at world bounds. It reports every pair of
//! bodies whose AABBs overlap, then every body whose AABB overlaps the
//! terrain. Pair order is scan order and carries no other meaning.
//!
//! # Example
//!
//! ```
//! use phys_core::{Aabb, AllPairs, BroadPhase, PairTarget};
//! use nalgebra::{Point3, Vector3};
//!
//! let unit = Vector3::new(1.0, 1.0, 1.0);
//! let bounds = vec![
//!     (0, Aabb::from_center(Point3::new(0.0, 0.0, 0.0), unit)),
//!     (1, Aabb::from_center(Point3::new(1.5, 0.0, 0.0), unit)),
//!     (2, Aabb::from_center(Point3::new(9.0, 0.0, 0.0), unit)),
//! ];
//!
//! let pairs = AllPairs::new().find_pairs(&bounds, None);
//! assert_eq!(pairs.len(), 1);
//! assert_eq!(pairs[0].b, PairTarget::Body(1));
//! ```

use crate::aabb::Aabb;

/// The second member of a candidate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairTarget {
    /// Another body, by pool slot.
    Body(usize),
    /// The terrain.
    Terrain,
}

/// Two things whose bounds overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CandidatePair {
    /// Pool slot of the first body.
    pub a: usize,
    /// The other body or the terrain.
    pub b: PairTarget,
}

/// Trait for broad-phase algorithms.
pub trait BroadPhase {
    /// Find candidate pairs.
    ///
    /// `bounds` lists `(slot, world AABB)` for every live body in slot
    /// order; `terrain` is the terrain's world AABB, if one exists.
    fn find_pairs(&mut self, bounds: &[(usize, Aabb)], terrain: Option<&Aabb>)
        -> Vec<CandidatePair>;
}

/// Exhaustive O(n²) scan.
#[derive(Debug, Clone, Default)]
pub struct AllPairs {
    margin: f64,
}

impl AllPairs {
    /// Create an all-pairs broad phase.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grow every body AABB by `margin` before testing.
    #[must_use]
    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    fn padded(&self, aabb: &Aabb) -> Aabb {
        if self.margin > 0.0 {
            aabb.expanded(self.margin)
        } else {
            *aabb
        }
    }
}

impl BroadPhase for AllPairs {
    fn find_pairs(
        &mut self,
        bounds: &[(usize, Aabb)],
        terrain: Option<&Aabb>,
    ) -> Vec<CandidatePair> {
        let mut pairs = Vec::new();

        for (i, (slot_a, aabb_a)) in bounds.iter().enumerate() {
            let aabb_a = self.padded(aabb_a);
            for (slot_b, aabb_b) in &bounds[i + 1..] {
                if aabb_a.overlaps(&self.padded(aabb_b)) {
                    pairs.push(CandidatePair {
                        a: *slot_a,
                        b: PairTarget::Body(*slot_b),
                    });
                }
            }
        }

        if let Some(terrain) = terrain {
            for (slot, aabb) in bounds {
                if self.padded(aabb).overlaps(terrain) {
                    pairs.push(CandidatePair {
                        a: *slot,
                        b: PairTarget::Terrain,
                    });
                }
            }
        }

        pairs
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
    use nalgebra::{Point3, Vector3};

    fn cube_at(x: f64) -> Aabb {
        Aabb::from_center(Point3::new(x, 0.0, 0.0), Vector3::new(0.5, 0.5, 0.5))
    }

    #[test]
    fn test_separated_bodies_make_no_pairs() {
        let bounds: Vec<_> = (0..5).map(|i| (i, cube_at(i as f64 * 3.0))).collect();
        assert!(AllPairs::new().find_pairs(&bounds, None).is_empty());
    }

    #[test]
    fn test_margin_catches_near_misses() {
        let bounds = vec![(0, cube_at(0.0)), (1, cube_at(1.2))];
        assert!(AllPairs::new().find_pairs(&bounds, None).is_empty());
        assert_eq!(AllPairs::new().with_margin(0.2).find_pairs(&bounds, None).len(), 1);
    }

    #[test]
    fn test_pairs_keep_scan_order() {
        let bounds = vec![(3, cube_at(0.0)), (7, cube_at(0.5)), (9, cube_at(0.9))];
        let ground = Aabb::new(Point3::new(-10.0, -1.0, -10.0), Point3::new(10.0, 0.0, 10.0));
        let pairs = AllPairs::new().find_pairs(&bounds, Some(&ground));
        let expected = vec![
            CandidatePair { a: 3, b: PairTarget::Body(7) },
            CandidatePair { a: 3, b: PairTarget::Body(9) },
            CandidatePair { a: 7, b: PairTarget::Body(9) },
            CandidatePair { a: 3, b: PairTarget::Terrain },
            CandidatePair { a: 7, b: PairTarget::Terrain },
            CandidatePair { a: 9, b: PairTarget::Terrain },
        ];
        assert_eq!(pairs, expected);
    }
}
