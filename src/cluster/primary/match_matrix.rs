//! Growth-based primary clusters over the ordered match matrix.
//!
//! Lay the leaves out in display order and mark cell (p, q) when either leaf
//! lists the other. Related matches form dense blocks on the diagonal:
//!
//! ```text
//!     0 1 2 3 4 5
//! 0   ■ ■ ■ · · ·
//! 1   ■ ■ ■ · · ·
//! 2   ■ ■ ■ ■ · ·
//! 3   · · ■ ■ ■ ■
//! 4   · · · ■ ■ ■
//! 5   · · · ■ ■ ■
//! ```
//!
//! From each seed a block grows one row/column at a time, right then left,
//! while the new far corner is marked and the new row is at least `min_fill`
//! full. Consecutive blocks that overlap are merged when the union is still
//! dense. Unlike the half-match strategy a match may land in several
//! clusters.

use std::collections::HashSet;

use super::{ClusterAssignment, ClusterRange, OrderedLeaves, PrimaryClusterFinder};
use crate::error::{Error, Result};
use crate::hierarchy::{Forest, NodeId};

/// Grows dense diagonal blocks in the ordered match matrix.
#[derive(Debug, Clone)]
pub struct MatchMatrixFinder {
    min_cluster_size: usize,
    min_fill: f64,
}

impl MatchMatrixFinder {
    /// Create a finder. `min_fill` is the fraction of a new row that must be
    /// marked for the row to join a block.
    pub fn new(min_cluster_size: usize, min_fill: f64) -> Result<Self> {
        if !(min_fill > 0.0 && min_fill <= 1.0) {
            return Err(Error::InvalidParameter {
                name: "min_fill",
                message: "must be in (0, 1]",
            });
        }
        Ok(Self {
            min_cluster_size,
            min_fill,
        })
    }

    /// Cluster ranges over the leaves under `root`, sorted by position.
    pub fn clusters(
        &self,
        forest: &Forest,
        root: NodeId,
        non_distant: &HashSet<usize>,
        immediate_family: &HashSet<usize>,
    ) -> Result<Vec<ClusterRange>> {
        let _ = forest.node(root)?;
        let leaves = OrderedLeaves::new(forest, root);
        let grid = Grid {
            leaves: &leaves,
            family: (0..leaves.len())
                .map(|p| immediate_family.contains(&leaves.indexes[p]))
                .collect(),
        };

        let mut blocks = Vec::new();
        let mut seed = 0;
        while seed < leaves.len() {
            if !non_distant.contains(&leaves.indexes[seed]) {
                seed += 1;
                continue;
            }
            let block = self.grow(&grid, seed);
            if block.len() >= self.min_cluster_size {
                blocks.push(block);
                seed = block.end + 1;
            } else {
                seed += 1;
            }
        }

        Ok(self.merge_overlapping(&grid, blocks))
    }

    fn grow(&self, grid: &Grid<'_, '_>, seed: usize) -> ClusterRange {
        let n = grid.leaves.len();
        let mut block = ClusterRange::new(seed, seed);
        loop {
            let mut grew = false;
            if block.end + 1 < n && self.accepts(grid, block, block.end + 1, block.start) {
                block.end += 1;
                grew = true;
            }
            if block.start > 0 && self.accepts(grid, block, block.start - 1, block.end) {
                block.start -= 1;
                grew = true;
            }
            if !grew {
                return block;
            }
        }
    }

    /// Whether `candidate` may join `block`, whose far corner is `corner`.
    fn accepts(&self, grid: &Grid<'_, '_>, block: ClusterRange, candidate: usize, corner: usize) -> bool {
        if grid.family[candidate] && (block.start..=block.end).any(|q| grid.leaves.shares(candidate, q)) {
            return true;
        }
        if !grid.leaves.shares(candidate, corner) {
            return false;
        }
        let marked = (block.start..=block.end)
            .filter(|&q| grid.leaves.shares(candidate, q))
            .count();
        marked as f64 >= self.min_fill * block.len() as f64
    }

    fn merge_overlapping(&self, grid: &Grid<'_, '_>, mut blocks: Vec<ClusterRange>) -> Vec<ClusterRange> {
        blocks.sort_unstable();
        let mut merged: Vec<ClusterRange> = Vec::with_capacity(blocks.len());
        for block in blocks {
            match merged.last_mut() {
                Some(last) if last.overlaps(&block) && grid.density(last.union(&block)) >= self.min_fill => {
                    *last = last.union(&block);
                }
                _ => merged.push(block),
            }
        }
        merged
    }
}

impl PrimaryClusterFinder for MatchMatrixFinder {
    fn find(
        &self,
        forest: &Forest,
        root: NodeId,
        non_distant: &HashSet<usize>,
        immediate_family: &HashSet<usize>,
    ) -> Result<ClusterAssignment> {
        let ranges = self
            .clusters(forest, root, non_distant, immediate_family)?
            .into_iter()
            .map(|range| (range, None))
            .collect();
        Ok(ClusterAssignment::from_ranges(&forest.ordered_indexes(root), ranges))
    }
}

struct Grid<'l, 'f> {
    leaves: &'l OrderedLeaves<'f>,
    family: Vec<bool>,
}

impl Grid<'_, '_> {
    /// Fraction of marked pairs inside a block.
    fn density(&self, block: ClusterRange) -> f64 {
        let m = block.len();
        if m < 2 {
            return 1.0;
        }
        let mut marked = 0usize;
        for p in block.start..=block.end {
            for q in p + 1..=block.end {
                if self.leaves.shares(p, q) {
                    marked += 1;
                }
            }
        }
        marked as f64 / (m * (m - 1) / 2) as f64
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::distance::OverlapWeightedEuclidean;
    use crate::matches::{ClusterableMatch, Match};
    use crate::matrix::SparseCoords;
    use std::sync::Arc;

    /// A chain of forced merges, so display order is 0..n.
    fn chain(lists: &[&[usize]]) -> (Forest, NodeId) {
        let mut f = Forest::new();
        let ids: Vec<NodeId> = lists
            .iter()
            .enumerate()
            .map(|(i, list)| {
                let m = Arc::new(Match::new(format!("m{i}"), format!("M{i}"), 40.0));
                let cm = Arc::new(ClusterableMatch::new(i, m, list.iter().copied()));
                let sparse = SparseCoords::from_pairs(cm.coords.iter().map(|&c| (c, 1.0)));
                f.add_leaf(cm, Arc::new(sparse))
            })
            .collect();
        let mut root = ids[0];
        for &id in &ids[1..] {
            root = f.merge(root, id, f64::INFINITY, &OverlapWeightedEuclidean);
        }
        (f, root)
    }

    fn all(n: usize) -> HashSet<usize> {
        (0..n).collect()
    }

    #[test]
    fn finds_two_blocks() {
        let (f, root) = chain(&[&[1, 2], &[0, 2], &[0, 1], &[4, 5], &[3, 5], &[3, 4]]);
        let finder = MatchMatrixFinder::new(3, 0.5).unwrap();
        let ranges = finder.clusters(&f, root, &all(6), &HashSet::new()).unwrap();
        assert_eq!(ranges, vec![ClusterRange::new(0, 2), ClusterRange::new(3, 5)]);
    }

    #[test]
    fn overlapping_blocks_can_share_a_match() {
        // Leaf 2 bridges {0,1,2} and {2,3,4}.
        let (f, root) = chain(&[&[1, 2], &[0, 2], &[0, 1, 3, 4], &[2, 4], &[2, 3]]);
        let finder = MatchMatrixFinder::new(3, 0.9).unwrap();
        let assignment = finder.find(&f, root, &all(5), &HashSet::new()).unwrap();
        assert_eq!(assignment.ranges(), vec![(0, 2), (2, 4)]);
        assert_eq!(assignment.clusters_of(2), &[1, 2]);
        assert!(assignment.clusters().iter().all(|c| c.range.len() >= 3));
    }

    #[test]
    fn distant_matches_do_not_seed() {
        let (f, root) = chain(&[&[1, 2], &[0, 2], &[0, 1]]);
        let finder = MatchMatrixFinder::new(3, 0.5).unwrap();
        let ranges = finder.clusters(&f, root, &HashSet::new(), &HashSet::new()).unwrap();
        assert!(ranges.is_empty());
    }

    #[test]
    fn immediate_family_joins_without_the_corner() {
        // Leaf 3 lists only leaf 2, so the far corner (0, 3) is empty.
        let (f, root) = chain(&[&[1, 2], &[0, 2], &[0, 1, 3], &[2]]);
        let finder = MatchMatrixFinder::new(3, 0.5).unwrap();
        let plain = finder.clusters(&f, root, &all(4), &HashSet::new()).unwrap();
        let family: HashSet<usize> = [3].into_iter().collect();
        let forced = finder.clusters(&f, root, &all(4), &family).unwrap();
        assert_eq!(plain, vec![ClusterRange::new(0, 2)]);
        assert_eq!(forced, vec![ClusterRange::new(0, 3)]);
    }

    #[test]
    fn rejects_bad_fill() {
        assert!(MatchMatrixFinder::new(3, 0.0).is_err());
        assert!(MatchMatrixFinder::new(3, 1.5).is_err());
    }
}
