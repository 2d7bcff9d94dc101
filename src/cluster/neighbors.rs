//! Bounded nearest-neighbor caches.
//!
//! Comparing every leaf with every other leaf is O(N²). Instead each leaf is
//! filed under its significant coordinates, and a leaf only looks at leaves
//! that share a bucket with it. Two further restrictions keep the caches
//! small:
//!
//! - a leaf only records neighbors with a *lower* match index, so each pair
//!   is computed once;
//! - at most `max_neighbors` entries are kept, selected with [`lowest_n`].
//!
//! Infinite distances are never cached.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::distance::DistanceMetric;
use crate::hierarchy::{Forest, Neighbor, NodeId};
use crate::matrix::SparseCoords;

/// The `n` smallest items under `cmp`, sorted ascending.
///
/// Uses a partial selection, so only the kept prefix is fully sorted.
pub fn lowest_n<T, F>(mut items: Vec<T>, n: usize, cmp: F) -> Vec<T>
where
    F: Fn(&T, &T) -> Ordering,
{
    if n == 0 {
        items.clear();
        return items;
    }
    if items.len() > n {
        let _ = items.select_nth_unstable_by(n - 1, &cmp);
        items.truncate(n);
    }
    items.sort_by(&cmp);
    items
}

#[derive(Debug, Clone)]
struct LeafView {
    index: usize,
    coords: Arc<SparseCoords>,
}

/// Snapshot of the leaves taking part in one build, with their buckets.
///
/// Holds its own copy of the leaf data so caches can be filled in parallel
/// while the forest is borrowed mutably.
pub(crate) struct NeighborIndex<'a, M: ?Sized> {
    metric: &'a M,
    max_neighbors: usize,
    leaves: HashMap<NodeId, LeafView>,
    buckets: HashMap<usize, Vec<NodeId>>,
}

impl<'a, M> NeighborIndex<'a, M>
where
    M: DistanceMetric + ?Sized,
{
    /// Index the given leaves of `forest`. Non-leaf ids are ignored.
    pub(crate) fn new(forest: &Forest, leaves: &[NodeId], metric: &'a M, max_neighbors: usize) -> Self {
        let mut views = HashMap::with_capacity(leaves.len());
        let mut buckets: HashMap<usize, Vec<NodeId>> = HashMap::new();

        for &id in leaves {
            let Some(leaf) = forest.get(id).and_then(|n| n.as_leaf()) else {
                continue;
            };
            for key in metric.significant_coordinates(&leaf.coords) {
                buckets.entry(key).or_default().push(id);
            }
            let _ = views.insert(
                id,
                LeafView {
                    index: leaf.matched.index,
                    coords: Arc::clone(&leaf.coords),
                },
            );
        }

        Self {
            metric,
            max_neighbors,
            leaves: views,
            buckets,
        }
    }

    /// Match index of an indexed leaf.
    pub(crate) fn match_index(&self, leaf: NodeId) -> Option<usize> {
        self.leaves.get(&leaf).map(|v| v.index)
    }

    /// Closest lower-index leaves sharing a bucket with `leaf`, ascending.
    pub(crate) fn neighbors_by_distance(&self, leaf: NodeId) -> Vec<Neighbor> {
        let Some(view) = self.leaves.get(&leaf) else {
            return Vec::new();
        };

        let mut candidates: Vec<NodeId> = self
            .metric
            .significant_coordinates(&view.coords)
            .into_iter()
            .filter_map(|key| self.buckets.get(&key))
            .flatten()
            .copied()
            .collect();
        candidates.sort_unstable();
        candidates.dedup();

        self.closest(view, candidates)
    }

    /// Closest lower-index leaves among `candidates`, ascending.
    ///
    /// Used when a cache runs dry and must be rebuilt without the buckets.
    pub(crate) fn neighbors_among<I>(&self, leaf: NodeId, candidates: I) -> Vec<Neighbor>
    where
        I: IntoIterator<Item = NodeId>,
    {
        match self.leaves.get(&leaf) {
            Some(view) => self.closest(view, candidates),
            None => Vec::new(),
        }
    }

    fn closest<I>(&self, view: &LeafView, candidates: I) -> Vec<Neighbor>
    where
        I: IntoIterator<Item = NodeId>,
    {
        let found: Vec<Neighbor> = candidates
            .into_iter()
            .filter_map(|id| {
                let other = self.leaves.get(&id)?;
                if other.index >= view.index {
                    return None;
                }
                let distance = self.metric.calculate(&view.coords, &other.coords);
                distance
                    .is_finite()
                    .then(|| Neighbor::new(id, other.index, distance))
            })
            .collect();
        lowest_n(found, self.max_neighbors, Neighbor::by_distance)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::distance::OverlapWeightedEuclidean;
    use crate::matches::{ClusterableMatch, Match};
    use proptest::prelude::*;

    fn build(rows: &[&[(usize, f64)]]) -> (Forest, Vec<NodeId>) {
        let mut forest = Forest::new();
        let ids = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let m = Arc::new(Match::new(format!("m{i}"), format!("M{i}"), 40.0));
                let cm = Arc::new(ClusterableMatch::new(i, m, row.iter().map(|(k, _)| *k)));
                forest.add_leaf(cm, Arc::new(SparseCoords::from_pairs(row.iter().copied())))
            })
            .collect();
        (forest, ids)
    }

    #[test]
    fn lowest_n_keeps_smallest_sorted() {
        let picked = lowest_n(vec![5, 1, 9, 3, 7, 2], 3, |a: &i32, b: &i32| a.cmp(b));
        assert_eq!(picked, vec![1, 2, 3]);
        assert_eq!(lowest_n(vec![2, 1], 5, |a: &i32, b: &i32| a.cmp(b)), vec![1, 2]);
        assert!(lowest_n(vec![2, 1], 0, |a: &i32, b: &i32| a.cmp(b)).is_empty());
    }

    #[test]
    fn neighbors_are_lower_index_and_finite() {
        let (forest, ids) = build(&[
            &[(0, 1.0), (1, 1.0)],
            &[(0, 1.0), (1, 1.0)],
            &[(2, 1.0)],
            &[(1, 1.0), (3, 1.0)],
        ]);
        let index = NeighborIndex::new(&forest, &ids, &OverlapWeightedEuclidean, 25);

        assert!(index.neighbors_by_distance(ids[0]).is_empty());
        let n1 = index.neighbors_by_distance(ids[1]);
        assert_eq!(n1.len(), 1);
        assert_eq!(n1[0].index, 0);
        assert_eq!(n1[0].distance, 0.0);
        // Leaf 2 shares no coordinate with a lower leaf.
        assert!(index.neighbors_by_distance(ids[2]).is_empty());
        let n3: Vec<usize> = index.neighbors_by_distance(ids[3]).iter().map(|n| n.index).collect();
        assert_eq!(n3, vec![0, 1]);
    }

    #[test]
    fn cache_is_capped() {
        let rows: Vec<Vec<(usize, f64)>> = (0..10).map(|i| vec![(0, 1.0), (i, 1.0)]).collect();
        let refs: Vec<&[(usize, f64)]> = rows.iter().map(Vec::as_slice).collect();
        let (forest, ids) = build(&refs);
        let index = NeighborIndex::new(&forest, &ids, &OverlapWeightedEuclidean, 3);
        let n = index.neighbors_by_distance(ids[9]);
        assert_eq!(n.len(), 3);
        assert!(n.windows(2).all(|w| Neighbor::by_distance(&w[0], &w[1]).is_le()));
    }

    proptest! {
        #[test]
        fn buckets_match_brute_force(
            rows in proptest::collection::vec(
                proptest::collection::vec((0usize..12, 0.1f64..1.0), 1..6),
                1..15,
            )
        ) {
            let refs: Vec<&[(usize, f64)]> = rows.iter().map(Vec::as_slice).collect();
            let (forest, ids) = build(&refs);
            let metric = OverlapWeightedEuclidean;
            let index = NeighborIndex::new(&forest, &ids, &metric, usize::MAX);
            for &id in &ids {
                let bucketed = index.neighbors_by_distance(id);
                let brute = index.neighbors_among(id, ids.iter().copied());
                prop_assert_eq!(bucketed, brute);
            }
        }
    }
}
