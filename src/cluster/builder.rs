//! Agglomerative cluster builder.
//!
//! Repeatedly merges the globally closest pair of top-level nodes, where the
//! distance between two nodes is the distance between their closest pair of
//! *boundary* leaves. Only boundary leaves can end up adjacent in the
//! display order, so only they keep neighbor caches.
//!
//! # Iteration
//!
//! ```text
//! 1. scan the head of every boundary leaf's cache     O(frontier)
//! 2. merge the two owners of the best pair
//! 3. drop interior and same-owner entries from caches (parallel)
//! 4. rebuild any cache that ran dry
//! ```
//!
//! When no finite pair is left the frontier has split into groups with no
//! signal between them. Nodes whose leaves reference nothing outside
//! themselves are *isolated* and set aside; the rest are force-merged at
//! infinite distance, most shared coordinates first. Isolated nodes are
//! joined onto the main tree at the end, largest first.
//!
//! # Tie-breaks
//!
//! Equal distances resolve by the lower match index of the leaf owning the
//! cache, then by the lower match index of the neighbor. Together with the
//! ordered frontier this makes a build fully deterministic.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

use log::{debug, info, trace};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::neighbors::NeighborIndex;
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::hierarchy::{Dendrogram, Forest, Neighbor, Node, NodeId};
use crate::progress::{NoProgress, Progress, ProgressEvent};

/// Default number of cached neighbors per leaf.
pub const DEFAULT_MAX_NEIGHBORS: usize = 25;

/// Result of a build.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// Top-level nodes after the build: one root, or none for empty input.
    pub roots: Vec<NodeId>,
    /// Every merge performed, in order.
    pub dendrogram: Dendrogram,
}

impl BuildOutcome {
    /// The single root, if any leaves were clustered.
    pub fn root(&self) -> Option<NodeId> {
        self.roots.first().copied()
    }
}

/// Agglomerative builder over the leaves of a [`Forest`].
pub struct ClusterBuilder<'a, M: ?Sized> {
    metric: &'a M,
    max_neighbors: usize,
    progress: &'a dyn Progress,
}

impl<'a, M> ClusterBuilder<'a, M>
where
    M: DistanceMetric + ?Sized,
{
    /// Create a builder using `metric`.
    pub fn new(metric: &'a M) -> Self {
        Self {
            metric,
            max_neighbors: DEFAULT_MAX_NEIGHBORS,
            progress: &NoProgress,
        }
    }

    /// Set the neighbor cache size per leaf.
    pub fn with_max_neighbors(mut self, max: usize) -> Self {
        self.max_neighbors = max;
        self
    }

    /// Report merges to `progress`.
    pub fn with_progress(mut self, progress: &'a dyn Progress) -> Self {
        self.progress = progress;
        self
    }

    /// Merge `leaves` into a single tree.
    ///
    /// Every id must be a top-level leaf of `forest`. Empty input produces an
    /// empty outcome.
    pub fn build(&self, forest: &mut Forest, leaves: &[NodeId]) -> Result<BuildOutcome> {
        let mut dendrogram = Dendrogram::new(leaves.len());
        if leaves.is_empty() {
            return Ok(BuildOutcome {
                roots: Vec::new(),
                dendrogram,
            });
        }
        if self.max_neighbors == 0 {
            return Err(Error::InvalidParameter {
                name: "max_neighbors",
                message: "must be at least 1",
            });
        }
        for &leaf in leaves {
            let node = forest.node(leaf)?;
            if !node.is_leaf() || node.parent().is_some() {
                return Err(Error::InvalidParameter {
                    name: "leaves",
                    message: "every entry must be a top-level leaf",
                });
            }
        }

        self.progress.report(ProgressEvent::Describe {
            description: "Clustering".to_string(),
            maximum: leaves.len().saturating_sub(1),
        });

        let index = NeighborIndex::new(forest, leaves, self.metric, self.max_neighbors);
        let mut state = BuildState::new(forest, leaves, &index);
        self.seed_caches(forest, &index, &state.owner);
        debug!("clustering {} leaves", leaves.len());

        while state.frontier.len() > 1 {
            if let Some((first, second, distance)) = state.best_pair(forest, &index) {
                let merged = self.join(forest, first, second, distance, &mut dendrogram);
                self.absorb(forest, &index, &mut state, first, second, merged);
                if dendrogram.n_merges() % 1000 == 0 {
                    debug!(
                        "{} merges done, {} top-level nodes remain",
                        dendrogram.n_merges(),
                        state.frontier.len()
                    );
                }
                continue;
            }

            state.set_aside_isolated(forest);
            if state.frontier.len() < 2 {
                break;
            }
            let Some((first, second)) = state.forced_pair(forest) else {
                break;
            };
            let merged = self.join(forest, first, second, f64::INFINITY, &mut dendrogram);
            self.absorb(forest, &index, &mut state, first, second, merged);
        }

        let root = self.join_isolated(forest, &mut state, &mut dendrogram);
        for &leaf in leaves {
            forest.at_mut(leaf).neighbors = Vec::new();
        }

        debug!(
            "built tree over {} leaves with {} merges ({} forced)",
            leaves.len(),
            dendrogram.n_merges(),
            dendrogram.n_forced()
        );

        Ok(BuildOutcome {
            roots: root.into_iter().collect(),
            dendrogram,
        })
    }

    fn seed_caches(&self, forest: &mut Forest, index: &NeighborIndex<'_, M>, owner: &HashMap<NodeId, NodeId>) {
        let fill = |node: &mut Node| {
            if owner.contains_key(&node.id) {
                node.neighbors = index.neighbors_by_distance(node.id);
            }
        };

        #[cfg(feature = "parallel")]
        forest.nodes_mut().par_iter_mut().for_each(fill);
        #[cfg(not(feature = "parallel"))]
        forest.nodes_mut().iter_mut().for_each(fill);
    }

    fn join(
        &self,
        forest: &mut Forest,
        first: NodeId,
        second: NodeId,
        distance: f64,
        dendrogram: &mut Dendrogram,
    ) -> NodeId {
        let merged = forest.merge(first, second, distance, self.metric);
        let size = forest.at(merged).num_children();
        if distance.is_infinite() {
            debug!("forced merge of {first} and {second} ({size} leaves)");
        } else {
            trace!("merged {first} and {second} at {distance:.4} ({size} leaves)");
        }
        dendrogram.add_merge(first, second, merged, distance, size);
        self.progress.report(ProgressEvent::Increment(1));
        merged
    }

    /// Update ownership and caches after `first` and `second` became `merged`.
    fn absorb(
        &self,
        forest: &mut Forest,
        index: &NeighborIndex<'_, M>,
        state: &mut BuildState,
        first: NodeId,
        second: NodeId,
        merged: NodeId,
    ) {
        let _ = state.frontier.remove(&first);
        let _ = state.frontier.remove(&second);
        let _ = state.frontier.insert(merged);
        state.combine_reach(first, second, merged);

        let boundary = [forest.at(merged).first_leaf(), forest.at(merged).second_leaf()];
        for part in [first, second] {
            for leaf in [forest.at(part).first_leaf(), forest.at(part).second_leaf()] {
                if !boundary.contains(&leaf) {
                    let _ = state.owner.remove(&leaf);
                    forest.at_mut(leaf).neighbors = Vec::new();
                }
            }
        }
        for leaf in boundary {
            let _ = state.owner.insert(leaf, merged);
        }

        let owner = &state.owner;
        let prune = |node: &mut Node| -> Option<NodeId> {
            let own = *owner.get(&node.id)?;
            if node.neighbors.is_empty() {
                return None;
            }
            node.neighbors
                .retain(|n| owner.get(&n.node).is_some_and(|&o| o != own));
            node.neighbors.is_empty().then_some(node.id)
        };

        #[cfg(feature = "parallel")]
        let mut emptied: Vec<NodeId> = forest.nodes_mut().par_iter_mut().filter_map(prune).collect();
        #[cfg(not(feature = "parallel"))]
        let mut emptied: Vec<NodeId> = forest.nodes_mut().iter_mut().filter_map(prune).collect();

        if emptied.is_empty() {
            return;
        }
        emptied.sort_unstable();

        let rebuild = |&leaf: &NodeId| -> (NodeId, Vec<Neighbor>) {
            let Some(&own) = owner.get(&leaf) else {
                return (leaf, Vec::new());
            };
            let candidates = owner
                .iter()
                .filter(|&(_, o)| *o != own)
                .map(|(l, _)| *l);
            (leaf, index.neighbors_among(leaf, candidates))
        };

        #[cfg(feature = "parallel")]
        let rebuilt: Vec<(NodeId, Vec<Neighbor>)> = emptied.par_iter().map(rebuild).collect();
        #[cfg(not(feature = "parallel"))]
        let rebuilt: Vec<(NodeId, Vec<Neighbor>)> = emptied.iter().map(rebuild).collect();

        trace!("rebuilt {} exhausted neighbor caches", rebuilt.len());
        for (leaf, neighbors) in rebuilt {
            forest.at_mut(leaf).neighbors = neighbors;
        }
    }

    /// Attach isolated nodes to the main tree, largest first.
    fn join_isolated(
        &self,
        forest: &mut Forest,
        state: &mut BuildState,
        dendrogram: &mut Dendrogram,
    ) -> Option<NodeId> {
        let mut isolated = std::mem::take(&mut state.isolated);
        isolated.sort_by(|&a, &b| {
            forest
                .at(b)
                .num_children()
                .cmp(&forest.at(a).num_children())
                .then_with(|| first_index(forest, a).cmp(&first_index(forest, b)))
        });

        let mut rest = isolated.into_iter();
        let mut main = match state.frontier.iter().next().copied() {
            Some(main) => main,
            None => rest.next()?,
        };
        for node in rest {
            main = self.join(forest, main, node, f64::INFINITY, dendrogram);
        }
        Some(main)
    }
}

fn first_index(forest: &Forest, node: NodeId) -> usize {
    forest
        .match_index(forest.at(node).first_leaf())
        .unwrap_or(usize::MAX)
}

/// Match indexes under a top-level node, and the coordinates of the build
/// its leaves reference.
#[derive(Debug, Default)]
struct Reach {
    own: HashSet<usize>,
    referenced: HashSet<usize>,
}

impl Reach {
    /// Everything referenced lies within the node itself.
    fn is_isolated(&self) -> bool {
        self.referenced.is_subset(&self.own)
    }

    fn union(self, other: Reach) -> Reach {
        let (mut big, small) = if self.referenced.len() >= other.referenced.len() {
            (self, other)
        } else {
            (other, self)
        };
        big.own.extend(small.own);
        big.referenced.extend(small.referenced);
        big
    }
}

/// Mutable state of one build.
struct BuildState {
    /// Boundary leaf → its top-level node. Leaves of isolated nodes are removed.
    owner: HashMap<NodeId, NodeId>,
    /// Top-level nodes still taking part in merging.
    frontier: BTreeSet<NodeId>,
    /// Top-level nodes set aside as isolated.
    isolated: Vec<NodeId>,
    /// Reach of every frontier node, unioned as nodes merge.
    reach: HashMap<NodeId, Reach>,
}

impl BuildState {
    fn new<M: DistanceMetric + ?Sized>(
        forest: &Forest,
        leaves: &[NodeId],
        index: &NeighborIndex<'_, M>,
    ) -> Self {
        let active: HashSet<usize> = leaves.iter().filter_map(|&l| index.match_index(l)).collect();
        let reach = leaves
            .iter()
            .map(|&leaf| {
                let reach = Reach {
                    own: index.match_index(leaf).into_iter().collect(),
                    referenced: forest
                        .leaf_coords(leaf)
                        .into_iter()
                        .flat_map(|coords| coords.keys())
                        .filter(|k| active.contains(k))
                        .collect(),
                };
                (leaf, reach)
            })
            .collect();
        Self {
            owner: leaves.iter().map(|&l| (l, l)).collect(),
            frontier: leaves.iter().copied().collect(),
            isolated: Vec::new(),
            reach,
        }
    }

    /// Carry the reach of `first` and `second` over to `merged`.
    fn combine_reach(&mut self, first: NodeId, second: NodeId, merged: NodeId) {
        let a = self.reach.remove(&first).unwrap_or_default();
        let b = self.reach.remove(&second).unwrap_or_default();
        let _ = self.reach.insert(merged, a.union(b));
    }

    /// The closest cached pair across the frontier, as (lower-index owner,
    /// higher-index owner, distance).
    fn best_pair<M: DistanceMetric + ?Sized>(
        &self,
        forest: &Forest,
        index: &NeighborIndex<'_, M>,
    ) -> Option<(NodeId, NodeId, f64)> {
        let mut best: Option<(Neighbor, usize, NodeId)> = None;

        for &top in &self.frontier {
            let node = forest.at(top);
            let mut boundary = vec![node.first_leaf()];
            if node.second_leaf() != node.first_leaf() {
                boundary.push(node.second_leaf());
            }
            for leaf in boundary {
                let Some(head) = forest.at(leaf).neighbors().first() else {
                    continue;
                };
                let own_index = index.match_index(leaf).unwrap_or(usize::MAX);
                let better = match &best {
                    None => true,
                    Some((current, current_index, _)) => {
                        match head.distance.total_cmp(&current.distance) {
                            Ordering::Less => true,
                            Ordering::Greater => false,
                            Ordering::Equal => (own_index, head.index) < (*current_index, current.index),
                        }
                    }
                };
                if better {
                    best = Some((*head, own_index, top));
                }
            }
        }

        let (head, _, top) = best?;
        let other = *self.owner.get(&head.node)?;
        Some((other, top, head.distance))
    }

    /// Move isolated nodes out of the frontier.
    ///
    /// A node is isolated when every coordinate its leaves reference, among
    /// the leaves of this build, lies within its own leaves.
    fn set_aside_isolated(&mut self, forest: &Forest) {
        let isolated: Vec<NodeId> = self
            .frontier
            .iter()
            .copied()
            .filter(|top| self.reach.get(top).is_some_and(Reach::is_isolated))
            .collect();

        if isolated.is_empty() {
            return;
        }
        let leaves: usize = isolated.iter().map(|&n| forest.at(n).num_children()).sum();
        info!(
            "set aside {} isolated groups ({} leaves), {} groups remain",
            isolated.len(),
            leaves,
            self.frontier.len() - isolated.len()
        );

        for &top in &isolated {
            let _ = self.frontier.remove(&top);
            let _ = self.reach.remove(&top);
            let _ = self.owner.remove(&forest.at(top).first_leaf());
            let _ = self.owner.remove(&forest.at(top).second_leaf());
        }
        self.isolated.extend(isolated);
    }

    /// The pair of frontier nodes sharing the most referenced coordinates.
    ///
    /// Ties go to the smaller combined size, then to the pair that comes
    /// first by first-leaf match index.
    fn forced_pair(&self, forest: &Forest) -> Option<(NodeId, NodeId)> {
        let mut tops: Vec<(usize, NodeId, &HashSet<usize>, usize)> = self
            .frontier
            .iter()
            .filter_map(|&top| {
                let reach = self.reach.get(&top)?;
                Some((
                    first_index(forest, top),
                    top,
                    &reach.referenced,
                    forest.at(top).num_children(),
                ))
            })
            .collect();
        tops.sort_by_key(|(first, ..)| *first);

        let mut best: Option<(usize, usize, NodeId, NodeId)> = None;
        for (i, (_, a, keys_a, size_a)) in tops.iter().enumerate() {
            for (_, b, keys_b, size_b) in &tops[i + 1..] {
                let shared = keys_a.intersection(*keys_b).count();
                let size = size_a + size_b;
                let better = match best {
                    None => true,
                    Some((best_shared, best_size, ..)) => {
                        shared > best_shared || (shared == best_shared && size < best_size)
                    }
                };
                if better {
                    best = Some((shared, size, *a, *b));
                }
            }
        }
        best.map(|(.., a, b)| (a, b))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, unused_results)]
mod tests {
    use super::*;
    use crate::distance::OverlapWeightedEuclidean;
    use crate::hierarchy::HealthCheck;
    use crate::matches::{ClusterableMatch, Match};
    use crate::matrix::SparseCoords;
    use std::sync::Arc;
    use std::sync::Mutex;

    fn leaves(forest: &mut Forest, rows: &[&[(usize, f64)]]) -> Vec<NodeId> {
        rows.iter()
            .enumerate()
            .map(|(i, row)| {
                let m = Arc::new(Match::new(format!("m{i}"), format!("M{i}"), 100.0 - i as f64));
                let cm = Arc::new(ClusterableMatch::new(i, m, row.iter().map(|(k, _)| *k)));
                forest.add_leaf(cm, Arc::new(SparseCoords::from_pairs(row.iter().copied())))
            })
            .collect()
    }

    #[test]
    fn empty_input_builds_nothing() {
        let mut forest = Forest::new();
        let out = ClusterBuilder::new(&OverlapWeightedEuclidean)
            .build(&mut forest, &[])
            .unwrap();
        assert!(out.roots.is_empty());
        assert_eq!(out.dendrogram.n_merges(), 0);
    }

    #[test]
    fn single_leaf_is_its_own_root() {
        let mut forest = Forest::new();
        let ids = leaves(&mut forest, &[&[(0, 1.0)]]);
        let out = ClusterBuilder::new(&OverlapWeightedEuclidean)
            .build(&mut forest, &ids)
            .unwrap();
        assert_eq!(out.roots, ids);
    }

    #[test]
    fn trivial_pair_merges_once() {
        let mut forest = Forest::new();
        let ids = leaves(&mut forest, &[&[(0, 1.0), (1, 1.0)], &[(0, 1.0), (1, 1.0)]]);
        let out = ClusterBuilder::new(&OverlapWeightedEuclidean)
            .build(&mut forest, &ids)
            .unwrap();

        let root = out.root().unwrap();
        assert_eq!(out.dendrogram.n_merges(), 1);
        assert_eq!(forest.at(root).num_children(), 2);
        assert_eq!(forest.ordered_leaves(root), ids);
        assert_eq!(forest.at(root).distance(), Some(0.0));
    }

    #[test]
    fn isolated_pairs_are_joined_at_infinity() {
        let mut forest = Forest::new();
        let ids = leaves(
            &mut forest,
            &[
                &[(0, 1.0), (1, 1.0)],
                &[(0, 1.0), (1, 1.0)],
                &[(2, 1.0), (3, 1.0)],
                &[(2, 1.0), (3, 1.0)],
            ],
        );
        let out = ClusterBuilder::new(&OverlapWeightedEuclidean)
            .build(&mut forest, &ids)
            .unwrap();

        let root = out.root().unwrap();
        assert_eq!(out.dendrogram.n_merges(), 3);
        assert_eq!(out.dendrogram.n_forced(), 1);
        let cluster = forest.at(root).as_cluster().unwrap();
        assert!(cluster.is_forced());
        assert_eq!(forest.at(cluster.first).num_children(), 2);
        assert_eq!(forest.at(cluster.second).num_children(), 2);
        assert_eq!(forest.at(cluster.first).distance(), Some(0.0));
        assert!(forest.health_check().is_healthy());
    }

    #[test]
    fn unreachable_leaf_is_joined_last() {
        // Leaf 2 shares nothing with the others; leaf 3 only reaches them
        // through coordinate 1.
        let mut forest = Forest::new();
        let ids = leaves(
            &mut forest,
            &[
                &[(0, 1.0), (1, 1.0)],
                &[(0, 1.0), (1, 1.0)],
                &[(2, 1.0), (5, 1.0)],
                &[(3, 1.0), (1, 1.0), (6, 1.0)],
            ],
        );
        let out = ClusterBuilder::new(&OverlapWeightedEuclidean)
            .build(&mut forest, &ids)
            .unwrap();
        let root = out.root().unwrap();
        let mut order = forest.ordered_indexes(root);
        order.sort_unstable();
        assert_eq!(order, vec![0, 1, 2, 3]);
        assert_eq!(out.dendrogram.n_merges(), 3);
    }

    #[test]
    fn small_caches_are_rebuilt_when_exhausted() {
        // A chain where every leaf is closest to its predecessor.
        let rows: Vec<Vec<(usize, f64)>> = (0..12)
            .map(|i| {
                let mut row = vec![(i, 1.0), (100, 1.0)];
                if i > 0 {
                    row.push((i - 1, 0.5));
                }
                row
            })
            .collect();
        let refs: Vec<&[(usize, f64)]> = rows.iter().map(Vec::as_slice).collect();

        let mut capped = Forest::new();
        let ids = leaves(&mut capped, &refs);
        let out = ClusterBuilder::new(&OverlapWeightedEuclidean)
            .with_max_neighbors(1)
            .build(&mut capped, &ids)
            .unwrap();

        assert_eq!(out.dendrogram.n_merges(), 11);
        assert_eq!(out.dendrogram.n_forced(), 0);
        assert!(capped.health_check().is_healthy());
    }

    #[test]
    fn capped_caches_build_the_same_tree() {
        use rand::prelude::*;

        let mut rng = StdRng::seed_from_u64(7);
        let rows: Vec<Vec<(usize, f64)>> = (0..48)
            .map(|i| {
                let family = i / 8 * 8;
                let mut row = vec![(i, 1.0)];
                for c in family..family + 8 {
                    if c != i && rng.random_bool(0.6) {
                        row.push((c, rng.random_range(0.1..1.0)));
                    }
                }
                if rng.random_bool(0.1) {
                    row.push((rng.random_range(0..48), rng.random_range(0.1..0.5)));
                }
                row.sort_by_key(|(k, _)| *k);
                row.dedup_by_key(|(k, _)| *k);
                row
            })
            .collect();
        let refs: Vec<&[(usize, f64)]> = rows.iter().map(Vec::as_slice).collect();

        let run = |max_neighbors: usize| {
            let mut forest = Forest::new();
            let ids = leaves(&mut forest, &refs);
            let out = ClusterBuilder::new(&OverlapWeightedEuclidean)
                .with_max_neighbors(max_neighbors)
                .build(&mut forest, &ids)
                .unwrap();
            let order = forest.ordered_indexes(out.root().unwrap());
            (out.dendrogram.distances(), order)
        };

        let (capped_distances, capped_order) = run(1);
        let (full_distances, full_order) = run(1000);
        assert_eq!(capped_distances.len(), 47);
        assert_eq!(capped_distances, full_distances);
        assert_eq!(capped_order, full_order);
    }

    #[test]
    fn chained_fragments_are_forced_together() {
        // Pair p references the first leaf index of pair p + 1 without sharing
        // any key with it, so every link between pairs is infinite.
        let pairs = 40;
        let rows: Vec<Vec<(usize, f64)>> = (0..pairs * 2)
            .map(|i| {
                let p = i / 2;
                let mut row = vec![(100 + p, 1.0), (200 + p, 1.0)];
                if i % 2 == 0 && p + 1 < pairs {
                    row.insert(0, (2 * p + 2, 1.0));
                }
                row
            })
            .collect();
        let refs: Vec<&[(usize, f64)]> = rows.iter().map(Vec::as_slice).collect();

        let mut forest = Forest::new();
        let ids = leaves(&mut forest, &refs);
        let out = ClusterBuilder::new(&OverlapWeightedEuclidean)
            .build(&mut forest, &ids)
            .unwrap();

        let root = out.root().unwrap();
        let mut order = forest.ordered_indexes(root);
        order.sort_unstable();
        assert_eq!(order, (0..pairs * 2).collect::<Vec<_>>());
        assert_eq!(out.dendrogram.n_merges(), pairs * 2 - 1);
        // One finite merge per pair; everything above is forced.
        assert_eq!(out.dendrogram.n_forced(), pairs - 1);
        assert!(forest.health_check().is_healthy());
    }

    #[test]
    fn reach_is_carried_through_merges() {
        let mut forest = Forest::new();
        // Leaf 0 references 2, leaf 1 references 0, leaf 2 references nothing in the build.
        let ids = leaves(
            &mut forest,
            &[&[(2, 1.0), (10, 1.0)], &[(0, 1.0), (10, 1.0)], &[(11, 1.0)]],
        );
        let index = NeighborIndex::new(&forest, &ids, &OverlapWeightedEuclidean, 4);
        let mut state = BuildState::new(&forest, &ids, &index);
        assert!(!state.reach[&ids[0]].is_isolated());
        assert!(state.reach[&ids[2]].is_isolated());

        let merged = forest.merge(ids[0], ids[1], 1.0, &OverlapWeightedEuclidean);
        state.combine_reach(ids[0], ids[1], merged);
        let reach = &state.reach[&merged];
        assert_eq!(reach.own, HashSet::from([0, 1]));
        assert_eq!(reach.referenced, HashSet::from([0, 2]));
        assert!(!reach.is_isolated());
        assert!(!state.reach.contains_key(&ids[0]));

        let top = forest.merge(merged, ids[2], f64::INFINITY, &OverlapWeightedEuclidean);
        state.combine_reach(merged, ids[2], top);
        assert!(state.reach[&top].is_isolated());
    }

    #[test]
    fn progress_counts_every_merge() {
        let mut forest = Forest::new();
        let ids = leaves(
            &mut forest,
            &[&[(0, 1.0), (1, 1.0)], &[(0, 1.0), (1, 1.0)], &[(2, 1.0)]],
        );
        let events = Mutex::new(Vec::new());
        let sink = |e: ProgressEvent| events.lock().unwrap().push(e);
        let out = ClusterBuilder::new(&OverlapWeightedEuclidean)
            .with_progress(&sink)
            .build(&mut forest, &ids)
            .unwrap();

        let events = events.into_inner().unwrap();
        let increments = events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Increment(1)))
            .count();
        assert_eq!(increments, out.dendrogram.n_merges());
        // Leaf 2 is joined at the end, so a connected build still takes N - 1 merges.
        assert!(matches!(events[0], ProgressEvent::Describe { maximum: 2, .. }));
        assert_eq!(increments, 2);
    }

    #[test]
    fn rejects_non_leaf_input() {
        let mut forest = Forest::new();
        let ids = leaves(&mut forest, &[&[(0, 1.0)], &[(1, 1.0)]]);
        let root = forest.merge(ids[0], ids[1], 1.0, &OverlapWeightedEuclidean);
        let err = ClusterBuilder::new(&OverlapWeightedEuclidean)
            .build(&mut forest, &[root])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "leaves", .. }));
    }
}
