//! Primary clusters: the numbered groups shown to the user.
//!
//! The merge tree says which matches are close; a primary cluster says
//! "these matches probably descend from the same ancestral couple". Two
//! strategies are provided:
//!
//! | Strategy | Input | Overlap |
//! |----------|-------|---------|
//! | [`HalfMatchFinder`] | subtrees of the merge tree | never |
//! | [`MatchMatrixFinder`] | ordered leaves as a 0/1 matrix | allowed |
//!
//! Both number clusters from 1 in display order and drop clusters smaller
//! than `min_cluster_size`.

mod half_match;
mod match_matrix;

pub use half_match::HalfMatchFinder;
pub use match_matrix::MatchMatrixFinder;

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::Result;
use crate::hierarchy::{Forest, NodeId};
use crate::matrix::SparseCoords;

/// Finds primary clusters in a built tree.
pub trait PrimaryClusterFinder: Send + Sync {
    /// Assign primary clusters to the leaves under `root`.
    ///
    /// `non_distant` holds the match indexes allowed to seed a cluster;
    /// `immediate_family` holds matches that may be force-included.
    fn find(
        &self,
        forest: &Forest,
        root: NodeId,
        non_distant: &HashSet<usize>,
        immediate_family: &HashSet<usize>,
    ) -> Result<ClusterAssignment>;
}

/// Inclusive range of positions in the display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusterRange {
    /// First position.
    pub start: usize,
    /// Last position (inclusive).
    pub end: usize,
}

impl ClusterRange {
    /// Create a range; `start` must not exceed `end`.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of positions covered.
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Always false; a range covers at least one position.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether the two ranges share a position.
    pub fn overlaps(&self, other: &ClusterRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Smallest range covering both.
    pub fn union(&self, other: &ClusterRange) -> ClusterRange {
        ClusterRange::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// One numbered primary cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryCluster {
    /// Cluster number, starting at 1 in display order.
    pub number: usize,
    /// Positions covered in the display order.
    pub range: ClusterRange,
    /// Match indexes of the members, in display order.
    pub members: Vec<usize>,
    /// Subtree the cluster was taken from, when it is exactly one subtree.
    pub node: Option<NodeId>,
}

/// Primary clusters of a tree and the reverse lookup from match to clusters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterAssignment {
    clusters: Vec<PrimaryCluster>,
    by_match: BTreeMap<usize, Vec<usize>>,
}

impl ClusterAssignment {
    /// Number clusters given as ranges over `order` (match indexes in display
    /// order). Ranges are sorted by position before numbering.
    pub fn from_ranges(order: &[usize], mut ranges: Vec<(ClusterRange, Option<NodeId>)>) -> Self {
        ranges.sort_by_key(|(range, _)| *range);

        let mut assignment = Self::default();
        for (i, (range, node)) in ranges.into_iter().enumerate() {
            let number = i + 1;
            let end = range.end.min(order.len().saturating_sub(1));
            let members: Vec<usize> = order.get(range.start..=end).map(<[usize]>::to_vec).unwrap_or_default();
            for &m in &members {
                assignment.by_match.entry(m).or_default().push(number);
            }
            assignment.clusters.push(PrimaryCluster {
                number,
                range,
                members,
                node,
            });
        }
        assignment
    }

    /// Build from whole subtrees of the tree at `root`.
    pub fn from_nodes(forest: &Forest, root: NodeId, nodes: &[NodeId]) -> Self {
        let order = forest.ordered_indexes(root);
        let position: HashMap<usize, usize> = order.iter().enumerate().map(|(p, &m)| (m, p)).collect();

        let ranges = nodes
            .iter()
            .filter_map(|&node| {
                let positions: Vec<usize> = forest
                    .ordered_indexes(node)
                    .iter()
                    .filter_map(|m| position.get(m).copied())
                    .collect();
                let start = positions.iter().min()?;
                let end = positions.iter().max()?;
                Some((ClusterRange::new(*start, *end), Some(node)))
            })
            .collect();
        Self::from_ranges(&order, ranges)
    }

    /// All clusters, by number.
    pub fn clusters(&self) -> &[PrimaryCluster] {
        &self.clusters
    }

    /// Cluster with the given number.
    pub fn cluster(&self, number: usize) -> Option<&PrimaryCluster> {
        number.checked_sub(1).and_then(|i| self.clusters.get(i))
    }

    /// Cluster numbers containing a match (empty if none).
    pub fn clusters_of(&self, match_index: usize) -> &[usize] {
        self.by_match.get(&match_index).map_or(&[][..], Vec::as_slice)
    }

    /// Every assigned match with its cluster numbers, by match index.
    pub fn assignments(&self) -> impl Iterator<Item = (usize, &[usize])> {
        self.by_match.iter().map(|(&m, c)| (m, c.as_slice()))
    }

    /// `(start, end)` position ranges of all clusters, by number.
    pub fn ranges(&self) -> Vec<(usize, usize)> {
        self.clusters.iter().map(|c| (c.range.start, c.range.end)).collect()
    }

    /// Number of clusters.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Whether no cluster was found.
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

/// Leaves of a subtree in display order, with their coordinates.
pub(crate) struct OrderedLeaves<'f> {
    pub(crate) indexes: Vec<usize>,
    coords: Vec<&'f SparseCoords>,
}

impl<'f> OrderedLeaves<'f> {
    pub(crate) fn new(forest: &'f Forest, root: NodeId) -> Self {
        let empty: &'static SparseCoords = &EMPTY;
        let (indexes, coords) = forest
            .ordered_leaves(root)
            .into_iter()
            .filter_map(|leaf| {
                let index = forest.match_index(leaf)?;
                Some((index, forest.leaf_coords(leaf).unwrap_or(empty)))
            })
            .unzip();
        Self { indexes, coords }
    }

    pub(crate) fn len(&self) -> usize {
        self.indexes.len()
    }

    /// Weight of the leaf at position `q` in the row of the leaf at `p`.
    pub(crate) fn weight(&self, p: usize, q: usize) -> f64 {
        self.coords[p].get(self.indexes[q])
    }

    /// Whether either leaf lists the other.
    pub(crate) fn shares(&self, p: usize, q: usize) -> bool {
        self.weight(p, q) > 0.0 || self.weight(q, p) > 0.0
    }
}

static EMPTY: SparseCoords = SparseCoords::empty();
