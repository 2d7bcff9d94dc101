//! Half-match primary clusters.
//!
//! A subtree is a primary cluster when *each* of its two boundary leaves
//! shares with at least half of the leaves under it. Otherwise the search
//! descends into both children. The result never overlaps, since every
//! cluster is a whole subtree and accepted subtrees are not searched.

use std::collections::HashSet;

use super::{ClusterAssignment, OrderedLeaves, PrimaryClusterFinder};
use crate::error::Result;
use crate::hierarchy::{Forest, NodeId, NodeKind};

/// Accepts subtrees whose boundary leaves each share with half the subtree.
#[derive(Debug, Clone)]
pub struct HalfMatchFinder {
    min_cluster_size: usize,
}

impl HalfMatchFinder {
    /// Create a finder dropping clusters smaller than `min_cluster_size`.
    pub fn new(min_cluster_size: usize) -> Self {
        Self { min_cluster_size }
    }

    /// Accepted subtrees under `root` (before the size filter), in no
    /// particular order. Leaves that no ancestor accepted come back on their own.
    pub fn primary_clusters(
        &self,
        forest: &Forest,
        root: NodeId,
        immediate_family: &HashSet<usize>,
    ) -> Result<Vec<NodeId>> {
        let _ = forest.node(root)?;
        let mut accepted = Vec::new();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            match forest.node(id)?.kind() {
                NodeKind::Leaf(_) => accepted.push(id),
                NodeKind::Cluster(cluster) => {
                    if is_primary(forest, id, immediate_family) {
                        accepted.push(id);
                    } else {
                        stack.push(cluster.second);
                        stack.push(cluster.first);
                    }
                }
            }
        }
        Ok(accepted)
    }
}

impl PrimaryClusterFinder for HalfMatchFinder {
    fn find(
        &self,
        forest: &Forest,
        root: NodeId,
        _non_distant: &HashSet<usize>,
        immediate_family: &HashSet<usize>,
    ) -> Result<ClusterAssignment> {
        let kept: Vec<NodeId> = self
            .primary_clusters(forest, root, immediate_family)?
            .into_iter()
            .filter(|&id| forest.at(id).num_children() >= self.min_cluster_size)
            .collect();
        Ok(ClusterAssignment::from_nodes(forest, root, &kept))
    }
}

/// Whether both boundary leaves of `id` share with at least half its leaves.
///
/// An immediate-family leaf that shares with anyone else in the subtree
/// counts as shared for both boundaries.
fn is_primary(forest: &Forest, id: NodeId, immediate_family: &HashSet<usize>) -> bool {
    let leaves = OrderedLeaves::new(forest, id);
    let n = leaves.len();
    if n == 0 {
        return false;
    }

    let forced: Vec<bool> = (0..n)
        .map(|k| {
            immediate_family.contains(&leaves.indexes[k])
                && (0..n).any(|j| j != k && leaves.shares(k, j))
        })
        .collect();

    [0, n - 1].into_iter().all(|boundary| {
        let count = (0..n)
            .filter(|&k| forced[k] || leaves.weight(boundary, k) > 0.0)
            .count();
        count * 2 >= n
    })
}
