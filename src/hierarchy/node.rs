//! Cluster tree nodes.

use core::cmp::Ordering;
use core::fmt;
use std::sync::Arc;

use crate::matches::ClusterableMatch;
use crate::matrix::SparseCoords;

/// Handle of a node inside a [`Forest`](super::Forest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position of the node in its forest's arena.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A candidate merge partner in a leaf's neighbor cache.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// The neighboring leaf.
    pub node: NodeId,
    /// Match index of the neighboring leaf (used for tie-breaks).
    pub index: usize,
    /// Distance to the neighboring leaf.
    pub distance: f64,
}

impl Neighbor {
    /// Create a neighbor entry.
    pub fn new(node: NodeId, index: usize, distance: f64) -> Self {
        Self {
            node,
            index,
            distance,
        }
    }

    /// Ascending by distance, then by match index.
    pub fn by_distance(a: &Neighbor, b: &Neighbor) -> Ordering {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.index.cmp(&b.index))
    }
}

/// A leaf: exactly one match and its matrix row.
#[derive(Debug, Clone)]
pub struct LeafNode {
    /// The match represented by this leaf.
    pub matched: Arc<ClusterableMatch>,
    /// Nonzero entries of the match's matrix row.
    pub coords: Arc<SparseCoords>,
}

/// An internal node joining two subtrees.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterNode {
    /// Child rendered first (before any reversal of this node).
    pub first: NodeId,
    /// Child rendered second.
    pub second: NodeId,
    /// Distance at which the children were merged; infinite for forced merges.
    pub distance: f64,
    /// Whether this node renders its children in reverse.
    pub(crate) reversed: bool,
}

impl ClusterNode {
    /// Whether this node is currently rendered in reverse.
    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Whether the merge was forced (no finite distance between the children).
    pub fn is_forced(&self) -> bool {
        self.distance.is_infinite()
    }
}

/// Leaf or cluster payload.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A single match.
    Leaf(LeafNode),
    /// Two merged subtrees.
    Cluster(ClusterNode),
}

/// A node of the cluster forest.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) parent: Option<NodeId>,
    pub(crate) num_children: usize,
    pub(crate) first_leaf: NodeId,
    pub(crate) second_leaf: NodeId,
    pub(crate) neighbors: Vec<Neighbor>,
    pub(crate) kind: NodeKind,
    pub(crate) retired: bool,
}

impl Node {
    pub(crate) fn leaf(id: NodeId, leaf: LeafNode) -> Self {
        Self {
            id,
            parent: None,
            num_children: 1,
            first_leaf: id,
            second_leaf: id,
            neighbors: Vec::new(),
            kind: NodeKind::Leaf(leaf),
            retired: false,
        }
    }

    /// Handle of this node.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Parent handle, `None` for roots.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Number of leaves under this node (1 for a leaf).
    pub fn num_children(&self) -> usize {
        self.num_children
    }

    /// Leftmost leaf in this node's own rendering order.
    pub fn first_leaf(&self) -> NodeId {
        self.first_leaf
    }

    /// Rightmost leaf in this node's own rendering order.
    pub fn second_leaf(&self) -> NodeId {
        self.second_leaf
    }

    /// Cached merge candidates, ascending by distance. Only leaves keep a cache.
    pub fn neighbors(&self) -> &[Neighbor] {
        &self.neighbors
    }

    /// Leaf or cluster payload.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Whether this node is a leaf.
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    /// Leaf payload, if this is a leaf.
    pub fn as_leaf(&self) -> Option<&LeafNode> {
        match &self.kind {
            NodeKind::Leaf(leaf) => Some(leaf),
            NodeKind::Cluster(_) => None,
        }
    }

    /// Cluster payload, if this is a cluster.
    pub fn as_cluster(&self) -> Option<&ClusterNode> {
        match &self.kind {
            NodeKind::Cluster(cluster) => Some(cluster),
            NodeKind::Leaf(_) => None,
        }
    }

    /// Match index of a leaf.
    pub fn match_index(&self) -> Option<usize> {
        self.as_leaf().map(|l| l.matched.index)
    }

    /// Merge distance of a cluster.
    pub fn distance(&self) -> Option<f64> {
        self.as_cluster().map(|c| c.distance)
    }

    /// Whether the node was replaced during cluster extension.
    pub fn is_retired(&self) -> bool {
        self.retired
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Leaf(leaf) => write!(
                f,
                "Leaf[{}]: {} ({:.1} cM)",
                leaf.matched.index, leaf.matched.matched.name, leaf.matched.matched.shared_centimorgans
            ),
            NodeKind::Cluster(cluster) => write!(
                f,
                "Cluster{} n={} d={:.4}",
                self.id, self.num_children, cluster.distance
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbors_order_by_distance_then_index() {
        let mut n = vec![
            Neighbor::new(NodeId(3), 3, 0.5),
            Neighbor::new(NodeId(1), 1, 0.5),
            Neighbor::new(NodeId(9), 9, 0.1),
        ];
        n.sort_by(Neighbor::by_distance);
        let order: Vec<usize> = n.iter().map(|x| x.index).collect();
        assert_eq!(order, vec![9, 1, 3]);
    }
}
