//! Arena-backed cluster forest.
//!
//! All nodes of a clustering run live in one `Vec`, addressed by [`NodeId`].
//! Parents are plain handles, so there are no ownership cycles between a
//! cluster and its children.
//!
//! # Orientation
//!
//! The display order of a tree is its depth-first leaf order. When two
//! subtrees X = (x1 … x2) and Y = (y1 … y2) merge, only their boundary
//! leaves can end up adjacent, giving four possible seams:
//!
//! ```text
//! seam      │ result
//! ──────────┼────────────────────
//! x2 | y1   │ x1 … x2  y1 … y2
//! x2 | y2   │ x1 … x2  y2 … y1   (Y reversed)
//! x1 | y1   │ x2 … x1  y1 … y2   (X reversed)
//! x1 | y2   │ y1 … y2  x1 … x2   (children swapped)
//! ```
//!
//! [`Forest::merge`] picks the seam with the smallest leaf distance; equal
//! distances resolve in the order listed. Reversal is a flag on the cluster
//! node, applied lazily when the tree is walked.

use std::collections::HashMap;
use std::sync::Arc;

use super::node::{ClusterNode, LeafNode, Node, NodeId, NodeKind};
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::matches::ClusterableMatch;
use crate::matrix::SparseCoords;

/// Owner of every node built during a clustering run.
#[derive(Debug, Clone, Default)]
pub struct Forest {
    nodes: Vec<Node>,
}

impl Forest {
    /// Create an empty forest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty forest with room for `n` leaves and their merges.
    pub fn with_leaf_capacity(n: usize) -> Self {
        Self {
            nodes: Vec::with_capacity((2 * n).saturating_sub(1)),
        }
    }

    /// Number of nodes ever created (including retired ones).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no node has been created.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate live (non-retired) nodes.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| !n.retired)
    }

    /// Look up a node.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Look up a live node or fail.
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        match self.nodes.get(id.0) {
            Some(node) if !node.retired => Ok(node),
            _ => Err(Error::UnknownNode(id.0)),
        }
    }

    pub(crate) fn at(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn at_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    /// Live nodes without a parent, in creation order.
    pub fn roots(&self) -> Vec<NodeId> {
        self.iter()
            .filter(|n| n.parent.is_none())
            .map(|n| n.id)
            .collect()
    }

    /// Add a leaf for `matched` with the given matrix coordinates.
    pub fn add_leaf(&mut self, matched: Arc<ClusterableMatch>, coords: Arc<SparseCoords>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::leaf(id, LeafNode { matched, coords }));
        id
    }

    /// Coordinates of a leaf.
    pub fn leaf_coords(&self, id: NodeId) -> Option<&SparseCoords> {
        self.get(id)
            .and_then(Node::as_leaf)
            .map(|leaf| leaf.coords.as_ref())
    }

    /// Match index of a leaf.
    pub fn match_index(&self, id: NodeId) -> Option<usize> {
        self.get(id).and_then(Node::match_index)
    }

    /// Walk parent links up to the top-level ancestor of `id`.
    pub fn highest_parent(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.at(current).parent {
            current = parent;
        }
        current
    }

    /// Merge two top-level nodes at `distance`, orienting them so the closest
    /// pair of boundary leaves meets at the seam. Returns the new cluster.
    pub fn merge<M>(&mut self, first: NodeId, second: NodeId, distance: f64, metric: &M) -> NodeId
    where
        M: DistanceMetric + ?Sized,
    {
        let (x1, x2) = (self.at(first).first_leaf, self.at(first).second_leaf);
        let (y1, y2) = (self.at(second).first_leaf, self.at(second).second_leaf);

        let empty = SparseCoords::new();
        let seam = |a: NodeId, b: NodeId| {
            metric.calculate(
                self.leaf_coords(a).unwrap_or(&empty),
                self.leaf_coords(b).unwrap_or(&empty),
            )
        };
        let candidates = [seam(x2, y1), seam(x2, y2), seam(x1, y1), seam(x1, y2)];
        let mut best = 0;
        for (i, d) in candidates.iter().enumerate().skip(1) {
            if *d < candidates[best] {
                best = i;
            }
        }

        let (first, second) = match best {
            1 => {
                self.reverse(second);
                (first, second)
            }
            2 => {
                self.reverse(first);
                (first, second)
            }
            3 => (second, first),
            _ => (first, second),
        };

        let id = NodeId(self.nodes.len());
        let node = Node {
            id,
            parent: None,
            num_children: self.at(first).num_children + self.at(second).num_children,
            first_leaf: self.at(first).first_leaf,
            second_leaf: self.at(second).second_leaf,
            neighbors: Vec::new(),
            kind: NodeKind::Cluster(ClusterNode {
                first,
                second,
                distance,
                reversed: false,
            }),
            retired: false,
        };
        self.nodes.push(node);
        self.at_mut(first).parent = Some(id);
        self.at_mut(second).parent = Some(id);
        id
    }

    /// Reverse the rendering order of a subtree. Leaves are unaffected.
    pub fn reverse(&mut self, id: NodeId) {
        let node = self.at_mut(id);
        if let NodeKind::Cluster(cluster) = &mut node.kind {
            cluster.reversed = !cluster.reversed;
            core::mem::swap(&mut node.first_leaf, &mut node.second_leaf);
        }
    }

    /// Leaves under `root` in display order (depth-first, orientation applied).
    pub fn ordered_leaves(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.at(root).num_children);
        self.walk(root, |node| {
            if node.is_leaf() {
                out.push(node.id);
            }
        });
        out
    }

    /// Cluster nodes under `root` (inclusive) in depth-first pre-order.
    pub fn ordered_clusters(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.walk(root, |node| {
            if !node.is_leaf() {
                out.push(node.id);
            }
        });
        out
    }

    /// Match indexes of the leaves under `root`, in display order.
    pub fn ordered_indexes(&self, root: NodeId) -> Vec<usize> {
        self.ordered_leaves(root)
            .into_iter()
            .filter_map(|id| self.match_index(id))
            .collect()
    }

    fn walk<F>(&self, root: NodeId, mut visit: F)
    where
        F: FnMut(&Node),
    {
        let mut stack = vec![(root, false)];
        while let Some((id, flip)) = stack.pop() {
            let node = self.at(id);
            visit(node);
            if let NodeKind::Cluster(cluster) = &node.kind {
                let reversed = flip ^ cluster.reversed;
                let (a, b) = if reversed {
                    (cluster.second, cluster.first)
                } else {
                    (cluster.first, cluster.second)
                };
                stack.push((b, reversed));
                stack.push((a, reversed));
            }
        }
    }

    /// Nodes of the subtree at `root`, every node after all of its descendants.
    fn post_order(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            if let NodeKind::Cluster(cluster) = &self.at(id).kind {
                stack.push(cluster.first);
                stack.push(cluster.second);
            }
        }
        out.reverse();
        out
    }

    /// Recompute boundary leaves and leaf count of a cluster from its children.
    fn refresh(&mut self, id: NodeId) {
        let (first, second, reversed) = match &self.at(id).kind {
            NodeKind::Cluster(c) => (c.first, c.second, c.reversed),
            NodeKind::Leaf(_) => return,
        };
        let (first_leaf, second_leaf) = if reversed {
            (self.at(second).second_leaf, self.at(first).first_leaf)
        } else {
            (self.at(first).first_leaf, self.at(second).second_leaf)
        };
        let num_children = self.at(first).num_children + self.at(second).num_children;
        let node = self.at_mut(id);
        node.first_leaf = first_leaf;
        node.second_leaf = second_leaf;
        node.num_children = num_children;
    }

    /// Replace `old` with `new` as a child of `parent`, then refresh every
    /// ancestor's boundary leaves and leaf count.
    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) -> Result<()> {
        self.node(parent)?;
        self.node(new)?;
        if self.get(old).is_none() {
            return Err(Error::UnknownNode(old.0));
        }

        match &mut self.at_mut(parent).kind {
            NodeKind::Cluster(cluster) if cluster.first == old => cluster.first = new,
            NodeKind::Cluster(cluster) if cluster.second == old => cluster.second = new,
            _ => {
                return Err(Error::NotAChild {
                    parent: parent.0,
                    child: old.0,
                })
            }
        }

        if self.at(old).parent == Some(parent) {
            self.at_mut(old).parent = None;
        }
        self.at_mut(new).parent = Some(parent);

        let mut current = Some(parent);
        while let Some(id) = current {
            self.refresh(id);
            current = self.at(id).parent;
        }
        Ok(())
    }

    /// Copy the subtree at `root` of `other` into this forest.
    ///
    /// Leaves of `other` listed in `existing` are mapped onto the given leaves
    /// of this forest, keeping their identity; their coordinates are taken
    /// from `other`. All other nodes are appended. Returns the copied root.
    pub(crate) fn graft(
        &mut self,
        other: &Forest,
        root: NodeId,
        existing: &HashMap<NodeId, NodeId>,
    ) -> NodeId {
        let mut mapped: HashMap<NodeId, NodeId> = HashMap::new();

        for oid in other.post_order(root) {
            let source = other.at(oid);
            let id = match &source.kind {
                NodeKind::Leaf(leaf) => match existing.get(&oid) {
                    Some(&mine) => {
                        let node = self.at_mut(mine);
                        if let NodeKind::Leaf(own) = &mut node.kind {
                            own.coords = Arc::clone(&leaf.coords);
                        }
                        node.neighbors.clear();
                        mine
                    }
                    None => {
                        let id = NodeId(self.nodes.len());
                        self.nodes.push(Node::leaf(id, leaf.clone()));
                        id
                    }
                },
                NodeKind::Cluster(cluster) => {
                    let id = NodeId(self.nodes.len());
                    let (first, second) = (mapped[&cluster.first], mapped[&cluster.second]);
                    self.nodes.push(Node {
                        id,
                        parent: None,
                        num_children: source.num_children,
                        first_leaf: mapped[&source.first_leaf],
                        second_leaf: mapped[&source.second_leaf],
                        neighbors: Vec::new(),
                        kind: NodeKind::Cluster(ClusterNode {
                            first,
                            second,
                            distance: cluster.distance,
                            reversed: cluster.reversed,
                        }),
                        retired: false,
                    });
                    self.at_mut(first).parent = Some(id);
                    self.at_mut(second).parent = Some(id);
                    id
                }
            };
            let _ = mapped.insert(oid, id);
        }

        mapped[&root]
    }

    /// Mark the given cluster nodes as replaced. Leaves are never retired.
    pub(crate) fn retire(&mut self, ids: &[NodeId]) {
        for &id in ids {
            let node = self.at_mut(id);
            if !node.is_leaf() {
                node.retired = true;
                node.parent = None;
            }
        }
    }
}
