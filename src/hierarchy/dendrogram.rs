//! Merge log of an agglomerative clustering run.
//!
//! Every call that joins two top-level nodes appends one [`Merge`]. Forced
//! merges (no finite distance between the parts) are recorded with an
//! infinite distance so renderers can draw them differently.

use super::node::NodeId;

/// Merge history of one clustering run.
#[derive(Debug, Clone, Default)]
pub struct Dendrogram {
    merges: Vec<Merge>,
    n_items: usize,
}

/// A single merge operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Merge {
    /// First top-level node that was merged.
    pub first: NodeId,
    /// Second top-level node that was merged.
    pub second: NodeId,
    /// The resulting cluster node.
    pub merged: NodeId,
    /// Distance at which the merge occurred.
    pub distance: f64,
    /// Number of leaves under the resulting cluster.
    pub size: usize,
}

impl Merge {
    /// Whether the merge joined parts with no finite distance between them.
    pub fn is_forced(&self) -> bool {
        self.distance.is_infinite()
    }
}

impl Dendrogram {
    /// Create an empty log for `n_items` leaves.
    pub fn new(n_items: usize) -> Self {
        Self {
            merges: Vec::with_capacity(n_items.saturating_sub(1)),
            n_items,
        }
    }

    /// Record a merge.
    pub fn add_merge(&mut self, first: NodeId, second: NodeId, merged: NodeId, distance: f64, size: usize) {
        self.merges.push(Merge {
            first,
            second,
            merged,
            distance,
            size,
        });
    }

    /// Number of leaves the run started with.
    pub fn n_items(&self) -> usize {
        self.n_items
    }

    /// Number of merges recorded.
    pub fn n_merges(&self) -> usize {
        self.merges.len()
    }

    /// Number of forced merges.
    pub fn n_forced(&self) -> usize {
        self.merges.iter().filter(|m| m.is_forced()).count()
    }

    /// Iterate over merges in the order they happened.
    pub fn merges(&self) -> impl Iterator<Item = &Merge> {
        self.merges.iter()
    }

    /// Merge distances in order (for visualization).
    pub fn distances(&self) -> Vec<f64> {
        self.merges.iter().map(|m| m.distance).collect()
    }

    /// Largest finite merge distance, if any merge was finite.
    pub fn max_finite_distance(&self) -> Option<f64> {
        self.merges
            .iter()
            .map(|m| m.distance)
            .filter(|d| d.is_finite())
            .max_by(f64::total_cmp)
    }
}
