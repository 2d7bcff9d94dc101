//! Cluster trees over matches.
//!
//! A clustering run produces a [`Forest`]: an arena of [`Node`]s where every
//! leaf is one match and every cluster node joins two subtrees. The forest
//! usually ends up as a single tree whose depth-first leaf order is the
//! display order of the matches.
//!
//! ```text
//!            c6 (forced, d=∞)
//!           /   \
//!        c4      c5
//!       /  \    /  \
//!      0    1  2    3      display order: 0 1 2 3
//! ```
//!
//! - [`Forest`]: the arena, merge orientation, and traversal
//! - [`Dendrogram`]: the merge log of a run
//! - [`HealthCheck`]: structural validation of a forest

mod dendrogram;
mod forest;
mod node;
mod validate;

pub use dendrogram::{Dendrogram, Merge};
pub use forest::Forest;
pub use node::{ClusterNode, LeafNode, Neighbor, Node, NodeId, NodeKind};
pub use validate::{
    validate_tree_structure, HealthCheck, HealthReport, Severity, ValidationIssue, ValidationReport,
};
