//! Agglomeration, primary clusters, and cluster extension.
//!
//! ## Agglomeration
//!
//! [`ClusterBuilder`] turns a set of leaves into one binary tree by
//! repeatedly merging the closest pair of top-level nodes. Closeness is
//! measured between *boundary* leaves only, since those are the leaves that
//! end up next to each other in the rendered diagram:
//!
//! ```text
//!   [a b c]   [d e]        seam candidates: (c,d) (c,e) (a,d) (a,e)
//!        \     /
//!     [a b c d e]          oriented so the closest pair meets in the middle
//! ```
//!
//! Each boundary leaf caches its closest `max_neighbors` leaves. Candidates
//! come from coordinate buckets, so a leaf is only compared against leaves
//! that share a significant coordinate with it. The cost per leaf is bounded
//! by the bucket sizes, not by N.
//!
//! ## Primary clusters
//!
//! The tree fixes the display order; primary clusters cut it into numbered
//! groups. See [`primary`] for the two strategies.
//!
//! | Type | Role |
//! |------|------|
//! | [`ClusterBuilder`] | agglomeration with bounded neighbor caches |
//! | [`HalfMatchFinder`] | non-overlapping subtree clusters |
//! | [`MatchMatrixFinder`] | growth-based, overlap-tolerant clusters |
//! | [`ClusterExtender`] | adds low-cM matches to existing clusters |
//!
//! ## Usage
//!
//! ```rust
//! use std::collections::HashSet;
//! use std::sync::Arc;
//! use icwcluster::cluster::{ClusterBuilder, HalfMatchFinder, PrimaryClusterFinder};
//! use icwcluster::distance::OverlapWeightedEuclidean;
//! use icwcluster::hierarchy::Forest;
//! use icwcluster::matches::{ClusterableMatch, Match};
//! use icwcluster::matrix::AppearanceWeightedBuilder;
//!
//! let lists: [&[usize]; 3] = [&[1, 2], &[0, 2], &[0, 1]];
//! let matches: Vec<ClusterableMatch> = lists
//!     .iter()
//!     .enumerate()
//!     .map(|(i, l)| {
//!         let m = Arc::new(Match::new(format!("id{i}"), format!("Match {i}"), 50.0));
//!         ClusterableMatch::new(i, m, l.iter().copied())
//!     })
//!     .collect();
//!
//! let matrix = AppearanceWeightedBuilder::new(20.0).correlate(&matches, &HashSet::new());
//! let mut forest = Forest::new();
//! let leaves: Vec<_> = matches
//!     .iter()
//!     .map(|m| forest.add_leaf(Arc::new(m.clone()), Arc::new(matrix.coords(m.index))))
//!     .collect();
//!
//! let outcome = ClusterBuilder::new(&OverlapWeightedEuclidean)
//!     .build(&mut forest, &leaves)
//!     .unwrap();
//! let root = outcome.root().unwrap();
//! assert_eq!(forest.ordered_leaves(root).len(), 3);
//!
//! let clusters = HalfMatchFinder::new(3)
//!     .find(&forest, root, &HashSet::new(), &HashSet::new())
//!     .unwrap();
//! assert_eq!(clusters.len(), 1);
//! ```

mod builder;
mod extender;
mod neighbors;
pub mod primary;

pub use builder::{BuildOutcome, ClusterBuilder, DEFAULT_MAX_NEIGHBORS};
pub use extender::{ClusterExtender, ExtensionOutcome};
pub use neighbors::lowest_n;
pub use primary::{
    ClusterAssignment, ClusterRange, HalfMatchFinder, MatchMatrixFinder, PrimaryCluster,
    PrimaryClusterFinder,
};
