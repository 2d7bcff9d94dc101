//! # icwcluster
//!
//! Shared-match ("in common with") clustering for genetic-genealogy DNA matches.
//!
//! Given a list of matches and, for each, the set of other matches it shares
//! DNA with, the crate builds an ordered binary tree whose leaf order puts
//! related matches next to each other, then cuts that order into numbered
//! primary clusters. A renderer draws the ordered correlation matrix; the
//! clusters show up as blocks along its diagonal.
//!
//! **Default build** enables `parallel` (rayon). Without it every stage runs
//! on the calling thread with identical results.
//!
//! ```rust
//! use std::collections::{HashMap, HashSet};
//! use icwcluster::{ClusteringConfig, HierarchicalClustering, Match};
//!
//! let matches = vec![
//!     Match::new("a", "Ann", 120.0),
//!     Match::new("b", "Bob", 80.0),
//!     Match::new("c", "Cal", 60.0),
//! ];
//! let mut shared: HashMap<String, HashSet<String>> = HashMap::new();
//! shared.insert("a".into(), ["b", "c"].iter().map(|s| s.to_string()).collect());
//! shared.insert("b".into(), ["a", "c"].iter().map(|s| s.to_string()).collect());
//! shared.insert("c".into(), ["a", "b"].iter().map(|s| s.to_string()).collect());
//!
//! let result = HierarchicalClustering::new(ClusteringConfig::default())
//!     .cluster_raw(matches, &shared)
//!     .unwrap();
//! assert_eq!(result.ordered_indexes().len(), 3);
//! assert_eq!(result.assignment.len(), 1);
//! ```

pub mod cluster;
pub mod config;
pub mod distance;
/// Error types used across `icwcluster`.
pub mod error;
pub mod hierarchy;
pub mod matches;
pub mod matrix;
pub mod pipeline;
pub mod progress;

pub use cluster::{ClusterAssignment, ClusterBuilder, ClusterExtender, PrimaryClusterFinder};
pub use config::{ClusteringConfig, PrimaryStrategy};
pub use distance::{DistanceMetric, OverlapWeightedEuclidean};
pub use error::{Error, Result};
pub use hierarchy::{Dendrogram, Forest, HealthCheck, NodeId};
pub use matches::{rank_matches, validate_matches, ClusterableMatch, Match};
pub use matrix::{AppearanceWeightedBuilder, Matrix, SparseCoords};
pub use pipeline::{ClusteringResult, HierarchicalClustering};
pub use progress::{NoProgress, Progress, ProgressEvent};
