//! Clustering configuration.
//!
//! Every threshold the core consumes is a plain value on [`ClusteringConfig`].
//! Callers (a CLI, a desktop front-end, a test) build one with the `with_*`
//! methods and hand it to [`crate::HierarchicalClustering`].

use crate::error::{Error, Result};

/// Which primary-cluster strategy numbers the final tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrimaryStrategy {
    /// Accept a subtree when both boundary leaves share with at least half of it.
    /// Produces non-overlapping clusters.
    #[default]
    HalfMatch,
    /// Grow dense diagonal blocks over the ordered leaf matrix.
    /// Clusters may overlap.
    MatchMatrix,
}

/// Configuration for a clustering run.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusteringConfig {
    /// Clusters with fewer leaves than this are discarded (default: 3).
    pub min_cluster_size: usize,
    /// Matches below this many shared cM are not clustered directly (default: 20).
    pub min_clusterable_cm: f64,
    /// Below-cutoff matches under this value are never extended into clusters (default: 10).
    pub min_extension_cm: f64,
    /// Matches at or above this value are immediate family (default: 200).
    pub immediate_family_cm: f64,
    /// Neighbor-cache capacity per leaf (default: 25).
    pub max_neighbors: usize,
    /// Upper bound on the percentage of indirect-only ("gray") matrix cells.
    /// `None` disables suppression (default).
    pub max_gray_percent: Option<f64>,
    /// Primary cluster strategy (default: half-match).
    pub strategy: PrimaryStrategy,
    /// Whether below-cutoff matches are added to existing clusters (default: false).
    pub extend_clusters: bool,
    /// Minimum row/column fill for the growth-based strategy (default: 0.5).
    pub min_fill: f64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: 3,
            min_clusterable_cm: 20.0,
            min_extension_cm: 10.0,
            immediate_family_cm: 200.0,
            max_neighbors: 25,
            max_gray_percent: None,
            strategy: PrimaryStrategy::HalfMatch,
            extend_clusters: false,
            min_fill: 0.5,
        }
    }
}

impl ClusteringConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set minimum cluster size.
    pub fn with_min_cluster_size(mut self, size: usize) -> Self {
        self.min_cluster_size = size;
        self
    }

    /// Set the clustering cutoff in shared cM.
    pub fn with_min_clusterable_cm(mut self, cm: f64) -> Self {
        self.min_clusterable_cm = cm;
        self
    }

    /// Set the lowest shared cM considered for cluster extension.
    pub fn with_min_extension_cm(mut self, cm: f64) -> Self {
        self.min_extension_cm = cm;
        self
    }

    /// Set the immediate-family cutoff in shared cM.
    pub fn with_immediate_family_cm(mut self, cm: f64) -> Self {
        self.immediate_family_cm = cm;
        self
    }

    /// Set neighbor-cache capacity.
    pub fn with_max_neighbors(mut self, max: usize) -> Self {
        self.max_neighbors = max;
        self
    }

    /// Cap the percentage of indirect-only matrix cells.
    pub fn with_max_gray_percent(mut self, percent: f64) -> Self {
        self.max_gray_percent = Some(percent);
        self
    }

    /// Set the primary cluster strategy.
    pub fn with_strategy(mut self, strategy: PrimaryStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Enable or disable cluster extension.
    pub fn with_extend_clusters(mut self, extend: bool) -> Self {
        self.extend_clusters = extend;
        self
    }

    /// Set minimum fill for the growth-based strategy.
    pub fn with_min_fill(mut self, fill: f64) -> Self {
        self.min_fill = fill;
        self
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.min_cluster_size == 0 {
            return Err(Error::InvalidParameter {
                name: "min_cluster_size",
                message: "must be at least 1",
            });
        }
        if self.max_neighbors == 0 {
            return Err(Error::InvalidParameter {
                name: "max_neighbors",
                message: "must be at least 1",
            });
        }
        if !self.min_clusterable_cm.is_finite() || self.min_clusterable_cm < 0.0 {
            return Err(Error::InvalidParameter {
                name: "min_clusterable_cm",
                message: "must be a non-negative number",
            });
        }
        if !self.min_extension_cm.is_finite() || self.min_extension_cm < 0.0 {
            return Err(Error::InvalidParameter {
                name: "min_extension_cm",
                message: "must be a non-negative number",
            });
        }
        if self.immediate_family_cm.is_nan() {
            return Err(Error::InvalidParameter {
                name: "immediate_family_cm",
                message: "must be a number",
            });
        }
        if let Some(p) = self.max_gray_percent {
            if !(0.0..=100.0).contains(&p) {
                return Err(Error::InvalidParameter {
                    name: "max_gray_percent",
                    message: "must be within 0..=100",
                });
            }
        }
        if !(self.min_fill > 0.0 && self.min_fill <= 1.0) {
            return Err(Error::InvalidParameter {
                name: "min_fill",
                message: "must be within (0, 1]",
            });
        }
        Ok(())
    }
}
