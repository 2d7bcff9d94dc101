//! End-to-end clustering run.
//!
//! [`HierarchicalClustering`] ties the stages together:
//!
//! ```text
//! matches ──► correlate ──► build tree ──► primary clusters ──► extend (optional)
//!             (matrix)      (forest)       (half-match)          │
//!                                                                ▼
//!                                            final primary clusters (configured strategy)
//! ```
//!
//! Matches at or above `min_clusterable_cm` become leaves and are the only
//! ones correlated up front. Matches below it but at or above
//! `min_extension_cm` are only used when extension is on, and only if they
//! list at least one other match; the extender adds their rows to the matrix.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use log::{debug, info};

use crate::cluster::{
    ClusterAssignment, ClusterBuilder, ClusterExtender, HalfMatchFinder, MatchMatrixFinder,
    PrimaryClusterFinder,
};
use crate::config::{ClusteringConfig, PrimaryStrategy};
use crate::distance::{DistanceMetric, OverlapWeightedEuclidean};
use crate::error::{Error, Result};
use crate::hierarchy::{Dendrogram, Forest, NodeId};
use crate::matches::{rank_matches, ClusterableMatch, Match};
use crate::matrix::{AppearanceWeightedBuilder, Matrix};
use crate::progress::{NoProgress, Progress, ProgressEvent};

/// Everything a renderer needs from a run.
#[derive(Debug, Clone)]
pub struct ClusteringResult {
    /// Arena holding the tree.
    pub forest: Forest,
    /// Top-level node: one for a successful run, none for empty input.
    pub roots: Vec<NodeId>,
    /// Correlation matrix, including rows for extended matches.
    pub matrix: Matrix,
    /// Final primary clusters.
    pub assignment: ClusterAssignment,
    /// Cluster number → below-cutoff matches added by extension.
    pub extended: BTreeMap<usize, Vec<usize>>,
    /// Merges of the main build, in order.
    pub dendrogram: Dendrogram,
}

impl ClusteringResult {
    fn empty(matrix: Matrix) -> Self {
        Self {
            forest: Forest::new(),
            roots: Vec::new(),
            matrix,
            assignment: ClusterAssignment::default(),
            extended: BTreeMap::new(),
            dendrogram: Dendrogram::new(0),
        }
    }

    /// The root of the tree, if anything was clustered.
    pub fn root(&self) -> Option<NodeId> {
        self.roots.first().copied()
    }

    /// Whether nothing was clustered.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Match indexes in display order.
    pub fn ordered_indexes(&self) -> Vec<usize> {
        self.root()
            .map(|root| self.forest.ordered_indexes(root))
            .unwrap_or_default()
    }
}

/// Runs the full clustering flow with one configuration.
pub struct HierarchicalClustering<'a, M = OverlapWeightedEuclidean> {
    config: ClusteringConfig,
    metric: M,
    progress: &'a dyn Progress,
}

impl<'a> HierarchicalClustering<'a, OverlapWeightedEuclidean> {
    /// Create a run with the default distance metric.
    pub fn new(config: ClusteringConfig) -> Self {
        Self {
            config,
            metric: OverlapWeightedEuclidean,
            progress: &NoProgress,
        }
    }
}

impl<'a, M> HierarchicalClustering<'a, M>
where
    M: DistanceMetric,
{
    /// Use a different distance metric.
    pub fn with_metric<N: DistanceMetric>(self, metric: N) -> HierarchicalClustering<'a, N> {
        HierarchicalClustering {
            config: self.config,
            metric,
            progress: self.progress,
        }
    }

    /// Send progress events to `progress`.
    pub fn with_progress(mut self, progress: &'a dyn Progress) -> Self {
        self.progress = progress;
        self
    }

    /// The configuration in use.
    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    /// Rank raw matches and cluster them. `shared` maps a match id to the ids
    /// on its shared-match list.
    pub fn cluster_raw(
        &self,
        matches: Vec<Match>,
        shared: &HashMap<String, HashSet<String>>,
    ) -> Result<ClusteringResult> {
        self.cluster(&rank_matches(matches, shared))
    }

    /// Cluster ranked matches.
    pub fn cluster(&self, matches: &[ClusterableMatch]) -> Result<ClusteringResult> {
        let config = &self.config;
        config.validate()?;
        self.progress.report(ProgressEvent::Reset);

        if matches.is_empty() {
            debug!("no matches to cluster");
            return Ok(ClusteringResult::empty(Matrix::new(0)));
        }
        if let Some((_, m)) = matches.iter().enumerate().find(|(i, m)| m.index != *i) {
            return Err(Error::IndexOutOfRange {
                index: m.index,
                len: matches.len(),
            });
        }

        let immediate_family: HashSet<usize> = matches
            .iter()
            .filter(|m| m.shared_centimorgans() >= config.immediate_family_cm)
            .map(|m| m.index)
            .collect();
        let clusterable: Vec<ClusterableMatch> = matches
            .iter()
            .filter(|m| m.shared_centimorgans() >= config.min_clusterable_cm)
            .cloned()
            .collect();
        let excluded: Vec<Arc<ClusterableMatch>> = if config.extend_clusters {
            matches
                .iter()
                .filter(|m| {
                    let cm = m.shared_centimorgans();
                    cm < config.min_clusterable_cm && cm >= config.min_extension_cm && m.count() > 1
                })
                .map(|m| Arc::new(m.clone()))
                .collect()
        } else {
            Vec::new()
        };
        info!(
            "clustering {} of {} matches ({} immediate family, {} candidates for extension)",
            clusterable.len(),
            matches.len(),
            immediate_family.len(),
            excluded.len()
        );

        let matrix_builder = AppearanceWeightedBuilder::new(config.min_clusterable_cm)
            .with_max_gray_percent(config.max_gray_percent);
        let matrix = matrix_builder.correlate(&clusterable, &immediate_family);
        if clusterable.is_empty() {
            debug!("no match reaches {} cM", config.min_clusterable_cm);
            return Ok(ClusteringResult::empty(matrix));
        }

        let mut forest = Forest::with_leaf_capacity(clusterable.len());
        let leaves: Vec<NodeId> = clusterable
            .iter()
            .map(|m| forest.add_leaf(Arc::new(m.clone()), Arc::new(matrix.coords(m.index))))
            .collect();

        let outcome = ClusterBuilder::new(&self.metric)
            .with_max_neighbors(config.max_neighbors)
            .with_progress(self.progress)
            .build(&mut forest, &leaves)?;
        let mut root = outcome.root().ok_or(Error::EmptyInput)?;

        let non_distant: HashSet<usize> = clusterable.iter().map(|m| m.index).collect();
        let half_match = HalfMatchFinder::new(config.min_cluster_size);
        let mut extended = BTreeMap::new();
        let mut extended_assignment = None;

        if !excluded.is_empty() {
            let primary = half_match.find(&forest, root, &non_distant, &immediate_family)?;
            let extension = ClusterExtender::new(&self.metric, &matrix_builder, config.min_cluster_size)
                .with_max_neighbors(config.max_neighbors)
                .with_progress(self.progress)
                .extend(&mut forest, root, &matrix, &primary, &excluded)?;
            root = extension.root;
            extended = extension.extended;
            extended_assignment = Some(extension.assignment);
        }

        let assignment = match (config.strategy, extended_assignment) {
            (PrimaryStrategy::HalfMatch, Some(assignment)) => assignment,
            (PrimaryStrategy::HalfMatch, None) => {
                half_match.find(&forest, root, &non_distant, &immediate_family)?
            }
            (PrimaryStrategy::MatchMatrix, _) => MatchMatrixFinder::new(config.min_cluster_size, config.min_fill)?
                .find(&forest, root, &non_distant, &immediate_family)?,
        };
        info!(
            "{} primary clusters, {} matches added by extension",
            assignment.len(),
            extended.values().map(Vec::len).sum::<usize>()
        );

        Ok(ClusteringResult {
            forest,
            roots: vec![root],
            matrix,
            assignment,
            extended,
            dendrogram: outcome.dendrogram,
        })
    }
}
