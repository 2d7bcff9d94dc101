//! Cluster extension with matches below the clustering cutoff.
//!
//! A low-cM match is too noisy to cluster on its own, but if most of its
//! shared matches sit in one primary cluster it very likely belongs there.
//! For every such cluster the extender:
//!
//! 1. copies the cluster's matrix rows and adds rows for the newcomers;
//! 2. re-clusters the cluster's leaves plus the newcomers in a private forest;
//! 3. grafts the new subtree in place of the old one.
//!
//! Step 2 runs in parallel across clusters. Leaves that already existed keep
//! their node identity through the graft.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::{debug, info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::builder::{ClusterBuilder, DEFAULT_MAX_NEIGHBORS};
use super::primary::ClusterAssignment;
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::hierarchy::{Forest, NodeId};
use crate::matches::ClusterableMatch;
use crate::matrix::{AppearanceWeightedBuilder, Matrix};
use crate::progress::{NoProgress, Progress, ProgressEvent};

/// Result of an extension pass.
#[derive(Debug, Clone)]
pub struct ExtensionOutcome {
    /// Root of the tree after grafting (changes only if the old root was replaced).
    pub root: NodeId,
    /// Primary clusters recomputed over the extended tree.
    pub assignment: ClusterAssignment,
    /// Cluster number → match indexes added to it.
    pub extended: BTreeMap<usize, Vec<usize>>,
}

/// Adds excluded matches to their best-fitting primary clusters.
pub struct ClusterExtender<'a, M: ?Sized> {
    metric: &'a M,
    matrix_builder: &'a AppearanceWeightedBuilder,
    min_cluster_size: usize,
    max_neighbors: usize,
    progress: &'a dyn Progress,
}

struct Job {
    number: usize,
    node: NodeId,
    originals: Vec<(NodeId, Arc<ClusterableMatch>)>,
    newcomers: Vec<Arc<ClusterableMatch>>,
}

struct Regrown {
    number: usize,
    node: NodeId,
    forest: Forest,
    root: NodeId,
    existing: HashMap<NodeId, NodeId>,
    newcomers: Vec<Arc<ClusterableMatch>>,
}

impl<'a, M> ClusterExtender<'a, M>
where
    M: DistanceMetric + ?Sized,
{
    /// Create an extender. Overlap with a cluster must reach `min_cluster_size`.
    pub fn new(metric: &'a M, matrix_builder: &'a AppearanceWeightedBuilder, min_cluster_size: usize) -> Self {
        Self {
            metric,
            matrix_builder,
            min_cluster_size,
            max_neighbors: DEFAULT_MAX_NEIGHBORS,
            progress: &NoProgress,
        }
    }

    /// Set the neighbor cache size used when re-clustering.
    pub fn with_max_neighbors(mut self, max: usize) -> Self {
        self.max_neighbors = max;
        self
    }

    /// Report one increment per extended cluster to `progress`.
    pub fn with_progress(mut self, progress: &'a dyn Progress) -> Self {
        self.progress = progress;
        self
    }

    /// Best cluster for each excluded match, grouped by cluster number.
    ///
    /// A match goes to the cluster holding the most of its shared matches
    /// (lower number on ties), if that overlap reaches `min_cluster_size`.
    pub fn assign(
        &self,
        assignment: &ClusterAssignment,
        excluded: &[Arc<ClusterableMatch>],
    ) -> BTreeMap<usize, Vec<Arc<ClusterableMatch>>> {
        let mut groups: BTreeMap<usize, Vec<Arc<ClusterableMatch>>> = BTreeMap::new();
        for m in excluded {
            let mut overlap: BTreeMap<usize, usize> = BTreeMap::new();
            for &c in m.coords.iter().filter(|&&c| c != m.index) {
                for &number in assignment.clusters_of(c) {
                    *overlap.entry(number).or_default() += 1;
                }
            }
            let best = overlap
                .into_iter()
                .fold(None, |best: Option<(usize, usize)>, (number, count)| match best {
                    Some((_, top)) if top >= count => best,
                    _ => Some((number, count)),
                });
            if let Some((number, count)) = best {
                if count >= self.min_cluster_size {
                    groups.entry(number).or_default().push(Arc::clone(m));
                }
            }
        }
        groups
    }

    /// Extend the clusters of the tree at `root` with `excluded` matches.
    ///
    /// `assignment` must come from a strategy that reports subtree nodes
    /// (half-match). `matrix` is extended in place with the added matches.
    pub fn extend(
        &self,
        forest: &mut Forest,
        root: NodeId,
        matrix: &Matrix,
        assignment: &ClusterAssignment,
        excluded: &[Arc<ClusterableMatch>],
    ) -> Result<ExtensionOutcome> {
        let _ = forest.node(root)?;
        let groups = self.assign(assignment, excluded);
        if groups.is_empty() {
            debug!("no excluded match fits an existing cluster");
            return Ok(ExtensionOutcome {
                root,
                assignment: assignment.clone(),
                extended: BTreeMap::new(),
            });
        }

        let mut jobs = Vec::with_capacity(groups.len());
        for (number, newcomers) in groups {
            let Some(node) = assignment.cluster(number).and_then(|c| c.node) else {
                warn!("cluster {number} is not a subtree, skipping extension");
                continue;
            };
            let originals = forest
                .ordered_leaves(node)
                .into_iter()
                .filter_map(|leaf| {
                    let matched = forest.node(leaf).ok()?.as_leaf()?.matched.clone();
                    Some((leaf, matched))
                })
                .collect();
            jobs.push(Job {
                number,
                node,
                originals,
                newcomers,
            });
        }

        let total: usize = jobs.iter().map(|j| j.newcomers.len()).sum();
        info!("extending {} clusters with {} matches", jobs.len(), total);
        self.progress.report(ProgressEvent::Describe {
            description: "Extending clusters".to_string(),
            maximum: jobs.len(),
        });

        let max_index = matrix.width().saturating_sub(1);

        #[cfg(feature = "parallel")]
        let regrown: Vec<Regrown> = jobs
            .into_par_iter()
            .map(|job| self.regrow(matrix, job, max_index))
            .collect::<Result<_>>()?;
        #[cfg(not(feature = "parallel"))]
        let regrown: Vec<Regrown> = jobs
            .into_iter()
            .map(|job| self.regrow(matrix, job, max_index))
            .collect::<Result<_>>()?;

        let mut root = root;
        let mut nodes: BTreeMap<usize, NodeId> = assignment
            .clusters()
            .iter()
            .filter_map(|c| c.node.map(|n| (c.number, n)))
            .collect();
        let mut extended = BTreeMap::new();
        let mut newcomers = Vec::new();

        for job in regrown {
            let retired = forest.ordered_clusters(job.node);
            let parent = forest.node(job.node)?.parent();
            let grafted = forest.graft(&job.forest, job.root, &job.existing);
            match parent {
                Some(parent) => forest.replace_child(parent, job.node, grafted)?,
                None if job.node == root => root = grafted,
                None => return Err(Error::UnknownNode(job.node.index())),
            }
            forest.retire(&retired);

            debug!(
                "cluster {} regrown with {} new matches",
                job.number,
                job.newcomers.len()
            );
            let _ = nodes.insert(job.number, grafted);
            let _ = extended.insert(job.number, job.newcomers.iter().map(|m| m.index).collect());
            newcomers.extend(job.newcomers.iter().map(|m| (**m).clone()));
            self.progress.report(ProgressEvent::Increment(1));
        }

        self.matrix_builder.extend_matrix(matrix, &newcomers, max_index);

        let nodes: Vec<NodeId> = nodes.into_values().collect();
        let assignment = ClusterAssignment::from_nodes(forest, root, &nodes);
        Ok(ExtensionOutcome {
            root,
            assignment,
            extended,
        })
    }

    /// Re-cluster one cluster with its newcomers in a private forest.
    fn regrow(&self, matrix: &Matrix, job: Job, max_index: usize) -> Result<Regrown> {
        let sub = matrix.subset(job.originals.iter().map(|(_, m)| m.index));
        let newcomers: Vec<ClusterableMatch> = job.newcomers.iter().map(|m| (**m).clone()).collect();
        self.matrix_builder.extend_matrix(&sub, &newcomers, max_index);

        let mut forest = Forest::with_leaf_capacity(job.originals.len() + newcomers.len());
        let mut existing = HashMap::with_capacity(job.originals.len());
        let mut leaves = Vec::with_capacity(job.originals.len() + newcomers.len());

        for (original, matched) in &job.originals {
            let coords = Arc::new(sub.coords(matched.index));
            let leaf = forest.add_leaf(Arc::clone(matched), coords);
            let _ = existing.insert(leaf, *original);
            leaves.push(leaf);
        }
        for matched in &job.newcomers {
            let coords = Arc::new(sub.coords(matched.index));
            leaves.push(forest.add_leaf(Arc::clone(matched), coords));
        }

        let outcome = ClusterBuilder::new(self.metric)
            .with_max_neighbors(self.max_neighbors)
            .build(&mut forest, &leaves)?;
        let root = outcome.root().ok_or(Error::EmptyInput)?;

        Ok(Regrown {
            number: job.number,
            node: job.node,
            forest,
            root,
            existing,
            newcomers: job.newcomers,
        })
    }
}
