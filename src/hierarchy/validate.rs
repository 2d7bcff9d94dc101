//! Tree validation and health checking utilities.
//!
//! Provides tools to verify forest integrity and detect common issues:
//! - Orphaned nodes (no parent connection)
//! - Cycles in the tree
//! - Missing children references
//! - Leaf counts or boundary leaves that disagree with the children
//!
//! # Example
//!
//! ```rust,ignore
//! use icwcluster::hierarchy::HealthCheck;
//!
//! let report = result.forest.health_check();
//! if !report.is_healthy() {
//!     for issue in report.validation.issues {
//!         eprintln!("{}", issue);
//!     }
//! }
//! ```

use std::collections::{HashMap, HashSet};

use super::{Forest, NodeKind};

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational, not a problem.
    Info,
    /// Something unusual but not necessarily wrong.
    Warning,
    /// A problem that should be fixed.
    Error,
    /// A critical issue that may cause failures.
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A single validation issue.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity of the issue.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Node (or match index) involved, if any.
    pub node_id: Option<usize>,
    /// Optional additional context.
    pub context: Option<String>,
}

impl ValidationIssue {
    /// Create a new validation issue.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            node_id: None,
            context: None,
        }
    }

    /// Add a node ID to this issue.
    pub fn with_node(mut self, id: usize) -> Self {
        self.node_id = Some(id);
        self
    }

    /// Add context to this issue.
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context = Some(ctx.into());
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)?;
        if let Some(id) = self.node_id {
            write!(f, " (node {})", id)?;
        }
        if let Some(ctx) = &self.context {
            write!(f, " - {}", ctx)?;
        }
        Ok(())
    }
}

/// Report from a validation/health check.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// All issues found.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    /// Add an issue to the report.
    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Add an info-level issue.
    pub fn info(&mut self, message: impl Into<String>) {
        self.add(ValidationIssue::new(Severity::Info, message));
    }

    /// Add a warning-level issue.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.add(ValidationIssue::new(Severity::Warning, message));
    }

    /// Add an error-level issue.
    pub fn error(&mut self, message: impl Into<String>) {
        self.add(ValidationIssue::new(Severity::Error, message));
    }

    /// Add a critical-level issue.
    pub fn critical(&mut self, message: impl Into<String>) {
        self.add(ValidationIssue::new(Severity::Critical, message));
    }

    /// Check if the report contains no errors or critical issues.
    pub fn is_healthy(&self) -> bool {
        !self.issues.iter().any(|i| i.severity >= Severity::Error)
    }

    /// Check if there are any issues at all.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Get issues of a specific severity or higher.
    pub fn issues_at_level(&self, min_severity: Severity) -> Vec<&ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity >= min_severity)
            .collect()
    }

    /// Count issues by severity.
    pub fn counts(&self) -> HashMap<Severity, usize> {
        let mut counts = HashMap::new();
        for issue in &self.issues {
            *counts.entry(issue.severity).or_default() += 1;
        }
        counts
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_clean() {
            return write!(f, "Validation passed: no issues found");
        }

        let counts = self.counts();
        write!(f, "Validation report: ")?;

        let parts: Vec<String> = [
            (Severity::Critical, "critical"),
            (Severity::Error, "errors"),
            (Severity::Warning, "warnings"),
            (Severity::Info, "info"),
        ]
        .iter()
        .filter_map(|(sev, name)| counts.get(sev).map(|c| format!("{} {}", c, name)))
        .collect();

        writeln!(f, "{}", parts.join(", "))?;

        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }

        Ok(())
    }
}

/// Health report with forest statistics.
#[derive(Debug, Clone)]
pub struct HealthReport {
    /// Validation issues.
    pub validation: ValidationReport,
    /// Number of live nodes.
    pub node_count: usize,
    /// Number of leaves.
    pub leaf_count: usize,
    /// Number of top-level nodes.
    pub root_count: usize,
    /// Deepest leaf, counted in edges from its root.
    pub max_depth: usize,
}

impl HealthReport {
    /// Check if the forest is healthy (no errors or critical issues).
    pub fn is_healthy(&self) -> bool {
        self.validation.is_healthy()
    }
}

impl std::fmt::Display for HealthReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Forest Health Report")?;
        writeln!(f, "====================")?;
        writeln!(f, "Nodes: {} ({} leaves)", self.node_count, self.leaf_count)?;
        writeln!(f, "Roots: {}", self.root_count)?;
        writeln!(f, "Max depth: {}", self.max_depth)?;
        writeln!(f)?;
        write!(f, "{}", self.validation)
    }
}

/// Trait for types that can be health-checked.
pub trait HealthCheck {
    /// Perform a health check and return a report.
    fn health_check(&self) -> HealthReport;

    /// Quick check: returns true if healthy.
    fn is_healthy(&self) -> bool {
        self.health_check().is_healthy()
    }
}

impl HealthCheck for Forest {
    fn health_check(&self) -> HealthReport {
        let mut parents: HashMap<usize, usize> = HashMap::new();
        let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
        let live: HashSet<usize> = self.iter().map(|n| n.id().index()).collect();

        for node in self.iter() {
            if let Some(parent) = node.parent() {
                let _ = parents.insert(node.id().index(), parent.index());
            }
            if let NodeKind::Cluster(cluster) = node.kind() {
                let _ = children.insert(
                    node.id().index(),
                    vec![cluster.first.index(), cluster.second.index()],
                );
            }
        }

        let mut validation = validate_tree_structure(&parents, &children, &live);

        for node in self.iter() {
            let NodeKind::Cluster(cluster) = node.kind() else {
                continue;
            };
            let (Some(first), Some(second)) = (self.get(cluster.first), self.get(cluster.second))
            else {
                validation.add(
                    ValidationIssue::new(Severity::Error, "child id does not exist")
                        .with_node(node.id().index()),
                );
                continue;
            };

            if first.num_children() + second.num_children() != node.num_children() {
                validation.add(
                    ValidationIssue::new(Severity::Error, "leaf count differs from children")
                        .with_node(node.id().index())
                        .with_context(format!(
                            "{} != {} + {}",
                            node.num_children(),
                            first.num_children(),
                            second.num_children()
                        )),
                );
            }

            for child in [first, second] {
                if child.parent() != Some(node.id()) {
                    validation.add(
                        ValidationIssue::new(Severity::Error, "child does not point back to parent")
                            .with_node(child.id().index())
                            .with_context(format!("parent {}", node.id())),
                    );
                }
            }
        }

        let roots = self.roots();
        let mut seen_matches: HashSet<usize> = HashSet::new();
        let mut max_depth = 0;
        for &root in &roots {
            let order = self.ordered_leaves(root);
            let node = self.at(root);
            if order.first() != Some(&node.first_leaf()) || order.last() != Some(&node.second_leaf()) {
                validation.add(
                    ValidationIssue::new(
                        Severity::Error,
                        "boundary leaves differ from rendered order",
                    )
                    .with_node(root.index()),
                );
            }
            if order.len() != node.num_children() {
                validation.add(
                    ValidationIssue::new(Severity::Error, "leaf count differs from rendered leaves")
                        .with_node(root.index()),
                );
            }
            for leaf in order {
                if let Some(index) = self.match_index(leaf) {
                    if !seen_matches.insert(index) {
                        validation.add(
                            ValidationIssue::new(Severity::Error, "match appears in more than one leaf")
                                .with_node(index),
                        );
                    }
                }
                let mut depth = 0;
                let mut current = leaf;
                while let Some(parent) = self.at(current).parent() {
                    depth += 1;
                    current = parent;
                }
                max_depth = max_depth.max(depth);
            }
        }

        HealthReport {
            validation,
            node_count: live.len(),
            leaf_count: self.iter().filter(|n| n.is_leaf()).count(),
            root_count: roots.len(),
            max_depth,
        }
    }
}

/// Validate that a parent-child relationship forms a proper tree.
///
/// # Arguments
/// * `parents` - Map from node ID to parent ID (roots have no entry)
/// * `children` - Map from node ID to child IDs
/// * `nodes` - IDs of every node that should be part of the structure
///
/// # Returns
/// A validation report with any issues found.
pub fn validate_tree_structure(
    parents: &HashMap<usize, usize>,
    children: &HashMap<usize, Vec<usize>>,
    nodes: &HashSet<usize>,
) -> ValidationReport {
    let mut report = ValidationReport::new();

    let nodes_with_parents: HashSet<usize> = parents.keys().copied().collect();
    let mut roots: Vec<usize> = nodes.difference(&nodes_with_parents).copied().collect();
    roots.sort_unstable();

    if roots.is_empty() && !nodes.is_empty() {
        report.critical("No root node found - tree has cycles");
    } else if roots.len() > 1 {
        report.info(format!("{} roots found", roots.len()));
    }

    let mut reachable = HashSet::new();
    let mut stack = roots.clone();

    while let Some(node) = stack.pop() {
        if reachable.insert(node) {
            if let Some(node_children) = children.get(&node) {
                stack.extend(node_children);
            }
        }
    }

    let mut orphans: Vec<usize> = nodes.difference(&reachable).copied().collect();
    orphans.sort_unstable();
    if !orphans.is_empty() {
        report.add(
            ValidationIssue::new(
                Severity::Error,
                format!("{} orphaned nodes not reachable from root", orphans.len()),
            )
            .with_context(format!("first few: {:?}", &orphans[..orphans.len().min(5)])),
        );
    }

    for (child, parent) in parents {
        if let Some(parent_children) = children.get(parent) {
            if !parent_children.contains(child) {
                report.add(
                    ValidationIssue::new(
                        Severity::Error,
                        "Parent-child inconsistency: child claims parent but parent doesn't list child",
                    )
                    .with_node(*child)
                    .with_context(format!("parent: {}", parent)),
                );
            }
        } else {
            report.add(
                ValidationIssue::new(Severity::Error, "Parent node has no children list")
                    .with_node(*parent),
            );
        }
    }

    // Iterative DFS with an explicit path set; deep chains are common here.
    let mut visited: HashSet<usize> = HashSet::new();
    'roots: for &root in &roots {
        let mut in_path: HashSet<usize> = HashSet::new();
        let mut stack: Vec<(usize, bool)> = vec![(root, false)];
        while let Some((node, exiting)) = stack.pop() {
            if exiting {
                let _ = in_path.remove(&node);
                continue;
            }
            if in_path.contains(&node) {
                report.critical("Cycle detected in tree structure");
                break 'roots;
            }
            if !visited.insert(node) {
                continue;
            }
            let _ = in_path.insert(node);
            stack.push((node, true));
            if let Some(node_children) = children.get(&node) {
                stack.extend(node_children.iter().map(|&c| (c, false)));
            }
        }
    }

    report
}

#[cfg(test)]
#[allow(clippy::unwrap_used, unused_results)]
mod tests {
    use super::*;
    use crate::distance::OverlapWeightedEuclidean;
    use crate::hierarchy::NodeId;
    use crate::matches::{ClusterableMatch, Match};
    use crate::matrix::SparseCoords;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn forest_of(n: usize) -> (Forest, Vec<NodeId>) {
        let mut forest = Forest::new();
        let ids = (0..n)
            .map(|i| {
                let m = Arc::new(Match::new(format!("m{i}"), format!("M{i}"), 30.0));
                let cm = Arc::new(ClusterableMatch::new(i, m, [i + 1]));
                let coords = SparseCoords::from_pairs([(i, 1.0), (i + 1, 1.0)]);
                forest.add_leaf(cm, Arc::new(coords))
            })
            .collect();
        (forest, ids)
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
    }

    #[test]
    fn test_validation_report_healthy() {
        let mut report = ValidationReport::new();
        report.info("Just some info");
        report.warn("A warning");

        assert!(report.is_healthy());

        report.error("An error");
        assert!(!report.is_healthy());
    }

    #[test]
    fn test_validation_issue_display() {
        let issue = ValidationIssue::new(Severity::Error, "Something wrong")
            .with_node(42)
            .with_context("additional info");

        let s = format!("{}", issue);
        assert!(s.contains("ERROR"));
        assert!(s.contains("Something wrong"));
        assert!(s.contains("42"));
        assert!(s.contains("additional info"));
    }

    #[test]
    fn test_validate_valid_tree() {
        let parents: HashMap<usize, usize> = [(1, 0), (2, 0)].into_iter().collect();
        let children: HashMap<usize, Vec<usize>> = [(0, vec![1, 2])].into_iter().collect();
        let nodes: HashSet<usize> = (0..3).collect();

        let report = validate_tree_structure(&parents, &children, &nodes);
        assert!(report.is_healthy());
    }

    #[test]
    fn test_validate_orphaned_nodes() {
        // Root 0 stands alone; 1 and 2 form a cycle nobody can reach.
        let parents: HashMap<usize, usize> = [(1, 2), (2, 1)].into_iter().collect();
        let children: HashMap<usize, Vec<usize>> =
            [(1, vec![2]), (2, vec![1])].into_iter().collect();
        let nodes: HashSet<usize> = (0..3).collect();

        let report = validate_tree_structure(&parents, &children, &nodes);
        assert!(!report.is_healthy());
        assert!(report.issues.iter().any(|i| i.message.contains("orphaned")));
    }

    #[test]
    fn test_validate_multiple_roots() {
        let parents: HashMap<usize, usize> = [(1, 0), (3, 2)].into_iter().collect();
        let children: HashMap<usize, Vec<usize>> =
            [(0, vec![1]), (2, vec![3])].into_iter().collect();
        let nodes: HashSet<usize> = (0..4).collect();

        let report = validate_tree_structure(&parents, &children, &nodes);
        assert!(report.is_healthy());
        assert!(report.issues.iter().any(|i| i.message.contains("roots")));
    }

    #[test]
    fn forest_health_check_is_healthy_for_chain() {
        let (mut forest, ids) = forest_of(5);
        let m = OverlapWeightedEuclidean;
        let mut top = ids[0];
        for &id in &ids[1..] {
            top = forest.merge(top, id, 1.0, &m);
        }
        let report = forest.health_check();
        assert!(report.is_healthy(), "{}", report);
        assert_eq!(report.leaf_count, 5);
        assert_eq!(report.root_count, 1);
        assert_eq!(report.max_depth, 4);
    }

    #[test]
    fn forest_health_check_flags_broken_counts() {
        let (mut forest, ids) = forest_of(2);
        let root = forest.merge(ids[0], ids[1], 0.5, &OverlapWeightedEuclidean);
        forest.at_mut(root).num_children = 3;
        let report = forest.health_check();
        assert!(!report.is_healthy());
    }

    proptest! {
        #[test]
        fn forest_health_check_is_healthy_for_arbitrary_merges(
            n in 2usize..30,
            picks in proptest::collection::vec((0usize..1000, 0usize..1000), 0..30),
        ) {
            let (mut forest, ids) = forest_of(n);
            let m = OverlapWeightedEuclidean;
            let mut tops = ids;
            for (a, b) in picks {
                if tops.len() < 2 {
                    break;
                }
                let i = a % tops.len();
                let first = tops.remove(i);
                let j = b % tops.len();
                let second = tops.remove(j);
                tops.push(forest.merge(first, second, 1.0, &m));
            }

            let report = forest.health_check();
            prop_assert!(report.is_healthy(), "{}", report);
            prop_assert_eq!(report.root_count, tops.len());
            prop_assert_eq!(report.leaf_count, n);
        }
    }
}
