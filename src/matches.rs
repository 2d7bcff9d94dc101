//! DNA matches as the clustering core sees them.
//!
//! A loader hands the core a list of [`Match`]es plus, per match, the set of
//! other matches on its shared-match ("in common with") list. The core works
//! on [`ClusterableMatch`]: the same match with a dense rank `index` (by
//! descending shared cM) and its shared-match list as a set of indexes.
//!
//! [`rank_matches`] performs that conversion; [`validate_matches`] reports
//! invariant violations and data-quality problems (asymmetric lists,
//! disconnected groups) without failing.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};

use crate::hierarchy::{Severity, ValidationIssue, ValidationReport};

/// One DNA match as produced by a loader.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Match {
    /// Stable identity (the provider's test GUID).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Shared centimorgans; the primary ranking key.
    pub shared_centimorgans: f64,
    /// Number of shared segments.
    pub shared_segments: u32,
    /// Size of the match's linked tree, if any.
    pub tree_size: Option<u32>,
    /// Whether the user starred this match.
    pub starred: bool,
    /// Free-form user note.
    pub note: Option<String>,
}

impl Match {
    /// Create a match with an id, a name, and a shared cM value.
    pub fn new(id: impl Into<String>, name: impl Into<String>, shared_centimorgans: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            shared_centimorgans,
            ..Default::default()
        }
    }

    /// Set the number of shared segments.
    pub fn with_segments(mut self, segments: u32) -> Self {
        self.shared_segments = segments;
        self
    }
}

/// A match ranked for clustering.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterableMatch {
    /// Dense, zero-based rank by descending shared cM.
    pub index: usize,
    /// The underlying match.
    pub matched: Arc<Match>,
    /// Indexes of every match on this match's shared-match list, itself included.
    pub coords: BTreeSet<usize>,
}

impl ClusterableMatch {
    /// Create a clusterable match. `index` is always added to `coords`.
    pub fn new(index: usize, matched: Arc<Match>, coords: impl IntoIterator<Item = usize>) -> Self {
        let mut coords: BTreeSet<usize> = coords.into_iter().collect();
        let _ = coords.insert(index);
        Self {
            index,
            matched,
            coords,
        }
    }

    /// Number of entries on the shared-match list (including itself).
    pub fn count(&self) -> usize {
        self.coords.len()
    }

    /// Shared centimorgans of the underlying match.
    pub fn shared_centimorgans(&self) -> f64 {
        self.matched.shared_centimorgans
    }

    /// Largest index referenced by this match (itself or a coordinate).
    pub fn max_index(&self) -> usize {
        self.coords
            .last()
            .copied()
            .map_or(self.index, |c| c.max(self.index))
    }
}

/// Rank matches by descending shared cM and translate shared-match lists to indexes.
///
/// Ties keep input order. Ids on a shared-match list that are not themselves
/// loaded are dropped. Every match is added to its own list.
pub fn rank_matches(
    matches: Vec<Match>,
    shared: &HashMap<String, HashSet<String>>,
) -> Vec<ClusterableMatch> {
    let mut matches = matches;
    matches.sort_by(|a, b| b.shared_centimorgans.total_cmp(&a.shared_centimorgans));

    let index_of: HashMap<&str, usize> = matches
        .iter()
        .enumerate()
        .map(|(i, m)| (m.id.as_str(), i))
        .collect();

    let coords: Vec<BTreeSet<usize>> = matches
        .iter()
        .map(|m| {
            shared
                .get(&m.id)
                .map(|ids| {
                    ids.iter()
                        .filter_map(|id| index_of.get(id.as_str()).copied())
                        .collect()
                })
                .unwrap_or_default()
        })
        .collect();

    matches
        .into_iter()
        .zip(coords)
        .enumerate()
        .map(|(index, (m, c))| ClusterableMatch::new(index, Arc::new(m), c))
        .collect()
}

/// Pairs `(a, b)` where `a` lists `b` but `b` does not list `a`.
///
/// Only pairs where both matches are present are reported. Output is sorted.
pub fn asymmetric_pairs(matches: &[ClusterableMatch]) -> Vec<(usize, usize)> {
    let by_index: HashMap<usize, &ClusterableMatch> =
        matches.iter().map(|m| (m.index, m)).collect();

    let mut pairs: Vec<(usize, usize)> = matches
        .iter()
        .flat_map(|m| {
            let by_index = &by_index;
            m.coords.iter().filter_map(move |&c| {
                if c == m.index {
                    return None;
                }
                let other = by_index.get(&c)?;
                (!other.coords.contains(&m.index)).then_some((m.index, c))
            })
        })
        .collect();
    pairs.sort_unstable();
    pairs
}

/// Check the loader invariants and report data-quality issues.
///
/// - Non-dense or duplicate indexes, missing self-membership, and orphan
///   coordinates are errors (the core tolerates them, but results degrade).
/// - Asymmetric shared-match lists are warnings.
/// - The number of disconnected shared-match groups is informational.
pub fn validate_matches(matches: &[ClusterableMatch]) -> ValidationReport {
    let mut report = ValidationReport::new();
    let n = matches.len();

    if n == 0 {
        report.info("no matches to validate");
        return report;
    }

    let mut seen = vec![false; n];
    for m in matches {
        if m.index >= n {
            report.add(
                ValidationIssue::new(Severity::Error, "match index outside the dense range")
                    .with_node(m.index)
                    .with_context(format!("{} matches loaded", n)),
            );
        } else if seen[m.index] {
            report.add(
                ValidationIssue::new(Severity::Error, "duplicate match index").with_node(m.index),
            );
        } else {
            seen[m.index] = true;
        }

        if !m.coords.contains(&m.index) {
            report.add(
                ValidationIssue::new(Severity::Error, "match is missing from its own shared-match list")
                    .with_node(m.index),
            );
        }

        let orphans: Vec<usize> = m.coords.iter().copied().filter(|&c| c >= n).collect();
        if !orphans.is_empty() {
            report.add(
                ValidationIssue::new(
                    Severity::Error,
                    format!("{} orphan shared-match coordinates", orphans.len()),
                )
                .with_node(m.index)
                .with_context(format!("first few: {:?}", &orphans[..orphans.len().min(5)])),
            );
        }
    }

    let gaps = seen.iter().filter(|s| !**s).count();
    if gaps > 0 {
        report.error(format!("{gaps} indexes in 0..{n} are not assigned to any match"));
    }

    let asymmetric = asymmetric_pairs(matches);
    if !asymmetric.is_empty() {
        report.add(
            ValidationIssue::new(
                Severity::Warning,
                format!("{} asymmetric shared-match pairs", asymmetric.len()),
            )
            .with_context(format!(
                "first few: {:?}",
                &asymmetric[..asymmetric.len().min(5)]
            )),
        );
    }

    let mut graph = UnGraph::<(), ()>::with_capacity(n, 0);
    for _ in 0..n {
        let _ = graph.add_node(());
    }
    for m in matches.iter().filter(|m| m.index < n) {
        for &c in m.coords.iter().filter(|&&c| c < n && c != m.index) {
            let _ = graph.add_edge(NodeIndex::new(m.index), NodeIndex::new(c), ());
        }
    }
    let components = connected_components(&graph);
    if components > 1 {
        report.info(format!("shared-match graph has {components} disconnected groups"));
    }

    report
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn m(id: &str, cm: f64) -> Match {
        Match::new(id, id.to_uppercase(), cm)
    }

    fn shared(pairs: &[(&str, &[&str])]) -> HashMap<String, HashSet<String>> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    #[test]
    fn ranking_sorts_by_descending_cm_and_keeps_ties_stable() {
        let matches = vec![m("a", 30.0), m("b", 90.0), m("c", 30.0), m("d", 45.0)];
        let ranked = rank_matches(matches, &HashMap::new());
        let ids: Vec<&str> = ranked.iter().map(|c| c.matched.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "a", "c"]);
        for (i, c) in ranked.iter().enumerate() {
            assert_eq!(c.index, i);
            assert!(c.coords.contains(&i));
        }
    }

    #[test]
    fn ranking_drops_orphans() {
        let matches = vec![m("a", 50.0), m("b", 40.0)];
        let icw = shared(&[("a", &["b", "zz"]), ("b", &["a"])]);
        let ranked = rank_matches(matches, &icw);
        assert_eq!(ranked[0].coords, BTreeSet::from([0, 1]));
        assert_eq!(ranked[1].coords, BTreeSet::from([0, 1]));
        assert_eq!(ranked[0].count(), 2);
    }

    #[test]
    fn asymmetric_pairs_are_reported() {
        let base = Arc::new(m("x", 10.0));
        let matches = vec![
            ClusterableMatch::new(0, base.clone(), [1, 2]),
            ClusterableMatch::new(1, base.clone(), [0]),
            ClusterableMatch::new(2, base, []),
        ];
        assert_eq!(asymmetric_pairs(&matches), vec![(0, 2)]);

        let report = validate_matches(&matches);
        assert!(report.is_healthy());
        assert!(report.issues.iter().any(|i| i.message.contains("asymmetric")));
    }

    #[test]
    fn validation_flags_broken_invariants() {
        let base = Arc::new(m("x", 10.0));
        let mut missing_self = ClusterableMatch::new(0, base.clone(), [1]);
        let _ = missing_self.coords.remove(&0);
        let matches = vec![
            missing_self,
            ClusterableMatch::new(1, base.clone(), [0, 7]),
            ClusterableMatch::new(1, base, []),
        ];
        let report = validate_matches(&matches);
        assert!(!report.is_healthy());
        let text = report.to_string();
        assert!(text.contains("own shared-match list"));
        assert!(text.contains("orphan"));
        assert!(text.contains("duplicate"));
    }

    #[test]
    fn validation_counts_disconnected_groups() {
        let base = Arc::new(m("x", 10.0));
        let matches = vec![
            ClusterableMatch::new(0, base.clone(), [1]),
            ClusterableMatch::new(1, base.clone(), [0]),
            ClusterableMatch::new(2, base.clone(), [3]),
            ClusterableMatch::new(3, base, [2]),
        ];
        let report = validate_matches(&matches);
        assert!(!report.is_clean());
        assert!(report
            .issues
            .iter()
            .any(|i| i.message.contains("2 disconnected groups")));
    }
}
