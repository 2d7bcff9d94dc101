//! Appearance-weighted correlation.
//!
//! # Direct evidence
//!
//! If match M lists C as a shared match, `matrix[M][C] = DIRECT_WEIGHT`.
//! Every match lists itself, so the diagonal is always direct.
//!
//! # Indirect evidence
//!
//! Two matches that keep showing up on the *same* lists are probably
//! related, even if neither lists the other. For every contributing list S
//! and every ordered pair (C1, C2) of distinct entries of S we count one
//! co-occurrence, then normalize by how often C1 appears at all:
//!
//! ```text
//! indirect[C1][C2] = INDIRECT_SCALE × cooccur(C1, C2) / appearances(C1)
//! ```
//!
//! A coordinate that appears on nearly every list (a parent, a prolific
//! cousin) therefore contributes little per co-occurrence, while a rare
//! co-occurrence carries real information. Values are capped at
//! [`INDIRECT_CAP`] so indirect evidence can never outweigh a direct link.
//!
//! Only lists of matches at or above the clustering cutoff contribute, and
//! immediate family lists are skipped entirely: a parent shares with nearly
//! everyone and would swamp the diagram.
//!
//! Co-occurrences are counted as integers, so the result does not depend on
//! the order in which parallel workers visit the lists.

use std::collections::{HashMap, HashSet};

use dashmap::DashMap;
use log::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::Matrix;
use crate::matches::ClusterableMatch;

/// Weight of a confirmed shared-match relationship.
pub const DIRECT_WEIGHT: f64 = 1.0;
/// Scale applied to the normalized co-occurrence rate.
pub const INDIRECT_SCALE: f64 = 0.5;
/// Upper bound for indirect weights.
pub const INDIRECT_CAP: f64 = DIRECT_WEIGHT / 2.0;

/// Builds a [`Matrix`] from shared-match lists.
#[derive(Debug, Clone)]
pub struct AppearanceWeightedBuilder {
    /// Lists of matches below this shared cM do not contribute indirect evidence.
    min_clusterable_cm: f64,
    /// Optional cap on the percentage of indirect-only cells.
    max_gray_percent: Option<f64>,
}

impl AppearanceWeightedBuilder {
    /// Create a builder with the given clustering cutoff.
    pub fn new(min_clusterable_cm: f64) -> Self {
        Self {
            min_clusterable_cm,
            max_gray_percent: None,
        }
    }

    /// Limit indirect-only cells to `percent` of the clusterable rows.
    pub fn with_max_gray_percent(mut self, percent: Option<f64>) -> Self {
        self.max_gray_percent = percent;
        self
    }

    /// Build the correlation matrix.
    ///
    /// `immediate_family` holds match indexes whose lists are excluded from
    /// indirect scoring. Empty input yields an empty matrix.
    ///
    /// The matrix spans the indexes of `matches` only: coordinates past the
    /// highest input index are dropped, so a long tail of low matches that
    /// were never correlated costs nothing. Use [`extend_matrix`] to bring
    /// such matches in later.
    ///
    /// [`extend_matrix`]: Self::extend_matrix
    pub fn correlate(
        &self,
        matches: &[ClusterableMatch],
        immediate_family: &HashSet<usize>,
    ) -> Matrix {
        let width = match matches.iter().map(|m| m.index).max() {
            Some(max) => max + 1,
            None => return Matrix::new(0),
        };
        let in_range = |c: &&usize| **c < width;

        let contributing: Vec<&ClusterableMatch> = matches
            .iter()
            .filter(|m| {
                m.shared_centimorgans() >= self.min_clusterable_cm
                    && !immediate_family.contains(&m.index)
            })
            .collect();

        let mut appearances: HashMap<usize, u32> = HashMap::new();
        for m in &contributing {
            for &c in m.coords.iter().filter(in_range) {
                *appearances.entry(c).or_default() += 1;
            }
        }

        let cooccurrence: DashMap<usize, HashMap<usize, u32>> = DashMap::new();
        let accumulate = |m: &&ClusterableMatch| {
            for &c1 in m.coords.iter().filter(in_range) {
                let mut row = cooccurrence.entry(c1).or_default();
                let counts = row.value_mut();
                for &c2 in m.coords.iter().filter(in_range).filter(|&&c2| c2 != c1) {
                    *counts.entry(c2).or_default() += 1;
                }
            }
        };

        #[cfg(feature = "parallel")]
        contributing.par_iter().for_each(accumulate);
        #[cfg(not(feature = "parallel"))]
        contributing.iter().for_each(accumulate);

        let matrix = Matrix::new(width);
        let counted: Vec<(usize, HashMap<usize, u32>)> = cooccurrence.into_iter().collect();
        let fill_indirect = |(c1, counts): &(usize, HashMap<usize, u32>)| {
            let seen = f64::from(appearances.get(c1).copied().unwrap_or(1).max(1));
            let mut row = vec![0.0; width];
            for (&c2, &n) in counts {
                row[c2] = (INDIRECT_SCALE * f64::from(n) / seen).min(INDIRECT_CAP);
            }
            matrix.insert_row(*c1, row);
        };

        #[cfg(feature = "parallel")]
        counted.par_iter().for_each(fill_indirect);
        #[cfg(not(feature = "parallel"))]
        counted.iter().for_each(fill_indirect);

        let fill_direct = |m: &ClusterableMatch| {
            matrix.update_row(m.index, |row| {
                for &c in m.coords.iter().filter(in_range) {
                    row[c] = DIRECT_WEIGHT;
                }
            });
        };

        #[cfg(feature = "parallel")]
        matches.par_iter().for_each(fill_direct);
        #[cfg(not(feature = "parallel"))]
        matches.iter().for_each(fill_direct);

        debug!(
            "correlated {} matches ({} contributing lists) into {} rows of width {}",
            matches.len(),
            contributing.len(),
            matrix.len(),
            width
        );

        let clusterable: Vec<usize> = matches
            .iter()
            .filter(|m| m.shared_centimorgans() >= self.min_clusterable_cm)
            .map(|m| m.index)
            .collect();
        let _ = self.suppress_gray(&matrix, &clusterable);

        matrix
    }

    /// Add rows (and columns) for matches introduced after the initial build.
    ///
    /// Each newcomer gets a direct row; existing rows it lists gain a direct
    /// entry for it. The matrix grows to hold `max_index`; it never shrinks.
    pub fn extend_matrix(&self, matrix: &Matrix, new_matches: &[ClusterableMatch], max_index: usize) {
        let needed = new_matches
            .iter()
            .map(ClusterableMatch::max_index)
            .fold(max_index, usize::max);
        matrix.grow(needed + 1);

        for m in new_matches {
            matrix.update_row(m.index, |row| {
                for &c in &m.coords {
                    row[c] = DIRECT_WEIGHT;
                }
            });
            for &c in m.coords.iter().filter(|&&c| c != m.index) {
                if matrix.contains_row(c) {
                    matrix.update_row(c, |row| row[m.index] = DIRECT_WEIGHT);
                }
            }
        }

        debug!(
            "extended matrix with {} matches, width now {}",
            new_matches.len(),
            matrix.width()
        );
    }

    /// Zero the weakest indirect-only cells of `rows` until they make up at
    /// most `max_gray_percent` of those rows. Returns the number of cells cleared.
    pub fn suppress_gray(&self, matrix: &Matrix, rows: &[usize]) -> usize {
        let Some(max_percent) = self.max_gray_percent else {
            return 0;
        };
        let total = rows.len() * matrix.width();
        if total == 0 {
            return 0;
        }

        let mut gray: Vec<(f64, usize, usize)> = rows
            .iter()
            .filter_map(|&r| matrix.row(r).map(|row| (r, row)))
            .flat_map(|(r, row)| {
                row.into_iter()
                    .enumerate()
                    .filter(|(_, w)| *w > 0.0 && *w < DIRECT_WEIGHT)
                    .map(move |(c, w)| (w, r, c))
            })
            .collect();

        let allowed = (max_percent / 100.0 * total as f64).floor() as usize;
        if gray.len() <= allowed {
            return 0;
        }

        gray.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then_with(|| a.1.cmp(&b.1))
                .then_with(|| a.2.cmp(&b.2))
        });
        let excess = gray.len() - allowed;
        for &(_, r, c) in &gray[..excess] {
            matrix.update_row(r, |row| row[c] = 0.0);
        }

        info!(
            "suppressed {} of {} indirect cells to stay under {:.1}% gray",
            excess,
            gray.len(),
            max_percent
        );
        excess
    }
}
