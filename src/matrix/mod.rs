//! Correlation matrix over shared-match lists.
//!
//! Row `m` of the matrix describes match `m`: column `c` holds the weight of
//! the evidence that `m` and `c` are related through shared matches.
//!
//! ```text
//! weight      │ meaning
//! ────────────┼──────────────────────────────────────────────
//! 1.0         │ direct: c is on m's shared-match list
//! (0, 0.5]    │ indirect: m and c co-occur on other lists
//! 0.0         │ no evidence
//! ```
//!
//! Rows are dense (`width` weights each) and live in a concurrent map keyed
//! by match index, so the builder can fill rows from many threads and the
//! extender can grow the matrix later without rebuilding it.
//!
//! Clustering itself works on [`SparseCoords`]: the nonzero entries of a row.

mod builder;

pub use builder::{AppearanceWeightedBuilder, DIRECT_WEIGHT, INDIRECT_CAP, INDIRECT_SCALE};

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;

/// Sparse weighted coordinates, sorted by coordinate index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SparseCoords {
    entries: Vec<(usize, f64)>,
}

impl SparseCoords {
    /// Empty coordinates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty coordinates, usable in constant contexts.
    pub const fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Nonzero entries of a dense row.
    pub fn from_dense(row: &[f64]) -> Self {
        let entries = row
            .iter()
            .enumerate()
            .filter(|(_, w)| **w != 0.0)
            .map(|(i, w)| (i, *w))
            .collect();
        Self { entries }
    }

    /// Build from `(index, weight)` pairs. Zero weights are dropped; later
    /// duplicates overwrite earlier ones.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (usize, f64)>) -> Self {
        let mut entries: Vec<(usize, f64)> = pairs.into_iter().collect();
        entries.sort_by_key(|(i, _)| *i);
        let mut deduped: Vec<(usize, f64)> = Vec::with_capacity(entries.len());
        for (i, w) in entries {
            match deduped.last_mut() {
                Some(last) if last.0 == i => last.1 = w,
                _ => deduped.push((i, w)),
            }
        }
        deduped.retain(|(_, w)| *w != 0.0);
        Self { entries: deduped }
    }

    /// Weight at `index`, zero if absent.
    pub fn get(&self, index: usize) -> f64 {
        self.entries
            .binary_search_by_key(&index, |(i, _)| *i)
            .map_or(0.0, |pos| self.entries[pos].1)
    }

    /// Whether `index` has a nonzero weight.
    pub fn contains(&self, index: usize) -> bool {
        self.entries
            .binary_search_by_key(&index, |(i, _)| *i)
            .is_ok()
    }

    /// Iterate `(index, weight)` in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.entries.iter().copied()
    }

    /// Iterate coordinate indexes in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().map(|(i, _)| *i)
    }

    /// Number of nonzero entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no nonzero entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Correlation matrix: match index → dense row of weights.
#[derive(Debug, Default)]
pub struct Matrix {
    rows: DashMap<usize, Vec<f64>>,
    width: AtomicUsize,
}

impl Clone for Matrix {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows.clone(),
            width: AtomicUsize::new(self.width()),
        }
    }
}

impl Matrix {
    /// Empty matrix whose rows hold `width` weights.
    pub fn new(width: usize) -> Self {
        Self {
            rows: DashMap::new(),
            width: AtomicUsize::new(width),
        }
    }

    /// Number of columns per row.
    pub fn width(&self) -> usize {
        self.width.load(Ordering::Acquire)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the matrix has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether a row exists for `index`.
    pub fn contains_row(&self, index: usize) -> bool {
        self.rows.contains_key(&index)
    }

    /// Row indexes in ascending order.
    pub fn row_indexes(&self) -> Vec<usize> {
        let mut keys: Vec<usize> = self.rows.iter().map(|r| *r.key()).collect();
        keys.sort_unstable();
        keys
    }

    /// Weight at (`row`, `col`); missing rows and columns read as zero.
    pub fn weight(&self, row: usize, col: usize) -> f64 {
        self.rows
            .get(&row)
            .and_then(|r| r.value().get(col).copied())
            .unwrap_or(0.0)
    }

    /// Copy of a row.
    pub fn row(&self, index: usize) -> Option<Vec<f64>> {
        self.rows.get(&index).map(|r| r.value().clone())
    }

    /// Nonzero entries of a row; empty if the row does not exist.
    pub fn coords(&self, index: usize) -> SparseCoords {
        self.rows
            .get(&index)
            .map(|r| SparseCoords::from_dense(r.value()))
            .unwrap_or_default()
    }

    /// Insert or replace a row, padding or truncating it to the current width.
    pub fn insert_row(&self, index: usize, mut row: Vec<f64>) {
        row.resize(self.width(), 0.0);
        let _ = self.rows.insert(index, row);
    }

    /// Apply `f` to row `index`, creating a zero row first if needed.
    pub fn update_row<F>(&self, index: usize, f: F)
    where
        F: FnOnce(&mut Vec<f64>),
    {
        let width = self.width();
        let mut row = self.rows.entry(index).or_insert_with(|| vec![0.0; width]);
        if row.len() < width {
            row.resize(width, 0.0);
        }
        f(row.value_mut());
    }

    /// Grow every row to at least `width` columns. Never shrinks.
    pub fn grow(&self, width: usize) {
        let previous = self.width.fetch_max(width, Ordering::AcqRel);
        if width > previous {
            self.rows.iter_mut().for_each(|mut r| {
                if r.len() < width {
                    r.resize(width, 0.0);
                }
            });
        }
    }

    /// Independent copy of the listed rows (missing rows are skipped).
    pub fn subset(&self, indexes: impl IntoIterator<Item = usize>) -> Matrix {
        let sub = Matrix::new(self.width());
        for i in indexes {
            if let Some(row) = self.row(i) {
                sub.insert_row(i, row);
            }
        }
        sub
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_coords_lookup() {
        let c = SparseCoords::from_pairs([(5, 1.0), (2, 0.25), (9, 0.0), (2, 0.5)]);
        assert_eq!(c.len(), 2);
        assert_eq!(c.get(2), 0.5);
        assert_eq!(c.get(5), 1.0);
        assert_eq!(c.get(9), 0.0);
        assert!(!c.contains(9));
        assert_eq!(c.keys().collect::<Vec<_>>(), vec![2, 5]);
    }

    #[test]
    fn dense_round_trip_drops_zeros() {
        let c = SparseCoords::from_dense(&[0.0, 1.0, 0.0, 0.3]);
        assert_eq!(c.iter().collect::<Vec<_>>(), vec![(1, 1.0), (3, 0.3)]);
    }

    #[test]
    fn matrix_grows_without_losing_weights() {
        let m = Matrix::new(3);
        m.update_row(0, |r| r[2] = 1.0);
        m.grow(6);
        assert_eq!(m.width(), 6);
        assert_eq!(m.row(0).map(|r| r.len()), Some(6));
        assert_eq!(m.weight(0, 2), 1.0);
        assert_eq!(m.weight(0, 5), 0.0);
        assert_eq!(m.weight(7, 0), 0.0);

        m.grow(2);
        assert_eq!(m.width(), 6);
    }

    #[test]
    fn subset_is_independent() {
        let m = Matrix::new(2);
        m.update_row(0, |r| r[0] = 1.0);
        m.update_row(1, |r| r[1] = 1.0);
        let sub = m.subset([1, 4]);
        assert_eq!(sub.row_indexes(), vec![1]);
        sub.update_row(1, |r| r[0] = 0.5);
        assert_eq!(m.weight(1, 0), 0.0);
    }
}
