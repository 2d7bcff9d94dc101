//! Distance between shared-match coordinate vectors.
//!
//! # Overlap-weighted squared Euclidean distance
//!
//! Two matches are close when they share with the same people at the same
//! strength. A plain squared Euclidean distance over sparse rows rewards two
//! matches that simply have *short* lists; dividing by the size of the
//! overlap fixes that:
//!
//! ```text
//!          Σ_{k ∈ A ∪ B} (a_k − b_k)²
//! d(A,B) = ───────────────────────────
//!               |keys(A) ∩ keys(B)|
//! ```
//!
//! Coordinates present in both vectors both shrink the numerator and grow
//! the denominator; coordinates present on one side only add to the
//! numerator. Disjoint vectors have no usable signal and are infinitely far
//! apart.

use crate::matrix::SparseCoords;

/// A dissimilarity between two sparse coordinate vectors.
///
/// Implementations must satisfy `calculate(x, x) == 0`, symmetry, and must
/// return `f64::INFINITY` when there is no usable signal.
pub trait DistanceMetric: Send + Sync {
    /// Distance between `a` and `b`; lower is closer.
    fn calculate(&self, a: &SparseCoords, b: &SparseCoords) -> f64;

    /// Coordinates under which a vector is bucketed for neighbor search.
    ///
    /// Must include every coordinate that can make `calculate` finite for
    /// some other vector.
    fn significant_coordinates(&self, coords: &SparseCoords) -> Vec<usize>;
}

/// Squared Euclidean distance normalized by the number of shared coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlapWeightedEuclidean;

impl DistanceMetric for OverlapWeightedEuclidean {
    fn calculate(&self, a: &SparseCoords, b: &SparseCoords) -> f64 {
        let mut sum = 0.0;
        let mut overlap = 0usize;
        let mut left = a.iter().peekable();
        let mut right = b.iter().peekable();

        loop {
            match (left.peek().copied(), right.peek().copied()) {
                (Some((ka, va)), Some((kb, vb))) => {
                    if ka == kb {
                        let d = va - vb;
                        sum += d * d;
                        overlap += 1;
                        let _ = left.next();
                        let _ = right.next();
                    } else if ka < kb {
                        sum += va * va;
                        let _ = left.next();
                    } else {
                        sum += vb * vb;
                        let _ = right.next();
                    }
                }
                (Some((_, va)), None) => {
                    sum += va * va;
                    let _ = left.next();
                }
                (None, Some((_, vb))) => {
                    sum += vb * vb;
                    let _ = right.next();
                }
                (None, None) => break,
            }
        }

        if overlap == 0 {
            f64::INFINITY
        } else {
            sum / overlap as f64
        }
    }

    fn significant_coordinates(&self, coords: &SparseCoords) -> Vec<usize> {
        coords.keys().collect()
    }
}
