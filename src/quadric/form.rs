//! Quadric form of the resolution function and its axis reductions.
//!
//! The resolution is a cost surface over coordinates `x`:
//!
//! ```text
//! chi2(x) = x^T Q x + R^T x + S
//! ```
//!
//! equivalently a Gaussian weight `exp(-chi2/2)`. Removing an axis takes one
//! of two forms, and the distinction matters:
//!
//! - **slicing** fixes the coordinate at its reference value: delete its
//!   row/column, no correction
//! - **marginalizing** integrates the coordinate out: apply a rank-1
//!   Schur-complement update to `Q` (and the matching correction to `R`)
//!   before deleting the row/column
//!
//! After any removal, every retained axis index greater than the removed one
//! shifts down by one. Callers that hold several axis indices across a chain
//! of removals must renumber them (`shift_index`) after each step; an
//! off-by-one here silently corrupts all downstream results.

use nalgebra::{DMatrix, DVector};
use tracing::warn;

/// Pivots smaller than this are treated as a degenerate axis during
/// marginalization.
pub const PIVOT_EPS: f64 = 1e-8;

/// How an axis is removed from the quadric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    /// Fix the coordinate at its reference value (delete row/column).
    Slice,
    /// Integrate the coordinate out (Schur-complement correction, then
    /// delete row/column).
    Integrate,
}

/// Quadric cost surface `x^T Q x + R^T x + S`.
///
/// Invariants: `Q` is symmetric and square with `Q.nrows() == R.len()`; the
/// dimension only ever decreases across a reduction chain. Each instance
/// represents one single-use reduction path; reductions consume no shared
/// state, so clone before branching.
#[derive(Debug, Clone)]
pub struct QuadricForm {
    q: DMatrix<f64>,
    r: DVector<f64>,
    s: f64,
}

impl QuadricForm {
    /// Build a quadric from its quadratic, linear and constant parts.
    ///
    /// The quadratic part is symmetrized on construction so that later
    /// row/column averages are exact.
    pub fn new(q: DMatrix<f64>, r: DVector<f64>, s: f64) -> Self {
        assert_eq!(q.nrows(), q.ncols(), "quadratic part must be square");
        assert_eq!(q.nrows(), r.len(), "linear part length must match dimension");

        let q = (&q + q.transpose()) * 0.5;
        Self { q, r, s }
    }

    /// Quadric with no linear or constant part.
    pub fn from_matrix(q: DMatrix<f64>) -> Self {
        let n = q.nrows();
        Self::new(q, DVector::zeros(n), 0.0)
    }

    pub fn dim(&self) -> usize {
        self.q.nrows()
    }

    pub fn q(&self) -> &DMatrix<f64> {
        &self.q
    }

    pub fn r(&self) -> &DVector<f64> {
        &self.r
    }

    pub fn s(&self) -> f64 {
        self.s
    }

    /// Remove axis `idx` by fixing it at its reference value.
    ///
    /// Deletes row/column `idx` of `Q` and element `idx` of `R` without any
    /// correction. O(N^2).
    pub fn slice(&mut self, idx: usize) {
        assert!(idx < self.dim(), "slice index out of range");

        self.q = self.q.clone().remove_row(idx).remove_column(idx);
        self.r = self.r.clone().remove_row(idx);
    }

    /// Remove axis `idx` by integrating it out.
    ///
    /// Applies the Schur-complement update `Q' = Q - (1/d) b b^T` with
    /// `b = (row_idx(Q) + col_idx(Q)) / 2` and `d = Q[idx][idx]`, corrects
    /// the linear part by `R' = R - (R[idx]/d) b`, then removes the
    /// row/column. A near-zero pivot degrades to `slice` with a logged
    /// warning; this is an explicit policy, not a silent failure. O(N^2).
    pub fn marginalize(&mut self, idx: usize) {
        assert!(idx < self.dim(), "marginalize index out of range");

        let d = self.q[(idx, idx)];
        if d.abs() <= PIVOT_EPS {
            warn!(axis = idx, pivot = d, "Cannot integrate out degenerate quadric axis, slicing instead.");
            self.slice(idx);
            return;
        }

        // Q is kept symmetric, so row and column only differ by float noise;
        // their average is the exact Schur vector.
        let b: DVector<f64> = (self.q.column(idx) + self.q.row(idx).transpose()) * 0.5;

        self.q -= &b * b.transpose() / d;
        let r_scale = self.r[idx] / d;
        self.r -= b * r_scale;

        self.q = self.q.clone().remove_row(idx).remove_column(idx);
        self.r = self.r.clone().remove_row(idx);
    }

    /// Remove axis `idx` using the given reduction.
    pub fn reduce(&mut self, idx: usize, how: Reduction) {
        match how {
            Reduction::Slice => self.slice(idx),
            Reduction::Integrate => self.marginalize(idx),
        }
    }

    /// Coherent (Bragg) full widths, one per axis, read off the diagonal.
    ///
    /// A non-positive diagonal entry means a degenerate axis; it is logged
    /// and its magnitude used, so a negative entry cannot produce NaN.
    pub fn bragg_fwhms(&self) -> Vec<f64> {
        (0..self.dim())
            .map(|i| {
                let d = self.q[(i, i)];
                if d <= 0.0 {
                    warn!(axis = i, pivot = d, "Non-positive diagonal entry in quadric.");
                }
                crate::ellipse::SIGMA2FWHM / d.abs().sqrt()
            })
            .collect()
    }

    /// Incoherent full width of axis `idx`: integrate out every other axis
    /// and read the surviving 1x1 pivot.
    pub fn incoherent_fwhm(&self, idx: usize) -> f64 {
        let mut quad = self.clone();
        let mut axis = idx;
        // Integrate from the highest axis down so earlier indices stay valid.
        for i in (0..self.dim()).rev() {
            if i == idx {
                continue;
            }
            quad.marginalize(i);
            axis = shift_index(axis, i);
        }
        crate::ellipse::SIGMA2FWHM / quad.q[(axis, axis)].abs().sqrt()
    }
}

/// Renumber a retained axis index after axis `removed` has been deleted.
///
/// Identity for indices below the removal point; indices above shift down by
/// one. Calling this with `idx == removed` is a logic error upstream (the
/// axis no longer exists); the index is returned unchanged in that case.
pub fn shift_index(idx: usize, removed: usize) -> usize {
    if idx > removed {
        idx - 1
    } else {
        idx
    }
}
