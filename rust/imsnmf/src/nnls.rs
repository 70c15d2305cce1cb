//! Nonnegative least squares against a fixed, small set of basis columns.
//!
//! Solves `min ||A h - b||^2 s.t. h >= 0` for every column `b` of a target
//! matrix using the block principal pivoting method of Kim & Park
//! ("Toward faster nonnegative matrix factorization: a new algorithm and
//! comparisons", 2008), including their backup rule that guarantees
//! termination.
//!
//! Targets can be very wide (one column per m/z bin), so [`project`] pulls
//! them in fixed-size batches from a [`ColumnSource`] and only ever holds one
//! batch in memory.

use nalgebra::{
    DMatrix,
    DVector,
    DVectorView,
};
use rayon::prelude::*;

use crate::cube::ColumnSource;
use crate::errors::{
    ConfigError,
    NnlsError,
    Result,
};
use crate::progress::ProgressObserver;

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Entries with a smaller magnitude are snapped to zero after every solve.
const ZERO_TOL: f64 = 1e-12;

/// Number of full exchanges allowed without reducing the infeasibility count
/// before falling back to single-variable exchanges.
const FULL_EXCHANGE_BUDGET: usize = 3;

/// Block-pivot solver bound to one anchor matrix.
///
/// The Gram matrix `A^T A` is computed once and shared by all right-hand
/// sides.
#[derive(Debug, Clone)]
pub struct BlockPivotNnls {
    ata: DMatrix<f64>,
    max_iter: usize,
}

impl BlockPivotNnls {
    pub fn new(anchors: &DMatrix<f64>) -> Self {
        let ata = anchors.tr_mul(anchors);
        let max_iter = 5 * ata.nrows();
        Self { ata, max_iter }
    }

    pub fn rank(&self) -> usize {
        self.ata.nrows()
    }

    /// Solves for every column of `targets`, returning a `k x n` matrix.
    pub fn solve(
        &self,
        anchors: &DMatrix<f64>,
        targets: &DMatrix<f64>,
    ) -> Result<DMatrix<f64>> {
        if anchors.nrows() != targets.nrows() {
            return Err(NnlsError::ShapeMismatch {
                expected: anchors.nrows(),
                other: targets.nrows(),
                context: "anchors and targets must have the same number of rows".to_string(),
            }
            .into());
        }
        let atb = anchors.tr_mul(targets);
        self.solve_normal_equations(&atb, 0)
    }

    /// Same as [`Self::solve`] but starting from the precomputed `A^T B`.
    ///
    /// `col_offset` is only used to report which global column failed.
    pub fn solve_normal_equations(
        &self,
        atb: &DMatrix<f64>,
        col_offset: usize,
    ) -> Result<DMatrix<f64>> {
        let k = self.rank();
        if atb.nrows() != k {
            return Err(NnlsError::ShapeMismatch {
                expected: k,
                other: atb.nrows(),
                context: "A^T B must have one row per anchor".to_string(),
            }
            .into());
        }

        let solved: Vec<DVector<f64>> = (0..atb.ncols())
            .into_par_iter()
            .map(|j| self.solve_column(atb.column(j), col_offset + j))
            .collect::<std::result::Result<_, NnlsError>>()?;

        let mut out = DMatrix::zeros(k, atb.ncols());
        for (j, col) in solved.iter().enumerate() {
            out.set_column(j, col);
        }
        Ok(out)
    }

    fn solve_column(
        &self,
        atb: DVectorView<f64>,
        column: usize,
    ) -> std::result::Result<DVector<f64>, NnlsError> {
        let k = self.rank();
        let mut x = DVector::zeros(k);
        let mut y: DVector<f64> = -atb.clone_owned();
        let mut passive = vec![false; k];

        let mut budget = FULL_EXCHANGE_BUDGET;
        let mut best_infeasible = k + 1;
        let mut iterations = 0;

        loop {
            let not_optimal: Vec<bool> = (0..k).map(|i| !passive[i] && y[i] < 0.0).collect();
            let infeasible: Vec<bool> = (0..k).map(|i| passive[i] && x[i] < 0.0).collect();
            let num_bad = not_optimal
                .iter()
                .zip(infeasible.iter())
                .filter(|(a, b)| **a || **b)
                .count();
            if num_bad == 0 {
                break;
            }

            iterations += 1;
            if iterations > self.max_iter {
                return Err(NnlsError::MaxIterationsExceeded {
                    column,
                    iterations: self.max_iter,
                });
            }

            let full_exchange = if num_bad < best_infeasible {
                budget = FULL_EXCHANGE_BUDGET;
                best_infeasible = num_bad;
                true
            } else if budget >= 1 {
                budget -= 1;
                true
            } else {
                false
            };

            if full_exchange {
                for i in 0..k {
                    if not_optimal[i] {
                        passive[i] = true;
                    } else if infeasible[i] {
                        passive[i] = false;
                    }
                }
            } else {
                // Backup rule: flip only the offending variable with the largest index.
                let to_flip = (0..k)
                    .rev()
                    .find(|&i| not_optimal[i] || infeasible[i])
                    .unwrap_or(0);
                passive[to_flip] = !passive[to_flip];
            }

            x = self.solve_passive(&atb, &passive, column)?;
            snap_to_zero(&mut x);
            y = &self.ata * &x - &atb;
            snap_to_zero(&mut y);
        }

        Ok(x)
    }

    /// Unconstrained solve restricted to the passive variables; the rest stay zero.
    fn solve_passive(
        &self,
        atb: &DVectorView<f64>,
        passive: &[bool],
        column: usize,
    ) -> std::result::Result<DVector<f64>, NnlsError> {
        let k = self.rank();
        let idx: Vec<usize> = (0..k).filter(|&i| passive[i]).collect();
        let mut out = DVector::zeros(k);
        if idx.is_empty() {
            return Ok(out);
        }

        let sub = self.ata.select_rows(idx.iter()).select_columns(idx.iter());
        let rhs = atb.select_rows(idx.iter());
        let sol = match sub.clone().cholesky() {
            Some(chol) => chol.solve(&rhs),
            None => sub.lu().solve(&rhs).ok_or_else(|| NnlsError::SingularSystem {
                column,
                context: format!("normal equations over {} passive variables", idx.len()),
            })?,
        };
        for (v, &i) in sol.iter().zip(idx.iter()) {
            out[i] = *v;
        }
        Ok(out)
    }
}

fn snap_to_zero(v: &mut DVector<f64>) {
    for x in v.iter_mut() {
        if x.abs() < ZERO_TOL {
            *x = 0.0;
        }
    }
}

/// Projects every column of `targets` onto the cone spanned by `anchors`.
///
/// Columns are loaded and solved `batch_size` at a time; the result is the
/// `k x n` nonnegative coefficient matrix. Any solver failure aborts the
/// whole projection.
pub fn project<S: ColumnSource + ?Sized>(
    anchors: &DMatrix<f64>,
    targets: &S,
    batch_size: usize,
    observer: &dyn ProgressObserver,
) -> Result<DMatrix<f64>> {
    if batch_size == 0 {
        return Err(ConfigError::InvalidParameter {
            field: "batch_size",
            context: "must be greater than zero".to_string(),
        }
        .into());
    }
    if targets.num_rows() != anchors.nrows() {
        return Err(NnlsError::ShapeMismatch {
            expected: anchors.nrows(),
            other: targets.num_rows(),
            context: "targets must have one row per pixel of the anchors".to_string(),
        }
        .into());
    }

    let solver = BlockPivotNnls::new(anchors);
    let num_cols = targets.num_cols();
    let mut out = DMatrix::zeros(anchors.ncols(), num_cols);

    let mut start = 0;
    while start < num_cols {
        let end = (start + batch_size).min(num_cols);
        let batch = targets.load_columns(start..end)?;
        let atb = anchors.tr_mul(&batch);
        let coefs = solver.solve_normal_equations(&atb, start)?;
        out.columns_mut(start, end - start).copy_from(&coefs);
        observer.projection_batch(end, num_cols);
        start = end;
    }

    Ok(out)
}
