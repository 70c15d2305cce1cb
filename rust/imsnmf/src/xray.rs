//! Greedy conical-hull column selection ("XRay").
//!
//! Near-separable NMF: the basis is made of actual columns of the data.
//! At every step a random probe scores how much unexplained residual mass
//! each column carries, the best column joins the basis and all columns are
//! re-projected onto the new basis with NNLS.
//!
//! Kumar, Sindhwani & Kambadur, "Fast conical hull algorithms for
//! near-separable non-negative matrix factorization", 2012.

use nalgebra::{
    DMatrix,
    DVector,
};
use rand::Rng;
use rayon::prelude::*;
use tracing::debug;

use crate::errors::{
    ConfigError,
    NmfError,
    Result,
};
use crate::nnls::project;
use crate::progress::ProgressObserver;

/// Residual error is reported every this many selected columns.
const REPORT_EVERY: usize = 5;

#[derive(Debug, Clone)]
pub struct XRaySelection {
    /// Indices of the chosen columns of the working matrix, in pick order.
    pub columns: Vec<usize>,
    /// Copy of the chosen columns (`pixels x rank`).
    pub w: DMatrix<f64>,
    /// Coefficients of the working matrix on `w` (`rank x working columns`).
    pub h: DMatrix<f64>,
    /// `x - w * h`.
    pub residual: DMatrix<f64>,
    /// `||residual||_F / ||x||_F`.
    pub residual_error: f64,
}

pub fn relative_error(residual: &DMatrix<f64>, x: &DMatrix<f64>) -> f64 {
    residual.norm() / x.norm()
}

/// Per-column score `sum(R .* x)[j] / (p . x[:, j])`.
///
/// No guard against a vanishing denominator: a column nearly orthogonal to
/// the probe gets a huge score, and an all-zero column scores NaN.
pub fn column_scores(
    residual: &DMatrix<f64>,
    x: &DMatrix<f64>,
    probe: &DVector<f64>,
) -> Vec<f64> {
    (0..x.ncols())
        .into_par_iter()
        .map(|j| {
            let xj = x.column(j);
            residual.column(j).dot(&xj) / probe.dot(&xj)
        })
        .collect()
}

/// Index of the largest score, ties going to the lowest index.
///
/// NaN ranks above every number, so the first NaN wins. An all-zero column
/// can be picked this way; its anchor never enters the NNLS passive set and
/// its coefficients stay at zero.
fn argmax(scores: &[f64]) -> Option<usize> {
    if let Some(i) = scores.iter().position(|s| s.is_nan()) {
        return Some(i);
    }
    let mut best: Option<(usize, f64)> = None;
    for (i, &s) in scores.iter().enumerate() {
        match best {
            Some((_, b)) if s <= b => {}
            _ => best = Some((i, s)),
        }
    }
    best.map(|(i, _)| i)
}

/// Selects `rank` columns of the nonnegative `x` (`pixels x columns`).
///
/// A fresh probe vector is drawn from `rng` at every step, so passing a
/// seeded generator makes the selection reproducible.
pub fn select_columns<R: Rng>(
    x: &DMatrix<f64>,
    rank: usize,
    batch_size: usize,
    rng: &mut R,
    observer: &dyn ProgressObserver,
) -> Result<XRaySelection> {
    if x.ncols() == 0 {
        return Err(ConfigError::EmptyWorkingSet {
            context: "column selection needs at least one data column".to_string(),
        }
        .into());
    }
    if rank == 0 {
        return Err(ConfigError::InvalidParameter {
            field: "rank",
            context: "must be greater than zero".to_string(),
        }
        .into());
    }
    if rank > x.ncols() {
        return Err(ConfigError::RankExceedsColumns {
            rank,
            available: x.ncols(),
        }
        .into());
    }

    let mut selected: Vec<usize> = Vec::with_capacity(rank);
    let mut residual = x.clone();
    let mut h = DMatrix::zeros(0, x.ncols());

    while selected.len() < rank {
        let probe = DVector::from_fn(x.nrows(), |_, _| rng.gen::<f64>());
        let mut scores = column_scores(&residual, x, &probe);
        for &c in selected.iter() {
            scores[c] = f64::NEG_INFINITY;
        }

        let best = argmax(&scores).ok_or_else(|| NmfError::InvariantViolation {
            context: "no column left to score".to_string(),
        })?;
        if selected.contains(&best) {
            return Err(NmfError::InvariantViolation {
                context: format!(
                    "column {} was selected twice (already picked: {:?})",
                    best, selected
                ),
            });
        }
        selected.push(best);
        observer.column_selected(selected.len(), rank);
        debug!("Picked column {} ({}/{})", best, selected.len(), rank);

        let anchors = x.select_columns(selected.iter());
        h = project(&anchors, x, batch_size, observer)?;
        residual = x - &anchors * &h;

        if selected.len() % REPORT_EVERY == 0 {
            observer.residual_error(selected.len(), relative_error(&residual, x));
        }
    }

    let w = x.select_columns(selected.iter());
    let residual_error = relative_error(&residual, x);
    observer.residual_error(selected.len(), residual_error);

    Ok(XRaySelection {
        columns: selected,
        w,
        h,
        residual,
        residual_error,
    })
}
