//! Factorization of a full cube.
//!
//! Column selection on tens of thousands of bins is not tractable, so the
//! basis is discovered on the brightest bins only and every bin of the axis
//! is then projected onto it.

use nalgebra::DMatrix;
use rand::Rng;
use std::time::Instant;
use tracing::info;

use crate::config::NmfConfig;
use crate::cube::{
    BinColumns,
    ChunkedCube,
};
use crate::errors::{
    ConfigError,
    Result,
};
use crate::nnls::project;
use crate::progress::ProgressObserver;
use crate::xray::select_columns;

#[derive(Debug, Clone)]
pub struct Factorization {
    /// Bins used for column selection, brightest first.
    pub bright_bins: Vec<usize>,
    /// Bins (indices into the full axis) whose images make up the basis.
    pub basis_bins: Vec<usize>,
    /// `pixels x rank` basis.
    pub w: DMatrix<f64>,
    /// `rank x bins` coefficients of every bin of the axis.
    pub h_full: DMatrix<f64>,
    /// `rank x bright bins` coefficients of the working set.
    pub h: DMatrix<f64>,
    /// Residual of the working set.
    pub residual: DMatrix<f64>,
    pub residual_error: f64,
}

/// Indices of the `n_bright` bins with the highest total intensity.
///
/// Sorted by descending intensity; equal totals keep ascending bin order and
/// NaN totals rank below everything else. Asking for more bins than exist
/// returns all of them.
pub fn select_bright_bins(totals: &[f64], n_bright: usize) -> Vec<usize> {
    let key = |i: usize| {
        let t = totals[i];
        if t.is_nan() { f64::NEG_INFINITY } else { t }
    };
    let mut order: Vec<usize> = (0..totals.len()).collect();
    order.sort_by(|&a, &b| key(b).total_cmp(&key(a)));
    order.truncate(n_bright);
    order
}

/// Projects every bin of `cube` onto `w`, one batch of bins at a time.
pub fn project_full_axis<C: ChunkedCube + ?Sized>(
    cube: &C,
    w: &DMatrix<f64>,
    batch_size: usize,
    observer: &dyn ProgressObserver,
) -> Result<DMatrix<f64>> {
    project(w, &BinColumns::all(cube), batch_size, observer)
}

pub fn factorize<C: ChunkedCube + ?Sized, R: Rng>(
    cube: &C,
    config: &NmfConfig,
    rng: &mut R,
    observer: &dyn ProgressObserver,
) -> Result<Factorization> {
    config.validate()?;

    let shape = cube.shape();
    if shape.bins == 0 || shape.pixels() == 0 {
        return Err(ConfigError::EmptyWorkingSet {
            context: format!(
                "cube has shape ({}, {}, {})",
                shape.bins, shape.height, shape.width
            ),
        }
        .into());
    }
    let available = shape.bins.min(config.n_bright);
    if config.rank > available {
        return Err(ConfigError::RankExceedsColumns {
            rank: config.rank,
            available,
        }
        .into());
    }

    info!("Computing bin intensities over {} bins", shape.bins);
    let st = Instant::now();
    let totals = cube.bin_totals()?;
    info!("Bin intensities took {:?}", st.elapsed());

    let bright_bins = select_bright_bins(&totals, config.n_bright);
    let x = cube.slice_bins(&bright_bins)?;
    info!(
        "Running column selection on {} bright bins x {} pixels (rank {})",
        bright_bins.len(),
        x.nrows(),
        config.rank
    );

    let st = Instant::now();
    let selection = select_columns(&x, config.rank, config.batch_size, rng, observer)?;
    info!(
        "Finished column picking in {:?}, relative error is {}",
        st.elapsed(),
        selection.residual_error
    );

    info!("Projecting all {} m/z bin images on the obtained basis", shape.bins);
    let st = Instant::now();
    let h_full = project_full_axis(cube, &selection.w, config.batch_size, observer)?;
    info!("Projection took {:?}", st.elapsed());

    let basis_bins = selection.columns.iter().map(|&c| bright_bins[c]).collect();
    Ok(Factorization {
        bright_bins,
        basis_bins,
        w: selection.w,
        h_full,
        h: selection.h,
        residual: selection.residual,
        residual_error: selection.residual_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bright_bins_descending_with_stable_ties() {
        let totals = vec![1.0, 5.0, 3.0, 5.0, f64::NAN, 0.0];
        assert_eq!(select_bright_bins(&totals, 3), vec![1, 3, 2]);
        assert_eq!(select_bright_bins(&totals, 6), vec![1, 3, 2, 0, 5, 4]);
    }

    #[test]
    fn test_more_bright_bins_than_bins() {
        let totals = vec![2.0, 1.0, 3.0];
        assert_eq!(select_bright_bins(&totals, 500), vec![2, 0, 1]);
        assert!(select_bright_bins(&[], 10).is_empty());
    }
}
