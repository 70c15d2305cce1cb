use tracing::{
    debug,
    info,
};

/// Hooks for reporting how far a factorization run has gotten.
///
/// Every method defaults to a no-op so implementors only override what they
/// want to render. Nothing here feeds back into the computation.
pub trait ProgressObserver: Sync {
    /// A new basis column was picked; `selected` columns out of `rank` so far.
    fn column_selected(&self, _selected: usize, _rank: usize) {}

    /// Relative residual error `||R||_F / ||x||_F` after `selected` columns.
    fn residual_error(&self, _selected: usize, _error: f64) {}

    /// `done` of `total` target columns have been projected onto the basis.
    fn projection_batch(&self, _done: usize, _total: usize) {}

    /// Noise analysis crossed `percent` percent of the bins.
    fn noise_progress(&self, _percent: f64) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressObserver for SilentProgress {}

/// Forwards progress to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn column_selected(&self, selected: usize, rank: usize) {
        debug!("Picked {}/{} columns", selected, rank);
    }

    fn residual_error(&self, selected: usize, error: f64) {
        info!("Relative error with {} columns is {}", selected, error);
    }

    fn projection_batch(&self, done: usize, total: usize) {
        debug!("Projected {}/{} columns", done, total);
    }

    fn noise_progress(&self, percent: f64) {
        info!("Noise statistics {}% done", percent);
    }
}
