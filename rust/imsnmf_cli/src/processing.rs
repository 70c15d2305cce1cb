use imsnmf::{
    CentroidedDataset,
    NmfArchive,
    NmfConfig,
    ProgressObserver,
    run_on_dataset,
};
use indicatif::{
    ProgressBar,
    ProgressStyle,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::Path;
use std::time::Instant;
use tracing::info;

use crate::errors::CliError;

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}";

/// Renders column selection and noise analysis as two terminal progress bars.
pub struct BarProgress {
    columns: ProgressBar,
    noise: ProgressBar,
}

impl BarProgress {
    pub fn new(rank: usize) -> Result<Self, CliError> {
        let style = ProgressStyle::with_template(BAR_TEMPLATE).map_err(|e| CliError::Config {
            source: format!("Invalid progress bar template: {}", e),
        })?;
        let columns = ProgressBar::hidden();
        columns.set_length(rank as u64);
        columns.set_style(style.clone());
        let noise = ProgressBar::hidden();
        noise.set_length(100);
        noise.set_style(style);
        Ok(Self { columns, noise })
    }
}

impl ProgressObserver for BarProgress {
    fn column_selected(&self, selected: usize, rank: usize) {
        if selected == 1 {
            self.columns.set_draw_target(indicatif::ProgressDrawTarget::stderr());
            self.columns.set_message("selecting basis images");
        }
        self.columns.set_position(selected as u64);
        if selected == rank {
            self.columns.finish();
        }
    }

    fn residual_error(&self, selected: usize, error: f64) {
        self.columns
            .set_message(format!("rel. error {:.5} at {} columns", error, selected));
    }

    fn noise_progress(&self, percent: f64) {
        if self.noise.is_hidden() {
            self.noise.set_draw_target(indicatif::ProgressDrawTarget::stderr());
            self.noise.set_message("noise statistics (%)");
        }
        self.noise.set_position(percent.round() as u64);
        if percent >= 100.0 {
            self.noise.finish();
        }
    }
}

fn probe_rng(config: &NmfConfig) -> ChaCha8Rng {
    match config.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

pub fn process_dataset(input: &Path, output: &Path, config: &NmfConfig) -> Result<(), CliError> {
    let start = Instant::now();

    info!("Loading centroided data from {}", input.display());
    let dataset = CentroidedDataset::load(input)?;

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| CliError::Io {
                source: e.to_string(),
                path: Some(parent.to_string_lossy().to_string()),
            })?;
        }
    }

    let mut rng = probe_rng(config);
    let progress = BarProgress::new(config.rank)?;
    let result = run_on_dataset(&dataset, config, &mut rng, &progress)?;

    NmfArchive::from_result(&result).save(output)?;
    println!(
        "Extracted {} basis images over {} bins, wrote {}",
        result.factorization.w.ncols(),
        result.mz_axis.len(),
        output.display()
    );
    println!("Finished in {:?}", start.elapsed());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let config = NmfConfig {
            seed: Some(11),
            ..Default::default()
        };
        let a: Vec<f64> = (0..4).map(|_| probe_rng(&config).gen_range(0.0..1.0)).collect();
        assert!(a.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_progress_bars_finish() {
        let progress = BarProgress::new(10).unwrap();
        for i in 1..=10 {
            progress.column_selected(i, 10);
        }
        progress.noise_progress(5.0);
        progress.noise_progress(100.0);
        assert!(progress.columns.is_finished());
        assert!(progress.noise.is_finished());
        assert_eq!(progress.noise.position(), 100);
    }
}
