//! Residual (noise) statistics of a factorization.
//!
//! For every bin the original image is compared against its reconstruction
//! `W * H[:, i]`. Pixels where the model under-reconstructs carry "noise";
//! we record how often that happens and the spread of its square root.

use nalgebra::DMatrix;
use tracing::info;

use crate::cube::{
    Image,
    ImageSource,
};
use crate::data_sources::MzAxis;
use crate::errors::{
    ConfigError,
    DataSourceError,
    NmfError,
    NnlsError,
    Result,
};
use crate::progress::ProgressObserver;
use crate::utils::stats::{
    median_in_place,
    population_std,
};

/// Progress is reported every time this percentage of bins is crossed.
const PROGRESS_STEP_PCT: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BinNoise {
    /// Fraction of pixels where the original exceeds the reconstruction.
    pub prob: f64,
    /// Median of `sqrt(original - approx)` over those pixels, 0 if there are none.
    pub sqrt_median: f64,
    /// Population std of the same values, 0 if there are none.
    pub sqrt_std: f64,
}

#[derive(Debug, Clone)]
pub struct NoiseStatistics {
    pub prob: Vec<f64>,
    pub sqrt_median: Vec<f64>,
    pub sqrt_std: Vec<f64>,
    /// Smallest positive intensity seen at each pixel over all bins.
    /// `f64::INFINITY` marks pixels that never had a positive value.
    pub min_intensities: Image,
}

impl NoiseStatistics {
    pub fn len(&self) -> usize {
        self.prob.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prob.is_empty()
    }
}

/// Noise statistics of a single (already clamped) original image against
/// its flattened reconstruction.
pub fn bin_noise(original: &[f64], approx: &[f64]) -> BinNoise {
    let mut sqrt_noise: Vec<f64> = original
        .iter()
        .zip(approx.iter())
        .map(|(o, a)| o - a)
        .filter(|d| *d > 0.0)
        .map(f64::sqrt)
        .collect();

    let prob = sqrt_noise.len() as f64 / original.len() as f64;
    if sqrt_noise.is_empty() {
        return BinNoise {
            prob,
            sqrt_median: 0.0,
            sqrt_std: 0.0,
        };
    }
    let sqrt_std = population_std(&sqrt_noise).unwrap_or(0.0);
    let sqrt_median = median_in_place(&mut sqrt_noise).unwrap_or(0.0);
    BinNoise {
        prob,
        sqrt_median,
        sqrt_std,
    }
}

/// Lowers `mins` to `original` wherever the original is positive.
pub fn update_min_intensities(mins: &mut Image, original: &Image) {
    for (m, &o) in mins.data.iter_mut().zip(original.data.iter()) {
        if o > 0.0 && o < *m {
            *m = o;
        }
    }
}

/// Walks the whole axis, fetching each original image from `images`.
///
/// Any failure to fetch an image aborts the analysis.
pub fn analyze_noise<S: ImageSource + ?Sized>(
    w: &DMatrix<f64>,
    h_full: &DMatrix<f64>,
    axis: &MzAxis,
    images: &S,
    observer: &dyn ProgressObserver,
) -> Result<NoiseStatistics> {
    let (height, width) = (images.height(), images.width());
    if w.nrows() != height * width {
        return Err(DataSourceError::ImageShapeMismatch {
            expected: (height, width),
            other: (w.nrows(), 1),
            context: "basis rows must match the image pixel count".to_string(),
        }
        .into());
    }
    if w.ncols() != h_full.nrows() {
        return Err(NnlsError::ShapeMismatch {
            expected: w.ncols(),
            other: h_full.nrows(),
            context: "coefficient rows must match the basis rank".to_string(),
        }
        .into());
    }
    if h_full.ncols() != axis.len() {
        return Err(ConfigError::AxisLengthMismatch {
            axis: axis.len(),
            bins: h_full.ncols(),
        }
        .into());
    }

    let num_bins = axis.len();
    let mut out = NoiseStatistics {
        prob: Vec::with_capacity(num_bins),
        sqrt_median: Vec::with_capacity(num_bins),
        sqrt_std: Vec::with_capacity(num_bins),
        min_intensities: Image {
            height,
            width,
            data: vec![f64::INFINITY; height * width],
        },
    };

    info!("Computing noise statistics over {} bins", num_bins);
    let mut next_pct = PROGRESS_STEP_PCT;
    for (i, bin) in axis.iter().enumerate() {
        let mut original = images
            .get_image(bin.mz, bin.ppm)
            .map_err(|e| match e {
                NmfError::DataSource(x) => NmfError::DataSource(
                    x.append_to_context(&format!(" (bin {}, m/z {})", i, bin.mz)),
                ),
                other => other,
            })?;
        if original.height != height || original.width != width {
            return Err(DataSourceError::ImageShapeMismatch {
                expected: (height, width),
                other: (original.height, original.width),
                context: format!("image for bin {} (m/z {})", i, bin.mz),
            }
            .into());
        }
        original.clamp_negative();

        let approx = w * h_full.column(i);
        let noise = bin_noise(&original.data, approx.as_slice());
        out.prob.push(noise.prob);
        out.sqrt_median.push(noise.sqrt_median);
        out.sqrt_std.push(noise.sqrt_std);

        update_min_intensities(&mut out.min_intensities, &original);

        let pct_done = (i + 1) as f64 / num_bins as f64 * 100.0;
        if pct_done > next_pct {
            observer.noise_progress(next_pct);
            next_pct += PROGRESS_STEP_PCT;
        }
    }
    observer.noise_progress(100.0);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_reconstruction_has_no_noise() {
        let orig = vec![0.0, 1.0, 4.0, 2.5];
        let noise = bin_noise(&orig, &orig);
        assert_eq!(
            noise,
            BinNoise {
                prob: 0.0,
                sqrt_median: 0.0,
                sqrt_std: 0.0
            }
        );
    }

    #[test]
    fn test_noise_only_counts_under_reconstruction() {
        let orig = vec![4.0, 9.0, 1.0, 0.0];
        let approx = vec![0.0, 0.0, 2.0, 0.0];
        let noise = bin_noise(&orig, &approx);
        assert_eq!(noise.prob, 0.5);
        // sqrt noise values are 2 and 3.
        assert_eq!(noise.sqrt_median, 2.5);
        assert_eq!(noise.sqrt_std, 0.5);
    }

    #[test]
    fn test_min_map_tracks_positive_minimum() {
        let mut mins = Image {
            height: 1,
            width: 2,
            data: vec![f64::INFINITY; 2],
        };
        for v in [3.0, 1.0, 5.0] {
            let img = Image {
                height: 1,
                width: 2,
                data: vec![v, 0.0],
            };
            update_min_intensities(&mut mins, &img);
        }
        assert_eq!(mins.data[0], 1.0);
        assert!(mins.data[1].is_infinite());
    }
}
