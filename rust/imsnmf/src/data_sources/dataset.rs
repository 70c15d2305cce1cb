//! Centroided imaging dataset.
//!
//! Every peak is stored as (m/z, intensity, pixel) and the peaks are kept
//! sorted by m/z, so an ion image for a tolerance window is a binary search
//! followed by a linear scan of the matching peaks.

use serde::{
    Deserialize,
    Serialize,
};
use std::path::Path;
use tracing::info;

use crate::cube::{
    Image,
    ImageSource,
};
use crate::errors::{
    DataSourceError,
    Result,
};
use crate::utils::serde::{
    load_compressed,
    save_compressed,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CentroidedDataset {
    height: usize,
    width: usize,
    mzs: Vec<f64>,
    intensities: Vec<f32>,
    pixel_indices: Vec<u32>,
}

/// Centroided spectrum of one pixel.
#[derive(Debug, Clone, Default)]
pub struct PixelSpectrum {
    pub row: usize,
    pub col: usize,
    pub mzs: Vec<f64>,
    pub intensities: Vec<f32>,
}

impl CentroidedDataset {
    pub fn from_spectra(height: usize, width: usize, spectra: Vec<PixelSpectrum>) -> Result<Self> {
        let total: usize = spectra.iter().map(|s| s.mzs.len()).sum();
        let mut peaks: Vec<(f64, f32, u32)> = Vec::with_capacity(total);

        for spec in spectra.into_iter() {
            if spec.row >= height || spec.col >= width {
                return Err(DataSourceError::Other {
                    context: format!(
                        "Pixel ({}, {}) is outside of a {}x{} image",
                        spec.row, spec.col, height, width
                    ),
                }
                .into());
            }
            if spec.mzs.len() != spec.intensities.len() {
                return Err(DataSourceError::Other {
                    context: format!(
                        "Pixel ({}, {}) has {} m/z values but {} intensities",
                        spec.row,
                        spec.col,
                        spec.mzs.len(),
                        spec.intensities.len()
                    ),
                }
                .into());
            }
            let pixel = (spec.row * width + spec.col) as u32;
            peaks.extend(
                spec.mzs
                    .iter()
                    .zip(spec.intensities.iter())
                    .map(|(mz, int)| (*mz, *int, pixel)),
            );
        }

        peaks.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut out = Self {
            height,
            width,
            mzs: Vec::with_capacity(peaks.len()),
            intensities: Vec::with_capacity(peaks.len()),
            pixel_indices: Vec::with_capacity(peaks.len()),
        };
        for (mz, int, pixel) in peaks {
            out.mzs.push(mz);
            out.intensities.push(int);
            out.pixel_indices.push(pixel);
        }
        Ok(out)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let st = std::time::Instant::now();
        let out: Self = load_compressed(path.as_ref())?;
        out.check_consistency()?;
        info!(
            "Loaded {} peaks over {}x{} pixels from {} in {:?}",
            out.num_peaks(),
            out.height,
            out.width,
            path.as_ref().display(),
            st.elapsed()
        );
        Ok(out)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        save_compressed(self, path)
    }

    fn check_consistency(&self) -> Result<()> {
        let n = self.mzs.len();
        if self.intensities.len() != n || self.pixel_indices.len() != n {
            return Err(DataSourceError::Other {
                context: format!(
                    "Peak arrays have different lengths: mz={}, intensity={}, pixel={}",
                    n,
                    self.intensities.len(),
                    self.pixel_indices.len()
                ),
            }
            .into());
        }
        let num_pixels = self.height * self.width;
        if let Some(bad) = self
            .pixel_indices
            .iter()
            .find(|&&p| p as usize >= num_pixels)
        {
            return Err(DataSourceError::Other {
                context: format!("Pixel index {} out of range ({} pixels)", bad, num_pixels),
            }
            .into());
        }
        if self.mzs.windows(2).any(|w| w[0] > w[1]) {
            return Err(DataSourceError::Other {
                context: "Peaks are not sorted by m/z".to_string(),
            }
            .into());
        }
        Ok(())
    }

    pub fn num_peaks(&self) -> usize {
        self.mzs.len()
    }

    /// Smallest and largest m/z of any peak.
    pub fn mz_range(&self) -> Option<(f64, f64)> {
        Some((*self.mzs.first()?, *self.mzs.last()?))
    }

    /// Sum of intensities of the peaks in `[lower, upper]`, accumulated per pixel.
    pub fn image_in_range(&self, lower: f64, upper: f64) -> Image {
        let mut img = Image::zeros(self.height, self.width);
        let start = self.mzs.partition_point(|&m| m < lower);
        let end = self.mzs.partition_point(|&m| m <= upper);
        if start < end {
            for i in start..end {
                img.data[self.pixel_indices[i] as usize] += self.intensities[i] as f64;
            }
        }
        img
    }
}

impl ImageSource for CentroidedDataset {
    fn height(&self) -> usize {
        self.height
    }

    fn width(&self) -> usize {
        self.width
    }

    fn get_image(&self, mz: f64, ppm: f64) -> Result<Image> {
        if !mz.is_finite() || !ppm.is_finite() || ppm < 0.0 {
            return Err(DataSourceError::ImageQuery {
                mz,
                ppm,
                context: "m/z and ppm must be finite and ppm nonnegative".to_string(),
            }
            .into());
        }
        let delta = mz * ppm * 1e-6;
        Ok(self.image_in_range(mz - delta, mz + delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_dataset() -> CentroidedDataset {
        let spectra = vec![
            PixelSpectrum {
                row: 0,
                col: 0,
                mzs: vec![100.0, 200.0],
                intensities: vec![1.0, 5.0],
            },
            PixelSpectrum {
                row: 0,
                col: 1,
                mzs: vec![100.0005],
                intensities: vec![2.0],
            },
            PixelSpectrum {
                row: 1,
                col: 1,
                mzs: vec![300.0, 100.0],
                intensities: vec![7.0, 3.0],
            },
        ];
        CentroidedDataset::from_spectra(2, 2, spectra).unwrap()
    }

    #[test]
    fn test_image_query_sums_per_pixel() {
        let ds = toy_dataset();
        let img = ds.get_image(100.0, 10.0).unwrap();
        assert_eq!(img.height, 2);
        assert_eq!(img.data, vec![1.0, 2.0, 0.0, 3.0]);

        let narrow = ds.get_image(100.0, 1.0).unwrap();
        assert_eq!(narrow.data, vec![1.0, 0.0, 0.0, 3.0]);
    }

    #[test]
    fn test_query_outside_range_is_empty() {
        let ds = toy_dataset();
        let img = ds.get_image(50.0, 10.0).unwrap();
        assert!(img.data.iter().all(|x| *x == 0.0));
        assert_eq!(ds.mz_range(), Some((100.0, 300.0)));
    }

    #[test]
    fn test_rejects_pixels_outside_image() {
        let spectra = vec![PixelSpectrum {
            row: 2,
            col: 0,
            mzs: vec![100.0],
            intensities: vec![1.0],
        }];
        assert!(CentroidedDataset::from_spectra(2, 2, spectra).is_err());
    }

    #[test]
    fn test_save_load() {
        let ds = toy_dataset();
        let path = std::env::temp_dir().join("imsnmf_test_dataset.msgpack.zst");
        ds.save(&path).unwrap();
        let loaded = CentroidedDataset::load(&path).unwrap();
        assert_eq!(loaded.num_peaks(), 5);
        assert_eq!(
            loaded.get_image(200.0, 5.0).unwrap().data,
            vec![5.0, 0.0, 0.0, 0.0]
        );
        std::fs::remove_file(&path).unwrap();
    }
}
