//! Rebinning of a centroided dataset onto a resolution-aware m/z axis.
//!
//! Bin widths follow the instrument's resolving power, so each bin covers
//! roughly one peak width. The resulting cube is never materialized: bins are
//! queried from the dataset when sliced.

use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};
use tracing::info;

use super::dataset::CentroidedDataset;
use super::mz_axis::{
    MzAxis,
    MzBin,
};
use crate::cube::{
    ChunkedCube,
    CubeShape,
    Image,
    ImageSource,
};
use crate::errors::{
    ConfigError,
    DataSourceError,
    Result,
};

/// Reference m/z at which resolving power is specified.
const REFERENCE_MZ: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    #[default]
    Orbitrap,
    Fticr,
}

impl Instrument {
    /// Resolving power (m / FWHM) at `mz` given the resolving power at m/z 200.
    pub fn resolving_power(&self, mz: f64, res200: f64) -> f64 {
        match self {
            Instrument::Orbitrap => res200 * (REFERENCE_MZ / mz).sqrt(),
            Instrument::Fticr => res200 * REFERENCE_MZ / mz,
        }
    }

    /// Half of the peak FWHM at `mz`, in ppm.
    pub fn ppm_tolerance(&self, mz: f64, res200: f64) -> f64 {
        1e6 / (2.0 * self.resolving_power(mz, res200))
    }
}

impl std::str::FromStr for Instrument {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "orbitrap" => Ok(Instrument::Orbitrap),
            "fticr" => Ok(Instrument::Fticr),
            other => Err(format!(
                "Unknown instrument '{}', expected one of: orbitrap, fticr",
                other
            )),
        }
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instrument::Orbitrap => write!(f, "orbitrap"),
            Instrument::Fticr => write!(f, "fticr"),
        }
    }
}

/// Builds contiguous bins covering `[mz_min, mz_max]`.
///
/// Each bin is centered so that its lower edge meets the upper edge of the
/// previous one. Since the ppm width grows with m/z, the lower edge lands at
/// or slightly below that point, so the windows never leave gaps.
pub fn generate_mz_axis(
    mz_min: f64,
    mz_max: f64,
    instrument: Instrument,
    res200: f64,
) -> Result<MzAxis> {
    if !(res200.is_finite() && res200 > 0.0) {
        return Err(ConfigError::InvalidParameter {
            field: "res200",
            context: format!("must be a positive number, got {}", res200),
        }
        .into());
    }
    if !(mz_min.is_finite() && mz_max.is_finite() && mz_min > 0.0 && mz_min <= mz_max) {
        return Err(ConfigError::InvalidParameter {
            field: "mz_range",
            context: format!("invalid m/z range [{}, {}]", mz_min, mz_max),
        }
        .into());
    }

    let mut bins = Vec::new();
    let mut lower_edge = mz_min;
    while lower_edge <= mz_max {
        let rel = instrument.ppm_tolerance(lower_edge, res200) * 1e-6;
        let center = lower_edge / (1.0 - rel);
        let ppm = instrument.ppm_tolerance(center, res200);
        let bin = MzBin::new(center, ppm);
        lower_edge = bin.upper();
        bins.push(bin);
    }
    Ok(MzAxis::new(bins))
}

/// Lazy cube over a centroided dataset and an m/z axis.
pub struct RebinnedCube<'a> {
    dataset: &'a CentroidedDataset,
    axis: MzAxis,
}

impl<'a> RebinnedCube<'a> {
    pub fn new(dataset: &'a CentroidedDataset, axis: MzAxis) -> Self {
        Self { dataset, axis }
    }

    pub fn axis(&self) -> &MzAxis {
        &self.axis
    }
}

impl ChunkedCube for RebinnedCube<'_> {
    fn shape(&self) -> CubeShape {
        CubeShape {
            bins: self.axis.len(),
            height: self.dataset.height(),
            width: self.dataset.width(),
        }
    }

    fn slice_bins(&self, bins: &[usize]) -> Result<DMatrix<f64>> {
        let pixels = self.shape().pixels();
        let images = bins
            .par_iter()
            .map(|&b| -> Result<Image> {
                let bin = self.axis.get(b).ok_or(DataSourceError::BinOutOfRange {
                    bin: b,
                    num_bins: self.axis.len(),
                })?;
                Ok(self.dataset.image_in_range(bin.lower(), bin.upper()))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut out = DMatrix::zeros(pixels, bins.len());
        for (j, img) in images.iter().enumerate() {
            out.column_mut(j).copy_from_slice(&img.data);
        }
        Ok(out)
    }

    fn bin_totals(&self) -> Result<Vec<f64>> {
        Ok(self
            .axis
            .as_slice()
            .par_iter()
            .map(|bin| self.dataset.image_in_range(bin.lower(), bin.upper()).total())
            .collect())
    }
}

/// Rebins `dataset` onto an axis spanning its full m/z range.
pub fn rebin(
    dataset: &CentroidedDataset,
    instrument: Instrument,
    res200: f64,
) -> Result<(RebinnedCube<'_>, MzAxis)> {
    let (mz_min, mz_max) = dataset.mz_range().ok_or_else(|| ConfigError::EmptyWorkingSet {
        context: "dataset contains no peaks".to_string(),
    })?;
    let axis = generate_mz_axis(mz_min, mz_max, instrument, res200)?;
    info!(
        "Rebinned m/z range [{:.4}, {:.4}] into {} bins ({}, R200={})",
        mz_min,
        mz_max,
        axis.len(),
        instrument,
        res200
    );
    Ok((RebinnedCube::new(dataset, axis.clone()), axis))
}
