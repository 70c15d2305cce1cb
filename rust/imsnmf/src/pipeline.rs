use rand::Rng;
use std::time::Instant;
use tracing::info;

use crate::config::NmfConfig;
use crate::cube::{
    ChunkedCube,
    ImageSource,
};
use crate::data_sources::{
    CentroidedDataset,
    MzAxis,
    rebin,
};
use crate::errors::{
    ConfigError,
    DataSourceError,
    Result,
};
use crate::factorization::{
    Factorization,
    factorize,
};
use crate::noise::{
    NoiseStatistics,
    analyze_noise,
};
use crate::progress::ProgressObserver;

#[derive(Debug, Clone)]
pub struct NmfResult {
    pub factorization: Factorization,
    pub mz_axis: MzAxis,
    pub noise: NoiseStatistics,
}

/// Factorizes `cube` and characterizes the residual of every bin.
///
/// `axis[i]` must describe bin `i` of the cube, and `images` must answer
/// queries over the same spatial extent.
pub fn run_nmf<C, S, R>(
    cube: &C,
    axis: &MzAxis,
    images: &S,
    config: &NmfConfig,
    rng: &mut R,
    observer: &dyn ProgressObserver,
) -> Result<NmfResult>
where
    C: ChunkedCube + ?Sized,
    S: ImageSource + ?Sized,
    R: Rng,
{
    config.validate()?;
    let shape = cube.shape();
    if axis.len() != shape.bins {
        return Err(ConfigError::AxisLengthMismatch {
            axis: axis.len(),
            bins: shape.bins,
        }
        .into());
    }
    if (images.height(), images.width()) != (shape.height, shape.width) {
        return Err(DataSourceError::ImageShapeMismatch {
            expected: (shape.height, shape.width),
            other: (images.height(), images.width()),
            context: "image source and cube disagree on the spatial extent".to_string(),
        }
        .into());
    }

    let st = Instant::now();
    let factorization = factorize(cube, config, rng, observer)?;
    info!("Factorization took {:?}", st.elapsed());

    let st = Instant::now();
    let noise = analyze_noise(
        &factorization.w,
        &factorization.h_full,
        axis,
        images,
        observer,
    )?;
    info!("Noise statistics took {:?}", st.elapsed());

    Ok(NmfResult {
        factorization,
        mz_axis: axis.clone(),
        noise,
    })
}

/// Rebins a centroided dataset with the configured instrument model and runs
/// [`run_nmf`] on it.
pub fn run_on_dataset<R: Rng>(
    dataset: &CentroidedDataset,
    config: &NmfConfig,
    rng: &mut R,
    observer: &dyn ProgressObserver,
) -> Result<NmfResult> {
    config.validate()?;
    let (cube, axis) = rebin(dataset, config.instrument, config.res200)?;
    run_nmf(&cube, &axis, dataset, config, rng, observer)
}
