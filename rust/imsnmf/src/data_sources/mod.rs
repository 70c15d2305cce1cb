pub mod dataset;
pub mod mz_axis;
pub mod rebin;

pub use dataset::{
    CentroidedDataset,
    PixelSpectrum,
};
pub use mz_axis::{
    MzAxis,
    MzBin,
};
pub use rebin::{
    Instrument,
    RebinnedCube,
    generate_mz_axis,
    rebin,
};
