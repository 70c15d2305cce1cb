//! Near-separable NMF of mass-spectrometry imaging cubes.
//!
//! The (m/z bin, row, column) intensity cube is flattened into a
//! `pixels x bins` matrix and factorized as `W * H` where the columns of `W`
//! are actual bin images, picked by the XRay conical-hull algorithm on the
//! brightest bins. Every bin is then projected onto that basis with a
//! batched block-pivot NNLS solver and the residual of each bin is
//! summarized as noise statistics.

pub mod archive;
pub mod config;
pub mod cube;
pub mod data_sources;
pub mod errors;
pub mod factorization;
pub mod nnls;
pub mod noise;
pub mod pipeline;
pub mod progress;
pub mod utils;
pub mod xray;

pub use archive::{
    NamedArray,
    NmfArchive,
};
pub use config::NmfConfig;
pub use cube::{
    ChunkedCube,
    ColumnSource,
    CubeShape,
    DenseCube,
    Image,
    ImageSource,
};
pub use data_sources::{
    CentroidedDataset,
    Instrument,
    MzAxis,
    MzBin,
};
pub use errors::{
    ConfigError,
    NmfError,
    Result,
};
pub use factorization::{
    Factorization,
    factorize,
};
pub use noise::NoiseStatistics;
pub use pipeline::{
    NmfResult,
    run_nmf,
    run_on_dataset,
};
pub use progress::{
    LogProgress,
    ProgressObserver,
    SilentProgress,
};
