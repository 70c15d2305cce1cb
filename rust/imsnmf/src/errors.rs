use std::path::PathBuf;

/// Problems with the requested run that are detected before any heavy work.
#[derive(Debug)]
pub enum ConfigError {
    RankBelowMinimum {
        rank: usize,
        min_rank: usize,
    },
    RankExceedsColumns {
        rank: usize,
        available: usize,
    },
    EmptyWorkingSet {
        context: String,
    },
    InvalidParameter {
        field: &'static str,
        context: String,
    },
    AxisLengthMismatch {
        axis: usize,
        bins: usize,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::RankBelowMinimum { rank, min_rank } => write!(
                f,
                "Factorization rank must be at least {} (got {})",
                min_rank, rank
            ),
            ConfigError::RankExceedsColumns { rank, available } => write!(
                f,
                "Factorization rank {} exceeds the {} available working columns",
                rank, available
            ),
            ConfigError::EmptyWorkingSet { context } => {
                write!(f, "Working set is empty: {}", context)
            }
            ConfigError::InvalidParameter { field, context } => {
                write!(f, "Invalid value for '{}': {}", field, context)
            }
            ConfigError::AxisLengthMismatch { axis, bins } => write!(
                f,
                "m/z axis has {} entries but the cube has {} bins",
                axis, bins
            ),
        }
    }
}

#[derive(Debug)]
pub enum NnlsError {
    SingularSystem {
        column: usize,
        context: String,
    },
    MaxIterationsExceeded {
        column: usize,
        iterations: usize,
    },
    ShapeMismatch {
        expected: usize,
        other: usize,
        context: String,
    },
}

#[derive(Debug)]
pub enum DataSourceError {
    BinOutOfRange {
        bin: usize,
        num_bins: usize,
    },
    ImageShapeMismatch {
        expected: (usize, usize),
        other: (usize, usize),
        context: String,
    },
    ImageQuery {
        mz: f64,
        ppm: f64,
        context: String,
    },
    Other {
        context: String,
    },
}

impl DataSourceError {
    pub fn append_to_context(mut self, context: &str) -> Self {
        match &mut self {
            DataSourceError::ImageShapeMismatch {
                context: owned_context,
                ..
            } => owned_context.push_str(context),
            DataSourceError::ImageQuery {
                context: owned_context,
                ..
            } => owned_context.push_str(context),
            DataSourceError::Other {
                context: owned_context,
            } => owned_context.push_str(context),
            DataSourceError::BinOutOfRange { .. } => {}
        }
        self
    }
}

#[derive(Debug)]
pub enum NmfError {
    Config(ConfigError),
    InvariantViolation {
        context: String,
    },
    Nnls(NnlsError),
    DataSource(DataSourceError),
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },
    Serialization {
        msg: String,
    },
}

impl std::fmt::Display for NmfError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NmfError::Config(x) => write!(f, "{}", x),
            _ => write!(f, "{:?}", self),
        }
    }
}

impl std::error::Error for NmfError {}

pub type Result<T> = std::result::Result<T, NmfError>;

impl From<ConfigError> for NmfError {
    fn from(x: ConfigError) -> Self {
        Self::Config(x)
    }
}

impl From<NnlsError> for NmfError {
    fn from(x: NnlsError) -> Self {
        Self::Nnls(x)
    }
}

impl From<DataSourceError> for NmfError {
    fn from(x: DataSourceError) -> Self {
        Self::DataSource(x)
    }
}

impl From<rmp_serde::encode::Error> for NmfError {
    fn from(x: rmp_serde::encode::Error) -> Self {
        Self::Serialization { msg: x.to_string() }
    }
}

impl From<rmp_serde::decode::Error> for NmfError {
    fn from(x: rmp_serde::decode::Error) -> Self {
        Self::Serialization { msg: x.to_string() }
    }
}
