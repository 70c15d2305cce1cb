use serde::{
    Deserialize,
    Serialize,
};

use crate::data_sources::Instrument;
use crate::errors::ConfigError;
use crate::nnls::DEFAULT_BATCH_SIZE;

pub const DEFAULT_RANK: usize = 40;
pub const DEFAULT_MIN_RANK: usize = 10;
pub const DEFAULT_N_BRIGHT: usize = 500;
pub const DEFAULT_RES200: f64 = 140_000.0;

/// Parameters of one factorization run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NmfConfig {
    /// Number of basis columns to select.
    pub rank: usize,
    pub min_rank: usize,
    /// Size of the bright-bin working set used for column selection.
    pub n_bright: usize,
    /// Target columns solved per NNLS batch.
    pub batch_size: usize,
    /// Seed for the probe vectors. `None` draws one from the OS.
    pub seed: Option<u64>,
    pub instrument: Instrument,
    pub res200: f64,
}

impl Default for NmfConfig {
    fn default() -> Self {
        Self {
            rank: DEFAULT_RANK,
            min_rank: DEFAULT_MIN_RANK,
            n_bright: DEFAULT_N_BRIGHT,
            batch_size: DEFAULT_BATCH_SIZE,
            seed: None,
            instrument: Instrument::default(),
            res200: DEFAULT_RES200,
        }
    }
}

impl NmfConfig {
    /// Cheap checks that must pass before touching any data.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rank < self.min_rank {
            return Err(ConfigError::RankBelowMinimum {
                rank: self.rank,
                min_rank: self.min_rank,
            });
        }
        if self.rank == 0 {
            return Err(ConfigError::InvalidParameter {
                field: "rank",
                context: "must be greater than zero".to_string(),
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidParameter {
                field: "batch_size",
                context: "must be greater than zero".to_string(),
            });
        }
        if self.n_bright == 0 {
            return Err(ConfigError::InvalidParameter {
                field: "n_bright",
                context: "must be greater than zero".to_string(),
            });
        }
        if !(self.res200.is_finite() && self.res200 > 0.0) {
            return Err(ConfigError::InvalidParameter {
                field: "res200",
                context: format!("must be a positive number, got {}", self.res200),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let conf = NmfConfig::default();
        assert_eq!(conf.rank, 40);
        assert_eq!(conf.n_bright, 500);
        assert_eq!(conf.batch_size, 100);
        assert!(conf.validate().is_ok());
    }

    #[test]
    fn test_rank_below_minimum() {
        let conf = NmfConfig {
            rank: 9,
            ..Default::default()
        };
        assert!(matches!(
            conf.validate(),
            Err(ConfigError::RankBelowMinimum {
                rank: 9,
                min_rank: 10
            })
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let conf: NmfConfig =
            serde_json::from_str(r#"{"rank": 12, "instrument": "fticr"}"#).unwrap();
        assert_eq!(conf.rank, 12);
        assert_eq!(conf.instrument, Instrument::Fticr);
        assert_eq!(conf.min_rank, DEFAULT_MIN_RANK);
        assert_eq!(conf.seed, None);
    }
}
