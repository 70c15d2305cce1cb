use imsnmf::NmfConfig;
use std::path::Path;

use crate::cli::Cli;
use crate::errors::CliError;

fn load_config_file(path: &Path) -> Result<NmfConfig, CliError> {
    let file = std::fs::File::open(path).map_err(|e| CliError::Io {
        source: e.to_string(),
        path: Some(path.to_string_lossy().to_string()),
    })?;
    serde_json::from_reader(file).map_err(|e| CliError::ParseError { msg: e.to_string() })
}

/// Builds the run configuration: defaults, then the config file if any,
/// then whatever was passed on the command line.
pub fn resolve_config(args: &Cli) -> Result<NmfConfig, CliError> {
    let mut config = match args.config {
        Some(ref path) => load_config_file(path)?,
        None => NmfConfig::default(),
    };

    if let Some(instrument) = args.instrument {
        config.instrument = instrument;
    }
    if let Some(res200) = args.res200 {
        config.res200 = res200;
    }
    if let Some(rank) = args.rank {
        config.rank = rank;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(n_bright) = args.n_bright {
        config.n_bright = n_bright;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }

    config.validate().map_err(|e| CliError::Config {
        source: e.to_string(),
    })?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use imsnmf::Instrument;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_defaults_without_flags() {
        let conf = resolve_config(&parse(&["imsnmf", "in.msgpack", "out.nmf"])).unwrap();
        assert_eq!(conf, NmfConfig::default());
    }

    #[test]
    fn test_flags_override_defaults() {
        let conf = resolve_config(&parse(&[
            "imsnmf",
            "in.msgpack",
            "out.nmf",
            "--instrument",
            "fticr",
            "--res200",
            "70000",
            "--rank",
            "12",
            "--seed",
            "7",
        ]))
        .unwrap();
        assert_eq!(conf.instrument, Instrument::Fticr);
        assert_eq!(conf.res200, 70_000.0);
        assert_eq!(conf.rank, 12);
        assert_eq!(conf.seed, Some(7));
    }

    #[test]
    fn test_small_rank_is_rejected() {
        let res = resolve_config(&parse(&["imsnmf", "in.msgpack", "out.nmf", "--rank", "9"]));
        match res {
            Err(CliError::Config { source }) => assert!(source.contains("10"), "{}", source),
            other => panic!("Expected a config error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_instrument_fails_parsing() {
        let res = Cli::try_parse_from(["imsnmf", "a", "b", "--instrument", "tof"]);
        assert!(res.is_err());
    }

    #[test]
    fn test_file_values_are_overridden_by_flags() {
        let path = std::env::temp_dir().join("imsnmf_cli_test_config.json");
        std::fs::write(&path, r#"{"rank": 20, "n_bright": 100}"#).unwrap();
        let path_str = path.to_string_lossy().to_string();
        let conf = resolve_config(&parse(&[
            "imsnmf",
            "in.msgpack",
            "out.nmf",
            "--config",
            &path_str,
            "--rank",
            "15",
        ]))
        .unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(conf.rank, 15);
        assert_eq!(conf.n_bright, 100);
    }
}
