use clap::Parser;
use imsnmf::Instrument;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Centroided imaging dataset (.msgpack, .msgpack.zst or .json)
    pub input: PathBuf,

    /// Where to write the factorization and noise statistics
    pub output: PathBuf,

    /// Path to a JSON configuration file, flags below over-write its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Instrument model used to build the m/z axis (orbitrap or fticr)
    #[arg(short, long)]
    pub instrument: Option<Instrument>,

    /// Resolving power at m/z 200
    #[arg(long)]
    pub res200: Option<f64>,

    /// Number of basis images to extract (at least 10)
    #[arg(short, long)]
    pub rank: Option<usize>,

    /// Seed for the column selection, random if not given
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Number of brightest bins used to pick the basis
    #[arg(long)]
    pub n_bright: Option<usize>,

    /// Number of bins solved per NNLS batch
    #[arg(long)]
    pub batch_size: Option<usize>,
}
