//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Cache remote media locally for offline playback.
///
/// Offliner downloads the given URLs one at a time into the output
/// directory, remembering what it already fetched across runs.
#[derive(Parser, Debug)]
#[command(name = "offliner")]
#[command(author, version, about)]
pub struct Args {
    /// Remote media URLs to download (reads stdin when omitted)
    pub urls: Vec<String>,

    /// Directory finished media is stored in
    #[arg(short, long, default_value = "downloads")]
    pub output_dir: PathBuf,

    /// Minimum milliseconds between progress updates (0-60000)
    #[arg(long, default_value_t = 700, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub throttle_ms: u64,

    /// Print a JSON summary of all requested items to stdout
    #[arg(long)]
    pub json: bool,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
