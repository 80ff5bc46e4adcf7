//! Command-line interface.

use cdman_library::PopulateMode;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Keep CD-sized folders of audio and MP3 tracks in sync with a music
/// library.
#[derive(Debug, Parser)]
#[command(name = "cdman", version, about)]
pub struct Cli {
    /// Configuration file (YAML, or TOML/JSON by extension)
    #[arg(short, long, env = "CDMAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Report what would change without touching the filesystem
    #[arg(long)]
    pub dry: bool,

    /// MP3 bitrate in kbps, overriding every disc
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub bitrate: Option<u32>,

    /// How audio tracks are placed on disc (copy, hard_link, soft_link),
    /// overriding every disc
    #[arg(long)]
    pub population_mode: Option<PopulateMode>,

    /// Worker threads
    #[arg(short = 'j', long, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    pub threads: Option<usize>,

    /// Only process the named disc (repeatable)
    #[arg(long = "only", value_name = "DISC")]
    pub only: Vec<String>,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Log filter used when `RUST_LOG` is not set.
    pub fn log_filter(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        }
    }
}
