use clap::Parser;
use std::path::PathBuf;

use quotamon_core::config::Overrides;

/// Command line arguments
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Usage quota monitor for a browser session")]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Run the offline demo simulation instead of polling
    #[arg(long)]
    pub demo: bool,

    /// Polling interval in seconds (overrides the config file)
    #[arg(short = 'i', long)]
    pub poll_interval: Option<u64>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Values that win over the config file, also across reloads
    pub fn overrides(&self) -> Overrides {
        Overrides {
            poll_interval_seconds: self.poll_interval,
            demo: self.demo,
        }
    }
}
