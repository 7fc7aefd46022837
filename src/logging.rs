use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log file written beside the configuration file
pub const LOG_FILE_NAME: &str = "quotamon.log";

fn default_filter(debug: bool) -> EnvFilter {
    if debug {
        EnvFilter::new("quotamon=debug,quotamon_core=debug")
    } else {
        EnvFilter::new("quotamon=info,quotamon_core=info")
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the `debug` flag. When `log_file` is given, a second
/// plain-text layer appends to it.
pub fn setup_logging(debug: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(debug));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()
        .context("failed to install log subscriber")?;
    Ok(())
}
