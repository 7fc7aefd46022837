use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure of one usage fetch. Every variant counts as a failed poll tick.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no session context received from the browser extension")]
    NoContext,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("server responded with HTTP {0}")]
    Status(u16),
    #[error("failed to parse usage response: {0}")]
    Parse(String),
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure of the outbound greeting send
#[derive(Debug, Error)]
pub enum SendError {
    #[error("no session context received from the browser extension")]
    NoContext,
    #[error("organization id is not known for the current session")]
    MissingOrganization,
    #[error("greeting destination is not configured")]
    MissingDestination,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("server responded with HTTP {0}")]
    Status(u16),
    #[error("send timed out after {0:?}")]
    Timeout(Duration),
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to write config file {path:?}: {message}")]
    Write { path: PathBuf, message: String },
    #[error("no configuration directory available on this platform")]
    NoConfigDir,
    #[error("invalid time of day {0:?} (expected HH:MM)")]
    InvalidTime(String),
    #[error("invalid schedule expression {0:?}")]
    InvalidSchedule(String),
    #[error("failed to watch config file: {0}")]
    Watch(#[from] notify::Error),
}
