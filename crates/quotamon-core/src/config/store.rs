//! Current configuration snapshot with atomic swap on reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use super::settings::{Overrides, Settings};
use crate::error::ConfigError;

/// Subscriber view of the configuration
pub type ConfigReceiver = watch::Receiver<Arc<Settings>>;

/// Owner of the live configuration.
///
/// Readers call [`ConfigStore::current`] at the top of every decision and get
/// an immutable snapshot; a reload replaces the snapshot as a whole and wakes
/// subscribers. A failed reload leaves the previous snapshot in place.
pub struct ConfigStore {
    path: PathBuf,
    overrides: Overrides,
    tx: watch::Sender<Arc<Settings>>,
}

impl ConfigStore {
    /// Load the initial configuration. Failure here is fatal for the caller.
    pub fn load(path: PathBuf, overrides: Overrides) -> Result<Self, ConfigError> {
        let mut settings = Settings::load_or_create(&path)?;
        overrides.apply(&mut settings);
        let (tx, _rx) = watch::channel(Arc::new(settings));
        Ok(Self {
            path,
            overrides,
            tx,
        })
    }

    /// Store backed by in-memory settings only (reload always fails)
    pub fn from_settings(settings: Settings) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(settings));
        Self {
            path: PathBuf::new(),
            overrides: Overrides::default(),
            tx,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current settings
    pub fn current(&self) -> Arc<Settings> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> ConfigReceiver {
        self.tx.subscribe()
    }

    /// Re-read the config file.
    ///
    /// Returns `Ok(true)` when a different snapshot was published and
    /// `Ok(false)` when the file content is equivalent to the current one.
    pub fn reload(&self) -> Result<bool, ConfigError> {
        let mut settings = Settings::load_from(&self.path)?;
        self.overrides.apply(&mut settings);
        Ok(self.replace(settings))
    }

    /// Publish new settings, returning whether anything changed
    pub fn replace(&self, settings: Settings) -> bool {
        let previous = self.current();
        if *previous == settings {
            debug!("Configuration unchanged");
            return false;
        }

        if previous.poll_interval_seconds != settings.poll_interval_seconds {
            info!(
                "Poll interval: {}s -> {}s",
                previous.poll_interval_seconds, settings.poll_interval_seconds
            );
        }
        if previous.enable_file_logging != settings.enable_file_logging {
            info!(
                enabled = settings.enable_file_logging,
                "File logging setting changed; takes effect on restart"
            );
        }
        if previous.server_port != settings.server_port {
            info!(
                port = settings.server_port,
                "Listener port changed; takes effect on restart"
            );
        }

        self.tx.send_replace(Arc::new(settings));
        info!("Configuration reloaded from {:?}", self.path);
        true
    }
}
