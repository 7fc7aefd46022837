//! Hot reload of the config file.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::store::ConfigStore;
use crate::error::ConfigError;

/// Editors often write a file in several steps; wait for them to settle
const DEBOUNCE: Duration = Duration::from_millis(250);

/// Watch the config file's directory and reload the store on change.
///
/// A reload that fails to read or parse is logged and skipped; the previous
/// configuration stays in effect.
pub fn spawn_config_watcher(
    store: Arc<ConfigStore>,
    cancel: CancellationToken,
) -> Result<JoinHandle<()>, ConfigError> {
    let (tx, mut rx) = mpsc::channel::<()>(1);
    let file_name = store.path().file_name().map(|n| n.to_os_string());

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            let relevant = matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
                && event
                    .paths
                    .iter()
                    .any(|p| p.file_name() == file_name.as_deref());
            if relevant {
                // Full channel means a reload is already queued
                let _ = tx.try_send(());
            }
        }
        Err(e) => warn!("Config watcher error: {}", e),
    })?;

    let dir = match store.path().parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    debug!("Watching {:?} for config changes", dir);

    Ok(tokio::spawn(async move {
        // Dropping the watcher stops the notification thread
        let _watcher = watcher;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = rx.recv() => {
                    if event.is_none() {
                        break;
                    }
                    tokio::time::sleep(DEBOUNCE).await;
                    while rx.try_recv().is_ok() {}

                    if let Err(e) = store.reload() {
                        warn!("Config reload failed, keeping previous configuration: {}", e);
                    }
                }
            }
        }
        debug!("Config watcher stopped");
    }))
}
