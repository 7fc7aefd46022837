//! Process lifecycle: load config, install logging, start the loops and wait
//! for a shutdown signal.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use quotamon_core::config::{spawn_config_watcher, ConfigStore, Settings};
use quotamon_core::demo::DemoPoller;
use quotamon_core::greeting::GreetingTrigger;
use quotamon_core::monitor::PollScheduler;
use quotamon_core::session::SessionStore;

use crate::cli::Cli;
use crate::client::HttpClient;
use crate::logging::{setup_logging, LOG_FILE_NAME};
use crate::sinks::{Indicator, NotificationCenter};
use crate::web::{ApiState, WebServer};

/// Log file location for a given config file
pub fn log_path(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(LOG_FILE_NAME)
}

/// Run until Ctrl+C or SIGTERM
pub async fn run(cli: Cli) -> Result<()> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => Settings::default_path()?,
    };
    let config = Arc::new(
        ConfigStore::load(path.clone(), cli.overrides())
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
    );
    let settings = config.current();

    let log_file = settings.enable_file_logging.then(|| log_path(&path));
    setup_logging(cli.debug, log_file.as_deref())?;
    info!("quotamon v{} starting", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {}", path.display());
    info!(
        port = settings.server_port,
        poll_interval = settings.poll_interval_seconds,
        demo = settings.demo_mode.enabled,
        proxy = settings.proxy().unwrap_or("none"),
        file_logging = settings.enable_file_logging,
        "Settings loaded"
    );

    let indicator = Arc::new(Indicator::new());
    let notifications = Arc::new(NotificationCenter::new());
    let cancel = CancellationToken::new();
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();
    let mut server = None;

    if settings.demo_mode.enabled {
        warn!(
            "Starting in DEMO MODE (cycle: {}s); HTTP listener not started",
            settings.demo_mode.duration_seconds
        );
        let demo = DemoPoller::new(config.clone(), indicator.clone(), notifications.clone());
        tasks.push(demo.start(cancel.clone()));
    } else {
        let session = SessionStore::new();
        let client = HttpClient::new(config.clone());

        let (scheduler, poll) = PollScheduler::new(
            client.clone(),
            config.clone(),
            session.subscribe(),
            indicator.clone(),
            notifications.clone(),
        );
        let greeting = GreetingTrigger::new(
            client,
            config.clone(),
            session.subscribe(),
            notifications.clone(),
        );
        let state = Arc::new(ApiState {
            session,
            indicator: indicator.clone(),
            notifications: notifications.clone(),
            poll,
        });

        // No loop starts unless the listener is bound
        let listener = WebServer::bind(settings.server_port, state)
            .await
            .context("session listener unavailable")?;

        tasks.push(scheduler.start(cancel.clone()));
        tasks.push(greeting.start(cancel.clone()));
        server = Some(listener.start(cancel.clone()));
    }

    match spawn_config_watcher(config.clone(), cancel.clone()) {
        Ok(handle) => tasks.push(handle),
        Err(e) => warn!("Config hot reload disabled: {}", e),
    }

    shutdown_signal(&cancel).await;
    info!("Shutting down");
    cancel.cancel();

    if let Some(server) = server {
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Web server error: {:#}", e),
            Err(e) => warn!("Web server task failed: {}", e),
        }
    }
    for task in tasks {
        if let Err(e) = task.await {
            warn!("Task failed during shutdown: {}", e);
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C, SIGTERM, or an internal cancellation
async fn shutdown_signal(cancel: &CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to register SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
        _ = cancel.cancelled() => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_sits_beside_config() {
        assert_eq!(
            log_path(Path::new("/home/u/.config/quotamon/config.toml")),
            PathBuf::from("/home/u/.config/quotamon/quotamon.log")
        );
        assert_eq!(log_path(Path::new("config.toml")), PathBuf::from("quotamon.log"));
    }
}
