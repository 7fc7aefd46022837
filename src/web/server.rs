//! Web server implementation using axum

use anyhow::{Context, Result};
use axum::http::{HeaderName, Method};
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use super::api::{self, ApiState};

/// Routes served by the listener
pub fn router(state: Arc<ApiState>) -> Router {
    // The browser extension calls from its own origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([HeaderName::from_static("content-type")]);

    Router::new()
        .route("/set-context", post(api::set_context))
        .route("/health", get(api::health))
        .route("/status", get(api::status))
        .route("/refresh", post(api::refresh))
        .with_state(state)
        .layer(cors)
}

/// Listener bound to the loopback interface
pub struct WebServer {
    listener: TcpListener,
    state: Arc<ApiState>,
}

impl WebServer {
    /// Bind `127.0.0.1:port`; port 0 picks a free port
    pub async fn bind(port: u16, state: Arc<ApiState>) -> Result<Self> {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;
        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Start the web server in a background task
    pub fn start(self, cancel: CancellationToken) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    async fn run(self, cancel: CancellationToken) -> Result<()> {
        let addr = self.local_addr()?;
        let app = router(self.state);
        tracing::info!("Listening for session context on http://{}", addr);

        axum::serve(self.listener, app)
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await?;

        tracing::info!("Web server stopped");
        Ok(())
    }
}
