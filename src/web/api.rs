//! REST API handlers for the browser companion

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};

use quotamon_core::monitor::PollHandle;
use quotamon_core::session::{SessionContext, SessionStore};

use crate::sinks::{Indicator, IndicatorState, NotificationCenter, NotificationRecord};

/// Helper to create JSON error responses
fn json_error(status: StatusCode, message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(serde_json::json!({"error": message})))
}

/// Shared state for API handlers
pub struct ApiState {
    pub session: SessionStore,
    pub indicator: Arc<Indicator>,
    pub notifications: Arc<NotificationCenter>,
    pub poll: PollHandle,
}

/// Body of `POST /set-context`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetContextRequest {
    #[serde(default)]
    pub cookies: String,
    #[serde(default)]
    pub target_url: String,
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub indicator: IndicatorState,
    pub has_context: bool,
    pub notifications: Vec<NotificationRecord>,
}

/// POST /set-context
pub async fn set_context(
    State(state): State<Arc<ApiState>>,
    body: Result<Json<SetContextRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let Json(req) = body.map_err(|e| {
        tracing::warn!("Rejected context update: {}", e.body_text());
        json_error(StatusCode::BAD_REQUEST, "Invalid JSON")
    })?;

    if req.cookies.is_empty() || req.target_url.is_empty() {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            "Missing cookies or targetUrl",
        ));
    }

    state.session.set_context(SessionContext::new(
        req.cookies,
        req.target_url,
        req.organization_id,
        req.headers,
    ));

    Ok(Json(serde_json::json!({
        "status": "ok",
        "message": "Context updated successfully",
    })))
}

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /status
pub async fn status(State(state): State<Arc<ApiState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        indicator: state.indicator.snapshot(),
        has_context: state.session.has_context(),
        notifications: state.notifications.recent(),
    })
}

/// POST /refresh
pub async fn refresh(
    State(state): State<Arc<ApiState>>,
) -> Result<(StatusCode, Json<serde_json::Value>), (StatusCode, Json<serde_json::Value>)> {
    if state.poll.trigger_manual() {
        Ok((
            StatusCode::ACCEPTED,
            Json(serde_json::json!({"status": "queued"})),
        ))
    } else {
        Err(json_error(
            StatusCode::CONFLICT,
            "A manual refresh is already pending",
        ))
    }
}
