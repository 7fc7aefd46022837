use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;
use ureq::{Agent, Proxy, RequestBuilder};

use quotamon_core::config::ConfigStore;
use quotamon_core::greeting::GreetingSender;
use quotamon_core::session::SessionContext;
use quotamon_core::usage::{parse_usage_body, UsageFetcher, UsageSnapshot};
use quotamon_core::{FetchError, SendError};

/// Browser headers never replayed on GET requests
const SKIPPED_ON_GET: &[&str] = &["accept-encoding"];
/// Browser headers never replayed on POST requests (the body sets its own type)
const SKIPPED_ON_POST: &[&str] = &["accept-encoding", "content-type"];

/// Settings an [`Agent`] was built with
#[derive(Debug, Clone, PartialEq, Eq)]
struct AgentKey {
    proxy: Option<String>,
    timeout: Duration,
}

/// Blocking `ureq` client driven from tokio's blocking pool.
///
/// Proxy and timeout come from the configuration current at each call; the
/// agent is rebuilt only when they change.
#[derive(Clone)]
pub struct HttpClient {
    config: Arc<ConfigStore>,
    cached: Arc<Mutex<Option<(AgentKey, Agent)>>>,
}

impl HttpClient {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self {
            config,
            cached: Arc::new(Mutex::new(None)),
        }
    }

    fn agent(&self, proxy: Option<&str>) -> Result<Agent, String> {
        let key = AgentKey {
            proxy: proxy.map(str::to_string),
            timeout: self.config.current().fetch_timeout(),
        };

        let mut cached = self.cached.lock();
        if let Some((cached_key, agent)) = cached.as_ref() {
            if *cached_key == key {
                return Ok(agent.clone());
            }
        }

        let proxy = match key.proxy.as_deref() {
            Some(url) => Some(Proxy::new(url).map_err(|e| format!("invalid proxy {url:?}: {e}"))?),
            None => None,
        };
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(key.timeout))
            .proxy(proxy)
            .http_status_as_error(false)
            .build()
            .into();
        debug!(proxy = ?key.proxy, timeout = ?key.timeout, "HTTP agent rebuilt");
        *cached = Some((key, agent.clone()));
        Ok(agent)
    }
}

/// Add the session cookie and the replayable browser headers
fn with_session_headers<B>(
    mut request: RequestBuilder<B>,
    context: &SessionContext,
    skipped: &[&str],
) -> RequestBuilder<B> {
    request = request.header("Cookie", context.cookies.as_str());
    for (name, value) in &context.headers {
        if skipped.iter().any(|s| name.eq_ignore_ascii_case(s)) {
            continue;
        }
        request = request.header(name.as_str(), value.as_str());
    }
    request
}

/// Conversation endpoint for the greeting, derived from the target URL's origin
pub fn greeting_url(context: &SessionContext, destination: &str) -> Result<String, SendError> {
    if context.organization_id.is_empty() {
        return Err(SendError::MissingOrganization);
    }
    let origin = context
        .origin()
        .ok_or_else(|| SendError::Transport(format!("invalid target URL {:?}", context.target_url)))?;
    Ok(format!(
        "{}/api/organizations/{}/chat_conversations/{}/completion",
        origin, context.organization_id, destination
    ))
}

fn blocking_fetch(agent: Agent, context: SessionContext) -> Result<UsageSnapshot, FetchError> {
    let request = with_session_headers(agent.get(context.target_url.as_str()), &context, SKIPPED_ON_GET);
    let mut response = request
        .call()
        .map_err(|e| FetchError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| FetchError::Transport(e.to_string()))?;
    parse_usage_body(&body)
}

fn blocking_send(agent: Agent, url: String, context: SessionContext, text: String) -> Result<(), SendError> {
    let request = with_session_headers(agent.post(url.as_str()), &context, SKIPPED_ON_POST);
    let response = request
        .send_json(serde_json::json!({ "prompt": text }))
        .map_err(|e| SendError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SendError::Status(status.as_u16()));
    }
    Ok(())
}

impl UsageFetcher for HttpClient {
    async fn fetch_usage(
        &self,
        context: &SessionContext,
        proxy: Option<&str>,
    ) -> Result<UsageSnapshot, FetchError> {
        if !context.is_usable() {
            return Err(FetchError::NoContext);
        }
        let agent = self.agent(proxy).map_err(FetchError::Transport)?;
        let context = context.clone();
        debug!(url = %context.target_url, cookies_len = context.cookies.len(), "Fetching usage");

        tokio::task::spawn_blocking(move || blocking_fetch(agent, context))
            .await
            .map_err(|e| FetchError::Transport(format!("fetch task failed: {e}")))?
    }
}

impl GreetingSender for HttpClient {
    async fn send(
        &self,
        context: &SessionContext,
        destination: &str,
        text: &str,
        proxy: Option<&str>,
    ) -> Result<(), SendError> {
        if !context.is_usable() {
            return Err(SendError::NoContext);
        }
        if destination.is_empty() {
            return Err(SendError::MissingDestination);
        }
        let url = greeting_url(context, destination)?;
        let agent = self.agent(proxy).map_err(SendError::Transport)?;
        let context = context.clone();
        let text = text.to_string();
        debug!(%url, "Sending greeting");

        tokio::task::spawn_blocking(move || blocking_send(agent, url, context, text))
            .await
            .map_err(|e| SendError::Transport(format!("send task failed: {e}")))?
    }
}
