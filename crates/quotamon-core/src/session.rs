//! Session context supplied by the browser companion.
//!
//! The listener publishes every received context through [`SessionStore`];
//! the poll scheduler and the greeting trigger each hold a receiver and react
//! to changes on their own loop.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

/// Cookie/header/URL bundle captured from a logged-in browser tab
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub cookies: String,
    pub target_url: String,
    pub organization_id: String,
    /// Browser headers replayed on each request (includes User-Agent)
    pub headers: HashMap<String, String>,
}

impl SessionContext {
    pub fn new(
        cookies: impl Into<String>,
        target_url: impl Into<String>,
        organization_id: impl Into<String>,
        headers: HashMap<String, String>,
    ) -> Self {
        Self {
            cookies: cookies.into(),
            target_url: target_url.into(),
            organization_id: organization_id.into(),
            headers,
        }
    }

    /// A context can only be used for fetching once cookies and a URL are present
    pub fn is_usable(&self) -> bool {
        !self.cookies.is_empty() && !self.target_url.is_empty()
    }

    /// Scheme and host of the target URL (e.g. `https://example.com`)
    pub fn origin(&self) -> Option<&str> {
        let scheme_end = self.target_url.find("://")? + 3;
        let rest = &self.target_url[scheme_end..];
        if rest.is_empty() {
            return None;
        }
        let host_end = rest.find('/').map(|i| scheme_end + i);
        Some(match host_end {
            Some(end) => &self.target_url[..end],
            None => &self.target_url,
        })
    }
}

/// Current session as seen by subscribers
pub type SessionReceiver = watch::Receiver<Option<Arc<SessionContext>>>;

/// Publisher for session context updates
#[derive(Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<Option<Arc<SessionContext>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Publish a new context.
    ///
    /// Every call notifies subscribers, even when the bundle is identical to
    /// the previous one; receiving a context is itself the reset signal.
    pub fn set_context(&self, context: SessionContext) {
        info!(
            target_url = %context.target_url,
            organization_id = %context.organization_id,
            cookies_len = context.cookies.len(),
            headers = context.headers.len(),
            "Session context updated"
        );
        self.tx.send_replace(Some(Arc::new(context)));
    }

    /// Latest published context, if any
    pub fn current(&self) -> Option<Arc<SessionContext>> {
        self.tx.borrow().clone()
    }

    pub fn has_context(&self) -> bool {
        self.tx
            .borrow()
            .as_ref()
            .is_some_and(|ctx| ctx.is_usable())
    }

    pub fn subscribe(&self) -> SessionReceiver {
        self.tx.subscribe()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
