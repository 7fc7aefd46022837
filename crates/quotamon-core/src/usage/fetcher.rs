//! Fetch capability used by the poll scheduler.

use std::future::Future;

use super::types::UsageSnapshot;
use crate::error::FetchError;
use crate::session::SessionContext;

/// Retrieves one usage snapshot for a session.
///
/// Every error is treated the same way by the scheduler: one failed tick.
/// Implementations need not enforce a timeout; the scheduler wraps each call
/// in the configured fetch timeout.
pub trait UsageFetcher: Send + Sync {
    fn fetch_usage(
        &self,
        context: &SessionContext,
        proxy: Option<&str>,
    ) -> impl Future<Output = Result<UsageSnapshot, FetchError>> + Send;
}
