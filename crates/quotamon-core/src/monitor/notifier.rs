use serde::Serialize;

/// Categories of user-visible notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Sustained fetch failure, most likely an expired session
    AuthFailure,
    LowQuota,
    ZeroQuota,
    GreetingSent,
}

impl NotificationKind {
    pub fn title(&self) -> &'static str {
        match self {
            NotificationKind::AuthFailure => "Authorization problem",
            NotificationKind::LowQuota => "Low quota",
            NotificationKind::ZeroQuota => "Quota exhausted",
            NotificationKind::GreetingSent => "Morning greeting sent",
        }
    }
}

/// Receiver of notifications (desktop toast, log, ...)
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NotificationKind, payload: &str);
}
