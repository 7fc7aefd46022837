use std::collections::VecDeque;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

use quotamon_core::monitor::{NotificationKind, Notifier};

/// Number of notifications kept for `/status`
pub const HISTORY_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRecord {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub at: DateTime<Local>,
}

/// Notification sink: logs every notification and keeps a bounded history
#[derive(Debug, Default)]
pub struct NotificationCenter {
    history: Mutex<VecDeque<NotificationRecord>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent first
    pub fn recent(&self) -> Vec<NotificationRecord> {
        self.history.lock().iter().rev().cloned().collect()
    }
}

impl Notifier for NotificationCenter {
    fn notify(&self, kind: NotificationKind, payload: &str) {
        let title = kind.title();
        info!(kind = ?kind, "Notification: {} | {}", title, payload.replace('\n', " | "));

        let mut history = self.history.lock();
        if history.len() == HISTORY_LIMIT {
            history.pop_front();
        }
        history.push_back(NotificationRecord {
            kind,
            title: title.to_string(),
            message: payload.to_string(),
            at: Local::now(),
        });
    }
}
