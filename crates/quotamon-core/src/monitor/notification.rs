//! Per-episode de-duplication of error, low-quota and zero-quota notifications.

use rand::RngExt;
use tracing::debug;

use super::notifier::NotificationKind;
use crate::config::LowValueSettings;

/// Which notifications already fired in the current episode.
///
/// `low_value_notified` and `zero_notified` are never both set. All flags
/// reset when a new session context arrives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationState {
    error_notified: bool,
    low_value_notified: bool,
    zero_notified: bool,
}

/// Quota notification decided for one observed value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaEvent {
    Low,
    Zero,
}

/// A notification ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaAlert {
    pub kind: NotificationKind,
    pub payload: String,
}

impl NotificationState {
    pub fn error_notified(&self) -> bool {
        self.error_notified
    }

    pub fn low_value_notified(&self) -> bool {
        self.low_value_notified
    }

    pub fn zero_notified(&self) -> bool {
        self.zero_notified
    }

    /// Set the error flag; returns true only on the false -> true transition
    pub fn mark_error_notified(&mut self) -> bool {
        !std::mem::replace(&mut self.error_notified, true)
    }

    pub fn clear_error(&mut self) {
        if self.error_notified {
            self.error_notified = false;
            debug!("Error notification state reset");
        }
    }

    /// Decide the quota notification for a remaining value.
    ///
    /// Zero and low each fire once per episode and clear each other's flag;
    /// a value above the threshold clears both so the next decline re-notifies.
    pub fn evaluate(&mut self, remaining: u8, threshold: u8) -> Option<QuotaEvent> {
        if remaining == 0 {
            self.low_value_notified = false;
            if self.zero_notified {
                return None;
            }
            self.zero_notified = true;
            return Some(QuotaEvent::Zero);
        }

        if remaining <= threshold {
            self.zero_notified = false;
            if self.low_value_notified {
                return None;
            }
            self.low_value_notified = true;
            return Some(QuotaEvent::Low);
        }

        if self.low_value_notified || self.zero_notified {
            debug!("Low value notification state reset");
        }
        self.low_value_notified = false;
        self.zero_notified = false;
        None
    }

    /// Forget everything; used when a new session context arrives
    pub fn reset_all(&mut self) {
        *self = Self::default();
    }
}

impl QuotaEvent {
    /// Build the notification text, drawing a phrase from this event's list
    pub fn into_alert(
        self,
        remaining: u8,
        reset_label: &str,
        settings: &LowValueSettings,
    ) -> QuotaAlert {
        match self {
            QuotaEvent::Low => QuotaAlert {
                kind: NotificationKind::LowQuota,
                payload: join_lines(
                    &pick_phrase(&settings.phrases),
                    &format!("{}% of the five-hour quota left", remaining),
                ),
            },
            QuotaEvent::Zero => QuotaAlert {
                kind: NotificationKind::ZeroQuota,
                payload: join_lines(
                    &pick_phrase(&settings.zero_phrases),
                    &format!("Come back at {}", reset_label),
                ),
            },
        }
    }
}

/// Uniform random choice from `phrases`; empty string for an empty list
pub fn pick_phrase(phrases: &[String]) -> String {
    if phrases.is_empty() {
        return String::new();
    }
    let mut rng = rand::rng();
    phrases[rng.random_range(0..phrases.len())].clone()
}

fn join_lines(phrase: &str, detail: &str) -> String {
    if phrase.is_empty() {
        detail.to_string()
    } else {
        format!("{}\n{}", phrase, detail)
    }
}
