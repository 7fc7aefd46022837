//! Shared downstream path for live and demo values: indicator update plus
//! de-duplicated notifications.

use std::sync::Arc;

use tracing::warn;

use super::display::{ColorCategory, DisplaySink, DisplayValue};
use super::escalation::Escalation;
use super::notification::NotificationState;
use super::notifier::{NotificationKind, Notifier};
use crate::config::Settings;
use crate::usage::UsageSnapshot;

/// Tooltip shown before any session context has been received
pub const NO_CONTEXT_TOOLTIP: &str = "Waiting for session cookies from the browser extension";

/// Tooltip for an automatic tick outside work hours before any value was shown
pub const OUTSIDE_WORK_HOURS_TOOLTIP: &str = "Outside work hours, automatic polling paused";

/// Display and notification sinks plus the de-duplication state they share
pub struct Pipeline {
    display: Arc<dyn DisplaySink>,
    notifier: Arc<dyn Notifier>,
    notifications: NotificationState,
    last_shown: Option<(DisplayValue, ColorCategory, String)>,
}

impl Pipeline {
    pub fn new(display: Arc<dyn DisplaySink>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            display,
            notifier,
            notifications: NotificationState::default(),
            last_shown: None,
        }
    }

    pub fn notifications(&self) -> &NotificationState {
        &self.notifications
    }

    pub fn notifications_mut(&mut self) -> &mut NotificationState {
        &mut self.notifications
    }

    pub fn display(&mut self, value: DisplayValue, color: ColorCategory, tooltip: &str) {
        self.display.update_display(value, color, tooltip);
        self.last_shown = Some((value, color, tooltip.to_string()));
    }

    pub fn display_no_context(&mut self) {
        self.display(DisplayValue::Unknown, ColorCategory::Error, NO_CONTEXT_TOOLTIP);
    }

    /// Show again whatever was shown last, gray mode included.
    ///
    /// Before anything was shown, the indicator shows "unknown" with `tooltip`.
    pub fn redisplay(&mut self, tooltip: &str) {
        let (value, color, tooltip) = self
            .last_shown
            .clone()
            .unwrap_or((DisplayValue::Unknown, ColorCategory::Error, tooltip.to_string()));
        self.display(value, color, &tooltip);
    }

    pub fn notify(&self, kind: NotificationKind, payload: &str) {
        self.notifier.notify(kind, payload);
    }

    /// Show a fresh snapshot and run the low/zero notification logic.
    ///
    /// Returns the displayed value and tooltip.
    pub fn show_usage(&mut self, snapshot: &UsageSnapshot, settings: &Settings) -> (u8, String) {
        let remaining = snapshot.remaining_percent();
        let value = DisplayValue::Percent(remaining);
        let tooltip = snapshot.tooltip();
        self.display(value, ColorCategory::for_value(value), &tooltip);

        let low = &settings.low_value_notifications;
        if low.enabled {
            if let Some(event) = self.notifications.evaluate(remaining, low.threshold) {
                let alert = event.into_alert(remaining, &snapshot.five_hour_reset_label(), low);
                warn!(
                    remaining,
                    threshold = low.threshold,
                    "Quota notification: {:?}",
                    alert.kind
                );
                self.notify(alert.kind, &alert.payload);
            }
        }

        (remaining, tooltip)
    }

    /// Reflect a failed fetch on the indicator and fire the escalation notification.
    ///
    /// The last value stays visible; gray mode only overrides the color.
    pub fn show_failure(&mut self, escalation: &Escalation, last_value: DisplayValue, last_tooltip: &str) {
        if escalation.gray_mode {
            let tooltip = format!(
                "API connection error ({} consecutive failures)",
                escalation.error_count
            );
            self.display(last_value, ColorCategory::Error, &tooltip);
        } else {
            self.display(last_value, ColorCategory::for_value(last_value), last_tooltip);
        }

        if escalation.notify {
            self.notify(
                NotificationKind::AuthFailure,
                &format!(
                    "The site is rejecting requests ({} consecutive failures). \
                     The session may have expired; sign in again to refresh it.",
                    escalation.error_count
                ),
            );
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{RecordingDisplay, RecordingNotifier};
    use super::*;
    use crate::usage::UsageWindow;

    fn pipeline() -> (Pipeline, Arc<RecordingDisplay>, Arc<RecordingNotifier>) {
        let display = Arc::new(RecordingDisplay::default());
        let notifier = Arc::new(RecordingNotifier::default());
        (Pipeline::new(display.clone(), notifier.clone()), display, notifier)
    }

    fn snapshot(utilization: f64) -> UsageSnapshot {
        UsageSnapshot::new(UsageWindow::new(utilization, None), UsageWindow::default())
    }

    #[test]
    fn test_show_usage_updates_display_and_notifies_once() {
        let (mut pipeline, display, notifier) = pipeline();
        let settings = Settings::default();

        let (value, _) = pipeline.show_usage(&snapshot(85.0), &settings);
        assert_eq!(value, 15);
        let (shown, color, _) = display.last().unwrap();
        assert_eq!(shown, DisplayValue::Percent(15));
        assert_eq!(color, ColorCategory::NormalLow);

        pipeline.show_usage(&snapshot(88.0), &settings);
        pipeline.show_usage(&snapshot(100.0), &settings);
        assert_eq!(
            notifier.kinds(),
            vec![NotificationKind::LowQuota, NotificationKind::ZeroQuota]
        );
        let (_, zero_payload) = notifier.sent.lock()[1].clone();
        assert!(zero_payload.ends_with("Come back at —"));
    }

    #[test]
    fn test_disabled_low_value_notifications() {
        let (mut pipeline, _display, notifier) = pipeline();
        let mut settings = Settings::default();
        settings.low_value_notifications.enabled = false;

        pipeline.show_usage(&snapshot(100.0), &settings);
        assert!(notifier.kinds().is_empty());
        assert!(!pipeline.notifications().zero_notified());
    }

    #[test]
    fn test_show_failure_keeps_last_value() {
        let (mut pipeline, display, notifier) = pipeline();
        let below = Escalation {
            error_count: 1,
            gray_mode: false,
            notify: false,
        };
        pipeline.show_failure(&below, DisplayValue::Percent(63), "old tooltip");
        assert_eq!(
            display.last().unwrap(),
            (
                DisplayValue::Percent(63),
                ColorCategory::NormalHigh,
                "old tooltip".to_string()
            )
        );

        let gray = Escalation {
            error_count: 5,
            gray_mode: true,
            notify: true,
        };
        pipeline.show_failure(&gray, DisplayValue::Percent(63), "old tooltip");
        let (value, color, tooltip) = display.last().unwrap();
        assert_eq!(value, DisplayValue::Percent(63));
        assert_eq!(color, ColorCategory::Error);
        assert!(tooltip.contains("5 consecutive failures"));
        assert_eq!(notifier.kinds(), vec![NotificationKind::AuthFailure]);
    }

    #[test]
    fn test_redisplay_repeats_last_update() {
        let (mut pipeline, display, _notifier) = pipeline();
        pipeline.redisplay("idle");
        assert_eq!(
            display.last().unwrap(),
            (DisplayValue::Unknown, ColorCategory::Error, "idle".to_string())
        );

        let gray = Escalation {
            error_count: 5,
            gray_mode: true,
            notify: false,
        };
        pipeline.show_failure(&gray, DisplayValue::Percent(40), "old tooltip");
        let before = display.last().unwrap();
        pipeline.redisplay("idle");
        assert_eq!(display.updates.lock().len(), 3);
        assert_eq!(display.last().unwrap(), before);
    }
}
