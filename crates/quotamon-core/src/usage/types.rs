//! Usage data types for the five-hour and seven-day quota windows.

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Serialize;

/// Placeholder shown when the server did not report a reset time
pub const UNKNOWN_TIME: &str = "—";

/// Convert a utilization percentage into remaining capacity.
///
/// Out-of-range input is clamped to `[0, 100]` before rounding, so malformed
/// values such as `150` or `-10` still produce a displayable number.
pub fn remaining_percent(utilization: f64) -> u8 {
    if utilization.is_nan() {
        return 0;
    }
    (100.0 - utilization).clamp(0.0, 100.0).round() as u8
}

/// One quota window (e.g. the rolling five hours)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct UsageWindow {
    /// Percentage used (nominally 0-100)
    pub utilization: f64,
    /// When the window resets, if known
    pub resets_at: Option<DateTime<Utc>>,
}

impl UsageWindow {
    pub fn new(utilization: f64, resets_at: Option<DateTime<Utc>>) -> Self {
        Self {
            utilization,
            resets_at,
        }
    }

    /// Remaining capacity for this window
    pub fn remaining_percent(&self) -> u8 {
        remaining_percent(self.utilization)
    }
}

/// Result of one successful fetch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSnapshot {
    /// Rolling five-hour window; drives the indicator and notifications
    pub five_hour: UsageWindow,
    /// Seven-day window; informational only
    pub seven_day: UsageWindow,
    /// When this snapshot was captured
    pub fetched_at: DateTime<Utc>,
}

impl UsageSnapshot {
    pub fn new(five_hour: UsageWindow, seven_day: UsageWindow) -> Self {
        Self {
            five_hour,
            seven_day,
            fetched_at: Utc::now(),
        }
    }

    /// Remaining five-hour capacity, the value shown on the indicator
    pub fn remaining_percent(&self) -> u8 {
        self.five_hour.remaining_percent()
    }

    pub fn remaining_seven_day_percent(&self) -> u8 {
        self.seven_day.remaining_percent()
    }

    /// Five-hour reset time in local `HH:MM:SS`, or the unknown placeholder
    pub fn five_hour_reset_label(&self) -> String {
        reset_label(self.five_hour.resets_at, &Local, "%H:%M:%S")
    }

    /// Two-line tooltip in local time
    pub fn tooltip(&self) -> String {
        self.tooltip_in(&Local)
    }

    /// Two-line tooltip rendered in the given time zone
    pub fn tooltip_in<Tz: TimeZone>(&self, tz: &Tz) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        format!(
            "5h: {:.0}% used, resets {}\n7d: {:.0}% used, resets {}",
            self.five_hour.utilization,
            reset_label(self.five_hour.resets_at, tz, "%H:%M:%S"),
            self.seven_day.utilization,
            reset_label(self.seven_day.resets_at, tz, "%d.%m.%Y %H:%M:%S"),
        )
    }
}

fn reset_label<Tz: TimeZone>(at: Option<DateTime<Utc>>, tz: &Tz, fmt: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match at {
        Some(at) => at.with_timezone(tz).format(fmt).to_string(),
        None => UNKNOWN_TIME.to_string(),
    }
}
