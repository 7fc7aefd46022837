//! Parse the usage endpoint's JSON body.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::types::{UsageSnapshot, UsageWindow};
use crate::error::FetchError;

/// Expected body shape:
/// ```json
/// {
///   "five_hour": { "utilization": 37.0, "resets_at": "2026-03-01T14:00:00Z" },
///   "seven_day": { "utilization": 12.0, "resets_at": null }
/// }
/// ```
#[derive(Debug, Deserialize)]
struct RawUsage {
    five_hour: Option<RawWindow>,
    #[serde(default)]
    seven_day: Option<RawWindow>,
}

#[derive(Debug, Deserialize)]
struct RawWindow {
    #[serde(default)]
    utilization: Option<f64>,
    #[serde(default)]
    resets_at: Option<DateTime<Utc>>,
}

impl From<RawWindow> for UsageWindow {
    fn from(raw: RawWindow) -> Self {
        UsageWindow::new(raw.utilization.unwrap_or(0.0), raw.resets_at)
    }
}

/// Parse a usage response body into a snapshot.
///
/// The five-hour window is required; a missing seven-day window is treated
/// as zero utilization with no reset time.
pub fn parse_usage_body(body: &str) -> Result<UsageSnapshot, FetchError> {
    let raw: RawUsage =
        serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;

    let five_hour = raw
        .five_hour
        .ok_or_else(|| FetchError::Parse("missing five_hour window".to_string()))?;

    Ok(UsageSnapshot::new(
        five_hour.into(),
        raw.seven_day.map(UsageWindow::from).unwrap_or_default(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_usage_body() {
        let body = r#"{
            "five_hour": {"utilization": 72.0, "resets_at": "2026-03-01T14:00:00+00:00"},
            "seven_day": {"utilization": 23.5, "resets_at": null},
            "seven_day_opus": {"utilization": 0.0, "resets_at": null}
        }"#;

        let snapshot = parse_usage_body(body).unwrap();
        assert_eq!(snapshot.five_hour.utilization, 72.0);
        assert_eq!(
            snapshot.five_hour.resets_at,
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 14, 0, 0).unwrap())
        );
        assert_eq!(snapshot.seven_day.utilization, 23.5);
        assert!(snapshot.seven_day.resets_at.is_none());
        assert_eq!(snapshot.remaining_percent(), 28);
    }

    #[test]
    fn test_missing_seven_day_defaults() {
        let snapshot = parse_usage_body(r#"{"five_hour": {"utilization": 10}}"#).unwrap();
        assert_eq!(snapshot.remaining_percent(), 90);
        assert_eq!(snapshot.seven_day.utilization, 0.0);
    }

    #[test]
    fn test_missing_five_hour_is_error() {
        let err = parse_usage_body(r#"{"seven_day": {"utilization": 10}}"#).unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }

    #[test]
    fn test_invalid_json_is_error() {
        let err = parse_usage_body("<html>Just a moment...</html>").unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }
}
