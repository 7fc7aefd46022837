use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, TimeZone, Timelike};

use crate::error::ConfigError;

/// Look-ahead bound for [`GreetingSchedule::next_after`]: two days covers any
/// daily schedule plus a DST shift
const SEARCH_MINUTES: i64 = 2 * 24 * 60;

/// Daily schedule: a minute and an hour, each fixed or "every".
///
/// Parsed from `HH:MM` or the cron subset `m h * * *`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GreetingSchedule {
    minute: Option<u32>,
    hour: Option<u32>,
}

impl GreetingSchedule {
    pub fn daily_at(hour: u32, minute: u32) -> Self {
        Self {
            minute: Some(minute),
            hour: Some(hour),
        }
    }

    fn matches(&self, hour: u32, minute: u32) -> bool {
        self.minute.is_none_or(|m| m == minute) && self.hour.is_none_or(|h| h == hour)
    }

    /// First matching instant strictly after `after`, at a whole minute
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let mut candidate = after.with_second(0)?.with_nanosecond(0)? + TimeDelta::minutes(1);
        for _ in 0..SEARCH_MINUTES {
            if self.matches(candidate.hour(), candidate.minute()) {
                return Some(candidate);
            }
            candidate = candidate + TimeDelta::minutes(1);
        }
        None
    }
}

impl FromStr for GreetingSchedule {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidSchedule(s.to_string());
        let s = s.trim();

        if let Some((h, m)) = s.split_once(':') {
            let hour = parse_field(h, 23).flatten().ok_or_else(invalid)?;
            let minute = parse_field(m, 59).flatten().ok_or_else(invalid)?;
            return Ok(Self::daily_at(hour, minute));
        }

        let fields: Vec<&str> = s.split_whitespace().collect();
        let [minute, hour, day, month, weekday] = fields.as_slice() else {
            return Err(invalid());
        };
        if [day, month, weekday].iter().any(|f| **f != "*") {
            return Err(invalid());
        }
        Ok(Self {
            minute: parse_field(minute, 59).ok_or_else(invalid)?,
            hour: parse_field(hour, 23).ok_or_else(invalid)?,
        })
    }
}

/// `*` -> Some(None); a number in range -> Some(Some(n)); anything else -> None
fn parse_field(field: &str, max: u32) -> Option<Option<u32>> {
    if field == "*" {
        return Some(None);
    }
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: u32 = field.parse().ok()?;
    (n <= max).then_some(Some(n))
}

impl fmt::Display for GreetingSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = |v: Option<u32>| v.map_or_else(|| "*".to_string(), |n| n.to_string());
        write!(f, "{} {} * * *", field(self.minute), field(self.hour))
    }
}
