//! In-process display and notification sinks.
//!
//! Both keep their latest state for the `/status` endpoint and report through
//! `tracing`.

mod indicator;
mod notifications;

pub use indicator::{Indicator, IndicatorState};
pub use notifications::{NotificationCenter, NotificationRecord, HISTORY_LIMIT};
