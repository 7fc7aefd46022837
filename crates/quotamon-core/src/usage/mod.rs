//! Usage monitoring data: snapshot model, response parsing and the fetch seam.
//!
//! A snapshot is built fresh for every successful fetch and is never mutated;
//! the poll scheduler consumes it for display and notification decisions.

pub mod fetcher;
pub mod parser;
pub mod types;

pub use fetcher::UsageFetcher;
pub use parser::parse_usage_body;
pub use types::{remaining_percent, UsageSnapshot, UsageWindow, UNKNOWN_TIME};
