//! Offline demo mode: a synthetic declining quota curve fed through the same
//! display and notification path as live data.

mod generator;
mod poller;

pub use generator::{demo_value, DemoGenerator, DemoSample, ZERO_HOLD_SECS};
pub use poller::{DemoPoller, DEMO_TICK};
