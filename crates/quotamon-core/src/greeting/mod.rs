//! Scheduled outbound greeting, independent of the poll timer.

mod schedule;
mod trigger;

pub use schedule::GreetingSchedule;
pub use trigger::{GreetingSender, GreetingTrigger};
