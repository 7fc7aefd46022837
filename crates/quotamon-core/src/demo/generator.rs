use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::usage::{UsageSnapshot, UsageWindow};

/// The last seconds of every cycle are pinned to zero
pub const ZERO_HOLD_SECS: f64 = 3.0;

/// Values in this range count as "top of a cycle"
const CYCLE_TOP: std::ops::RangeInclusive<u8> = 95..=100;

/// Remaining percentage at `position` seconds into a cycle of `duration` seconds
pub fn demo_value(position: f64, duration: f64) -> u8 {
    if position >= duration - ZERO_HOLD_SECS {
        return 0;
    }
    let value = (100.0 * (1.0 - position / duration)).round();
    value.clamp(0.0, 100.0) as u8
}

/// One demo tick's worth of output
#[derive(Debug, Clone, PartialEq)]
pub struct DemoSample {
    pub value: u8,
    /// Index of the cycle this sample belongs to; only ever increases
    pub cycle: u64,
    /// Seconds into the current cycle
    pub position: f64,
    /// The once-per-cycle greeting should fire on this tick
    pub greet: bool,
    pub snapshot: UsageSnapshot,
}

/// Deterministic 100 -> 0 sawtooth.
///
/// Cycles are counted from the start of the current one, so a duration change
/// stretches or shrinks the running cycle instead of renumbering past ones.
/// The greeting fires on the first top-of-cycle tick of each cycle and never
/// twice.
#[derive(Debug, Clone, Default)]
pub struct DemoGenerator {
    cycle: u64,
    cycle_start: f64,
    greeted_cycle: Option<u64>,
}

impl DemoGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample(&mut self, elapsed: Duration, duration: Duration, now: DateTime<Utc>) -> DemoSample {
        let duration = duration.max(Duration::from_secs(1)).as_secs_f64();
        let mut position = (elapsed.as_secs_f64() - self.cycle_start).max(0.0);
        let passed = (position / duration).floor();
        if passed >= 1.0 {
            self.cycle += passed as u64;
            self.cycle_start += passed * duration;
            position -= passed * duration;
        }
        let cycle = self.cycle;
        let value = demo_value(position, duration);

        let greet = CYCLE_TOP.contains(&value) && self.greeted_cycle != Some(cycle);
        if greet {
            self.greeted_cycle = Some(cycle);
        }

        DemoSample {
            value,
            cycle,
            position,
            greet,
            snapshot: synthetic_snapshot(value, now),
        }
    }
}

/// Snapshot whose remaining percentage equals `value`; the seven-day window
/// is half as used and both reset times sit at fixed offsets from `now`
fn synthetic_snapshot(value: u8, now: DateTime<Utc>) -> UsageSnapshot {
    let utilization = f64::from(100 - value.min(100));
    let mut snapshot = UsageSnapshot::new(
        UsageWindow::new(utilization, Some(now + TimeDelta::hours(2))),
        UsageWindow::new(utilization / 2.0, Some(now + TimeDelta::days(7))),
    );
    snapshot.fetched_at = now;
    snapshot
}
