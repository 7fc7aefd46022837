//! Usage monitoring state machine.
//!
//! The [`PollScheduler`] owns the timing loop and the per-poll state; on each
//! tick it drives the [`ErrorTracker`] (failures) or the [`Pipeline`]
//! (display update plus low/zero notification de-duplication).

mod display;
mod escalation;
mod notification;
mod notifier;
mod pipeline;
mod poller;

pub use display::{ColorCategory, DisplaySink, DisplayValue};
pub use escalation::{ErrorTracker, Escalation, EscalationPolicy};
pub use notification::{pick_phrase, NotificationState, QuotaAlert, QuotaEvent};
pub use notifier::{NotificationKind, Notifier};
pub use pipeline::{Pipeline, NO_CONTEXT_TOOLTIP, OUTSIDE_WORK_HOURS_TOOLTIP};
pub use poller::{PollHandle, PollOutcome, PollScheduler, PollState, PollTrigger};

#[cfg(test)]
pub(crate) use pipeline::testing;
