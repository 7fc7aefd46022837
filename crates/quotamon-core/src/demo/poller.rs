use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::generator::{DemoGenerator, DemoSample};
use crate::config::ConfigStore;
use crate::monitor::{DisplaySink, NotificationKind, Notifier, Pipeline};

/// Demo tick period
pub const DEMO_TICK: Duration = Duration::from_secs(2);

/// Demo poller that replaces the real PollScheduler in demo mode.
///
/// Nothing is fetched, so there is no failure path and no error streak.
pub struct DemoPoller {
    config: Arc<ConfigStore>,
    pipeline: Pipeline,
    generator: DemoGenerator,
}

impl DemoPoller {
    pub fn new(
        config: Arc<ConfigStore>,
        display: Arc<dyn DisplaySink>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            pipeline: Pipeline::new(display, notifier),
            generator: DemoGenerator::new(),
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Start the demo loop in a background task
    pub fn start(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run(cancel).await;
        })
    }

    /// Main demo loop; the first tick fires immediately
    pub async fn run(mut self, cancel: CancellationToken) {
        let started = Instant::now();
        let mut ticker = interval(DEMO_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "Demo loop started (cycle: {}s)",
            self.config.current().demo_mode.duration_seconds
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick(started.elapsed());
                }
            }
        }

        info!("Demo loop stopped");
    }

    /// Run one demo step for the given time since the loop started
    pub fn tick(&mut self, elapsed: Duration) -> DemoSample {
        // Duration and notification settings may change between ticks
        let settings = self.config.current();
        let sample = self
            .generator
            .sample(elapsed, settings.demo_mode.duration(), Utc::now());
        debug!(
            "Demo: cycle_pos={:.1}s, value={}",
            sample.position, sample.value
        );

        self.pipeline.show_usage(&sample.snapshot, &settings);

        if sample.greet {
            info!(cycle = sample.cycle, "Demo: new cycle, sending greeting notification");
            self.pipeline
                .notify(NotificationKind::GreetingSent, "Demo cycle started");
        }
        sample
    }
}
