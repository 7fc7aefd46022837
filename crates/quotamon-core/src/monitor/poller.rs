use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Local, NaiveTime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::display::{DisplaySink, DisplayValue};
use super::escalation::{ErrorTracker, Escalation};
use super::notifier::Notifier;
use super::pipeline::{Pipeline, OUTSIDE_WORK_HOURS_TOOLTIP};
use crate::config::{ConfigStore, Settings};
use crate::error::FetchError;
use crate::session::SessionReceiver;
use crate::usage::UsageFetcher;

/// What started a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollTrigger {
    /// Timer tick; subject to the work-hours gate
    Scheduled,
    /// User request; bypasses the work-hours gate
    Manual,
}

/// Result of one poll, mostly for logging and tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// No session context yet; indicator shows "unknown"
    NoContext,
    /// Automatic poll outside the work-hours window
    OutsideWorkHours,
    /// Fetch succeeded with this remaining percentage
    Success(u8),
    Failure(Escalation),
    /// Shutdown arrived while the fetch was in flight; state untouched
    Cancelled,
}

/// State owned and mutated only by the scheduler
#[derive(Debug, Clone, Default)]
pub struct PollState {
    pub errors: ErrorTracker,
    pub last_value: DisplayValue,
    pub last_tooltip: String,
    pub manual_in_flight: bool,
}

/// Cloneable handle for requesting manual polls
#[derive(Clone)]
pub struct PollHandle {
    tx: mpsc::Sender<()>,
    pending: Arc<AtomicBool>,
}

impl PollHandle {
    /// Queue a manual poll.
    ///
    /// Returns false when a manual poll is already queued or running, or the
    /// scheduler has stopped.
    pub fn trigger_manual(&self) -> bool {
        if self.pending.swap(true, Ordering::AcqRel) {
            debug!("Manual poll already pending, ignoring request");
            return false;
        }
        if self.tx.try_send(()).is_err() {
            self.pending.store(false, Ordering::Release);
            return false;
        }
        true
    }
}

/// Timing loop for usage polls.
///
/// Scheduled ticks, manual requests and session changes are handled one at a
/// time on a single task, so a new fetch is never evaluated before the
/// previous one's success/failure handling has finished.
pub struct PollScheduler<F: UsageFetcher> {
    fetcher: F,
    config: Arc<ConfigStore>,
    session: SessionReceiver,
    pipeline: Pipeline,
    state: PollState,
    manual_rx: mpsc::Receiver<()>,
    manual_pending: Arc<AtomicBool>,
}

impl<F: UsageFetcher + 'static> PollScheduler<F> {
    /// Create a new scheduler
    ///
    /// Returns (PollScheduler, handle for manual polls)
    pub fn new(
        fetcher: F,
        config: Arc<ConfigStore>,
        session: SessionReceiver,
        display: Arc<dyn DisplaySink>,
        notifier: Arc<dyn Notifier>,
    ) -> (Self, PollHandle) {
        let (tx, manual_rx) = mpsc::channel(1);
        let pending = Arc::new(AtomicBool::new(false));
        let scheduler = Self {
            fetcher,
            config,
            session,
            pipeline: Pipeline::new(display, notifier),
            state: PollState::default(),
            manual_rx,
            manual_pending: pending.clone(),
        };
        (scheduler, PollHandle { tx, pending })
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Start polling in a background task
    pub fn start(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run(cancel).await;
        })
    }

    /// Run the polling loop until cancelled.
    ///
    /// The first tick fires immediately, so the initial poll does not wait for
    /// a full interval.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut period = self.config.current().poll_interval();
        let mut ticker = new_ticker(interval(period));
        let mut session_open = true;
        info!("Poll loop started (interval: {}s)", period.as_secs());

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    debug!("Poll tick (interval: {}s)", period.as_secs());
                    self.poll(PollTrigger::Scheduled, &cancel).await;

                    let next = self.config.current().poll_interval();
                    if next != period {
                        info!("Poll interval changed: {}s -> {}s", period.as_secs(), next.as_secs());
                        period = next;
                        ticker = new_ticker(interval_at(Instant::now() + period, period));
                    }
                }
                Some(()) = self.manual_rx.recv() => {
                    info!("Manual poll requested");
                    self.state.manual_in_flight = true;
                    self.poll(PollTrigger::Manual, &cancel).await;
                    self.state.manual_in_flight = false;
                    self.manual_pending.store(false, Ordering::Release);
                }
                changed = self.session.changed(), if session_open => {
                    match changed {
                        Ok(()) => {
                            let _ = self.session.borrow_and_update();
                            self.on_session_changed();
                        }
                        Err(_) => session_open = false,
                    }
                }
            }
        }

        info!("Poll loop stopped");
    }

    /// A new session context restarts every episode
    pub fn on_session_changed(&mut self) {
        self.state.errors.reset();
        self.pipeline.notifications_mut().reset_all();
        info!("New session context: error count and notification state reset");
    }

    /// Perform a single poll at the current local time
    pub async fn poll(&mut self, trigger: PollTrigger, cancel: &CancellationToken) -> PollOutcome {
        self.poll_at(trigger, Local::now().time(), cancel).await
    }

    /// Perform a single poll as if the local time of day were `now`
    pub async fn poll_at(
        &mut self,
        trigger: PollTrigger,
        now: NaiveTime,
        cancel: &CancellationToken,
    ) -> PollOutcome {
        let settings = self.config.current();

        let current = self.session.borrow().clone();
        let context = match current {
            Some(ctx) if ctx.is_usable() => ctx,
            _ => {
                debug!("No session context received yet");
                self.state.last_value = DisplayValue::Unknown;
                self.pipeline.display_no_context();
                return PollOutcome::NoContext;
            }
        };

        if trigger == PollTrigger::Scheduled && !settings.work_hours.allows(now) {
            debug!("Outside work hours, skipping automatic poll");
            self.pipeline.redisplay(OUTSIDE_WORK_HOURS_TOOLTIP);
            return PollOutcome::OutsideWorkHours;
        }

        match trigger {
            PollTrigger::Manual => info!("Manual poll: fetching usage"),
            PollTrigger::Scheduled => debug!("Automatic poll: fetching usage"),
        }

        let timeout = settings.fetch_timeout();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            result = tokio::time::timeout(
                timeout,
                self.fetcher.fetch_usage(&context, settings.proxy()),
            ) => result.unwrap_or(Err(FetchError::Timeout(timeout))),
        };

        match result {
            Ok(snapshot) => {
                let ended = self
                    .state
                    .errors
                    .record_success(self.pipeline.notifications_mut());
                if ended > 0 {
                    info!("Fetch succeeded after {} errors", ended);
                }
                let (remaining, tooltip) = self.pipeline.show_usage(&snapshot, &settings);
                debug!(remaining, "Usage updated");
                self.state.last_value = DisplayValue::Percent(remaining);
                self.state.last_tooltip = tooltip;
                PollOutcome::Success(remaining)
            }
            Err(e) => self.handle_failure(&settings, e),
        }
    }

    fn handle_failure(&mut self, settings: &Settings, err: FetchError) -> PollOutcome {
        let policy = settings.escalation_policy();
        let escalation = self
            .state
            .errors
            .record_failure(&policy, self.pipeline.notifications_mut());
        error!(
            "Usage fetch failed (error #{}): {}",
            escalation.error_count, err
        );

        if escalation.gray_mode {
            warn!(
                "Error count ({}) reached gray mode threshold ({})",
                escalation.error_count, policy.gray_mode_threshold
            );
        }
        if escalation.notify {
            warn!(
                "Error count ({}) reached notification threshold ({})",
                escalation.error_count, policy.notification_threshold
            );
        }

        self.pipeline
            .show_failure(&escalation, self.state.last_value, &self.state.last_tooltip);
        PollOutcome::Failure(escalation)
    }
}

fn new_ticker(mut ticker: Interval) -> Interval {
    // A slow fetch must not cause a burst of catch-up polls
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::monitor::testing::{RecordingDisplay, RecordingNotifier};
    use crate::monitor::{ColorCategory, NotificationKind, NO_CONTEXT_TOOLTIP};
    use crate::session::{SessionContext, SessionStore};
    use crate::usage::{UsageSnapshot, UsageWindow};

    /// Fetcher returning scripted results; an empty script yields transport errors
    #[derive(Default)]
    struct ScriptedFetcher {
        script: Mutex<VecDeque<Result<UsageSnapshot, FetchError>>>,
        calls: Arc<AtomicUsize>,
        delay: Option<Duration>,
    }

    impl ScriptedFetcher {
        fn push_ok(&self, utilization: f64) {
            self.script.lock().push_back(Ok(UsageSnapshot::new(
                UsageWindow::new(utilization, None),
                UsageWindow::default(),
            )));
        }

        fn push_err(&self) {
            self.script
                .lock()
                .push_back(Err(FetchError::Status(401)));
        }
    }

    impl UsageFetcher for ScriptedFetcher {
        async fn fetch_usage(
            &self,
            _context: &SessionContext,
            _proxy: Option<&str>,
        ) -> Result<UsageSnapshot, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.script.lock().pop_front();
            next.unwrap_or_else(|| Err(FetchError::Transport("connection refused".to_string())))
        }
    }

    struct Harness {
        scheduler: PollScheduler<ScriptedFetcher>,
        handle: PollHandle,
        session: SessionStore,
        config: Arc<ConfigStore>,
        display: Arc<RecordingDisplay>,
        notifier: Arc<RecordingNotifier>,
        calls: Arc<AtomicUsize>,
        cancel: CancellationToken,
    }

    fn test_settings() -> Settings {
        let mut settings = Settings::default();
        settings.work_hours.enabled = false;
        settings.gray_mode_threshold = 5;
        settings.notification_threshold = 3;
        settings.fetch_timeout_seconds = 1;
        settings
    }

    fn harness_with(settings: Settings, fetcher: ScriptedFetcher, with_context: bool) -> Harness {
        let session = SessionStore::new();
        if with_context {
            session.set_context(test_context());
        }
        let calls = fetcher.calls.clone();
        let display = Arc::new(RecordingDisplay::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let config = Arc::new(ConfigStore::from_settings(settings));
        let (mut scheduler, handle) = PollScheduler::new(
            fetcher,
            config.clone(),
            session.subscribe(),
            display.clone(),
            notifier.clone(),
        );
        // The context published above is not a "change" for this test's purposes
        let _ = scheduler.session.borrow_and_update();
        Harness {
            scheduler,
            handle,
            session,
            config,
            display,
            notifier,
            calls,
            cancel: CancellationToken::new(),
        }
    }

    fn harness(fetcher: ScriptedFetcher) -> Harness {
        harness_with(test_settings(), fetcher, true)
    }

    fn test_context() -> SessionContext {
        SessionContext::new(
            "sessionKey=abc",
            "https://example.com/api/organizations/org-1/usage",
            "org-1",
            HashMap::new(),
        )
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[tokio::test]
    async fn test_poll_without_context_shows_unknown() {
        let mut h = harness_with(test_settings(), ScriptedFetcher::default(), false);

        let outcome = h.scheduler.poll(PollTrigger::Manual, &h.cancel).await;
        assert_eq!(outcome, PollOutcome::NoContext);
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.scheduler.state().errors.count(), 0);
        assert_eq!(
            h.display.last().unwrap(),
            (
                DisplayValue::Unknown,
                ColorCategory::Error,
                NO_CONTEXT_TOOLTIP.to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_successful_poll_updates_display() {
        let fetcher = ScriptedFetcher::default();
        fetcher.push_ok(37.4);
        let mut h = harness(fetcher);

        let outcome = h.scheduler.poll(PollTrigger::Scheduled, &h.cancel).await;
        assert_eq!(outcome, PollOutcome::Success(63));
        assert_eq!(h.scheduler.state().last_value, DisplayValue::Percent(63));
        let (value, color, tooltip) = h.display.last().unwrap();
        assert_eq!(value, DisplayValue::Percent(63));
        assert_eq!(color, ColorCategory::NormalHigh);
        assert!(tooltip.starts_with("5h: 37% used"));
        assert!(h.notifier.kinds().is_empty());
    }

    #[tokio::test]
    async fn test_error_notification_once_per_streak() {
        let fetcher = ScriptedFetcher::default();
        fetcher.push_ok(50.0);
        for _ in 0..6 {
            fetcher.push_err();
        }
        fetcher.push_ok(40.0);
        for _ in 0..3 {
            fetcher.push_err();
        }
        let mut h = harness(fetcher);

        h.scheduler.poll(PollTrigger::Scheduled, &h.cancel).await;
        let mut notified = Vec::new();
        for _ in 0..6 {
            match h.scheduler.poll(PollTrigger::Scheduled, &h.cancel).await {
                PollOutcome::Failure(e) => notified.push(e.notify),
                other => panic!("unexpected outcome {:?}", other),
            }
        }
        assert_eq!(notified, vec![false, false, true, false, false, false]);
        assert_eq!(h.notifier.kinds(), vec![NotificationKind::AuthFailure]);

        // Success resets the streak immediately
        assert_eq!(
            h.scheduler.poll(PollTrigger::Scheduled, &h.cancel).await,
            PollOutcome::Success(60)
        );
        assert_eq!(h.scheduler.state().errors.count(), 0);
        assert!(!h.scheduler.pipeline().notifications().error_notified());

        for _ in 0..3 {
            h.scheduler.poll(PollTrigger::Scheduled, &h.cancel).await;
        }
        assert_eq!(
            h.notifier.kinds(),
            vec![NotificationKind::AuthFailure, NotificationKind::AuthFailure]
        );
    }

    #[tokio::test]
    async fn test_gray_mode_keeps_last_value_visible() {
        let fetcher = ScriptedFetcher::default();
        fetcher.push_ok(30.0);
        let mut settings = test_settings();
        settings.gray_mode_threshold = 2;
        let mut h = harness_with(settings, fetcher, true);

        h.scheduler.poll(PollTrigger::Scheduled, &h.cancel).await;

        h.scheduler.poll(PollTrigger::Scheduled, &h.cancel).await;
        let (value, color, _) = h.display.last().unwrap();
        assert_eq!(value, DisplayValue::Percent(70));
        assert_eq!(color, ColorCategory::NormalHigh);

        h.scheduler.poll(PollTrigger::Scheduled, &h.cancel).await;
        let (value, color, tooltip) = h.display.last().unwrap();
        assert_eq!(value, DisplayValue::Percent(70));
        assert_eq!(color, ColorCategory::Error);
        assert!(tooltip.contains("2 consecutive failures"));
    }

    #[tokio::test]
    async fn test_gray_mode_clears_on_next_success() {
        let fetcher = ScriptedFetcher::default();
        for _ in 0..5 {
            fetcher.push_err();
        }
        fetcher.push_ok(10.0);
        let mut h = harness(fetcher);

        for _ in 0..5 {
            h.scheduler.poll(PollTrigger::Scheduled, &h.cancel).await;
        }
        assert_eq!(h.display.last().unwrap().1, ColorCategory::Error);
        // Nothing was ever fetched, so the stale value is still unknown
        assert_eq!(h.display.last().unwrap().0, DisplayValue::Unknown);

        h.scheduler.poll(PollTrigger::Scheduled, &h.cancel).await;
        assert_eq!(
            h.display.last().unwrap().1,
            ColorCategory::NormalHigh,
        );
    }

    #[tokio::test]
    async fn test_new_session_resets_mid_streak() {
        let fetcher = ScriptedFetcher::default();
        fetcher.push_ok(85.0);
        for _ in 0..4 {
            fetcher.push_err();
        }
        let mut h = harness(fetcher);

        h.scheduler.poll(PollTrigger::Scheduled, &h.cancel).await;
        for _ in 0..4 {
            h.scheduler.poll(PollTrigger::Scheduled, &h.cancel).await;
        }
        assert_eq!(h.scheduler.state().errors.count(), 4);
        assert!(h.scheduler.pipeline().notifications().error_notified());
        assert!(h.scheduler.pipeline().notifications().low_value_notified());

        h.session.set_context(test_context());
        h.scheduler.on_session_changed();
        assert_eq!(h.scheduler.state().errors.count(), 0);
        let flags = h.scheduler.pipeline().notifications();
        assert!(!flags.error_notified());
        assert!(!flags.low_value_notified());
        assert!(!flags.zero_notified());
    }

    #[tokio::test]
    async fn test_work_hours_gate_applies_to_scheduled_polls_only() {
        let fetcher = ScriptedFetcher::default();
        fetcher.push_ok(10.0);
        fetcher.push_ok(10.0);
        let mut settings = test_settings();
        settings.work_hours.enabled = true;
        settings.work_hours.start = "08:00".parse().unwrap();
        settings.work_hours.end = "20:00".parse().unwrap();
        let mut h = harness_with(settings, fetcher, true);

        let outcome = h
            .scheduler
            .poll_at(PollTrigger::Scheduled, at(7, 59), &h.cancel)
            .await;
        assert_eq!(outcome, PollOutcome::OutsideWorkHours);
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            h.display.last().unwrap(),
            (
                DisplayValue::Unknown,
                ColorCategory::Error,
                OUTSIDE_WORK_HOURS_TOOLTIP.to_string()
            )
        );

        let outcome = h
            .scheduler
            .poll_at(PollTrigger::Manual, at(7, 59), &h.cancel)
            .await;
        assert_eq!(outcome, PollOutcome::Success(90));
        let shown = h.display.last().unwrap();
        assert_eq!(shown.0, DisplayValue::Percent(90));

        // A skipped tick keeps showing the last value
        let outcome = h
            .scheduler
            .poll_at(PollTrigger::Scheduled, at(7, 59), &h.cancel)
            .await;
        assert_eq!(outcome, PollOutcome::OutsideWorkHours);
        assert_eq!(h.display.updates.lock().len(), 3);
        assert_eq!(h.display.last().unwrap(), shown);

        let outcome = h
            .scheduler
            .poll_at(PollTrigger::Scheduled, at(8, 0), &h.cancel)
            .await;
        assert_eq!(outcome, PollOutcome::Success(90));
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let fetcher = ScriptedFetcher {
            delay: Some(Duration::from_secs(5)),
            ..ScriptedFetcher::default()
        };
        fetcher.push_ok(10.0);
        let mut h = harness(fetcher);

        match h.scheduler.poll(PollTrigger::Scheduled, &h.cancel).await {
            PollOutcome::Failure(e) => assert_eq!(e.error_count, 1),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_poll_leaves_state_untouched() {
        let fetcher = ScriptedFetcher::default();
        fetcher.push_err();
        let mut h = harness(fetcher);
        h.cancel.cancel();

        let outcome = h.scheduler.poll(PollTrigger::Scheduled, &h.cancel).await;
        assert_eq!(outcome, PollOutcome::Cancelled);
        assert_eq!(h.scheduler.state().errors.count(), 0);
        assert!(h.display.updates.lock().is_empty());
    }

    #[tokio::test]
    async fn test_run_polls_immediately_and_serves_manual_requests() {
        let fetcher = ScriptedFetcher::default();
        fetcher.push_ok(20.0);
        fetcher.push_ok(30.0);
        let mut settings = test_settings();
        settings.poll_interval_seconds = 3600;
        let h = harness_with(settings, fetcher, true);
        let calls = h.calls.clone();
        let display = h.display.clone();
        let handle = h.handle.clone();
        let cancel = h.cancel.clone();
        let task = h.scheduler.start(cancel.clone());

        wait_for(|| calls.load(Ordering::SeqCst) == 1).await;
        assert!(handle.trigger_manual());
        wait_for(|| calls.load(Ordering::SeqCst) == 2).await;
        wait_for(|| display.last().map(|d| d.0) == Some(DisplayValue::Percent(70))).await;

        cancel.cancel();
        task.await.unwrap();
        assert!(!handle.trigger_manual());
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_change_resets_streak_in_run_loop() {
        let mut settings = test_settings();
        settings.poll_interval_seconds = 60;
        let h = harness_with(settings, ScriptedFetcher::default(), true);
        let notifier = h.notifier.clone();
        let calls = h.calls.clone();
        let cancel = h.cancel.clone();
        let task = h.scheduler.start(cancel.clone());

        // Ticks at 0, 60 and 120 reach the notification threshold
        tokio::time::sleep(Duration::from_secs(150)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(notifier.kinds(), vec![NotificationKind::AuthFailure]);

        // Fresh cookies start a new streak, which notifies again at 300
        h.session.set_context(test_context());
        tokio::time::sleep(Duration::from_secs(180)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(
            notifier.kinds(),
            vec![NotificationKind::AuthFailure, NotificationKind::AuthFailure]
        );

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_change_applies_after_next_tick() {
        let mut settings = test_settings();
        settings.poll_interval_seconds = 60;
        let h = harness_with(settings.clone(), ScriptedFetcher::default(), true);
        let calls = h.calls.clone();
        let cancel = h.cancel.clone();
        let task = h.scheduler.start(cancel.clone());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        settings.poll_interval_seconds = 10;
        h.config.replace(settings);
        // Pending tick at 60 still fires, then every 10s: 70, 80
        tokio::time::sleep(Duration::from_secs(55)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_manual_trigger_is_not_reentrant() {
        let h = harness(ScriptedFetcher::default());
        assert!(h.handle.trigger_manual());
        assert!(!h.handle.trigger_manual());
    }

    async fn wait_for(cond: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }
}
