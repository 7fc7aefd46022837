use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::schedule::GreetingSchedule;
use crate::config::{ConfigReceiver, ConfigStore};
use crate::error::SendError;
use crate::monitor::{NotificationKind, Notifier};
use crate::session::{SessionContext, SessionReceiver};

/// Outbound send capability for the greeting
pub trait GreetingSender: Send + Sync {
    fn send(
        &self,
        context: &SessionContext,
        destination: &str,
        text: &str,
        proxy: Option<&str>,
    ) -> impl Future<Output = Result<(), SendError>> + Send;
}

/// Fires the configured greeting once per scheduled instant.
///
/// The trigger stays inert until a session context arrives and re-arms from
/// the current configuration whenever the context or the `[greeting]` section
/// changes. A failed send is logged and retried only at the next instant.
pub struct GreetingTrigger<S: GreetingSender> {
    sender: S,
    config: Arc<ConfigStore>,
    config_rx: ConfigReceiver,
    session: SessionReceiver,
    notifier: Arc<dyn Notifier>,
    schedule: Option<GreetingSchedule>,
    next_fire: Option<DateTime<Local>>,
}

impl<S: GreetingSender + 'static> GreetingTrigger<S> {
    pub fn new(
        sender: S,
        config: Arc<ConfigStore>,
        session: SessionReceiver,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let config_rx = config.subscribe();
        Self {
            sender,
            config,
            config_rx,
            session,
            notifier,
            schedule: None,
            next_fire: None,
        }
    }

    /// Next armed instant, if any
    pub fn next_fire(&self) -> Option<DateTime<Local>> {
        self.next_fire
    }

    pub fn start(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run(cancel).await;
        })
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        let mut session_open = true;
        let mut config_open = true;
        let mut greeting = self.config.current().greeting.clone();
        // A context may already be present when the trigger starts
        self.rearm(Local::now());

        loop {
            let wait = self
                .next_fire
                .and_then(|at| (at - Local::now()).to_std().ok())
                .unwrap_or(Duration::ZERO);

            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = self.session.changed(), if session_open => {
                    match changed {
                        Ok(()) => {
                            let _ = self.session.borrow_and_update();
                            self.rearm(Local::now());
                        }
                        Err(_) => session_open = false,
                    }
                }
                changed = self.config_rx.changed(), if config_open => {
                    match changed {
                        Ok(()) => {
                            let current = self.config_rx.borrow_and_update().greeting.clone();
                            if current != greeting {
                                greeting = current;
                                info!("Greeting configuration changed");
                                if self.has_context() {
                                    self.rearm(Local::now());
                                }
                            }
                        }
                        Err(_) => config_open = false,
                    }
                }
                _ = tokio::time::sleep(wait), if self.next_fire.is_some() => {
                    let target = self.next_fire.take();
                    info!("Greeting schedule triggered");
                    if let Err(e) = self.fire(&cancel).await {
                        error!("Failed to send greeting: {}", e);
                    }
                    // The send may have outlived its minute; never fire twice for one instant
                    let after = target.map_or_else(Local::now, |t| t.max(Local::now()));
                    self.next_fire = self.schedule.and_then(|s| s.next_after(&after));
                }
            }
        }

        info!("Greeting trigger stopped");
    }

    fn has_context(&self) -> bool {
        self.session
            .borrow()
            .as_ref()
            .is_some_and(|ctx| ctx.is_usable())
    }

    /// Tear down the current schedule and rebuild it from configuration
    pub fn rearm(&mut self, now: DateTime<Local>) {
        self.schedule = None;
        self.next_fire = None;

        if !self.has_context() {
            debug!("No session context, greeting trigger inert");
            return;
        }
        let settings = self.config.current();
        if !settings.greeting.is_configured() {
            info!("Greeting not configured (schedule or chat id missing), trigger inert");
            return;
        }
        let schedule: GreetingSchedule = match settings.greeting.schedule.parse() {
            Ok(schedule) => schedule,
            Err(e) => {
                error!("Failed to set up greeting schedule: {}", e);
                return;
            }
        };

        self.schedule = Some(schedule);
        self.next_fire = schedule.next_after(&now);
        match self.next_fire {
            Some(at) => info!(
                "Greeting scheduled with {:?}, next at {}",
                settings.greeting.schedule,
                at.format("%Y-%m-%d %H:%M")
            ),
            None => error!("Greeting schedule {:?} never fires", settings.greeting.schedule),
        }
    }

    /// Send the greeting now using the configuration current at this moment
    pub async fn fire(&self, cancel: &CancellationToken) -> Result<(), SendError> {
        let settings = self.config.current();
        let context = self
            .session
            .borrow()
            .clone()
            .filter(|ctx| ctx.is_usable())
            .ok_or(SendError::NoContext)?;
        let destination = settings.greeting.chat_id.trim();
        if destination.is_empty() {
            return Err(SendError::MissingDestination);
        }
        let text = settings.greeting.text_or_default();
        info!("Sending greeting {:?} to chat {}", text, destination);

        let timeout = settings.fetch_timeout();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Greeting send abandoned on shutdown");
                return Ok(());
            }
            result = tokio::time::timeout(
                timeout,
                self.sender.send(&context, destination, text, settings.proxy()),
            ) => result.unwrap_or(Err(SendError::Timeout(timeout)))?,
        }

        info!("Greeting sent");
        self.notifier
            .notify(NotificationKind::GreetingSent, &format!("Sent \"{}\"", text));
        Ok(())
    }
}
