//! Consecutive fetch-failure counting and severity classification.

use super::notification::NotificationState;

/// Thresholds for the two escalation signals.
///
/// The thresholds are independent; either may be the larger one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationPolicy {
    pub gray_mode_threshold: u32,
    pub notification_threshold: u32,
}

/// Classification of one failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Escalation {
    /// Length of the current failure streak, including this failure
    pub error_count: u32,
    /// Indicator must show the error color
    pub gray_mode: bool,
    /// The auth-failure notification must fire now (once per streak)
    pub notify: bool,
}

/// Counts consecutive fetch failures
#[derive(Debug, Clone, Default)]
pub struct ErrorTracker {
    count: u32,
}

impl ErrorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Whether gray mode is active for the current streak
    pub fn is_gray(&self, policy: &EscalationPolicy) -> bool {
        self.count >= policy.gray_mode_threshold
    }

    /// Record a failure and classify it.
    ///
    /// The notification signal is guarded by the error flag in
    /// `notifications`, so it fires exactly once per unbroken streak.
    pub fn record_failure(
        &mut self,
        policy: &EscalationPolicy,
        notifications: &mut NotificationState,
    ) -> Escalation {
        self.count = self.count.saturating_add(1);
        let gray_mode = self.is_gray(policy);
        let notify =
            self.count >= policy.notification_threshold && notifications.mark_error_notified();
        Escalation {
            error_count: self.count,
            gray_mode,
            notify,
        }
    }

    /// Record a success: the streak ends and the error notification re-arms.
    ///
    /// Returns the length of the streak that just ended.
    pub fn record_success(&mut self, notifications: &mut NotificationState) -> u32 {
        let ended = self.count;
        self.count = 0;
        notifications.clear_error();
        ended
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(gray: u32, notify: u32) -> EscalationPolicy {
        EscalationPolicy {
            gray_mode_threshold: gray,
            notification_threshold: notify,
        }
    }

    #[test]
    fn test_notification_fires_once_per_streak() {
        let policy = policy(5, 3);
        let mut tracker = ErrorTracker::new();
        let mut state = NotificationState::default();

        let fired: Vec<bool> = (0..6)
            .map(|_| tracker.record_failure(&policy, &mut state).notify)
            .collect();
        assert_eq!(fired, vec![false, false, true, false, false, false]);

        // Success ends the streak and re-arms
        assert_eq!(tracker.record_success(&mut state), 6);
        assert_eq!(tracker.count(), 0);
        let fired: Vec<bool> = (0..3)
            .map(|_| tracker.record_failure(&policy, &mut state).notify)
            .collect();
        assert_eq!(fired, vec![false, false, true]);
    }

    #[test]
    fn test_gray_mode_threshold() {
        let policy = policy(2, 10);
        let mut tracker = ErrorTracker::new();
        let mut state = NotificationState::default();

        assert!(!tracker.record_failure(&policy, &mut state).gray_mode);
        let second = tracker.record_failure(&policy, &mut state);
        assert!(second.gray_mode);
        assert_eq!(second.error_count, 2);
        assert!(!second.notify);

        tracker.record_success(&mut state);
        assert!(!tracker.is_gray(&policy));
    }

    #[test]
    fn test_notification_threshold_below_gray_threshold() {
        let policy = policy(4, 1);
        let mut tracker = ErrorTracker::new();
        let mut state = NotificationState::default();

        let first = tracker.record_failure(&policy, &mut state);
        assert!(first.notify);
        assert!(!first.gray_mode);
        for _ in 0..3 {
            assert!(!tracker.record_failure(&policy, &mut state).notify);
        }
        assert!(tracker.is_gray(&policy));
    }
}
