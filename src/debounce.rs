//! Coalesces bursts of change events into one delayed notification
//!
//! The debouncer owns no thread and no OS timer. It keeps a single deadline
//! which the host checks from its event loop, so there is never more than
//! one pending notification.

use std::time::{Duration, Instant};
use tracing::{trace, warn};

use crate::constants::timing::MAX_DEBOUNCE_MS;

#[derive(Debug)]
pub struct ChangeDebouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl ChangeDebouncer {
    /// Delays above one day are clamped
    pub fn new(delay: Duration) -> Self {
        let max = Duration::from_millis(MAX_DEBOUNCE_MS);
        if delay > max {
            warn!(requested_ms = delay.as_millis() as u64, max_ms = MAX_DEBOUNCE_MS, "Debounce delay clamped");
        }
        Self { delay: delay.min(max), deadline: None }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Record a change at `now`. An already pending deadline is restarted.
    pub fn notify(&mut self, now: Instant) {
        let restarted = self.deadline.is_some();
        // An unrepresentable deadline fires on the next check
        self.deadline = Some(now.checked_add(self.delay).unwrap_or(now));
        trace!(restarted = restarted, delay_ms = self.delay.as_millis() as u64, "Debounce timer armed");
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the pending notification is due, zero if overdue
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(now))
    }

    /// Returns true exactly once per armed deadline, when `now` has reached it.
    /// The deadline is released on firing; the next `notify` arms a fresh one.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Drop any pending notification without firing it
    pub fn cancel(&mut self) {
        if self.deadline.take().is_some() {
            trace!("Debounce timer cancelled");
        }
    }
}
