//! # Reload Gate
//!
//! Reload is blocked as soon as any write is pending and released only
//! once nothing has been pending for the whole unblock delay.

use std::time::{Duration, Instant};

use crate::observability::{log_event, Event};

/// Default quiet period before reload is allowed again
pub const DEFAULT_RELOAD_UNBLOCK_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct ReloadGate {
    blocked: bool,
    unblock_delay: Duration,
    idle_since: Option<Instant>,
}

impl ReloadGate {
    pub fn new(unblock_delay: Duration) -> Self {
        Self {
            blocked: false,
            unblock_delay,
            idle_since: None,
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn unblock_delay(&self) -> Duration {
        self.unblock_delay
    }

    /// When a blocked gate will open if nothing new is written
    pub fn unblock_deadline(&self) -> Option<Instant> {
        if !self.blocked {
            return None;
        }
        self.idle_since.map(|since| since + self.unblock_delay)
    }

    /// Feed the current pending-write state; returns whether reload is blocked
    pub fn observe(&mut self, any_pending: bool, now: Instant) -> bool {
        if any_pending {
            self.idle_since = None;
            if !self.blocked {
                self.blocked = true;
                log_event(Event::ReloadBlocked);
            }
        } else if self.blocked {
            let since = *self.idle_since.get_or_insert(now);
            if now.saturating_duration_since(since) >= self.unblock_delay {
                self.blocked = false;
                self.idle_since = None;
                log_event(Event::ReloadUnblocked);
            }
        }

        self.blocked
    }
}

impl Default for ReloadGate {
    fn default() -> Self {
        Self::new(DEFAULT_RELOAD_UNBLOCK_DELAY)
    }
}
