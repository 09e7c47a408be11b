//! Hub-wide counters
//!
//! Maintained by the router task alone, so plain integers suffice. Callers
//! get copies through [`crate::Hub::stats`].

use std::time::{Duration, Instant};

use crate::registry::DropReason;

/// Hub statistics snapshot
#[derive(Debug, Clone)]
pub struct HubStats {
    /// Subscribers currently registered
    pub active_subscribers: u64,
    /// Registrations ever accepted
    pub total_registered: u64,
    /// Unregistrations that actually removed a subscriber
    pub total_unregistered: u64,
    /// Broadcast requests processed
    pub broadcasts: u64,
    /// Frames successfully placed into mailboxes
    pub frames_enqueued: u64,
    /// Subscribers dropped because their mailbox was full
    pub dropped_slow: u64,
    /// Subscribers dropped because their mailbox or connection was gone
    pub dropped_closed: u64,
    /// Payload bytes accepted for broadcast
    pub bytes_broadcast: u64,
    /// When the router started
    pub started_at: Instant,
}

impl Default for HubStats {
    fn default() -> Self {
        Self {
            active_subscribers: 0,
            total_registered: 0,
            total_unregistered: 0,
            broadcasts: 0,
            frames_enqueued: 0,
            dropped_slow: 0,
            dropped_closed: 0,
            bytes_broadcast: 0,
            started_at: Instant::now(),
        }
    }
}

impl HubStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub(crate) fn on_register(&mut self) {
        self.total_registered += 1;
        self.active_subscribers += 1;
    }

    pub(crate) fn on_unregister(&mut self, reason: DropReason) {
        self.total_unregistered += 1;
        self.active_subscribers = self.active_subscribers.saturating_sub(1);

        match reason {
            DropReason::SlowConsumer => self.dropped_slow += 1,
            DropReason::MailboxClosed | DropReason::WriteError => self.dropped_closed += 1,
            _ => {}
        }
    }

    pub(crate) fn on_broadcast(&mut self, size: usize, enqueued: usize) {
        self.broadcasts += 1;
        self.bytes_broadcast += size as u64;
        self.frames_enqueued += enqueued as u64;
    }

    /// Average number of subscribers reached per broadcast
    pub fn average_fanout(&self) -> f64 {
        if self.broadcasts > 0 {
            self.frames_enqueued as f64 / self.broadcasts as f64
        } else {
            0.0
        }
    }
}
