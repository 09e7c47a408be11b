//! Hub configuration

/// Default number of frames a subscriber may have queued before it is
/// considered too slow and dropped.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 16;

/// Configuration for the hub's router and subscriber mailboxes
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Per-subscriber mailbox capacity (always at least 1)
    pub mailbox_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }
}

impl HubConfig {
    /// Set the mailbox capacity
    ///
    /// A capacity of zero is raised to one; a subscriber always has room for
    /// a single pending frame.
    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity.max(1);
        self
    }
}
