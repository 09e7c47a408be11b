//! Delivery failure and drop reason types
//!
//! Neither of these is fatal to the hub. Each one ends exactly one subscriber.

/// Why a frame could not be enqueued into a subscriber's mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// Mailbox is at capacity (slow consumer)
    #[error("mailbox full")]
    Full,
    /// Write loop is gone or the subscriber was already unregistered
    #[error("mailbox closed")]
    Closed,
}

/// Why a subscriber left the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Peer closed the connection
    PeerClosed,
    /// Reading from the connection failed
    ReadError,
    /// Writing to the connection failed
    WriteError,
    /// Mailbox was full at broadcast time
    SlowConsumer,
    /// Mailbox was already closed at broadcast time
    MailboxClosed,
    /// A second registration replaced this one
    Replaced,
    /// The hub is shutting down
    Shutdown,
}

impl DropReason {
    /// Short label used in log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::PeerClosed => "peer_closed",
            DropReason::ReadError => "read_error",
            DropReason::WriteError => "write_error",
            DropReason::SlowConsumer => "slow_consumer",
            DropReason::MailboxClosed => "mailbox_closed",
            DropReason::Replaced => "replaced",
            DropReason::Shutdown => "shutdown",
        }
    }
}

impl From<DeliveryError> for DropReason {
    fn from(err: DeliveryError) -> Self {
        match err {
            DeliveryError::Full => DropReason::SlowConsumer,
            DeliveryError::Closed => DropReason::MailboxClosed,
        }
    }
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
