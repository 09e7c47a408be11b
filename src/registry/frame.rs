//! Broadcast frame and subscriber identity types
//!
//! A [`BroadcastFrame`] is one fully serialized upstream event. The router
//! never looks inside it; it is only cloned into subscriber mailboxes.

use bytes::Bytes;

/// Identity of one live subscriber connection
///
/// Allocated by the hub once per accepted connection and never reused
/// while the hub is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// A payload to be fanned out to every subscriber
///
/// Cheap to clone: every mailbox shares the same `Bytes` allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastFrame {
    data: Bytes,
}

impl BroadcastFrame {
    /// Wrap an already serialized payload
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Raw payload bytes
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Consume the frame, returning the payload bytes
    pub fn into_data(self) -> Bytes {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Bytes> for BroadcastFrame {
    fn from(data: Bytes) -> Self {
        Self::new(data)
    }
}
