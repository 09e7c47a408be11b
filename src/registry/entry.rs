//! Subscriber entry and mailbox types
//!
//! A subscriber is split in two halves that share a liveness flag:
//!
//! - [`Subscriber`] lives in the registry and is owned by the router. It
//!   holds the sending side of the mailbox.
//! - [`Mailbox`] is owned by the connection's write loop and drains frames
//!   onto the socket.
//!
//! Dropping the `Subscriber` (on unregistration) closes the mailbox.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::session::SessionContext;

use super::error::DeliveryError;
use super::frame::{BroadcastFrame, SubscriberId};

/// Registry-side half of a subscriber
#[derive(Debug)]
pub struct Subscriber {
    /// Session metadata for the underlying connection
    pub context: SessionContext,

    /// When the subscriber was created
    pub created_at: Instant,

    tx: mpsc::Sender<BroadcastFrame>,
    alive: Arc<AtomicBool>,
}

impl Subscriber {
    /// Create a subscriber and its mailbox with the given capacity
    pub fn channel(context: SessionContext, capacity: usize) -> (Self, Mailbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let alive = Arc::new(AtomicBool::new(true));

        let subscriber = Self {
            context,
            created_at: Instant::now(),
            tx,
            alive: Arc::clone(&alive),
        };

        (subscriber, Mailbox { rx, alive })
    }

    pub fn id(&self) -> SubscriberId {
        self.context.id
    }

    /// Whether the subscriber has not been unregistered yet
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Frames currently waiting in the mailbox
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Enqueue a frame without waiting
    pub fn offer(&self, frame: BroadcastFrame) -> Result<(), DeliveryError> {
        if !self.is_alive() {
            return Err(DeliveryError::Closed);
        }

        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Full,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Mark the subscriber dead
    ///
    /// The write loop stops before its next write. The mailbox itself closes
    /// when this value is dropped.
    pub(super) fn close(&self) {
        self.alive.store(false, Ordering::Release);
    }
}

/// Write-loop half of a subscriber
#[derive(Debug)]
pub struct Mailbox {
    rx: mpsc::Receiver<BroadcastFrame>,
    alive: Arc<AtomicBool>,
}

impl Mailbox {
    /// Wait for the next frame
    ///
    /// Returns `None` once the subscriber has been unregistered. Frames still
    /// queued at that point are discarded, never written.
    pub async fn recv(&mut self) -> Option<BroadcastFrame> {
        if !self.is_alive() {
            return None;
        }

        let frame = self.rx.recv().await?;

        if self.is_alive() {
            Some(frame)
        } else {
            None
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}
