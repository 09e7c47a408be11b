//! Hub router
//!
//! A single task owns the [`Registry`] and consumes every register,
//! unregister and broadcast request from one unbounded command channel.
//! Registry mutation is therefore linearized without a lock, and a
//! broadcast never waits on any subscriber: each mailbox is offered the
//! frame with `try_send`, and a subscriber that cannot take it is dropped
//! on the spot.
//!
//! [`Hub`] is the cloneable handle the rest of the crate talks to.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::session::SessionContext;
use crate::stats::HubStats;

use super::config::HubConfig;
use super::entry::{Mailbox, Subscriber};
use super::error::DropReason;
use super::frame::{BroadcastFrame, SubscriberId};
use super::store::Registry;

enum Command {
    Register(Subscriber),
    Unregister {
        id: SubscriberId,
        reason: DropReason,
    },
    Broadcast(BroadcastFrame),
    Stats(oneshot::Sender<HubStats>),
    Contains(SubscriberId, oneshot::Sender<bool>),
    Stop,
}

struct HubInner {
    tx: mpsc::UnboundedSender<Command>,
    next_id: AtomicU64,
    config: HubConfig,
    closed: watch::Sender<bool>,
}

/// Handle to a running hub
///
/// Cheap to clone; every clone talks to the same router task.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

impl Hub {
    /// Start the router task
    ///
    /// The returned handle resolves to the final statistics once the hub
    /// has been stopped.
    pub fn spawn(config: HubConfig) -> (Self, JoinHandle<HubStats>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);

        let router = Router {
            rx,
            registry: Registry::new(),
            stats: HubStats::new(),
        };
        let handle = tokio::spawn(router.run());

        tracing::info!(
            mailbox_capacity = config.mailbox_capacity,
            "Hub started"
        );

        let hub = Self {
            inner: Arc::new(HubInner {
                tx,
                next_id: AtomicU64::new(1),
                config,
                closed,
            }),
        };

        (hub, handle)
    }

    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    /// Allocate an identity for a new connection
    pub fn next_subscriber_id(&self) -> SubscriberId {
        SubscriberId(self.inner.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Create a subscriber for `context` and register it
    ///
    /// Returns the mailbox the connection's write loop should drain. Every
    /// broadcast submitted after this returns reaches the mailbox, unless the
    /// subscriber is dropped first.
    pub fn attach(&self, context: SessionContext) -> Result<Mailbox> {
        let (subscriber, mailbox) = Subscriber::channel(context, self.inner.config.mailbox_capacity);
        self.register(subscriber)?;
        Ok(mailbox)
    }

    /// Submit a prepared subscriber for registration
    pub fn register(&self, subscriber: Subscriber) -> Result<()> {
        if self.is_closed() {
            return Err(Error::HubClosed);
        }
        self.send(Command::Register(subscriber))
    }

    /// Request removal of a subscriber
    ///
    /// Safe to call any number of times for the same identity; only the
    /// first request that finds it registered has an effect.
    pub fn unregister(&self, id: SubscriberId, reason: DropReason) {
        if self.send(Command::Unregister { id, reason }).is_err() {
            tracing::debug!(subscriber_id = %id, "Unregister after hub stopped");
        }
    }

    /// Submit an already serialized payload for fan-out
    ///
    /// Never blocks: the intake queue is unbounded.
    pub fn broadcast(&self, payload: impl Into<Bytes>) -> Result<()> {
        self.broadcast_frame(BroadcastFrame::new(payload))
    }

    pub fn broadcast_frame(&self, frame: BroadcastFrame) -> Result<()> {
        self.send(Command::Broadcast(frame))
    }

    /// Current statistics, observed after every request submitted before
    /// this call has been processed
    pub async fn stats(&self) -> Result<HubStats> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stats(reply))?;
        rx.await.map_err(|_| Error::HubClosed)
    }

    pub async fn subscriber_count(&self) -> Result<usize> {
        Ok(self.stats().await?.active_subscribers as usize)
    }

    /// Whether `id` is currently registered
    pub async fn contains(&self, id: SubscriberId) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Contains(id, reply))?;
        rx.await.map_err(|_| Error::HubClosed)
    }

    /// Stop the hub
    ///
    /// New registrations are refused immediately. The router then
    /// unregisters every subscriber, which closes their mailboxes and lets
    /// each write loop close its connection.
    pub fn stop(&self) {
        if self.inner.closed.send_replace(true) {
            return;
        }
        tracing::info!("Hub stopping");
        let _ = self.send(Command::Stop);
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }

    /// Resolves once [`Hub::stop`] has been called
    pub async fn closed(&self) {
        let mut rx = self.inner.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    fn send(&self, command: Command) -> Result<()> {
        self.inner.tx.send(command).map_err(|_| Error::HubClosed)
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("config", &self.inner.config)
            .field("closed", &self.is_closed())
            .finish()
    }
}

struct Router {
    rx: mpsc::UnboundedReceiver<Command>,
    registry: Registry,
    stats: HubStats,
}

impl Router {
    async fn run(mut self) -> HubStats {
        while let Some(command) = self.rx.recv().await {
            match command {
                Command::Register(subscriber) => self.register(subscriber),
                Command::Unregister { id, reason } => self.unregister(id, reason),
                Command::Broadcast(frame) => self.broadcast(frame),
                Command::Stats(reply) => {
                    let _ = reply.send(self.stats.clone());
                }
                Command::Contains(id, reply) => {
                    let _ = reply.send(self.registry.contains(id));
                }
                Command::Stop => break,
            }
        }

        // Refuse anything still queued; pending registrations are dropped,
        // which closes their mailboxes.
        self.rx.close();
        self.shutdown();

        tracing::info!(
            total_registered = self.stats.total_registered,
            broadcasts = self.stats.broadcasts,
            dropped_slow = self.stats.dropped_slow,
            "Hub stopped"
        );

        self.stats
    }

    fn register(&mut self, subscriber: Subscriber) {
        let id = subscriber.id();
        let peer = subscriber.context.peer_addr;
        let origin = subscriber.context.origin.clone();

        if let Some(previous) = self.registry.insert(subscriber) {
            previous.close();
            self.stats.on_unregister(DropReason::Replaced);
            tracing::warn!(
                subscriber_id = %id,
                "Duplicate registration, previous subscriber replaced"
            );
        }
        self.stats.on_register();

        tracing::info!(
            subscriber_id = %id,
            peer = ?peer,
            origin = ?origin,
            subscribers = self.registry.len(),
            "Subscriber registered"
        );
    }

    fn unregister(&mut self, id: SubscriberId, reason: DropReason) {
        let Some(subscriber) = self.registry.remove(id) else {
            tracing::debug!(subscriber_id = %id, reason = %reason, "Subscriber already removed");
            return;
        };
        self.stats.on_unregister(reason);

        let age_ms = subscriber.created_at.elapsed().as_millis() as u64;
        match reason {
            DropReason::SlowConsumer => tracing::warn!(
                subscriber_id = %id,
                age_ms = age_ms,
                subscribers = self.registry.len(),
                "Subscriber dropped: mailbox full (slow consumer)"
            ),
            DropReason::MailboxClosed | DropReason::WriteError => tracing::info!(
                subscriber_id = %id,
                reason = %reason,
                subscribers = self.registry.len(),
                "Subscriber dropped: peer vanished"
            ),
            _ => tracing::info!(
                subscriber_id = %id,
                reason = %reason,
                subscribers = self.registry.len(),
                "Subscriber unregistered"
            ),
        }
    }

    fn broadcast(&mut self, frame: BroadcastFrame) {
        let (enqueued, failed) = self.registry.offer_all(&frame);
        self.stats.on_broadcast(frame.len(), enqueued);

        tracing::trace!(
            size = frame.len(),
            enqueued = enqueued,
            failed = failed.len(),
            "Broadcast"
        );

        for (id, err) in failed {
            self.unregister(id, err.into());
        }
    }

    fn shutdown(&mut self) {
        let drained = self.registry.drain();
        for subscriber in &drained {
            self.stats.on_unregister(DropReason::Shutdown);
            tracing::debug!(subscriber_id = %subscriber.id(), "Subscriber closed on shutdown");
        }
    }
}
