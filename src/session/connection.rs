//! Subscriber connection loops
//!
//! Each subscriber connection runs two loops:
//!
//! - the **read loop** waits on inbound frames only to notice the peer going
//!   away (inbound content is ignored),
//! - the **write loop** drains the subscriber's mailbox onto the connection.
//!
//! Whichever loop ends first requests unregistration. The router ignores
//! repeat requests, so both loops may report the same subscriber safely.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::registry::{DropReason, Hub, Mailbox, SubscriberId};

use super::context::SessionContext;

/// Outbound half of a message-framed connection
#[async_trait]
pub trait FrameSink: Send + 'static {
    /// Write one payload as a single message frame
    async fn send(&mut self, payload: Bytes) -> Result<()>;

    /// Close the connection. Errors are swallowed; the peer may be gone.
    async fn close(&mut self);
}

/// Inbound half of a message-framed connection
#[async_trait]
pub trait FrameStream: Send + 'static {
    /// Next inbound frame, or `None` once the peer has closed
    async fn recv(&mut self) -> Option<Result<Bytes>>;
}

/// A bidirectional, message-framed connection (e.g. an upgraded WebSocket)
pub trait DuplexConnection: Send + 'static {
    type Sink: FrameSink;
    type Stream: FrameStream;

    /// Split into independently driven halves
    fn split(self) -> (Self::Sink, Self::Stream);
}

/// Per-session settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long to wait for the write loop to close the connection after
    /// the read side has ended
    pub close_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            close_timeout: Duration::from_secs(5),
        }
    }
}

impl SessionConfig {
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }
}

/// Drive one subscriber connection until it ends
///
/// Registers the subscriber with `hub`, runs the read and write loops, and
/// returns once the subscriber is unregistered and its connection closed
/// (or abandoned after [`SessionConfig::close_timeout`]).
pub async fn run_session<C: DuplexConnection>(
    hub: Hub,
    context: SessionContext,
    connection: C,
    config: SessionConfig,
) {
    let id = context.id;
    let (mut sink, mut stream) = connection.split();

    let mailbox = match hub.attach(context) {
        Ok(mailbox) => mailbox,
        Err(e) => {
            tracing::debug!(subscriber_id = %id, error = %e, "Subscriber refused");
            sink.close().await;
            return;
        }
    };

    let mut writer = tokio::spawn(write_loop(hub.clone(), id, sink, mailbox));

    tokio::select! {
        reason = read_loop(&hub, id, &mut stream) => {
            hub.unregister(id, reason);

            if tokio::time::timeout(config.close_timeout, &mut writer).await.is_err() {
                tracing::warn!(
                    subscriber_id = %id,
                    timeout_ms = config.close_timeout.as_millis() as u64,
                    "Write loop did not finish, abandoning connection"
                );
                writer.abort();
            }
        }
        _ = &mut writer => {}
    }

    tracing::debug!(subscriber_id = %id, "Session ended");
}

async fn read_loop<S: FrameStream>(hub: &Hub, id: SubscriberId, stream: &mut S) -> DropReason {
    let closed = hub.closed();
    tokio::pin!(closed);

    loop {
        tokio::select! {
            _ = &mut closed => return DropReason::Shutdown,
            inbound = stream.recv() => match inbound {
                Some(Ok(data)) => {
                    tracing::trace!(subscriber_id = %id, size = data.len(), "Ignoring inbound frame");
                }
                Some(Err(e)) => {
                    tracing::debug!(subscriber_id = %id, error = %e, "Read failed");
                    return DropReason::ReadError;
                }
                None => {
                    tracing::debug!(subscriber_id = %id, "Peer closed connection");
                    return DropReason::PeerClosed;
                }
            },
        }
    }
}

async fn write_loop<S: FrameSink>(hub: Hub, id: SubscriberId, mut sink: S, mut mailbox: Mailbox) {
    while let Some(frame) = mailbox.recv().await {
        if let Err(e) = sink.send(frame.into_data()).await {
            tracing::debug!(subscriber_id = %id, error = %e, "Write failed");
            hub.unregister(id, DropReason::WriteError);
            break;
        }
    }

    sink.close().await;
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use super::*;
    use crate::error::Error;
    use crate::registry::HubConfig;

    struct MockSink {
        tx: mpsc::UnboundedSender<Bytes>,
        fail: Arc<AtomicBool>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl FrameSink for MockSink {
        async fn send(&mut self, payload: Bytes) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) || self.closed.load(Ordering::SeqCst) {
                return Err(Error::transport("broken pipe"));
            }
            self.tx.send(payload).map_err(Error::transport)
        }

        async fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    struct MockStream {
        rx: mpsc::UnboundedReceiver<Result<Bytes>>,
    }

    #[async_trait]
    impl FrameStream for MockStream {
        async fn recv(&mut self) -> Option<Result<Bytes>> {
            self.rx.recv().await
        }
    }

    struct MockConnection {
        sink: MockSink,
        stream: MockStream,
    }

    impl DuplexConnection for MockConnection {
        type Sink = MockSink;
        type Stream = MockStream;

        fn split(self) -> (MockSink, MockStream) {
            (self.sink, self.stream)
        }
    }

    /// Test-side view of a mock connection
    struct Peer {
        outbound: mpsc::UnboundedReceiver<Bytes>,
        inbound: mpsc::UnboundedSender<Result<Bytes>>,
        fail: Arc<AtomicBool>,
        closed: Arc<AtomicBool>,
    }

    fn mock() -> (MockConnection, Peer) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let fail = Arc::new(AtomicBool::new(false));
        let closed = Arc::new(AtomicBool::new(false));

        let connection = MockConnection {
            sink: MockSink {
                tx: out_tx,
                fail: Arc::clone(&fail),
                closed: Arc::clone(&closed),
            },
            stream: MockStream { rx: in_rx },
        };
        let peer = Peer {
            outbound: out_rx,
            inbound: in_tx,
            fail,
            closed,
        };

        (connection, peer)
    }

    async fn wait_registered(hub: &Hub, id: SubscriberId) {
        timeout(Duration::from_secs(1), async {
            while !hub.contains(id).await.unwrap() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("subscriber never registered");
    }

    fn start(hub: &Hub, connection: MockConnection) -> (SubscriberId, tokio::task::JoinHandle<()>) {
        let id = hub.next_subscriber_id();
        let handle = tokio::spawn(run_session(
            hub.clone(),
            SessionContext::detached(id),
            connection,
            SessionConfig::default(),
        ));
        (id, handle)
    }

    #[tokio::test]
    async fn test_delivers_then_ends_on_peer_close() {
        let (hub, _router) = Hub::spawn(HubConfig::default());
        let (connection, mut peer) = mock();
        let (id, session) = start(&hub, connection);
        wait_registered(&hub, id).await;

        hub.broadcast(&br#"{"id":1}"#[..]).unwrap();
        assert_eq!(peer.outbound.recv().await.unwrap(), &br#"{"id":1}"#[..]);

        // Inbound content is ignored
        peer.inbound.send(Ok(Bytes::from_static(b"hello"))).unwrap();
        hub.broadcast(&br#"{"id":2}"#[..]).unwrap();
        assert_eq!(peer.outbound.recv().await.unwrap(), &br#"{"id":2}"#[..]);

        drop(peer.inbound);
        timeout(Duration::from_secs(1), session).await.unwrap().unwrap();

        assert!(peer.closed.load(Ordering::SeqCst));
        assert!(!hub.contains(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_read_error_unregisters() {
        let (hub, _router) = Hub::spawn(HubConfig::default());
        let (connection, peer) = mock();
        let (id, session) = start(&hub, connection);
        wait_registered(&hub, id).await;

        peer.inbound.send(Err(Error::transport("reset by peer"))).unwrap();
        timeout(Duration::from_secs(1), session).await.unwrap().unwrap();

        assert!(peer.closed.load(Ordering::SeqCst));
        assert!(!hub.contains(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_write_error_unregisters() {
        let (hub, _router) = Hub::spawn(HubConfig::default());
        let (connection, peer) = mock();
        let (id, session) = start(&hub, connection);
        wait_registered(&hub, id).await;

        peer.fail.store(true, Ordering::SeqCst);
        hub.broadcast("doomed").unwrap();

        // Ends even though the inbound side is still open
        timeout(Duration::from_secs(1), session).await.unwrap().unwrap();

        assert!(peer.closed.load(Ordering::SeqCst));
        let stats = hub.stats().await.unwrap();
        assert_eq!(stats.active_subscribers, 0);
        assert_eq!(stats.dropped_closed, 1);
        drop(peer.inbound);
    }

    #[tokio::test]
    async fn test_stop_ends_session() {
        let (hub, router) = Hub::spawn(HubConfig::default());
        let (connection, peer) = mock();
        let (id, session) = start(&hub, connection);
        wait_registered(&hub, id).await;

        hub.stop();
        timeout(Duration::from_secs(1), session).await.unwrap().unwrap();
        let stats = router.await.unwrap();

        assert!(peer.closed.load(Ordering::SeqCst));
        assert_eq!(stats.active_subscribers, 0);
        drop(peer.inbound);
    }

    /// Sink whose writes never complete, like a peer that stopped reading
    struct StalledSink {
        writes: Arc<AtomicBool>,
    }

    #[async_trait]
    impl FrameSink for StalledSink {
        async fn send(&mut self, _payload: Bytes) -> Result<()> {
            self.writes.store(true, Ordering::SeqCst);
            std::future::pending().await
        }

        async fn close(&mut self) {}
    }

    struct StalledConnection {
        sink: StalledSink,
        stream: MockStream,
    }

    impl DuplexConnection for StalledConnection {
        type Sink = StalledSink;
        type Stream = MockStream;

        fn split(self) -> (StalledSink, MockStream) {
            (self.sink, self.stream)
        }
    }

    #[tokio::test]
    async fn test_stalled_writer_abandoned_on_stop() {
        let (hub, router) = Hub::spawn(HubConfig::default());
        let writes = Arc::new(AtomicBool::new(false));
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let connection = StalledConnection {
            sink: StalledSink {
                writes: Arc::clone(&writes),
            },
            stream: MockStream { rx: in_rx },
        };

        let id = hub.next_subscriber_id();
        let session = tokio::spawn(run_session(
            hub.clone(),
            SessionContext::detached(id),
            connection,
            SessionConfig::default().close_timeout(Duration::from_millis(100)),
        ));
        wait_registered(&hub, id).await;

        hub.broadcast("x").unwrap();
        timeout(Duration::from_secs(1), async {
            while !writes.load(Ordering::SeqCst) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("write never started");

        hub.stop();
        timeout(Duration::from_secs(1), session).await.unwrap().unwrap();

        let stats = router.await.unwrap();
        assert_eq!(stats.active_subscribers, 0);
        drop(in_tx);
    }

    #[tokio::test]
    async fn test_stalled_writer_abandoned_on_peer_close() {
        let (hub, _router) = Hub::spawn(HubConfig::default());
        let (in_tx, in_rx) = mpsc::unbounded_channel::<Result<Bytes>>();
        let connection = StalledConnection {
            sink: StalledSink {
                writes: Arc::new(AtomicBool::new(false)),
            },
            stream: MockStream { rx: in_rx },
        };

        let id = hub.next_subscriber_id();
        let session = tokio::spawn(run_session(
            hub.clone(),
            SessionContext::detached(id),
            connection,
            SessionConfig::default().close_timeout(Duration::from_millis(100)),
        ));
        wait_registered(&hub, id).await;

        hub.broadcast("x").unwrap();
        drop(in_tx);

        timeout(Duration::from_secs(1), session).await.unwrap().unwrap();
        assert!(!hub.contains(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_refused_after_stop() {
        let (hub, router) = Hub::spawn(HubConfig::default());
        hub.stop();
        router.await.unwrap();

        let (connection, peer) = mock();
        let (_id, session) = start(&hub, connection);
        timeout(Duration::from_secs(1), session).await.unwrap().unwrap();

        assert!(peer.closed.load(Ordering::SeqCst));
        drop(peer.inbound);
    }
}
