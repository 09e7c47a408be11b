//! Ingress adapter

use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::registry::{BroadcastFrame, Hub};

/// Turns upstream domain events into broadcast frames
///
/// Cloneable and safe to call from any task; submission never blocks.
#[derive(Debug, Clone)]
pub struct IngressAdapter {
    hub: Hub,
}

impl IngressAdapter {
    pub fn new(hub: Hub) -> Self {
        Self { hub }
    }

    /// Serialize `event` to JSON and broadcast it
    ///
    /// A serialization failure is logged and returned; nothing is sent for
    /// that event.
    pub fn on_domain_event<E>(&self, event: &E) -> Result<()>
    where
        E: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(event).map_err(|e| {
            tracing::error!(error = %e, "Failed to serialize upstream event");
            e
        })?;

        self.hub.broadcast_frame(BroadcastFrame::new(payload))
    }

    /// Broadcast a payload that is already serialized
    pub fn on_raw_event(&self, payload: impl Into<bytes::Bytes>) -> Result<()> {
        self.hub.broadcast(payload)
    }

    /// Pump an upstream event stream into the hub
    ///
    /// Runs until the stream ends or the hub stops. The end of the feed is
    /// logged; subscribers stay connected and simply receive nothing new.
    /// The task returns the number of events forwarded.
    pub fn spawn_feed<S, E>(&self, feed: S) -> JoinHandle<u64>
    where
        S: Stream<Item = E> + Send + 'static,
        E: Serialize + Send + 'static,
    {
        let adapter = self.clone();

        tokio::spawn(async move {
            let mut feed = Box::pin(feed);
            let mut forwarded = 0u64;

            while let Some(event) = feed.next().await {
                match adapter.on_domain_event(&event) {
                    Ok(()) => forwarded += 1,
                    Err(crate::error::Error::HubClosed) => {
                        tracing::info!(forwarded = forwarded, "Hub closed, upstream feed detached");
                        return forwarded;
                    }
                    // Already logged; skip the event
                    Err(_) => {}
                }
            }

            tracing::warn!(forwarded = forwarded, "Upstream feed ended");
            forwarded
        })
    }
}
