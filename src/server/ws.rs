//! WebSocket transport
//!
//! Adapts an upgraded axum [`WebSocket`] to the session's duplex traits.
//! Payloads go out as text frames; anything that is not valid UTF-8 is sent
//! as a binary frame instead.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};

use crate::error::{Error, Result};
use crate::session::{DuplexConnection, FrameSink, FrameStream};

/// An upgraded WebSocket connection
pub struct WsConnection {
    socket: WebSocket,
}

impl WsConnection {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

impl DuplexConnection for WsConnection {
    type Sink = WsSink;
    type Stream = WsStream;

    fn split(self) -> (WsSink, WsStream) {
        let (sink, stream) = self.socket.split();
        (WsSink { inner: sink }, WsStream { inner: stream })
    }
}

/// Write half of a WebSocket
pub struct WsSink {
    inner: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, payload: Bytes) -> Result<()> {
        let message = match std::str::from_utf8(&payload) {
            Ok(text) => Message::Text(text.to_owned()),
            Err(_) => Message::Binary(payload.to_vec()),
        };
        self.inner.send(message).await.map_err(Error::transport)
    }

    async fn close(&mut self) {
        if let Err(e) = self.inner.close().await {
            tracing::trace!(error = %e, "WebSocket close failed");
        }
    }
}

/// Read half of a WebSocket
pub struct WsStream {
    inner: SplitStream<WebSocket>,
}

#[async_trait]
impl FrameStream for WsStream {
    async fn recv(&mut self) -> Option<Result<Bytes>> {
        match self.inner.next().await? {
            Ok(Message::Close(_)) => None,
            // Pings are answered by the protocol layer
            Ok(message) => Some(Ok(Bytes::from(message.into_data()))),
            Err(e) => Some(Err(Error::transport(e))),
        }
    }
}
