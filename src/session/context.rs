//! Session context
//!
//! Metadata about one subscriber connection, captured at upgrade time.

use std::net::SocketAddr;
use std::time::Instant;

use crate::registry::SubscriberId;

/// Context for a single subscriber connection
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Unique subscriber ID
    pub id: SubscriberId,

    /// Remote peer address, when the transport exposes one
    pub peer_addr: Option<SocketAddr>,

    /// `Origin` header value presented at admission
    pub origin: Option<String>,

    /// When the connection was accepted
    pub connected_at: Instant,
}

impl SessionContext {
    /// Create a new context
    pub fn new(id: SubscriberId, peer_addr: Option<SocketAddr>, origin: Option<String>) -> Self {
        Self {
            id,
            peer_addr,
            origin,
            connected_at: Instant::now(),
        }
    }

    /// Context with no network metadata (in-process subscribers, tests)
    pub fn detached(id: SubscriberId) -> Self {
        Self::new(id, None, None)
    }
}

impl std::fmt::Display for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.peer_addr {
            Some(addr) => write!(f, "{}@{}", self.id, addr),
            None => write!(f, "{}", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let ctx = SessionContext::new(SubscriberId(7), Some(addr), Some("https://a.example".into()));
        assert_eq!(ctx.to_string(), "sub-7@127.0.0.1:9000");

        let ctx = SessionContext::detached(SubscriberId(8));
        assert_eq!(ctx.to_string(), "sub-8");
        assert!(ctx.origin.is_none());
    }
}
