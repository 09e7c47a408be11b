//! Real-time WebSocket fan-out hub
//!
//! Receives discrete, already decoded events from a single upstream producer
//! and pushes each one to every connected WebSocket subscriber. Slow or dead
//! subscribers are dropped instead of slowing the producer or each other.
//!
//! # Architecture
//!
//! ```text
//!  upstream feed ──► IngressAdapter ──► Hub::broadcast
//!                                            │
//!                                     Router task (owns Registry)
//!                                            │ try_send per subscriber
//!                      ┌─────────────────────┼─────────────────────┐
//!                      ▼                     ▼                     ▼
//!                   Mailbox               Mailbox               Mailbox
//!                 write loop            write loop            write loop
//!                      │                     │                     │
//!                      ▼                     ▼                     ▼
//!                  WebSocket             WebSocket             WebSocket
//!
//!  GET /events ──► OriginGate ──► upgrade ──► run_session ──► Hub::attach
//! ```
//!
//! # Example
//!
//! ```no_run
//! use fanout_hub::{HubServer, OriginGate, ServerConfig};
//!
//! # async fn example() -> fanout_hub::error::Result<()> {
//! let config = ServerConfig::default().origins(OriginGate::parse("https://app.example"));
//! let server = HubServer::new(config);
//! let ingress = server.ingress();
//!
//! ingress.on_domain_event(&serde_json::json!({ "id": 1, "text": "hello" }))?;
//!
//! server
//!     .run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod ingress;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;

pub use error::{Error, Result};
pub use ingress::IngressAdapter;
pub use registry::{BroadcastFrame, DropReason, Hub, HubConfig, SubscriberId};
pub use server::{HubServer, OriginGate, ServerConfig};
pub use session::{SessionConfig, SessionContext};
pub use stats::HubStats;
