//! Subscriber registry and fan-out routing
//!
//! The registry holds every live subscriber and routes each broadcast frame
//! into every subscriber's mailbox. One router task owns the registry; all
//! other components talk to it through a cloneable [`Hub`] handle.
//!
//! # Architecture
//!
//! ```text
//!   [Ingress]          [Session]           [Session]
//!   broadcast()        attach()            unregister()
//!        │                 │                   │
//!        └─────────────────┼───────────────────┘
//!                          ▼
//!              mpsc::UnboundedSender<Command>
//!                          │
//!                          ▼
//!                ┌───────────────────┐
//!                │ Router task       │
//!                │  Registry {       │
//!                │   id → Subscriber │
//!                │  }                │
//!                └─────────┬─────────┘
//!                          │ try_send (never blocks)
//!          ┌───────────────┼───────────────┐
//!          ▼               ▼               ▼
//!      [Mailbox]       [Mailbox]       [Mailbox]
//!      write loop      write loop      write loop ──► socket
//! ```
//!
//! # Backpressure
//!
//! Mailboxes are bounded. A subscriber whose mailbox is full when a frame
//! arrives is unregistered immediately rather than slowing the producer.
//! `BroadcastFrame` wraps `bytes::Bytes`, so fan-out clones only bump a
//! reference count.

pub mod config;
pub mod entry;
pub mod error;
pub mod frame;
pub mod router;
pub mod store;

pub use config::HubConfig;
pub use entry::{Mailbox, Subscriber};
pub use error::{DeliveryError, DropReason};
pub use frame::{BroadcastFrame, SubscriberId};
pub use router::Hub;
pub use store::Registry;
