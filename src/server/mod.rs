//! WebSocket server
//!
//! Accepts upgrade requests on a single path, applies origin admission, and
//! turns each upgraded connection into a hub subscriber.

pub mod config;
pub mod listener;
pub mod origin;
pub mod ws;

pub use config::ServerConfig;
pub use listener::HubServer;
pub use origin::{OriginGate, OriginPolicy};
pub use ws::WsConnection;
