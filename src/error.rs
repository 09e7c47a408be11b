//! Error types for the hub
//!
//! Per-subscriber delivery failures are not errors at this level; they are
//! handled inside the router (see [`crate::registry::DeliveryError`]).

use std::io;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket or listener I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Read or write failure on a live subscriber connection
    #[error("transport error: {0}")]
    Transport(String),

    /// An upstream event could not be turned into a payload
    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The router has stopped and accepts no more requests
    #[error("hub is shut down")]
    HubClosed,
}

impl Error {
    /// Wrap any displayable transport failure
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Error::Transport(err.to_string())
    }
}
