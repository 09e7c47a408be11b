//! Subscriber session handling
//!
//! A session is one admitted connection: its [`SessionContext`] and the
//! read/write loops that tie it to the hub.

pub mod connection;
pub mod context;

pub use connection::{run_session, DuplexConnection, FrameSink, FrameStream, SessionConfig};
pub use context::SessionContext;
