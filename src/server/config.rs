//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::registry::HubConfig;
use crate::session::SessionConfig;

use super::origin::OriginGate;

/// Default listen address
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Default upgrade endpoint
pub const DEFAULT_PATH: &str = "/events";

/// Environment variables read by [`ServerConfig::from_env`]
pub mod env {
    pub const ALLOWED_ORIGINS: &str = "ALLOWED_ORIGINS";
    pub const LISTEN_ADDR: &str = "LISTEN_ADDR";
    pub const MAILBOX_CAPACITY: &str = "MAILBOX_CAPACITY";
    pub const MAX_CONNECTIONS: &str = "MAX_CONNECTIONS";
    pub const SHUTDOWN_GRACE_SECS: &str = "SHUTDOWN_GRACE_SECS";
}

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Path accepting WebSocket upgrades
    pub path: String,

    /// Origin admission
    pub origins: OriginGate,

    /// Maximum concurrent subscribers (0 = unlimited)
    pub max_connections: usize,

    /// How long shutdown waits for connections before giving up on them
    pub shutdown_grace: Duration,

    /// Router and mailbox settings
    pub hub: HubConfig,

    /// Per-connection settings
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            path: DEFAULT_PATH.to_string(),
            origins: OriginGate::default(),
            max_connections: 0,
            shutdown_grace: Duration::from_secs(15),
            hub: HubConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Load from process environment
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable lookup
    ///
    /// Unset variables keep their defaults. `ALLOWED_ORIGINS` unset means no
    /// origin is admitted.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(origins) = lookup(env::ALLOWED_ORIGINS) {
            config.origins = OriginGate::parse(&origins);
        }

        if let Some(addr) = lookup(env::LISTEN_ADDR) {
            config.bind_addr = parse_bind_addr(&addr)?;
        }

        if let Some(capacity) = lookup(env::MAILBOX_CAPACITY) {
            let capacity = parse_number(env::MAILBOX_CAPACITY, &capacity)?;
            config.hub = config.hub.mailbox_capacity(capacity as usize);
        }

        if let Some(max) = lookup(env::MAX_CONNECTIONS) {
            config.max_connections = parse_number(env::MAX_CONNECTIONS, &max)? as usize;
        }

        if let Some(secs) = lookup(env::SHUTDOWN_GRACE_SECS) {
            config.shutdown_grace =
                Duration::from_secs(parse_number(env::SHUTDOWN_GRACE_SECS, &secs)?);
        }

        Ok(config)
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the upgrade path
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set origin admission
    pub fn origins(mut self, origins: OriginGate) -> Self {
        self.origins = origins;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the shutdown grace period
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Set the per-subscriber mailbox capacity
    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.hub = self.hub.mailbox_capacity(capacity);
        self
    }

    /// Set session settings
    pub fn session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }
}

/// Parse a listen address
///
/// Accepts `IP:PORT`, a bare port (`:9000` or `9000`, bound on all
/// interfaces), and `localhost` in place of `127.0.0.1`.
pub fn parse_bind_addr(value: &str) -> Result<SocketAddr> {
    let normalized = value.trim().replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    let port = normalized.strip_prefix(':').unwrap_or(&normalized);
    if let Ok(port) = port.parse::<u16>() {
        return Ok(SocketAddr::from(([0, 0, 0, 0], port)));
    }

    Err(Error::Config(format!(
        "invalid listen address '{}', expected IP:PORT or :PORT",
        value
    )))
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} must be a non-negative integer, got '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.path, "/events");
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.shutdown_grace, Duration::from_secs(15));
        assert!(!config.origins.admit(Some("https://a.example")));
        assert_eq!(DEFAULT_BIND_ADDR.parse::<SocketAddr>().unwrap(), config.bind_addr);
    }

    #[test]
    fn test_from_vars() {
        let config = ServerConfig::from_vars(vars(&[
            (env::ALLOWED_ORIGINS, "https://a.example,https://b.example"),
            (env::LISTEN_ADDR, "127.0.0.1:9001"),
            (env::MAILBOX_CAPACITY, "4"),
            (env::MAX_CONNECTIONS, "100"),
            (env::SHUTDOWN_GRACE_SECS, "3"),
        ]))
        .unwrap();

        assert!(config.origins.admit(Some("https://b.example")));
        assert_eq!(config.bind_addr, "127.0.0.1:9001".parse().unwrap());
        assert_eq!(config.hub.mailbox_capacity, 4);
        assert_eq!(config.max_connections, 100);
        assert_eq!(config.shutdown_grace, Duration::from_secs(3));
    }

    #[test]
    fn test_from_vars_allow_all() {
        let config = ServerConfig::from_vars(vars(&[(env::ALLOWED_ORIGINS, "*")])).unwrap();
        assert!(config.origins.is_allow_all());
    }

    #[test]
    fn test_from_vars_rejects_garbage() {
        let result = ServerConfig::from_vars(vars(&[(env::MAILBOX_CAPACITY, "lots")]));
        assert!(matches!(result, Err(Error::Config(_))));

        let result = ServerConfig::from_vars(vars(&[(env::LISTEN_ADDR, "nowhere")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_parse_bind_addr() {
        assert_eq!(parse_bind_addr(":9000").unwrap().port(), 9000);
        assert_eq!(parse_bind_addr("9000").unwrap(), "0.0.0.0:9000".parse().unwrap());
        assert_eq!(
            parse_bind_addr("localhost:1936").unwrap(),
            "127.0.0.1:1936".parse().unwrap()
        );
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:8081".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .path("/feed")
            .origins(OriginGate::allow_all())
            .max_connections(50)
            .mailbox_capacity(0)
            .shutdown_grace(Duration::from_secs(1))
            .session(SessionConfig::default().close_timeout(Duration::from_millis(250)));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.path, "/feed");
        assert!(config.origins.is_allow_all());
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.hub.mailbox_capacity, 1);
        assert_eq!(config.shutdown_grace, Duration::from_secs(1));
        assert_eq!(config.session.close_timeout, Duration::from_millis(250));
    }
}
