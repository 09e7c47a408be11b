//! Origin-based admission
//!
//! Checked once per upgrade request, before the WebSocket handshake. A
//! rejected request never becomes a subscriber.

use std::collections::HashSet;

/// Configuration value that disables origin checking
pub const ALLOW_ALL: &str = "*";

/// Which origins may connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginPolicy {
    /// Admit every request, including ones without an `Origin` header
    AllowAll,
    /// Admit only exact matches
    AllowList(HashSet<String>),
}

/// Admission predicate over the `Origin` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginGate {
    policy: OriginPolicy,
}

impl OriginGate {
    pub fn new(policy: OriginPolicy) -> Self {
        Self { policy }
    }

    pub fn allow_all() -> Self {
        Self::new(OriginPolicy::AllowAll)
    }

    /// Gate admitting exactly the given origins
    pub fn allow_list<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(OriginPolicy::AllowList(
            origins.into_iter().map(Into::into).collect(),
        ))
    }

    /// Parse a comma-separated allow-list
    ///
    /// `*` on its own disables checking. Entries are trimmed and empty
    /// entries are ignored, so an empty value admits nobody.
    pub fn parse(value: &str) -> Self {
        if value.trim() == ALLOW_ALL {
            return Self::allow_all();
        }

        Self::allow_list(
            value
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty()),
        )
    }

    pub fn policy(&self) -> &OriginPolicy {
        &self.policy
    }

    pub fn is_allow_all(&self) -> bool {
        matches!(self.policy, OriginPolicy::AllowAll)
    }

    /// Decide whether a request with this `Origin` header may connect
    pub fn admit(&self, origin: Option<&str>) -> bool {
        match &self.policy {
            OriginPolicy::AllowAll => {
                tracing::warn!(origin = ?origin, "Allowing all origins");
                true
            }
            OriginPolicy::AllowList(allowed) => {
                let admitted = origin.is_some_and(|o| allowed.contains(o));
                if !admitted {
                    tracing::warn!(origin = ?origin, "Connection from disallowed origin");
                }
                admitted
            }
        }
    }
}

impl Default for OriginGate {
    /// Admits nobody until origins are configured
    fn default() -> Self {
        Self::allow_list(Vec::<String>::new())
    }
}
