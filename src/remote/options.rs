//! Remote configuration.
//!
//! Options can be built in code through [`RemoteBuilder`](super::RemoteBuilder)
//! or deserialized from JSON:
//!
//! ```json
//! {
//!   "servers": ["wss://s1.example.net:443", "wss://s2.example.net:443"],
//!   "local_signing": false,
//!   "max_pending_requests": 200,
//!   "connect_timeout_ms": 10000
//! }
//! ```
//!
//! Every field is optional.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::transport::MAX_PENDING_REQUESTS;

// ============================================================================
// Constants
// ============================================================================

/// Default time allowed for a WebSocket handshake.
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 30_000;

// ============================================================================
// RemoteOptions
// ============================================================================

/// Configuration for a [`Remote`](super::Remote).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteOptions {
    /// Server URLs, in pool order.
    pub servers: Vec<String>,

    /// Sign transactions locally. Rules out server-side path building.
    pub local_signing: bool,

    /// Outstanding-request cap per server.
    pub max_pending_requests: usize,

    /// WebSocket handshake timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            local_signing: true,
            max_pending_requests: MAX_PENDING_REQUESTS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

impl RemoteOptions {
    /// Parses options from a JSON document.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the document is malformed or has unknown fields
    /// - [`Error::Config`] if a value is out of range
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Returns the handshake timeout.
    #[inline]
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Checks value ranges. Server URLs are checked when the pool is built.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero cap or zero timeout.
    pub fn validate(&self) -> Result<()> {
        if self.max_pending_requests == 0 {
            return Err(Error::config("max_pending_requests must be at least 1"));
        }

        if self.connect_timeout_ms == 0 {
            return Err(Error::config("connect_timeout_ms must be at least 1"));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = RemoteOptions::default();
        assert!(options.servers.is_empty());
        assert!(options.local_signing);
        assert_eq!(options.max_pending_requests, 100);
        assert_eq!(options.connect_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_from_json_partial() {
        let options = RemoteOptions::from_json(
            r#"{"servers": ["wss://localhost:5006"], "local_signing": false}"#,
        )
        .expect("parse");

        assert_eq!(options.servers, vec!["wss://localhost:5006"]);
        assert!(!options.local_signing);
        assert_eq!(options.max_pending_requests, 100);
    }

    #[test]
    fn test_from_json_rejects_unknown_fields() {
        let result = RemoteOptions::from_json(r#"{"trace": true}"#);
        assert!(matches!(result, Err(Error::Json(_))));
    }

    #[test]
    fn test_validate_ranges() {
        let result = RemoteOptions::from_json(r#"{"max_pending_requests": 0}"#);
        assert!(matches!(result, Err(Error::Config { .. })));

        let result = RemoteOptions::from_json(r#"{"connect_timeout_ms": 0}"#);
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
