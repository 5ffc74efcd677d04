//! Error types for the ledger remote client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use ledger_remote::{Remote, Result};
//!
//! async fn example(remote: &Remote) -> Result<()> {
//!     let mut request = remote.request("ledger");
//!     request.ledger_select("validated")?;
//!     let ledger = request.send().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Connectivity | [`Error::NotConnected`], [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`] |
//! | Remote | [`Error::Remote`] |
//! | Validation | [`Error::InvalidArgument`], [`Error::InvalidLedgerHash`], [`Error::BuildPathWithLocalSigning`], [`Error::InvalidPublicKey`], [`Error::InvalidUrl`], [`Error::Config`] |
//! | Timeout | [`Error::Timeout`] |
//! | External | [`Error::Json`], [`Error::WebSocket`], [`Error::ChannelClosed`] |
//!
//! Validation errors are returned synchronously from request builders.
//! Connectivity and remote errors reach callers only through a request's
//! completion channel once it has been dispatched.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::RequestId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Connectivity Errors
    // ========================================================================
    /// No connected server was available at dispatch time.
    ///
    /// Returned synchronously from `request()`/`broadcast()`; no network
    /// attempt is made.
    #[error("Not connected: no reachable server")]
    NotConnected,

    /// Connection failed or could not carry a request.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Timed out while opening a connection to a server.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Connection closed while a request was outstanding.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Remote Errors
    // ========================================================================
    /// The backend answered with an error-status envelope.
    #[error("Remote error: {error} ({})", .error_message.as_deref().unwrap_or("no message"))]
    Remote {
        /// Error token reported by the server (e.g. `actNotFound`).
        error: String,
        /// Numeric error code, when present.
        error_code: Option<i64>,
        /// Human readable message, when present.
        error_message: Option<String>,
    },

    // ========================================================================
    // Validation Errors
    // ========================================================================
    /// Invalid argument passed to a builder.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// Ledger or transaction hash with the wrong shape.
    #[error("Invalid hash: {value:?} (expected 64 hexadecimal characters)")]
    InvalidLedgerHash {
        /// The rejected value.
        value: String,
    },

    /// Server-side path building requested while local signing is on.
    #[error("Cannot build path with local signing enabled")]
    BuildPathWithLocalSigning,

    /// Public key that the address codec could not decode.
    #[error("Invalid public key: {message}")]
    InvalidPublicKey {
        /// Description of the decoding failure.
        message: String,
    },

    /// Server URL that failed to parse.
    #[error("Invalid server URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Timeout Errors
    // ========================================================================
    /// No terminal signal observed within the armed window.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    Timeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a remote error from the fields of an error envelope.
    #[inline]
    pub fn remote(
        error: impl Into<String>,
        error_code: Option<i64>,
        error_message: Option<String>,
    ) -> Self {
        Self::Remote {
            error: error.into(),
            error_code,
            error_message,
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an invalid hash error.
    #[inline]
    pub fn invalid_ledger_hash(value: impl Into<String>) -> Self {
        Self::InvalidLedgerHash {
            value: value.into(),
        }
    }

    /// Creates an invalid public key error.
    #[inline]
    pub fn invalid_public_key(message: impl Into<String>) -> Self {
        Self::InvalidPublicKey {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::Timeout {
            request_id,
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectionTimeout { .. } | Self::Timeout { .. })
    }

    /// Returns `true` if this is a connectivity error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::NotConnected
                | Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if the backend reported this error.
    #[inline]
    #[must_use]
    pub fn is_remote_error(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// Returns `true` if this error was raised by input validation.
    #[inline]
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. }
                | Self::InvalidLedgerHash { .. }
                | Self::BuildPathWithLocalSigning
                | Self::InvalidPublicKey { .. }
                | Self::InvalidUrl(_)
                | Self::Config { .. }
        )
    }

    /// Returns the remote error token (e.g. `actNotFound`), if any.
    #[inline]
    #[must_use]
    pub fn remote_error(&self) -> Option<&str> {
        match self {
            Self::Remote { error, .. } => Some(error),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::connection("failed to connect");
        assert_eq!(err.to_string(), "Connection failed: failed to connect");
    }

    #[test]
    fn test_remote_error_display() {
        let err = Error::remote("actNotFound", Some(19), Some("Account not found.".into()));
        assert_eq!(err.to_string(), "Remote error: actNotFound (Account not found.)");

        let bare = Error::remote("unknownCmd", None, None);
        assert_eq!(bare.to_string(), "Remote error: unknownCmd (no message)");
    }

    #[test]
    fn test_timeout_display() {
        let err = Error::timeout(RequestId::new(7), 250);
        assert_eq!(err.to_string(), "Request 7 timed out after 250ms");
        assert!(err.is_timeout());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::NotConnected.is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(Error::connection("test").is_connection_error());
        assert!(!Error::config("test").is_connection_error());
    }

    #[test]
    fn test_is_validation_error() {
        assert!(Error::BuildPathWithLocalSigning.is_validation_error());
        assert!(Error::invalid_ledger_hash("abc").is_validation_error());
        assert!(!Error::NotConnected.is_validation_error());
        assert!(!Error::remote("x", None, None).is_validation_error());
    }

    #[test]
    fn test_remote_error_token() {
        let err = Error::remote("actNotFound", Some(19), None);
        assert!(err.is_remote_error());
        assert_eq!(err.remote_error(), Some("actNotFound"));
        assert_eq!(Error::ConnectionClosed.remote_error(), None);
    }

    #[test]
    fn test_from_json_error() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, Error::Json(_)));
        assert!(!err.is_validation_error());
    }

    #[test]
    fn test_from_url_error() {
        let err: Error = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, Error::InvalidUrl(_)));
        assert!(err.is_validation_error());
    }
}
