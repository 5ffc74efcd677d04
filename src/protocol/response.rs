//! Inbound response envelopes.
//!
//! # Format
//!
//! Success:
//! ```json
//! { "id": 1, "type": "response", "status": "success", "result": { ... } }
//! ```
//!
//! Error:
//! ```json
//! {
//!   "id": 3,
//!   "type": "response",
//!   "status": "error",
//!   "error": "actNotFound",
//!   "error_code": 19,
//!   "error_message": "Account not found."
//! }
//! ```
//!
//! Stream messages (`"type": "ledgerClosed"`, `"transaction"`, …) carry no
//! id and are not responses.

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

// ============================================================================
// Response
// ============================================================================

/// An inbound message as read off a server link.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// Echoed correlation id; absent on stream messages.
    #[serde(default)]
    pub id: Option<RequestId>,

    /// Message type (`response` for command replies).
    #[serde(rename = "type", default)]
    pub message_type: Option<String>,

    /// Envelope status.
    #[serde(default)]
    pub status: Option<ResponseStatus>,

    /// Result payload (if success).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error token (if error).
    #[serde(default)]
    pub error: Option<String>,

    /// Numeric error code (if error).
    #[serde(default)]
    pub error_code: Option<i64>,

    /// Error message (if error).
    #[serde(default)]
    pub error_message: Option<String>,
}

impl Response {
    /// Returns `true` if this message answers a command.
    #[inline]
    #[must_use]
    pub fn is_response(&self) -> bool {
        self.id.is_some()
            && self
                .message_type
                .as_deref()
                .is_none_or(|kind| kind == "response")
    }

    /// Returns `true` if the envelope reports an error.
    ///
    /// A missing status with an `error` field counts as an error.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        match self.status {
            Some(status) => status == ResponseStatus::Error,
            None => self.error.is_some(),
        }
    }

    /// Extracts the result value, or the remote error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Remote`] if the envelope reports an error.
    pub fn into_result(self) -> Result<Value> {
        if self.is_error() {
            let error = self.error.unwrap_or_else(|| "unknown error".to_string());
            return Err(Error::remote(error, self.error_code, self.error_message));
        }

        Ok(self.result.unwrap_or(Value::Null))
    }
}

// ============================================================================
// ResponseStatus
// ============================================================================

/// Envelope status discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    /// Successful response.
    Success,
    /// Error response.
    Error,
}

// ============================================================================
// Tests
// ============================================================================
