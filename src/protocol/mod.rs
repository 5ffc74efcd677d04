//! Wire message types.
//!
//! This module defines the JSON messages exchanged with a ledger server.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Message` | Local → Server | Command with correlation `id` |
//! | `Response` | Server → Local | Echoed `id` plus `status` and `result` or error fields |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `ledger` | Ledger selectors and hashes |
//! | `message` | Outbound command payloads |
//! | `response` | Inbound response envelopes |

// ============================================================================
// Submodules
// ============================================================================

/// Ledger selectors and hashes.
pub mod ledger;

/// Outbound command payloads.
pub mod message;

/// Inbound response envelopes.
pub mod response;

// ============================================================================
// Re-exports
// ============================================================================

pub use ledger::{Hash256, IntoLedgerSelector, LedgerHash, LedgerSelector, LedgerTag};
pub use message::{Book, Issue, Message, Offer, RippleState};
pub use response::{Response, ResponseStatus};
