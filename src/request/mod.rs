//! Requests: typed command builders with exactly-once completion.
//!
//! # Lifecycle
//!
//! 1. [`Remote::request`](crate::Remote::request) creates a [`Request`]
//!    bound to a command with an empty payload
//! 2. Builder calls fill in the payload, each validated on the spot
//! 3. [`Request::request`] or [`Request::broadcast`] dispatches it
//! 4. The first success, error, or timeout is delivered; everything after
//!    it is discarded
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `completion` | Completion and timeout state machine |
//! | `core` | Builders and dispatch |

// ============================================================================
// Submodules
// ============================================================================

/// Completion and timeout state machine.
pub mod completion;

/// Request builder and dispatch.
mod core;

// ============================================================================
// Re-exports
// ============================================================================

pub use completion::{Completion, RequestState};
pub use self::core::Request;
