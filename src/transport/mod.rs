//! WebSocket transport layer.
//!
//! A [`Server`] is one endpoint in the pool. It owns the outstanding
//! request table for its link and correlates responses to requests by id.
//! The `link` module drives the socket itself.
//!
//! # Connection Lifecycle
//!
//! 1. `link::connect` - WebSocket handshake, bounded by the connect timeout
//! 2. `Server::attach` - Server becomes connected, frames flow to the link
//! 3. `Server::handle_message` - Responses complete outstanding requests
//! 4. `Server::handle_disconnect` - Outstanding requests fail with
//!    [`Error::ConnectionClosed`](crate::Error::ConnectionClosed)
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `link` | WebSocket event loop |
//! | `server` | Server endpoint and outstanding table |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket event loop.
pub mod link;

/// Server endpoint and outstanding table.
pub mod server;

// ============================================================================
// Re-exports
// ============================================================================

pub use server::{LinkCommand, MAX_PENDING_REQUESTS, Server, WeakServer};
