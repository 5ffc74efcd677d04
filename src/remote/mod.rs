//! Remote: the caller-facing handle to a pool of ledger servers.
//!
//! # Server Selection
//!
//! ```text
//! ┌──────────┐   request()   ┌───────────────────┐
//! │  Remote  │──────────────►│  get_server()     │
//! │          │               │  connected only,  │
//! │  pool:   │               │  fewest pending,  │
//! │  [s1,s2] │               │  pool order ties  │
//! └──────────┘               └─────────┬─────────┘
//!                                      │
//!                        ┌─────────────┴────────────┐
//!                        ▼                          ▼
//!                 ┌────────────┐             ┌────────────┐
//!                 │  Server 1  │◄──── ws ───►│  rippled   │
//!                 └────────────┘             └────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | Fluent configuration |
//! | `core` | Pool, selection, request factory |
//! | `options` | Configuration values |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent configuration.
pub mod builder;

/// Pool, selection, and request factory.
mod core;

/// Configuration values.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::RemoteBuilder;
pub use options::RemoteOptions;
pub use self::core::Remote;
