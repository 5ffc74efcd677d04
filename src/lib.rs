//! Ledger Remote - Networking core for a distributed ledger client.
//!
//! This library keeps connections to several redundant ledger servers, lets
//! callers build structured remote commands, and resolves each command to
//! exactly one outcome: success, a remote-reported error, or a timeout.
//!
//! # Architecture
//!
//! The crate is built around three types:
//!
//! - **[`Remote`]**: owns the server pool, picks a server per request,
//!   creates requests
//! - **[`Request`]**: typed payload builder plus a completion state machine
//! - **[`Server`]**: one endpoint and its outstanding-request table
//!
//! Key design principles:
//!
//! - Responses are correlated to requests by a process-unique [`RequestId`]
//! - A request completes at most once; later outcomes are dropped
//! - A timed-out request never delivers a callback or event afterwards
//! - Builder input is validated synchronously; connectivity and remote
//!   errors arrive through completion only
//!
//! # Quick Start
//!
//! ```no_run
//! use ledger_remote::{Remote, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let remote = Remote::builder()
//!         .server("wss://s1.example.net:443")
//!         .server("wss://s2.example.net:443")
//!         .build()?;
//!     remote.connect().await?;
//!
//!     let mut request = remote.request("account_info");
//!     request
//!         .account("rKXCummUHnenhYudNb9UoJ4mGBR75vFcgz")?
//!         .ledger_select("validated")?;
//!     let info = request.send().await?;
//!     println!("{info}");
//!
//!     remote.disconnect();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`account`] | Public key activity checks |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Request correlation ids |
//! | [`protocol`] | Wire payload and response types |
//! | [`remote`] | Server pool, selection, configuration |
//! | [`request`] | Request builders and completion |
//! | [`transport`] | Server endpoints and the WebSocket link |

// ============================================================================
// Modules
// ============================================================================

/// Public key activity checks.
///
/// Built on top of [`Remote`]; address derivation is supplied by the caller.
pub mod account;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Request correlation ids.
pub mod identifiers;

/// Wire payload and response types.
pub mod protocol;

/// Server pool, selection, and configuration.
///
/// Use [`Remote::builder()`] to create a configured remote.
pub mod remote;

/// Request builders and completion.
pub mod request;

/// Server endpoints and the WebSocket link.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Account types
pub use account::{Account, AccountInfoSource, AccountRoot, AddressCodec};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::RequestId;

// Protocol types
pub use protocol::{
    Book, Hash256, IntoLedgerSelector, Issue, LedgerHash, LedgerSelector, LedgerTag, Message,
    Offer, Response, ResponseStatus, RippleState,
};

// Remote types
pub use remote::{Remote, RemoteBuilder, RemoteOptions};

// Request types
pub use request::{Request, RequestState};

// Transport types
pub use transport::Server;
