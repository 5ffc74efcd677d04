//! Builder pattern for remote configuration.
//!
//! Provides a fluent API for configuring and creating [`Remote`] instances.
//!
//! # Example
//!
//! ```no_run
//! use ledger_remote::Remote;
//!
//! # fn example() -> ledger_remote::Result<()> {
//! let remote = Remote::builder()
//!     .server("wss://s1.example.net:443")
//!     .server("wss://s2.example.net:443")
//!     .local_signing(false)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

use super::core::Remote;
use super::options::RemoteOptions;

// ============================================================================
// RemoteBuilder
// ============================================================================

/// Builder for configuring a [`Remote`] instance.
///
/// Use [`Remote::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct RemoteBuilder {
    options: RemoteOptions,
}

impl RemoteBuilder {
    /// Creates a builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a server URL to the pool.
    #[inline]
    #[must_use]
    pub fn server(mut self, url: impl Into<String>) -> Self {
        self.options.servers.push(url.into());
        self
    }

    /// Appends several server URLs to the pool.
    #[inline]
    #[must_use]
    pub fn servers<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.servers.extend(urls.into_iter().map(Into::into));
        self
    }

    /// Enables or disables local signing.
    #[inline]
    #[must_use]
    pub fn local_signing(mut self, enabled: bool) -> Self {
        self.options.local_signing = enabled;
        self
    }

    /// Sets the outstanding-request cap per server.
    #[inline]
    #[must_use]
    pub fn max_pending_requests(mut self, max: usize) -> Self {
        self.options.max_pending_requests = max;
        self
    }

    /// Sets the WebSocket handshake timeout.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Replaces all options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: RemoteOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds the remote with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] for out-of-range values or duplicate servers
    /// - [`Error::InvalidUrl`] for a server URL that does not parse
    pub fn build(self) -> Result<Remote> {
        self.validate_servers()?;
        Remote::from_options(self.options)
    }
}

// ============================================================================
// Validation
// ============================================================================

impl RemoteBuilder {
    /// Rejects duplicated server URLs before any server is created.
    fn validate_servers(&self) -> Result<()> {
        for (index, url) in self.options.servers.iter().enumerate() {
            if self.options.servers[..index].contains(url) {
                return Err(Error::config(format!(
                    "Server listed twice: {url}\n\
                     Each server URL may appear only once in the pool."
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
