//! Remote: server pool, selection, and request factory.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::{IntoLedgerSelector, Issue, LedgerTag};
use crate::request::Request;
use crate::transport::{Server, link};

use super::builder::RemoteBuilder;
use super::options::RemoteOptions;

// ============================================================================
// Remote
// ============================================================================

/// Shared state behind a [`Remote`] handle.
struct RemoteInner {
    /// Server pool in configuration order. Only pool operations mutate it.
    servers: RwLock<Vec<Server>>,
    /// Sign transactions locally.
    local_signing: AtomicBool,
    /// Options the remote was built from.
    options: RemoteOptions,
    /// Event loop tasks of open links.
    links: Mutex<Vec<JoinHandle<()>>>,
}

/// Caller-facing handle to the ledger network.
///
/// Owns the server pool, picks a server for each request, and creates
/// requests. Cloning is cheap; clones share the pool.
///
/// # Example
///
/// ```no_run
/// use ledger_remote::Remote;
///
/// # async fn example() -> ledger_remote::Result<()> {
/// let remote = Remote::builder()
///     .server("wss://s1.example.net:443")
///     .build()?;
/// remote.connect().await?;
///
/// let info = remote.request_server_info().send().await?;
/// println!("{info}");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Remote {
    inner: Arc<RemoteInner>,
}

// ============================================================================
// Remote - Constructor
// ============================================================================

impl Remote {
    /// Creates a remote with default options and an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::with_servers(Vec::new(), RemoteOptions::default())
    }

    /// Creates a builder.
    #[inline]
    #[must_use]
    pub fn builder() -> RemoteBuilder {
        RemoteBuilder::new()
    }

    /// Creates a remote from options, creating one server per URL.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] for out-of-range values or an unsupported scheme
    /// - [`Error::InvalidUrl`] for a server URL that does not parse
    pub fn from_options(options: RemoteOptions) -> Result<Self> {
        options.validate()?;

        let servers = options
            .servers
            .iter()
            .map(|url| Server::with_max_pending(url, options.max_pending_requests))
            .collect::<Result<Vec<_>>>()?;

        debug!(servers = servers.len(), "Remote created");

        Ok(Self::with_servers(servers, options))
    }

    fn with_servers(servers: Vec<Server>, options: RemoteOptions) -> Self {
        Self {
            inner: Arc::new(RemoteInner {
                servers: RwLock::new(servers),
                local_signing: AtomicBool::new(options.local_signing),
                options,
                links: Mutex::new(Vec::new()),
            }),
        }
    }
}

impl Default for Remote {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Remote - State
// ============================================================================

impl Remote {
    /// Returns `true` if local signing is enabled.
    #[inline]
    #[must_use]
    pub fn local_signing(&self) -> bool {
        self.inner.local_signing.load(Ordering::Acquire)
    }

    /// Enables or disables local signing.
    #[inline]
    pub fn set_local_signing(&self, enabled: bool) {
        self.inner.local_signing.store(enabled, Ordering::Release);
    }

    /// Returns `true` if any server is connected.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.servers.read().iter().any(Server::is_connected)
    }

    /// Returns the options this remote was built from.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &RemoteOptions {
        &self.inner.options
    }
}

// ============================================================================
// Remote - Pool
// ============================================================================

impl Remote {
    /// Adds a server to the end of the pool.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] / [`Error::Config`] for a bad URL
    /// - [`Error::Config`] if the URL is already in the pool
    pub fn add_server(&self, url: &str) -> Result<Server> {
        let server = Server::with_max_pending(url, self.inner.options.max_pending_requests)?;

        let mut servers = self.inner.servers.write();
        if servers.iter().any(|existing| existing.url() == server.url()) {
            return Err(Error::config(format!("Server already in pool: {url}")));
        }
        servers.push(server.clone());

        debug!(url = %server.url(), pool = servers.len(), "Server added");
        Ok(server)
    }

    /// Removes a server from the pool and closes it.
    ///
    /// Its outstanding requests fail with a connectivity error.
    pub fn remove_server(&self, url: &str) -> Option<Server> {
        let url = Url::parse(url).ok()?;
        let removed = {
            let mut servers = self.inner.servers.write();
            let index = servers.iter().position(|server| server.url() == &url)?;
            servers.remove(index)
        };

        removed.close();
        debug!(url = %removed.url(), "Server removed");
        Some(removed)
    }

    /// Returns a snapshot of the pool in order.
    #[must_use]
    pub fn servers(&self) -> Vec<Server> {
        self.inner.servers.read().clone()
    }

    /// Returns the connected servers in pool order.
    #[must_use]
    pub fn connected_servers(&self) -> Vec<Server> {
        self.inner
            .servers
            .read()
            .iter()
            .filter(|server| server.is_connected())
            .cloned()
            .collect()
    }

    /// Returns the pool size.
    #[inline]
    #[must_use]
    pub fn server_count(&self) -> usize {
        self.inner.servers.read().len()
    }

    /// Picks the connected server with the fewest outstanding requests.
    ///
    /// Ties go to the earlier server in the pool, so the choice is
    /// reproducible for a given pool state. Returns `None` when no server
    /// is connected.
    #[must_use]
    pub fn get_server(&self) -> Option<Server> {
        self.inner
            .servers
            .read()
            .iter()
            .filter(|server| server.is_connected())
            .min_by_key(|server| server.pending_count())
            .cloned()
    }
}

// ============================================================================
// Remote - Connection
// ============================================================================

impl Remote {
    /// Opens a WebSocket link to every disconnected server.
    ///
    /// Succeeds if at least one server is connected afterwards; individual
    /// failures are logged.
    ///
    /// # Errors
    ///
    /// Returns the last connection error if no server could be reached, or
    /// [`Error::NotConnected`] for an empty pool.
    pub async fn connect(&self) -> Result<()> {
        let timeout = self.inner.options.connect_timeout();
        let mut last_error = None;

        for server in self.servers() {
            if server.is_connected() {
                continue;
            }

            match link::connect(&server, timeout).await {
                Ok(handle) => self.track_link(handle),
                Err(e) => {
                    warn!(url = %server.url(), error = %e, "Failed to connect server");
                    last_error = Some(e);
                }
            }
        }

        if self.is_connected() {
            info!(
                connected = self.connected_servers().len(),
                pool = self.server_count(),
                "Remote connected"
            );
            return Ok(());
        }

        Err(last_error.unwrap_or(Error::NotConnected))
    }

    /// Keeps `handle`, dropping handles of loops that already exited.
    fn track_link(&self, handle: JoinHandle<()>) {
        let mut links = self.inner.links.lock();
        links.retain(|running| !running.is_finished());
        links.push(handle);
    }

    /// Closes every server link.
    ///
    /// Outstanding requests fail with a connectivity error.
    pub fn disconnect(&self) {
        for server in self.servers() {
            server.close();
        }

        // Event loops exit on their own after the shutdown command.
        self.inner.links.lock().clear();

        info!("Remote disconnected");
    }
}

// ============================================================================
// Remote - Requests
// ============================================================================

impl Remote {
    /// Creates a request for `command` with an empty payload.
    #[must_use]
    pub fn request(&self, command: impl Into<String>) -> Request {
        Request::new(self.clone(), command)
    }

    /// `server_info`.
    #[must_use]
    pub fn request_server_info(&self) -> Request {
        self.request("server_info")
    }

    /// `ledger`, optionally with transactions.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed selector.
    pub fn request_ledger(
        &self,
        selector: impl IntoLedgerSelector,
        transactions: bool,
    ) -> Result<Request> {
        let mut request = self.request("ledger");
        request.ledger_select(selector)?;
        if transactions {
            request.transactions(true).expand(true);
        }
        Ok(request)
    }

    /// `account_info` against the validated ledger.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a blank address.
    pub fn request_account_info(&self, account: impl Into<String>) -> Result<Request> {
        self.account_request("account_info", account)
    }

    /// `account_lines` against the validated ledger.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a blank address.
    pub fn request_account_lines(&self, account: impl Into<String>) -> Result<Request> {
        self.account_request("account_lines", account)
    }

    /// `account_offers` against the validated ledger.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a blank address.
    pub fn request_account_offers(&self, account: impl Into<String>) -> Result<Request> {
        self.account_request("account_offers", account)
    }

    /// `book_offers` for one side of an order book.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a blank currency.
    pub fn request_book_offers(&self, taker_gets: Issue, taker_pays: Issue) -> Result<Request> {
        let mut request = self.request("book_offers");
        request.book(taker_gets, taker_pays)?;
        Ok(request)
    }

    /// `tx` lookup by hash.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLedgerHash`] for a malformed hash.
    pub fn request_tx(&self, hash: impl Into<String>) -> Result<Request> {
        let mut request = self.request("tx");
        request.transaction(hash)?;
        Ok(request)
    }

    /// `submit` of a signed transaction blob.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty blob.
    pub fn request_submit(&self, tx_blob: impl Into<String>) -> Result<Request> {
        let mut request = self.request("submit");
        request.tx_blob(tx_blob)?;
        Ok(request)
    }

    /// `subscribe` to named streams.
    #[must_use]
    pub fn request_subscribe<I, S>(&self, streams: I) -> Request
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut request = self.request("subscribe");
        request.streams(streams);
        request
    }

    /// `unsubscribe` from named streams.
    #[must_use]
    pub fn request_unsubscribe<I, S>(&self, streams: I) -> Request
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut request = self.request("unsubscribe");
        request.streams(streams);
        request
    }

    fn account_request(&self, command: &str, account: impl Into<String>) -> Result<Request> {
        let mut request = self.request(command);
        request
            .account(account)?
            .ledger_select(LedgerTag::Validated)?;
        Ok(request)
    }
}

impl fmt::Debug for Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Remote")
            .field("servers", &*self.inner.servers.read())
            .field("local_signing", &self.local_signing())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
