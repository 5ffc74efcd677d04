//! Request builder and dispatch.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::{
    Book, Hash256, IntoLedgerSelector, Issue, LedgerSelector, Message, Offer, RippleState,
};
use crate::remote::Remote;
use crate::transport::Server;

use super::completion::{Completion, RequestState};

// ============================================================================
// Request
// ============================================================================

/// One remote command: typed payload plus completion state.
///
/// Created by [`Remote::request`]. Builders mutate the payload and validate
/// their input synchronously; [`request`](Self::request) and
/// [`broadcast`](Self::broadcast) dispatch it. The outcome reaches the
/// registered callback and event listeners exactly once.
///
/// # Example
///
/// ```ignore
/// let mut request = remote.request("account_info");
/// request
///     .account("rKXCummUHnenhYudNb9UoJ4mGBR75vFcgz")?
///     .ledger_select("validated")?;
/// request.callback(|outcome| println!("{outcome:?}"));
/// request.request()?;
/// ```
pub struct Request {
    /// Owning remote.
    remote: Remote,
    /// Explicit target, overriding the remote's selection.
    server: Option<Server>,
    /// Command payload.
    message: Message,
    /// Completion shared with the servers' outstanding tables.
    completion: Arc<Completion>,
}

impl Request {
    /// Creates a request for `command` with an empty payload.
    pub(crate) fn new(remote: Remote, command: impl Into<String>) -> Self {
        let message = Message::new(command);
        let completion = Arc::new(Completion::new(RequestId::next(), &message.command));

        Self {
            remote,
            server: None,
            message,
            completion,
        }
    }

    /// Returns the correlation id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.completion.id()
    }

    /// Returns the command name.
    #[inline]
    #[must_use]
    pub fn command(&self) -> &str {
        &self.message.command
    }

    /// Returns the payload built so far.
    #[inline]
    #[must_use]
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Returns the pinned server, if any.
    #[inline]
    #[must_use]
    pub fn server(&self) -> Option<&Server> {
        self.server.as_ref()
    }

    /// Returns the lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> RequestState {
        self.completion.state()
    }
}

// ============================================================================
// Request - Ledger Selection
// ============================================================================

impl Request {
    /// Targets a ledger by hash, clearing any ledger index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLedgerHash`] unless `hash` is 64 hex characters.
    pub fn ledger_hash(&mut self, hash: impl Into<String>) -> Result<&mut Self> {
        self.message.ledger = Some(LedgerSelector::Hash(Hash256::parse(hash)?));
        Ok(self)
    }

    /// Targets a ledger by index, clearing any ledger hash.
    pub fn ledger_index(&mut self, index: u32) -> &mut Self {
        self.message.ledger = Some(LedgerSelector::Index(index));
        self
    }

    /// Targets a ledger by hash, index, or tag, classified by shape.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `selector` matches no shape.
    pub fn ledger_select(&mut self, selector: impl IntoLedgerSelector) -> Result<&mut Self> {
        self.message.ledger = Some(selector.into_ledger_selector()?);
        Ok(self)
    }
}

// ============================================================================
// Request - Accounts & Books
// ============================================================================

impl Request {
    /// Sets the single `account` field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a blank address.
    pub fn account(&mut self, account: impl Into<String>) -> Result<&mut Self> {
        self.message.account = Some(validate_account(account.into())?);
        Ok(self)
    }

    /// Sets the legacy `ident` field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a blank address.
    pub fn ident(&mut self, account: impl Into<String>) -> Result<&mut Self> {
        self.message.ident = Some(validate_account(account.into())?);
        Ok(self)
    }

    /// Replaces the `accounts` list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if any address is blank.
    pub fn accounts<I, S>(&mut self, accounts: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.message.accounts = Some(collect_accounts(accounts)?);
        Ok(self)
    }

    /// Appends to the `accounts` list, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a blank address.
    pub fn add_account(&mut self, account: impl Into<String>) -> Result<&mut Self> {
        let account = validate_account(account.into())?;
        self.message.accounts.get_or_insert_with(Vec::new).push(account);
        Ok(self)
    }

    /// Replaces the `accounts_proposed` list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if any address is blank.
    pub fn accounts_proposed<I, S>(&mut self, accounts: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.message.accounts_proposed = Some(collect_accounts(accounts)?);
        Ok(self)
    }

    /// Appends to the `accounts_proposed` list, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a blank address.
    pub fn add_account_proposed(&mut self, account: impl Into<String>) -> Result<&mut Self> {
        let account = validate_account(account.into())?;
        self.message
            .accounts_proposed
            .get_or_insert_with(Vec::new)
            .push(account);
        Ok(self)
    }

    /// Replaces the `books` list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if a book has a blank currency.
    pub fn books(&mut self, books: impl IntoIterator<Item = Book>) -> Result<&mut Self> {
        let books = books
            .into_iter()
            .map(validate_book)
            .collect::<Result<Vec<_>>>()?;
        self.message.books = Some(books);
        Ok(self)
    }

    /// Appends to the `books` list, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the book has a blank currency.
    pub fn add_book(&mut self, book: Book) -> Result<&mut Self> {
        let book = validate_book(book)?;
        self.message.books.get_or_insert_with(Vec::new).push(book);
        Ok(self)
    }

    /// Replaces the `streams` list.
    pub fn streams<I, S>(&mut self, streams: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.message.streams = Some(streams.into_iter().map(Into::into).collect());
        self
    }

    /// Appends to the `streams` list, creating it if absent.
    pub fn add_stream(&mut self, stream: impl Into<String>) -> &mut Self {
        self.message
            .streams
            .get_or_insert_with(Vec::new)
            .push(stream.into());
        self
    }

    /// Sets the order book sides for `book_offers`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a blank currency.
    pub fn book(&mut self, taker_gets: Issue, taker_pays: Issue) -> Result<&mut Self> {
        let book = validate_book(Book::new(taker_gets, taker_pays))?;
        self.message.taker_gets = Some(book.taker_gets);
        self.message.taker_pays = Some(book.taker_pays);
        Ok(self)
    }

    /// Sets the account viewing a book.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a blank address.
    pub fn taker(&mut self, account: impl Into<String>) -> Result<&mut Self> {
        self.message.taker = Some(validate_account(account.into())?);
        Ok(self)
    }
}

// ============================================================================
// Request - Ledger Objects
// ============================================================================

impl Request {
    /// Selects an offer by owner and sequence: `offer = {account, seq}`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a blank address.
    pub fn offer_id(&mut self, account: impl Into<String>, seq: u32) -> Result<&mut Self> {
        self.message.offer = Some(Offer::Id {
            account: validate_account(account.into())?,
            seq,
        });
        Ok(self)
    }

    /// Selects an offer by ledger index: `offer = n`.
    pub fn offer_index(&mut self, index: u64) -> &mut Self {
        self.message.offer = Some(Offer::Index(index));
        self
    }

    /// Selects the trust line between two accounts in one currency.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a blank address or currency.
    pub fn ripple_state(
        &mut self,
        account_a: impl Into<String>,
        account_b: impl Into<String>,
        currency: impl Into<String>,
    ) -> Result<&mut Self> {
        let accounts = [
            validate_account(account_a.into())?,
            validate_account(account_b.into())?,
        ];
        let currency = validate_currency(currency.into())?;
        self.message.ripple_state = Some(RippleState { currency, accounts });
        Ok(self)
    }
}

// ============================================================================
// Request - Transactions
// ============================================================================

impl Request {
    /// Sets the signing secret.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty secret.
    pub fn secret(&mut self, secret: impl Into<String>) -> Result<&mut Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(Error::invalid_argument("secret must not be empty"));
        }
        self.message.secret = Some(secret);
        Ok(self)
    }

    /// Sets the `tx_hash` field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLedgerHash`] unless `hash` is 64 hex characters.
    pub fn tx_hash(&mut self, hash: impl Into<String>) -> Result<&mut Self> {
        self.message.tx_hash = Some(Hash256::parse(hash)?);
        Ok(self)
    }

    /// Sets the `transaction` field used by the `tx` command.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLedgerHash`] unless `hash` is 64 hex characters.
    pub fn transaction(&mut self, hash: impl Into<String>) -> Result<&mut Self> {
        self.message.transaction = Some(Hash256::parse(hash)?);
        Ok(self)
    }

    /// Sets the transaction in JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] unless `tx_json` is a JSON object.
    pub fn tx_json(&mut self, tx_json: Value) -> Result<&mut Self> {
        match tx_json {
            Value::Object(map) => {
                self.message.tx_json = Some(map);
                Ok(self)
            }
            other => Err(Error::invalid_argument(format!(
                "tx_json must be an object, got {other}"
            ))),
        }
    }

    /// Sets the transaction in serialized form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty blob.
    pub fn tx_blob(&mut self, blob: impl Into<String>) -> Result<&mut Self> {
        let blob = blob.into();
        if blob.is_empty() {
            return Err(Error::invalid_argument("tx_blob must not be empty"));
        }
        self.message.tx_blob = Some(blob);
        Ok(self)
    }

    /// Sets or removes the `build_path` flag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BuildPathWithLocalSigning`] when enabling while the
    /// remote signs locally.
    pub fn build_path(&mut self, enable: bool) -> Result<&mut Self> {
        if !enable {
            self.message.build_path = None;
            return Ok(self);
        }

        if self.remote.local_signing() {
            return Err(Error::BuildPathWithLocalSigning);
        }

        self.message.build_path = Some(true);
        Ok(self)
    }
}

// ============================================================================
// Request - Paging
// ============================================================================

impl Request {
    /// Sets the page size.
    pub fn limit(&mut self, limit: u32) -> &mut Self {
        self.message.limit = Some(limit);
        self
    }

    /// Resumes from a marker returned by a previous page.
    pub fn marker(&mut self, marker: Value) -> &mut Self {
        self.message.marker = Some(marker);
        self
    }

    /// Includes transactions in a `ledger` response.
    pub fn transactions(&mut self, include: bool) -> &mut Self {
        self.message.transactions = Some(include);
        self
    }

    /// Expands transactions in a `ledger` response.
    pub fn expand(&mut self, expand: bool) -> &mut Self {
        self.message.expand = Some(expand);
        self
    }
}

// ============================================================================
// Request - Subscription
// ============================================================================

impl Request {
    /// Registers the callback, invoked once with the first success or
    /// error. It never runs on timeout.
    pub fn callback<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnOnce(Result<Value>) + Send + 'static,
    {
        self.completion.set_callback(Box::new(callback));
        self
    }

    /// Registers the `success` event listener.
    pub fn on_success<F>(&mut self, listener: F) -> &mut Self
    where
        F: FnOnce(&Value) + Send + 'static,
    {
        self.completion.set_success_listener(Box::new(listener));
        self
    }

    /// Registers the `error` event listener.
    pub fn on_error<F>(&mut self, listener: F) -> &mut Self
    where
        F: FnOnce(&Error) + Send + 'static,
    {
        self.completion.set_error_listener(Box::new(listener));
        self
    }

    /// Arms a timer of `window`.
    ///
    /// If nothing terminal happens first, the request becomes timed-out,
    /// `on_timeout` runs, and no callback or event fires afterwards. Any
    /// terminal signal before that cancels the timer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when called outside a tokio runtime.
    pub fn timeout<F>(&mut self, window: Duration, on_timeout: F) -> Result<&mut Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let runtime = Handle::try_current()
            .map_err(|_| Error::config("Request::timeout requires a tokio runtime"))?;

        let completion = Arc::clone(&self.completion);
        let timer = runtime.spawn(async move {
            sleep(window).await;
            completion.expire();
        });

        self.completion
            .arm_timer(window, Box::new(on_timeout), timer.abort_handle());
        Ok(self)
    }
}

// ============================================================================
// Request - Dispatch
// ============================================================================

impl Request {
    /// Pins the target server, overriding the remote's selection.
    pub fn set_server(&mut self, server: Server) -> &mut Self {
        self.server = Some(server);
        self
    }

    /// Sends the request to one server.
    ///
    /// The pinned server is used if set, otherwise the remote's selection.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if no reachable server exists
    /// - [`Error::InvalidArgument`] if the request was already dispatched
    /// - [`Error::Connection`] if the server's outstanding cap is reached or
    ///   its link has gone away
    ///
    /// A refused dispatch leaves the request `Pending`.
    pub fn request(&self) -> Result<()> {
        self.ensure_pending()?;

        let server = match &self.server {
            Some(server) if server.is_connected() => server.clone(),
            Some(_) => return Err(Error::NotConnected),
            None => self.remote.get_server().ok_or(Error::NotConnected)?,
        };

        let frame = self.message.to_frame(self.id())?;

        debug!(
            request_id = %self.id(),
            command = %self.message.command,
            url = %server.url(),
            "Dispatching request"
        );

        server.send(&self.completion, frame)
    }

    /// Sends the request to every connected server.
    ///
    /// The first terminal response wins; later responses are dropped.
    /// Returns the number of servers whose link took the frame; servers
    /// that refuse it are skipped.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if no server is connected
    /// - [`Error::InvalidArgument`] if the request was already dispatched
    /// - the last send error if every server refused the request
    pub fn broadcast(&self) -> Result<usize> {
        self.ensure_pending()?;

        let servers = self.remote.connected_servers();
        if servers.is_empty() {
            return Err(Error::NotConnected);
        }

        let frame = self.message.to_frame(self.id())?;

        let mut sent = 0;
        let mut last_error = None;
        for server in &servers {
            match server.send(&self.completion, frame.clone()) {
                Ok(()) => sent += 1,
                Err(e) => {
                    warn!(url = %server.url(), error = %e, "Broadcast skipped server");
                    last_error = Some(e);
                }
            }
        }

        debug!(
            request_id = %self.id(),
            command = %self.message.command,
            servers = sent,
            "Broadcast request"
        );

        match (sent, last_error) {
            (0, Some(e)) => Err(e),
            _ => Ok(sent),
        }
    }

    /// Dispatches with [`request`](Self::request) and waits for the outcome.
    ///
    /// A previously registered callback is replaced. If a timeout was armed
    /// and fires first, its handler runs and this returns
    /// [`Error::Timeout`].
    ///
    /// # Errors
    ///
    /// Dispatch errors, the remote or connectivity error delivered on
    /// completion, or [`Error::Timeout`].
    pub async fn send(mut self) -> Result<Value> {
        let (tx, rx) = oneshot::channel();
        self.callback(move |outcome| {
            let _ = tx.send(outcome);
        });
        self.request()?;

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) if self.state() == RequestState::TimedOut => {
                let window = self.completion.timeout().unwrap_or_default();
                Err(Error::timeout(self.id(), window.as_millis() as u64))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn ensure_pending(&self) -> Result<()> {
        match self.state() {
            RequestState::Pending => Ok(()),
            state => Err(Error::invalid_argument(format!(
                "request {} cannot be dispatched in state {state:?}",
                self.id()
            ))),
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id())
            .field("message", &self.message)
            .field("server", &self.server)
            .field("state", &self.state())
            .finish()
    }
}

// ============================================================================
// Validation
// ============================================================================

fn validate_account(account: String) -> Result<String> {
    if account.is_empty() || account.chars().any(char::is_whitespace) {
        return Err(Error::invalid_argument(format!(
            "invalid account address: {account:?}"
        )));
    }
    Ok(account)
}

fn collect_accounts<I, S>(accounts: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    accounts
        .into_iter()
        .map(|account| validate_account(account.into()))
        .collect()
}

fn validate_currency(currency: String) -> Result<String> {
    if currency.trim().is_empty() {
        return Err(Error::invalid_argument("currency must not be empty"));
    }
    Ok(currency)
}

fn validate_book(book: Book) -> Result<Book> {
    for issue in [&book.taker_gets, &book.taker_pays] {
        if issue.currency.trim().is_empty() {
            return Err(Error::invalid_argument("book currency must not be empty"));
        }
        if let Some(issuer) = &issue.issuer
            && issuer.is_empty()
        {
            return Err(Error::invalid_argument("book issuer must not be empty"));
        }
    }
    Ok(book)
}

// ============================================================================
// Tests
// ============================================================================
