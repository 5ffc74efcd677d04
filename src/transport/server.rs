//! One backend server and its outstanding-request table.
//!
//! A [`Server`] does not own a socket. It owns:
//!
//! - the outbound half of a link (an unbounded channel of [`LinkCommand`])
//! - the correlation table `RequestId → Completion`
//!
//! Whatever drives the actual connection (the WebSocket link in
//! [`super::link`], or a test harness) calls [`Server::attach`] to take the
//! outbound receiver, feeds inbound text to [`Server::handle_message`], and
//! reports loss with [`Server::handle_disconnect`].
//!
//! # Correlation
//!
//! ```text
//! send(completion) ──► table.insert(id) ──► link ──► server
//!                                                      │
//! handle_message ◄──────────────────────────────────────┘
//!     table.remove(id)  (before completing)
//!     completion.complete(result | RemoteError)
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::from_str;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::Response;
use crate::request::Completion;

// ============================================================================
// Constants
// ============================================================================

/// Maximum outstanding requests per server before rejecting new ones.
pub const MAX_PENDING_REQUESTS: usize = 100;

// ============================================================================
// Types
// ============================================================================

/// Map of request IDs to the completion awaiting them.
type CorrelationMap = FxHashMap<RequestId, Arc<Completion>>;

/// Commands consumed by whatever drives a server's connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCommand {
    /// Write one text frame.
    Frame(String),
    /// Close the connection.
    Shutdown,
}

// ============================================================================
// Server
// ============================================================================

/// Shared state behind a [`Server`] handle.
pub(crate) struct ServerInner {
    /// Endpoint URL.
    url: Url,
    /// Whether a link is attached and live.
    connected: AtomicBool,
    /// The attached link, if any.
    link: Mutex<Option<Link>>,
    /// Generation of the most recently attached link.
    epoch: AtomicU64,
    /// Outstanding requests by correlation id.
    outstanding: Mutex<CorrelationMap>,
    /// Cap on `outstanding`.
    max_pending: usize,
}

/// Outbound half of an attached link, tagged with its generation.
struct Link {
    epoch: u64,
    commands: mpsc::UnboundedSender<LinkCommand>,
}

/// Handle to one backend server.
///
/// Cloning is cheap; all clones share the same table and link.
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

/// Non-owning server reference held by in-flight requests.
#[derive(Clone)]
pub struct WeakServer(Weak<ServerInner>);

impl WeakServer {
    /// Returns the server if it is still alive.
    #[inline]
    #[must_use]
    pub fn upgrade(&self) -> Option<Server> {
        self.0.upgrade().map(|inner| Server { inner })
    }

    /// Returns `true` if both references point at the same server.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.0, &other.0)
    }

    #[cfg(test)]
    pub(crate) fn dangling() -> Self {
        Self(Weak::new())
    }
}

impl Server {
    /// Creates a disconnected server for `url`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if the URL does not parse
    /// - [`Error::Config`] if the scheme is not `ws` or `wss`
    pub fn new(url: &str) -> Result<Self> {
        Self::with_max_pending(url, MAX_PENDING_REQUESTS)
    }

    /// Creates a disconnected server with a custom outstanding-request cap.
    ///
    /// # Errors
    ///
    /// Same as [`Server::new`]; also [`Error::Config`] if `max_pending` is 0.
    pub fn with_max_pending(url: &str, max_pending: usize) -> Result<Self> {
        let url = Url::parse(url)?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::config(format!(
                "Unsupported server scheme {:?} in {url} (expected ws or wss)",
                url.scheme()
            )));
        }

        if max_pending == 0 {
            return Err(Error::config("max_pending_requests must be at least 1"));
        }

        Ok(Self {
            inner: Arc::new(ServerInner {
                url,
                connected: AtomicBool::new(false),
                link: Mutex::new(None),
                epoch: AtomicU64::new(0),
                outstanding: Mutex::new(CorrelationMap::default()),
                max_pending,
            }),
        })
    }

    /// Returns the endpoint URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    /// Returns `true` if a live link is attached.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Returns the number of outstanding requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.outstanding.lock().len()
    }

    /// Returns `true` if both handles refer to the same server.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns a non-owning reference.
    #[inline]
    #[must_use]
    pub fn downgrade(&self) -> WeakServer {
        WeakServer(Arc::downgrade(&self.inner))
    }
}

// ============================================================================
// Server - Link
// ============================================================================

impl Server {
    /// Attaches a new link and marks the server connected.
    ///
    /// Returns the receiver of outbound commands. A previously attached
    /// link is replaced; its receiver sees the channel close.
    pub fn attach(&self) -> mpsc::UnboundedReceiver<LinkCommand> {
        self.attach_link().1
    }

    /// Attaches a new link and returns its generation with the receiver.
    ///
    /// The generation identifies this link to
    /// [`handle_disconnect_if`](Self::handle_disconnect_if).
    pub fn attach_link(&self) -> (u64, mpsc::UnboundedReceiver<LinkCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let epoch = self.inner.epoch.fetch_add(1, Ordering::AcqRel) + 1;

        {
            let mut link = self.inner.link.lock();
            *link = Some(Link {
                epoch,
                commands: tx,
            });
            self.inner.connected.store(true, Ordering::Release);
        }

        debug!(url = %self.inner.url, epoch, "Server link attached");
        (epoch, rx)
    }

    /// Handles one inbound text message.
    ///
    /// Responses are matched to their request by id. The table entry is
    /// removed before the request is completed.
    pub fn handle_message(&self, text: &str) {
        let response = match from_str::<Response>(text) {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %self.inner.url, error = %e, "Failed to parse incoming message");
                return;
            }
        };

        let Some(id) = response.id.filter(|_| response.is_response()) else {
            trace!(
                url = %self.inner.url,
                message_type = ?response.message_type,
                "Ignoring non-response message"
            );
            return;
        };

        let completion = self.inner.outstanding.lock().remove(&id);

        match completion {
            Some(completion) => {
                trace!(url = %self.inner.url, request_id = %id, "Response received");
                completion.complete(response.into_result());
            }
            None => {
                warn!(url = %self.inner.url, request_id = %id, "Response for unknown request");
            }
        }
    }

    /// Marks the server disconnected and fails every outstanding request.
    ///
    /// No retry is attempted here.
    pub fn handle_disconnect(&self) {
        self.detach_link(|_| true);
    }

    /// Like [`handle_disconnect`](Self::handle_disconnect), but only if the
    /// attached link is still generation `epoch`.
    ///
    /// A link that exits after a newer one was attached leaves the server
    /// alone.
    pub fn handle_disconnect_if(&self, epoch: u64) {
        self.detach_link(|current| current == epoch);
    }

    /// Asks the link to close, then fails outstanding requests.
    pub fn close(&self) {
        if let Some(link) = self.inner.link.lock().as_ref() {
            let _ = link.commands.send(LinkCommand::Shutdown);
        }
        self.handle_disconnect();
    }

    fn detach_link(&self, owns: impl FnOnce(u64) -> bool) {
        let pending: Vec<_> = {
            let mut link = self.inner.link.lock();
            if let Some(current) = link.as_ref()
                && !owns(current.epoch)
            {
                trace!(url = %self.inner.url, current = current.epoch, "Ignoring exit of stale link");
                return;
            }

            link.take();
            self.inner.connected.store(false, Ordering::Release);
            self.inner.outstanding.lock().drain().collect()
        };

        let count = pending.len();
        for (_, completion) in pending {
            completion.complete(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(url = %self.inner.url, count, "Failed pending requests on disconnect");
        }
    }
}

// ============================================================================
// Server - Dispatch
// ============================================================================

impl Server {
    /// Sends a serialized frame on behalf of `completion`.
    ///
    /// The correlation entry is stored only once the frame is handed to the
    /// link, under the table lock, so a response cannot overtake it.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if no link is attached
    /// - [`Error::Connection`] if the outstanding-request cap is reached or
    ///   the link has gone away
    /// - [`Error::InvalidArgument`] if the request already completed
    ///
    /// On error nothing was sent and the request is left as it was.
    pub(crate) fn send(&self, completion: &Arc<Completion>, frame: String) -> Result<()> {
        let id = completion.id();

        let link = self
            .inner
            .link
            .lock()
            .as_ref()
            .filter(|_| self.is_connected())
            .map(|link| link.commands.clone())
            .ok_or(Error::NotConnected)?;

        let target = self.downgrade();
        let mut outstanding = self.inner.outstanding.lock();

        if outstanding.len() >= self.inner.max_pending {
            warn!(
                url = %self.inner.url,
                pending = outstanding.len(),
                max = self.inner.max_pending,
                "Too many pending requests"
            );
            return Err(Error::connection(format!(
                "Too many pending requests: {}/{}",
                outstanding.len(),
                self.inner.max_pending
            )));
        }

        if !completion.mark_sent(target.clone()) {
            return Err(Error::invalid_argument(format!(
                "request {id} already completed"
            )));
        }

        if link.send(LinkCommand::Frame(frame)).is_err() {
            completion.unmark_sent(&target);
            warn!(url = %self.inner.url, request_id = %id, "Link closed, request not sent");
            return Err(Error::connection(format!(
                "link to {} is closed",
                self.inner.url
            )));
        }

        outstanding.insert(id, Arc::clone(completion));
        drop(outstanding);

        trace!(url = %self.inner.url, request_id = %id, command = completion.command(), "Request sent");
        Ok(())
    }

    /// Drops the outstanding entry for `id` without completing it.
    pub(crate) fn forget(&self, id: RequestId) {
        if self.inner.outstanding.lock().remove(&id).is_some() {
            trace!(url = %self.inner.url, request_id = %id, "Outstanding entry removed");
        }
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("url", &self.inner.url.as_str())
            .field("connected", &self.is_connected())
            .field("pending", &self.pending_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{Value, json};

    use crate::request::RequestState;

    fn completion() -> Arc<Completion> {
        Arc::new(Completion::new(RequestId::next(), "server_info"))
    }

    fn frame_id(rx: &mut mpsc::UnboundedReceiver<LinkCommand>) -> u64 {
        match rx.try_recv().expect("frame sent") {
            LinkCommand::Frame(text) => {
                let value: Value = serde_json::from_str(&text).unwrap();
                value["id"].as_u64().unwrap()
            }
            other => panic!("expected frame, got {other:?}"),
        }
    }

    #[test]
    fn test_new_rejects_bad_urls() {
        assert!(matches!(Server::new("not a url"), Err(Error::InvalidUrl(_))));
        assert!(matches!(
            Server::new("http://localhost:5006"),
            Err(Error::Config { .. })
        ));
        assert!(Server::new("wss://localhost:5006").is_ok());
    }

    #[test]
    fn test_send_without_link_fails() {
        let server = Server::new("ws://localhost:5006").unwrap();
        let completion = completion();

        let result = server.send(&completion, "{}".into());
        assert!(matches!(result, Err(Error::NotConnected)));
        assert_eq!(server.pending_count(), 0);
        assert_eq!(completion.state(), RequestState::Pending);
    }

    #[test]
    fn test_response_completes_request() {
        let server = Server::new("ws://localhost:5006").unwrap();
        let mut rx = server.attach();
        let completion = completion();

        server.send(&completion, format!(r#"{{"id":{}}}"#, completion.id())).unwrap();
        assert_eq!(server.pending_count(), 1);
        let id = frame_id(&mut rx);

        server.handle_message(
            &json!({ "id": id, "type": "response", "status": "success", "result": {} }).to_string(),
        );

        assert_eq!(server.pending_count(), 0);
        assert_eq!(completion.state(), RequestState::Succeeded);
    }

    #[test]
    fn test_error_envelope_fails_request() {
        let server = Server::new("ws://localhost:5006").unwrap();
        let mut rx = server.attach();
        let completion = completion();

        let seen = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);
        completion.set_callback(Box::new(move |outcome| {
            *slot.lock() = outcome.err().and_then(|e| e.remote_error().map(str::to_owned));
        }));

        server.send(&completion, "{}".into()).unwrap();
        let _ = rx.try_recv();

        server.handle_message(
            &json!({
                "id": completion.id(),
                "type": "response",
                "status": "error",
                "error": "noNetwork",
                "error_code": 17,
            })
            .to_string(),
        );

        assert_eq!(completion.state(), RequestState::Failed);
        assert_eq!(seen.lock().as_deref(), Some("noNetwork"));
    }

    #[test]
    fn test_unknown_and_malformed_messages_are_ignored() {
        let server = Server::new("ws://localhost:5006").unwrap();
        let _rx = server.attach();
        let completion = completion();
        server.send(&completion, "{}".into()).unwrap();

        server.handle_message("not json");
        server.handle_message(r#"{"type":"ledgerClosed","ledger_index":5}"#);
        server.handle_message(r#"{"id":999999999,"type":"response","status":"success"}"#);

        assert_eq!(server.pending_count(), 1);
        assert_eq!(completion.state(), RequestState::Sent);
    }

    #[test]
    fn test_disconnect_fails_outstanding() {
        let server = Server::new("ws://localhost:5006").unwrap();
        let _rx = server.attach();

        let first = completion();
        let second = completion();
        server.send(&first, "{}".into()).unwrap();
        server.send(&second, "{}".into()).unwrap();

        let closed = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&closed);
        first.set_callback(Box::new(move |outcome| {
            assert!(matches!(outcome, Err(Error::ConnectionClosed)));
            *counter.lock() += 1;
        }));

        server.handle_disconnect();

        assert!(!server.is_connected());
        assert_eq!(server.pending_count(), 0);
        assert_eq!(first.state(), RequestState::Failed);
        assert_eq!(second.state(), RequestState::Failed);
        assert_eq!(*closed.lock(), 1);
    }

    #[test]
    fn test_dropped_link_refuses_send() {
        let server = Server::new("ws://localhost:5006").unwrap();
        drop(server.attach());
        let completion = completion();

        let result = server.send(&completion, "{}".into());

        assert!(matches!(result, Err(Error::Connection { .. })));
        assert_eq!(completion.state(), RequestState::Pending);
        assert_eq!(server.pending_count(), 0);
    }

    #[test]
    fn test_send_after_completion_is_refused() {
        let server = Server::new("ws://localhost:5006").unwrap();
        let mut rx = server.attach();
        let completion = completion();
        completion.complete(Ok(json!({})));

        let result = server.send(&completion, "{}".into());

        assert!(matches!(result, Err(Error::InvalidArgument { .. })));
        assert!(rx.try_recv().is_err());
        assert_eq!(server.pending_count(), 0);
    }

    #[test]
    fn test_stale_link_exit_keeps_new_link() {
        let server = Server::new("ws://localhost:5006").unwrap();
        let (old_epoch, _old_rx) = server.attach_link();
        let (new_epoch, mut new_rx) = server.attach_link();
        assert!(new_epoch > old_epoch);

        let completion = completion();
        server.send(&completion, "{}".into()).unwrap();
        assert!(matches!(new_rx.try_recv(), Ok(LinkCommand::Frame(_))));

        server.handle_disconnect_if(old_epoch);

        assert!(server.is_connected());
        assert_eq!(server.pending_count(), 1);
        assert_eq!(completion.state(), RequestState::Sent);

        server.handle_disconnect_if(new_epoch);

        assert!(!server.is_connected());
        assert_eq!(completion.state(), RequestState::Failed);
    }

    #[test]
    fn test_pending_cap() {
        let server = Server::with_max_pending("ws://localhost:5006", 1).unwrap();
        let _rx = server.attach();

        server.send(&completion(), "{}".into()).unwrap();
        let rejected = completion();
        let result = server.send(&rejected, "{}".into());

        assert!(matches!(result, Err(Error::Connection { .. })));
        assert_eq!(rejected.state(), RequestState::Pending);
        assert_eq!(server.pending_count(), 1);
    }

    #[test]
    fn test_close_sends_shutdown() {
        let server = Server::new("ws://localhost:5006").unwrap();
        let mut rx = server.attach();

        server.close();

        assert_eq!(rx.try_recv().unwrap(), LinkCommand::Shutdown);
        assert!(!server.is_connected());
    }
}
