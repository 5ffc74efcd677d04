//! Completion and timeout state machine.
//!
//! Every request owns one [`Completion`], shared with the outstanding table
//! of each server it was sent to. All terminal signals funnel through it:
//!
//! ```text
//! Pending ──dispatch──► Sent ──response──► Succeeded | Failed
//!    │                   │
//!    └───────timer───────┴──────────────► TimedOut
//! ```
//!
//! The first terminal signal wins. Subscribers are taken out of the lock
//! before they run, so a callback may dispatch new requests freely.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::AbortHandle;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::transport::WeakServer;

// ============================================================================
// Types
// ============================================================================

/// Callback invoked with the outcome of a request.
pub type Callback = Box<dyn FnOnce(Result<Value>) + Send>;

/// Listener for the `success` event.
pub type SuccessListener = Box<dyn FnOnce(&Value) + Send>;

/// Listener for the `error` event.
pub type ErrorListener = Box<dyn FnOnce(&Error) + Send>;

/// Handler invoked when the timer fires first.
pub type TimeoutHandler = Box<dyn FnOnce() + Send>;

// ============================================================================
// RequestState
// ============================================================================

/// Lifecycle state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    /// Built but not dispatched.
    Pending,
    /// Dispatched to at least one server.
    Sent,
    /// Completed with a result.
    Succeeded,
    /// Completed with an error.
    Failed,
    /// Timer fired before any response.
    TimedOut,
}

impl RequestState {
    /// Returns `true` for absorbing states.
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::TimedOut)
    }
}

// ============================================================================
// Completion
// ============================================================================

/// Mutable part of a completion, guarded by one lock.
struct Inner {
    state: RequestState,
    callback: Option<Callback>,
    on_success: Option<SuccessListener>,
    on_error: Option<ErrorListener>,
    on_timeout: Option<TimeoutHandler>,
    timer: Option<AbortHandle>,
    timeout: Option<Duration>,
    /// Servers holding an outstanding entry for this request.
    targets: Vec<WeakServer>,
}

/// Subscribers detached from a completion, ready to fire.
struct Fanout {
    callback: Option<Callback>,
    on_success: Option<SuccessListener>,
    on_error: Option<ErrorListener>,
}

/// Shared completion state of one request.
pub struct Completion {
    id: RequestId,
    command: String,
    inner: Mutex<Inner>,
}

impl Completion {
    /// Creates a pending completion.
    pub(crate) fn new(id: RequestId, command: impl Into<String>) -> Self {
        Self {
            id,
            command: command.into(),
            inner: Mutex::new(Inner {
                state: RequestState::Pending,
                callback: None,
                on_success: None,
                on_error: None,
                on_timeout: None,
                timer: None,
                timeout: None,
                targets: Vec::new(),
            }),
        }
    }

    /// Returns the correlation id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Returns the command name.
    #[inline]
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> RequestState {
        self.inner.lock().state
    }

    /// Returns the armed timeout window, if any.
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.inner.lock().timeout
    }

    // ========================================================================
    // Subscription
    // ========================================================================

    /// Registers the callback, replacing any previous one.
    ///
    /// Ignored once terminal.
    pub(crate) fn set_callback(&self, callback: Callback) {
        let mut inner = self.inner.lock();
        if !inner.state.is_terminal() {
            inner.callback = Some(callback);
        }
    }

    /// Registers the `success` listener, replacing any previous one.
    pub(crate) fn set_success_listener(&self, listener: SuccessListener) {
        let mut inner = self.inner.lock();
        if !inner.state.is_terminal() {
            inner.on_success = Some(listener);
        }
    }

    /// Registers the `error` listener, replacing any previous one.
    pub(crate) fn set_error_listener(&self, listener: ErrorListener) {
        let mut inner = self.inner.lock();
        if !inner.state.is_terminal() {
            inner.on_error = Some(listener);
        }
    }

    /// Installs a timer and its handler.
    ///
    /// A previously armed timer is cancelled. If the request is already
    /// terminal the new timer is cancelled instead.
    pub(crate) fn arm_timer(&self, window: Duration, handler: TimeoutHandler, timer: AbortHandle) {
        let previous = {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                drop(inner);
                timer.abort();
                return;
            }
            inner.on_timeout = Some(handler);
            inner.timeout = Some(window);
            inner.timer.replace(timer)
        };

        if let Some(previous) = previous {
            previous.abort();
        }
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Records that the request was handed to `target`.
    ///
    /// Returns `false` if the request is already terminal, in which case
    /// nothing should be sent.
    pub(crate) fn mark_sent(&self, target: WeakServer) -> bool {
        let mut inner = self.inner.lock();
        if inner.state.is_terminal() {
            return false;
        }
        inner.state = RequestState::Sent;
        inner.targets.push(target);
        true
    }

    /// Reverts [`mark_sent`](Self::mark_sent) for a target that could not
    /// take the frame.
    ///
    /// With no target left the request is `Pending` again.
    pub(crate) fn unmark_sent(&self, target: &WeakServer) {
        let mut inner = self.inner.lock();
        inner.targets.retain(|sent| !sent.ptr_eq(target));
        if inner.state == RequestState::Sent && inner.targets.is_empty() {
            inner.state = RequestState::Pending;
        }
    }

    /// Delivers a success or error outcome.
    ///
    /// Returns `false` (and drops `outcome`) if a terminal signal was
    /// already delivered.
    pub(crate) fn complete(&self, outcome: Result<Value>) -> bool {
        let (fanout, timer, targets) = {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                debug!(
                    request_id = %self.id,
                    state = ?inner.state,
                    "Dropping outcome for completed request"
                );
                return false;
            }

            inner.state = if outcome.is_ok() {
                RequestState::Succeeded
            } else {
                RequestState::Failed
            };
            inner.on_timeout = None;

            let fanout = Fanout {
                callback: inner.callback.take(),
                on_success: inner.on_success.take(),
                on_error: inner.on_error.take(),
            };
            (fanout, inner.timer.take(), std::mem::take(&mut inner.targets))
        };

        if let Some(timer) = timer {
            timer.abort();
        }
        self.detach(targets);

        trace!(request_id = %self.id, ok = outcome.is_ok(), "Request completed");
        fanout.fire(outcome);
        true
    }

    /// Fires the timeout path.
    ///
    /// Returns `false` if a terminal signal was already delivered. After a
    /// successful expiry no callback or event will ever fire.
    pub(crate) fn expire(&self) -> bool {
        let (handler, targets) = {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                return false;
            }

            inner.state = RequestState::TimedOut;
            inner.callback = None;
            inner.on_success = None;
            inner.on_error = None;
            inner.timer = None;
            (inner.on_timeout.take(), std::mem::take(&mut inner.targets))
        };

        self.detach(targets);

        debug!(request_id = %self.id, command = %self.command, "Request timed out");
        if let Some(handler) = handler {
            handler();
        }
        true
    }

    /// Removes this request from every server still holding it.
    fn detach(&self, targets: Vec<WeakServer>) {
        for server in targets.iter().filter_map(WeakServer::upgrade) {
            server.forget(self.id);
        }
    }
}

impl Fanout {
    /// Event listener first, then the callback, each at most once.
    fn fire(self, outcome: Result<Value>) {
        match outcome {
            Ok(result) => {
                if let Some(listener) = self.on_success {
                    listener(&result);
                }
                if let Some(callback) = self.callback {
                    callback(Ok(result));
                }
            }
            Err(error) => {
                if let Some(listener) = self.on_error {
                    listener(&error);
                }
                if let Some(callback) = self.callback {
                    callback(Err(error));
                }
            }
        }
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("id", &self.id)
            .field("command", &self.command)
            .field("state", &self.state())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
