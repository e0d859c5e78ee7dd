//! Request session: the per-action state machine behind the Login and
//! Register buttons.
//!
//! Each action moves through
//!
//! ```text
//!   Idle ──begin──► Sending ──mark_sent──► AwaitingResponse
//!    ▲                 │                          │
//!    └─────finish──────┴───────────finish─────────┘
//! ```
//!
//! Login and register are tracked independently even though they share one
//! socket, so a registration can be in flight while a login is pending.
//!
//! # Exactly-once completion
//!
//! Every way out of an exchange (response, protocol violation, disconnect,
//! timeout, send failure) goes through [`RequestSession::finish`], which
//! returns `true` only for the call that actually moved the action back to
//! `Idle`.  The caller re-enables the UI control only on that `true`, so a
//! late response after a timeout, or a disconnect after a response, can never
//! re-enable a control twice.
//!
//! The session does no I/O.  It is owned by the client actor and mutated
//! through `&mut self` only.

use std::time::Duration;

use faceauth_core::{AuthRequest, ProtocolError, RequestKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::infrastructure::network::NetworkError;

/// Errors surfaced to the UI for a single login or registration attempt.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    /// Username (after trimming) or password is empty.
    #[error("username and password must not be empty")]
    EmptyCredentials,

    /// Submit was pressed before any face image was captured.
    #[error("a face image must be captured first")]
    NoImageCaptured,

    /// The same action already has an exchange in flight.
    #[error("a {0} request is already in progress")]
    RequestInFlight(RequestKind),

    /// The connection to the server could not be established.
    #[error("failed to connect to server at {endpoint}: {reason}")]
    ConnectFailed { endpoint: String, reason: String },

    /// The request frame could not be written to the socket.
    #[error("failed to send data: {0}")]
    WriteFailed(String),

    /// The server sent bytes that are not a valid response frame.
    #[error("invalid response from server: {0}")]
    Protocol(#[from] ProtocolError),

    /// No response arrived within the configured window.
    #[error("no response from server within {}s", .0.as_secs())]
    ResponseTimeout(Duration),

    /// The connection dropped before a response arrived.
    #[error("disconnected from server")]
    Disconnected,

    /// A lower-level fault that has no better home.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<NetworkError> for SessionError {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::ConnectTimeout { endpoint, timeout } => SessionError::ConnectFailed {
                endpoint,
                reason: format!("timed out after {}ms", timeout.as_millis()),
            },
            NetworkError::ConnectFailed { endpoint, source } => SessionError::ConnectFailed {
                endpoint,
                reason: source.to_string(),
            },
            NetworkError::WriteFailed(e) => SessionError::WriteFailed(e.to_string()),
            NetworkError::NotConnected | NetworkError::WriterClosed => SessionError::Disconnected,
        }
    }
}

/// Where one action is in its exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionState {
    #[default]
    Idle,
    Sending,
    AwaitingResponse,
}

/// A request accepted by [`RequestSession::begin`], ready to be framed.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Correlates log lines for one exchange.
    pub exchange_id: Uuid,
    pub request: AuthRequest,
}

#[derive(Debug, Default)]
struct Slot {
    state: ActionState,
    exchange_id: Option<Uuid>,
    deadline: Option<Instant>,
}

/// Per-action exchange state plus the most recent captured image.
#[derive(Debug)]
pub struct RequestSession {
    login: Slot,
    register: Slot,
    captured_image: Option<Vec<u8>>,
    response_timeout: Option<Duration>,
}

impl RequestSession {
    /// Creates a session with both actions idle and no captured image.
    ///
    /// `response_timeout` of `None` waits for a response indefinitely.
    pub fn new(response_timeout: Option<Duration>) -> Self {
        Self {
            login: Slot::default(),
            register: Slot::default(),
            captured_image: None,
            response_timeout,
        }
    }

    fn slot(&self, kind: RequestKind) -> &Slot {
        match kind {
            RequestKind::Login => &self.login,
            RequestKind::Register => &self.register,
        }
    }

    fn slot_mut(&mut self, kind: RequestKind) -> &mut Slot {
        match kind {
            RequestKind::Login => &mut self.login,
            RequestKind::Register => &mut self.register,
        }
    }

    /// Current state of `kind`.
    pub fn state(&self, kind: RequestKind) -> ActionState {
        self.slot(kind).state
    }

    /// Exchange id of the in-flight request for `kind`, if any.
    pub fn exchange_id(&self, kind: RequestKind) -> Option<Uuid> {
        self.slot(kind).exchange_id
    }

    /// Actions that are not idle.
    pub fn in_flight(&self) -> Vec<RequestKind> {
        RequestKind::ALL
            .into_iter()
            .filter(|k| self.state(*k) != ActionState::Idle)
            .collect()
    }

    /// Stores a freshly captured image, replacing any previous one.
    ///
    /// The image is kept across submissions until the next capture.
    pub fn store_capture(&mut self, image: Vec<u8>) -> usize {
        let len = image.len();
        self.captured_image = Some(image);
        len
    }

    /// Size of the stored image, if one has been captured.
    pub fn captured_len(&self) -> Option<usize> {
        self.captured_image.as_ref().map(Vec::len)
    }

    /// Changes the response timeout for exchanges started afterwards.
    pub fn set_response_timeout(&mut self, timeout: Option<Duration>) {
        self.response_timeout = timeout;
    }

    /// Validates a submit and moves `kind` from `Idle` to `Sending`.
    ///
    /// The username is trimmed; the password is sent as typed.
    ///
    /// # Errors
    ///
    /// - [`SessionError::RequestInFlight`] if `kind` is not idle.
    /// - [`SessionError::EmptyCredentials`] if either field is empty.
    /// - [`SessionError::NoImageCaptured`] if nothing has been captured.
    ///
    /// The state is unchanged on error.
    pub fn begin(
        &mut self,
        kind: RequestKind,
        username: &str,
        password: &str,
    ) -> Result<Submission, SessionError> {
        if self.state(kind) != ActionState::Idle {
            return Err(SessionError::RequestInFlight(kind));
        }
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(SessionError::EmptyCredentials);
        }
        let image = match &self.captured_image {
            Some(image) => image.clone(),
            None => return Err(SessionError::NoImageCaptured),
        };

        let exchange_id = Uuid::new_v4();
        let slot = self.slot_mut(kind);
        slot.state = ActionState::Sending;
        slot.exchange_id = Some(exchange_id);
        slot.deadline = None;
        debug!("[{exchange_id}] {kind} -> Sending");

        Ok(Submission {
            exchange_id,
            request: AuthRequest {
                kind,
                username: username.to_string(),
                password: password.to_string(),
                image,
            },
        })
    }

    /// Moves `kind` from `Sending` to `AwaitingResponse` and arms the
    /// response deadline relative to `now`.
    ///
    /// Returns `false` (and changes nothing) if `kind` was not `Sending`.
    pub fn mark_sent(&mut self, kind: RequestKind, now: Instant) -> bool {
        let timeout = self.response_timeout;
        let slot = self.slot_mut(kind);
        if slot.state != ActionState::Sending {
            return false;
        }
        slot.state = ActionState::AwaitingResponse;
        slot.deadline = timeout.map(|t| now + t);
        true
    }

    /// Returns `kind` to `Idle`.
    ///
    /// Returns `true` only if the action was in flight, i.e. exactly once per
    /// exchange.  Callers re-enable the matching control on `true` only.
    pub fn finish(&mut self, kind: RequestKind) -> bool {
        let slot = self.slot_mut(kind);
        if slot.state == ActionState::Idle {
            return false;
        }
        if let Some(id) = slot.exchange_id.take() {
            debug!("[{id}] {kind} -> Idle");
        }
        *slot = Slot::default();
        true
    }

    /// Finishes every in-flight action and returns the ones that changed.
    pub fn finish_all(&mut self) -> Vec<RequestKind> {
        RequestKind::ALL
            .into_iter()
            .filter(|k| self.finish(*k))
            .collect()
    }

    /// Actions whose response deadline is at or before `now`.
    pub fn expired(&self, now: Instant) -> Vec<RequestKind> {
        RequestKind::ALL
            .into_iter()
            .filter(|k| {
                let slot = self.slot(*k);
                slot.state == ActionState::AwaitingResponse
                    && slot.deadline.is_some_and(|d| d <= now)
            })
            .collect()
    }

    /// Earliest armed response deadline across both actions.
    pub fn next_deadline(&self) -> Option<Instant> {
        [self.login.deadline, self.register.deadline]
            .into_iter()
            .flatten()
            .min()
    }

    /// The configured response timeout.
    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
