//! UI bridge: how the client talks back to whatever draws the window.
//!
//! The client never calls into a UI toolkit.  It emits [`UiEvent`]s through a
//! [`UiNotifier`] and answers status queries with a [`ClientStatusDto`].  A
//! desktop shell forwards the events to its widgets; tests record them.
//!
//! # Events
//!
//! ```text
//! Notice  { status_text, severity, message }  → status bar (+ dialog if severity)
//! Control { control, enabled }                → Login / Register button state
//! ```
//!
//! # DTOs (Data Transfer Objects)
//!
//! [`ClientStatusDto`] and [`ClientSettingsDto`] are plain serializable
//! snapshots, safe to hand across an IPC boundary as JSON.  The TypeScript (or
//! other) side must mirror the field names exactly.

use std::sync::Mutex;

use faceauth_core::RequestKind;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

// ── Events ────────────────────────────────────────────────────────────────────

/// Severity of a modal dialog accompanying a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogSeverity {
    Information,
    Warning,
    Critical,
}

/// UI controls the client enables and disables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlId {
    LoginButton,
    RegisterButton,
}

impl ControlId {
    /// The button that submits `kind`.
    pub fn for_action(kind: RequestKind) -> Self {
        match kind {
            RequestKind::Login => ControlId::LoginButton,
            RequestKind::Register => ControlId::RegisterButton,
        }
    }
}

/// Something the UI should show or change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UiEvent {
    /// Status-bar text, optionally with a dialog of the given severity.
    /// `message` is the dialog body (empty for status-only notices).
    Notice {
        status_text: String,
        severity: Option<DialogSeverity>,
        message: String,
    },
    /// Enable or disable a control.
    Control { control: ControlId, enabled: bool },
}

impl UiEvent {
    /// Status-bar text with no dialog.
    pub fn status(text: impl Into<String>) -> Self {
        UiEvent::Notice {
            status_text: text.into(),
            severity: None,
            message: String::new(),
        }
    }

    /// Status-bar text plus a dialog.
    pub fn dialog(
        text: impl Into<String>,
        severity: DialogSeverity,
        message: impl Into<String>,
    ) -> Self {
        UiEvent::Notice {
            status_text: text.into(),
            severity: Some(severity),
            message: message.into(),
        }
    }

    /// Re-enables (or disables) the button for `kind`.
    pub fn control(kind: RequestKind, enabled: bool) -> Self {
        UiEvent::Control {
            control: ControlId::for_action(kind),
            enabled,
        }
    }
}

/// Receiver of UI events.
///
/// Called from the client actor task; implementations must not block.
pub trait UiNotifier: Send + Sync {
    fn notify(&self, event: UiEvent);
}

/// Forwards events over an unbounded tokio channel.
///
/// Events sent after the receiver is dropped are discarded.
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl ChannelNotifier {
    /// Creates the notifier and the receiving end for the UI.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl UiNotifier for ChannelNotifier {
    fn notify(&self, event: UiEvent) {
        if self.tx.send(event).is_err() {
            debug!("UI event receiver dropped; discarding event");
        }
    }
}

/// Records every event in memory.  Used by tests.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<UiEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events so far.
    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Status texts of all notices, in order.
    pub fn status_texts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::Notice { status_text, .. } => Some(status_text),
                UiEvent::Control { .. } => None,
            })
            .collect()
    }

    /// Notices that carried a dialog.
    pub fn dialogs(&self) -> Vec<(DialogSeverity, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::Notice {
                    severity: Some(severity),
                    message,
                    ..
                } => Some((severity, message)),
                _ => None,
            })
            .collect()
    }

    /// How many times `control` was set to `enabled`.
    pub fn control_count(&self, control: ControlId, enabled: bool) -> usize {
        self.events()
            .iter()
            .filter(|e| **e == UiEvent::Control { control, enabled })
            .count()
    }
}

impl UiNotifier for RecordingNotifier {
    fn notify(&self, event: UiEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

// ── DTOs ──────────────────────────────────────────────────────────────────────

/// Full status snapshot returned to the UI.
///
/// State fields are the `Debug` names of their enums (e.g. `"Connected"`,
/// `"AwaitingResponse"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientStatusDto {
    pub connection_status: String,
    pub server_endpoint: String,
    pub login_state: String,
    pub register_state: String,
    /// Size of the captured face image, `None` before the first capture.
    pub captured_image_bytes: Option<usize>,
}

/// Server settings as entered in the settings dialog.
///
/// `server_port` is wider than `u16` so out-of-range input can be rejected
/// with a proper error instead of wrapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettingsDto {
    pub server_address: String,
    pub server_port: u32,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
