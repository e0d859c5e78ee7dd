//! Response interpretation: turns a decoded `RESP` payload into an outcome.
//!
//! Servers in the field disagree on how they spell a verdict.  `success` may
//! arrive as a boolean, a string (`"true"`, `"YES"`, `"1"`), or a number, and
//! some servers send `success: false` alongside a message such as
//! `"Login successful"`.  [`interpret_response`] absorbs those differences so
//! the session layer only ever sees a [`ResponseOutcome`].
//!
//! # The success-message override
//!
//! Under [`SuccessPolicy::Lenient`] (the default), a `false` verdict whose
//! message contains `"successful"` (any case) is coerced to `true`.  Use
//! [`SuccessPolicy::Strict`] to take the `success` field at face value.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::protocol::messages::{JsonObject, RequestKind};

/// Message substring that triggers the success-message override.
const SUCCESS_MARKER: &str = "successful";

/// How strictly the `success` field is read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuccessPolicy {
    /// Apply the success-message override.
    #[default]
    Lenient,
    /// Use the normalized `success` field only.
    Strict,
}

/// Which action a response answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseKind {
    /// Answer to a pending request of this kind.
    Action(RequestKind),
    /// A `type` the client does not know.  Holds the raw value (empty when the
    /// field is missing or not a string).
    Unknown(String),
}

/// Normalized server verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseOutcome {
    pub kind: ResponseKind,
    pub success: bool,
    pub message: String,
    /// `true` when the success-message override changed the verdict.
    pub overridden: bool,
}

/// Interprets a decoded response object.
///
/// Never fails: missing or oddly typed fields degrade to `Unknown`, `false`,
/// and an empty message.
///
/// # Examples
///
/// ```rust
/// use faceauth_core::domain::response::{interpret_response, ResponseKind, SuccessPolicy};
/// use faceauth_core::protocol::RequestKind;
///
/// let obj = serde_json::json!({"type": "login", "success": "yes", "message": "hi"});
/// let outcome = interpret_response(obj.as_object().unwrap(), SuccessPolicy::Strict);
/// assert_eq!(outcome.kind, ResponseKind::Action(RequestKind::Login));
/// assert!(outcome.success);
/// ```
pub fn interpret_response(obj: &JsonObject, policy: SuccessPolicy) -> ResponseOutcome {
    let kind = match obj.get("type") {
        Some(Value::String(t)) => match RequestKind::from_wire(t) {
            Some(kind) => ResponseKind::Action(kind),
            None => ResponseKind::Unknown(t.clone()),
        },
        _ => ResponseKind::Unknown(String::new()),
    };

    let message = match obj.get("message") {
        Some(Value::String(m)) => m.clone(),
        _ => String::new(),
    };

    let raw = normalize_success(obj.get("success"));
    let success = apply_success_policy(raw, &message, policy);
    let overridden = success != raw;
    if overridden {
        debug!("success flag was false but message reports success; treating as success");
    }

    ResponseOutcome {
        kind,
        success,
        message,
        overridden,
    }
}

/// Normalizes the heterogeneous `success` field to a boolean.
///
/// - booleans pass through;
/// - strings `"true"`, `"1"`, `"yes"` (case-insensitive) are `true`, any other
///   string is `false`;
/// - numbers are `true` when non-zero;
/// - absent, `null`, arrays and objects are `false`.
pub fn normalize_success(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => {
            let s = s.to_ascii_lowercase();
            s == "true" || s == "1" || s == "yes"
        }
        Some(Value::Number(n)) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        _ => false,
    }
}

/// Applies the success-message override under [`SuccessPolicy::Lenient`].
pub fn apply_success_policy(success: bool, message: &str, policy: SuccessPolicy) -> bool {
    match policy {
        SuccessPolicy::Strict => success,
        SuccessPolicy::Lenient => {
            success || message.to_lowercase().contains(SUCCESS_MARKER)
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
