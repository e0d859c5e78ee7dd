//! # faceauth-core
//!
//! Shared library for the FaceAuth client containing the wire codec, the
//! receive buffer, and response interpretation.
//!
//! It has zero dependencies on OS APIs, UI frameworks, or network sockets, so
//! everything here is testable with plain byte slices.
//!
//! # Architecture overview
//!
//! A FaceAuth client logs a user in (or registers them) by sending their
//! credentials together with a captured face image to a remote server, over
//! one persistent TCP connection.
//!
//! - **`protocol`** – How bytes travel over the network.  Requests are framed
//!   as `"FACE"` + big-endian length + JSON metadata + raw image; responses as
//!   `"RESP"` + length + JSON.  [`ReceiveBuffer`] reassembles responses that
//!   arrive split across several reads.
//!
//! - **`domain`** – How a decoded response is read: the `success` field is
//!   normalized from booleans, strings, and numbers, and a named leniency rule
//!   (the success-message override) can be switched off.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root.
pub use domain::response::{interpret_response, ResponseKind, ResponseOutcome, SuccessPolicy};
pub use protocol::buffer::ReceiveBuffer;
pub use protocol::codec::{encode_response, FrameCodec, ProtocolError, RequestFraming};
pub use protocol::messages::{AuthRequest, JsonObject, RequestKind};
