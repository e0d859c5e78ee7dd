//! Receive buffer that reassembles response frames from a byte stream.
//!
//! TCP delivers bytes in arbitrary chunks: one read may hold a fraction of a
//! header, another the rest of the frame.  [`ReceiveBuffer`] accumulates the
//! chunks and applies the discard policy after every decode attempt:
//!
//! | decode result                         | buffer afterwards |
//! |---------------------------------------|-------------------|
//! | `IncompleteHeader` / `IncompleteBody` | kept as is        |
//! | complete frame                        | cleared           |
//! | `BadMagic` / `InvalidJson`            | cleared           |
//!
//! Bytes trailing a complete frame are discarded with it: the server sends at
//! most one response per request, so nothing legitimate can follow.

use tracing::{debug, warn};

use crate::protocol::codec::{FrameCodec, ProtocolError};
use crate::protocol::messages::JsonObject;

/// Accumulator for not-yet-decoded inbound bytes.
#[derive(Debug, Default)]
pub struct ReceiveBuffer {
    bytes: Vec<u8>,
}

impl ReceiveBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk received from the socket.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// `true` when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Drops every buffered byte.
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Attempts to decode one response frame from the buffered bytes.
    ///
    /// Returns `Ok(None)` while the frame is incomplete (buffer untouched),
    /// `Ok(Some(obj))` for a complete frame (buffer cleared).
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::BadMagic`] or [`ProtocolError::InvalidJson`]
    /// after clearing the buffer.
    pub fn try_decode(&mut self, codec: &FrameCodec) -> Result<Option<JsonObject>, ProtocolError> {
        match codec.decode_response(&self.bytes) {
            Ok((obj, consumed)) => {
                if self.bytes.len() > consumed {
                    warn!(
                        "discarding {} byte(s) trailing a complete response frame",
                        self.bytes.len() - consumed
                    );
                }
                self.bytes.clear();
                Ok(Some(obj))
            }
            Err(e) if e.is_incomplete() => {
                debug!("waiting for more data: {e}");
                Ok(None)
            }
            Err(e) => {
                self.bytes.clear();
                Err(e)
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
