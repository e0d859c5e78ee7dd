//! Frame codec for the FaceAuth wire protocol.
//!
//! Wire format:
//! ```text
//! request:  ["FACE":4][json_len:4][json:json_len][image:face_data_size]
//! response: ["RESP":4][json_len:4][json:json_len]
//! ```
//! The length field is a big-endian `u32`.  On requests it covers only the JSON
//! segment; the image is appended after it and its size travels inside the
//! JSON as `face_data_size`.  [`RequestFraming::WholePayload`] is the symmetric
//! alternative where the length covers JSON and image together.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::messages::{
    AuthRequest, JsonObject, RequestMetadata, HEADER_SIZE, REQUEST_MAGIC, RESPONSE_MAGIC,
};

/// Errors that can occur during frame encoding or decoding.
///
/// [`ProtocolError::IncompleteHeader`] and [`ProtocolError::IncompleteBody`]
/// are not faults: they tell the caller to keep buffering.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProtocolError {
    /// Fewer than [`HEADER_SIZE`] bytes are buffered.
    #[error("incomplete header: need 8 bytes, got {available}")]
    IncompleteHeader { available: usize },

    /// The first four bytes are not the expected magic tag.
    #[error(
        "bad magic: expected {:?}, got {:?}",
        String::from_utf8_lossy(.expected),
        String::from_utf8_lossy(.found)
    )]
    BadMagic { expected: [u8; 4], found: [u8; 4] },

    /// The header declares more body bytes than are buffered.
    #[error("incomplete body: header declares {declared} bytes, {available} available")]
    IncompleteBody { declared: usize, available: usize },

    /// The declared payload is not a JSON object.
    #[error("invalid JSON payload: {0}")]
    InvalidJson(String),

    /// A frame could not be built (metadata serialization, oversized segment).
    #[error("encode failed: {0}")]
    Encode(String),
}

impl ProtocolError {
    /// `true` for the two "wait for more bytes" variants.
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self,
            ProtocolError::IncompleteHeader { .. } | ProtocolError::IncompleteBody { .. }
        )
    }
}

/// What the request length field covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestFraming {
    /// Length covers the JSON segment only; the image trails undeclared.
    /// This is what deployed servers expect.
    #[default]
    JsonLengthOnly,
    /// Length covers JSON and image together.
    WholePayload,
}

/// Encodes requests and decodes responses.
///
/// The codec is a small `Copy` value: it holds only the request framing
/// strategy, so callers can keep one per connection without sharing.
///
/// # Examples
///
/// ```rust
/// use faceauth_core::protocol::{AuthRequest, FrameCodec, RequestKind};
///
/// let codec = FrameCodec::default();
/// let req = AuthRequest {
///     kind: RequestKind::Login,
///     username: "alice".into(),
///     password: "pw".into(),
///     image: vec![1, 2, 3],
/// };
/// let bytes = codec.encode_request(&req).unwrap();
/// assert_eq!(&bytes[..4], b"FACE");
/// let (decoded, consumed) = codec.decode_request(&bytes).unwrap();
/// assert_eq!(decoded, req);
/// assert_eq!(consumed, bytes.len());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCodec {
    framing: RequestFraming,
}

impl FrameCodec {
    /// Creates a codec using the given request framing.
    pub fn new(framing: RequestFraming) -> Self {
        Self { framing }
    }

    /// Returns the request framing in use.
    pub fn framing(&self) -> RequestFraming {
        self.framing
    }

    /// Encodes `req` into a complete `FACE` frame.
    ///
    /// Total size is always `8 + json_len + image_len`; only the value written
    /// into the length field depends on the framing.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encode`] if the metadata cannot be serialized or
    /// the declared length does not fit in a `u32`.
    pub fn encode_request(&self, req: &AuthRequest) -> Result<Vec<u8>, ProtocolError> {
        let json = serde_json::to_vec(&req.metadata())
            .map_err(|e| ProtocolError::Encode(e.to_string()))?;

        let declared = match self.framing {
            RequestFraming::JsonLengthOnly => json.len(),
            RequestFraming::WholePayload => json.len() + req.image.len(),
        };
        let declared = u32::try_from(declared)
            .map_err(|_| ProtocolError::Encode(format!("payload of {declared} bytes exceeds u32")))?;

        let mut buf = Vec::with_capacity(HEADER_SIZE + json.len() + req.image.len());
        buf.extend_from_slice(&REQUEST_MAGIC);
        buf.extend_from_slice(&declared.to_be_bytes());
        buf.extend_from_slice(&json);
        buf.extend_from_slice(&req.image);
        Ok(buf)
    }

    /// Decodes one `RESP` frame from the start of `bytes`.
    ///
    /// Returns the JSON object and the frame size (`8 + json_len`).  Bytes past
    /// the frame are left to the caller.
    ///
    /// # Errors
    ///
    /// Checked in order: [`ProtocolError::IncompleteHeader`],
    /// [`ProtocolError::BadMagic`], [`ProtocolError::IncompleteBody`],
    /// [`ProtocolError::InvalidJson`].
    pub fn decode_response(&self, bytes: &[u8]) -> Result<(JsonObject, usize), ProtocolError> {
        let declared = read_header(bytes, RESPONSE_MAGIC)?;
        let total = HEADER_SIZE + declared;
        require_body(bytes, declared)?;

        let value: serde_json::Value = serde_json::from_slice(&bytes[HEADER_SIZE..total])
            .map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
        match value {
            serde_json::Value::Object(obj) => Ok((obj, total)),
            other => Err(ProtocolError::InvalidJson(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Decodes one `FACE` frame from the start of `bytes`.
    ///
    /// This is the server's side of the exchange.  The client never calls it;
    /// it exists so fake servers and tests can check what went on the wire.
    ///
    /// # Errors
    ///
    /// Same ordering as [`FrameCodec::decode_response`]; `IncompleteBody` is
    /// also returned while the trailing image is still short.
    pub fn decode_request(&self, bytes: &[u8]) -> Result<(AuthRequest, usize), ProtocolError> {
        let declared = read_header(bytes, REQUEST_MAGIC)?;

        let (meta, json_len) = match self.framing {
            RequestFraming::JsonLengthOnly => {
                require_body(bytes, declared)?;
                let meta: RequestMetadata =
                    serde_json::from_slice(&bytes[HEADER_SIZE..HEADER_SIZE + declared])
                        .map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
                (meta, declared)
            }
            RequestFraming::WholePayload => {
                require_body(bytes, declared)?;
                let payload = &bytes[HEADER_SIZE..HEADER_SIZE + declared];
                let mut stream =
                    serde_json::Deserializer::from_slice(payload).into_iter::<RequestMetadata>();
                let meta = match stream.next() {
                    Some(Ok(meta)) => meta,
                    Some(Err(e)) => return Err(ProtocolError::InvalidJson(e.to_string())),
                    None => return Err(ProtocolError::InvalidJson("empty payload".to_string())),
                };
                (meta, stream.byte_offset())
            }
        };

        let image_len = usize::try_from(meta.face_data_size)
            .map_err(|_| ProtocolError::InvalidJson("face_data_size out of range".to_string()))?;
        let total = (HEADER_SIZE + json_len)
            .checked_add(image_len)
            .ok_or_else(|| ProtocolError::InvalidJson("face_data_size out of range".to_string()))?;

        if self.framing == RequestFraming::WholePayload && total - HEADER_SIZE != declared {
            return Err(ProtocolError::InvalidJson(format!(
                "declared {declared} bytes but JSON ({json_len}) + image ({image_len}) differ"
            )));
        }
        if bytes.len() < total {
            return Err(ProtocolError::IncompleteBody {
                declared: total - HEADER_SIZE,
                available: bytes.len() - HEADER_SIZE,
            });
        }

        let req = AuthRequest {
            kind: meta.kind,
            username: meta.username,
            password: meta.password,
            image: bytes[HEADER_SIZE + json_len..total].to_vec(),
        };
        Ok((req, total))
    }
}

/// Encodes a `RESP` frame around `body`.
///
/// Used by fake servers in tests and benchmarks.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if `body` cannot be serialized.
pub fn encode_response(body: &serde_json::Value) -> Result<Vec<u8>, ProtocolError> {
    let json = serde_json::to_vec(body).map_err(|e| ProtocolError::Encode(e.to_string()))?;
    let len = u32::try_from(json.len())
        .map_err(|_| ProtocolError::Encode(format!("payload of {} bytes exceeds u32", json.len())))?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + json.len());
    buf.extend_from_slice(&RESPONSE_MAGIC);
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(&json);
    Ok(buf)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Validates the header and returns the declared length.
fn read_header(bytes: &[u8], expected: [u8; 4]) -> Result<usize, ProtocolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::IncompleteHeader {
            available: bytes.len(),
        });
    }

    let found = [bytes[0], bytes[1], bytes[2], bytes[3]];
    if found != expected {
        return Err(ProtocolError::BadMagic { expected, found });
    }

    Ok(u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize)
}

fn require_body(bytes: &[u8], declared: usize) -> Result<(), ProtocolError> {
    let available = bytes.len() - HEADER_SIZE;
    if available < declared {
        return Err(ProtocolError::IncompleteBody {
            declared,
            available,
        });
    }
    Ok(())
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
