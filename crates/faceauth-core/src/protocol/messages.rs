//! FaceAuth protocol message types.
//!
//! A request travels client → server as a `FACE` frame whose payload is a JSON
//! metadata object followed by the raw (JPEG) face image.  A response travels
//! server → client as a `RESP` frame whose payload is a single JSON object.

use serde::{Deserialize, Serialize};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Magic tag opening every client → server frame.
pub const REQUEST_MAGIC: [u8; 4] = *b"FACE";

/// Magic tag opening every server → client frame.
pub const RESPONSE_MAGIC: [u8; 4] = *b"RESP";

/// Size of the common frame header: 4-byte magic + 4-byte big-endian length.
pub const HEADER_SIZE: usize = 8;

/// A decoded JSON object, as carried in a response payload.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

// ── Request kinds ─────────────────────────────────────────────────────────────

/// The two user actions that produce a request.
///
/// Serialized as the lowercase `type` field of the request metadata, and used
/// as the key for per-action session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Login,
    Register,
}

impl RequestKind {
    /// Both kinds, in a fixed order.
    pub const ALL: [RequestKind; 2] = [RequestKind::Login, RequestKind::Register];

    /// Wire name used in the `type` field.
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::Login => "login",
            RequestKind::Register => "register",
        }
    }

    /// Parses a wire `type` value.  Matching is exact, as the server sends it.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "login" => Some(RequestKind::Login),
            "register" => Some(RequestKind::Register),
            _ => None,
        }
    }

    /// Capitalised label for user-facing text ("Login", "Registration").
    pub fn label(self) -> &'static str {
        match self {
            RequestKind::Login => "Login",
            RequestKind::Register => "Registration",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Request ───────────────────────────────────────────────────────────────────

/// A login or registration request ready to be framed.
///
/// `image` is an opaque encoded blob (JPEG in practice); the codec never looks
/// inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    pub kind: RequestKind,
    pub username: String,
    pub password: String,
    pub image: Vec<u8>,
}

impl AuthRequest {
    /// Builds the JSON metadata that precedes the image bytes on the wire.
    ///
    /// `face_data_size` always equals `image.len()`.
    pub fn metadata(&self) -> RequestMetadata {
        RequestMetadata {
            kind: self.kind,
            username: self.username.clone(),
            password: self.password.clone(),
            face_data_size: self.image.len() as u64,
        }
    }
}

/// JSON metadata segment of a request frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    #[serde(rename = "type")]
    pub kind: RequestKind,
    pub username: String,
    pub password: String,
    pub face_data_size: u64,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_tags_are_ascii() {
        assert_eq!(&REQUEST_MAGIC, b"FACE");
        assert_eq!(&RESPONSE_MAGIC, b"RESP");
    }

    #[test]
    fn test_request_kind_wire_names_round_trip() {
        for kind in RequestKind::ALL {
            assert_eq!(RequestKind::from_wire(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_request_kind_from_wire_is_case_sensitive() {
        assert_eq!(RequestKind::from_wire("LOGIN"), None);
        assert_eq!(RequestKind::from_wire(""), None);
    }

    #[test]
    fn test_metadata_face_data_size_matches_image_length() {
        // Arrange
        let req = AuthRequest {
            kind: RequestKind::Register,
            username: "alice".to_string(),
            password: "pw".to_string(),
            image: vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00],
        };

        // Act
        let meta = req.metadata();

        // Assert
        assert_eq!(meta.face_data_size, 5);
        assert_eq!(meta.kind, RequestKind::Register);
    }

    #[test]
    fn test_metadata_serializes_type_field_in_lowercase() {
        let meta = RequestMetadata {
            kind: RequestKind::Login,
            username: "bob".to_string(),
            password: "secret".to_string(),
            face_data_size: 0,
        };

        let json = serde_json::to_value(&meta).unwrap();

        assert_eq!(json["type"], "login");
        assert_eq!(json["face_data_size"], 0);
        assert!(json.get("kind").is_none(), "field must be renamed to `type`");
    }
}
