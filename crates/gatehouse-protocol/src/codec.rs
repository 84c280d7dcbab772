//! Codec trait and implementations for serializing payloads.
//!
//! A codec converts between Rust types and the raw payload bytes carried
//! inside a [`Frame`](crate::Frame). The gateway only needs something that
//! implements [`Codec`]; the concrete format is swappable without touching
//! framing, routing, or session code.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because a single codec instance is shared by
/// every connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Readable on the wire, which makes packet captures easy to debug.
///
/// ```rust
/// use gatehouse_protocol::{Codec, JsonCodec, LoginRequest};
///
/// let codec = JsonCodec;
/// let req = LoginRequest {
///     username: "admin".into(),
///     password: "password123".into(),
/// };
///
/// let bytes = codec.encode(&req).unwrap();
/// let decoded: LoginRequest = codec.decode(&bytes).unwrap();
/// assert_eq!(req, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{LoginNotice, LoginRequest};

    #[test]
    fn test_decode_garbage_returns_decode_error() {
        let result: Result<LoginRequest, _> = JsonCodec.decode(b"\x00\x01");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_wrong_shape_returns_decode_error() {
        let bytes = JsonCodec
            .encode(&LoginNotice {
                message: "hi".into(),
            })
            .unwrap();
        let result: Result<LoginRequest, _> = JsonCodec.decode(&bytes);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
