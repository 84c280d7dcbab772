//! Error types for the protocol layer.
//!
//! Framing errors and payload errors are kept apart. A [`FrameError`] means
//! the byte stream itself is unusable and the connection has to go. A
//! [`ProtocolError`] means one payload could not be (de)serialized; the
//! stream is still in sync and the caller decides what to do.

/// Errors produced while reading a frame off a stream.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The peer went away before a new frame header arrived.
    ///
    /// This is the normal end of a connection, not a protocol violation.
    #[error("connection closed")]
    ConnectionClosed,

    /// The header promised `expected` body bytes but the stream ended
    /// after `received`.
    #[error("truncated frame: expected {expected} bytes, received {received}")]
    TruncatedFrame {
        /// Body length declared in the header.
        expected: u32,
        /// Body bytes actually read before end-of-stream.
        received: usize,
    },

    /// The declared length is too small to hold a message id.
    #[error("malformed frame: declared length {0} is shorter than a message id")]
    MalformedFrame(u32),

    /// The declared length exceeds the configured decode limit.
    #[error("frame of {size} bytes exceeds maximum {max}")]
    FrameTooLarge {
        /// Declared body length.
        size: u32,
        /// Configured limit.
        max: u32,
    },

    /// Any other I/O failure on the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while encoding or decoding a payload.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed input, missing required fields, or a
    /// payload sent under the wrong message id.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
