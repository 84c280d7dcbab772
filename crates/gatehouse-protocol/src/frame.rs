//! Length-prefixed framing for the gateway's TCP streams.
//!
//! Every message on the wire is one frame:
//!
//! ```text
//! +-------------------+-------------------+------------------+
//! | length (4 bytes)  | msg_id (4 bytes)  | payload          |
//! | u32 little-endian | u32 little-endian | (length - 4)     |
//! +-------------------+-------------------+------------------+
//! ```
//!
//! `length` covers the message id and the payload, never itself. An empty
//! payload is legal and encodes as `length == 4`.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::FrameError;

/// Size of the length prefix in bytes.
pub const HEADER_LEN: usize = 4;

/// Size of the message id that opens every frame body.
pub const MSG_ID_LEN: usize = 4;

/// Configuration for the decoding side of the framing layer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Largest body (`msg_id` + payload) a peer may declare. Default: 1 MiB.
    ///
    /// The encoder does not enforce this; it only bounds how much memory
    /// a single header can make the reader allocate.
    pub max_frame_len: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_len: 1_048_576,
        }
    }
}

/// One decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Message-type identifier used for routing.
    pub msg_id: u32,
    /// Opaque payload bytes.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Creates a frame from its parts.
    pub fn new(msg_id: u32, payload: Vec<u8>) -> Self {
        Self { msg_id, payload }
    }

    /// Encodes this frame into wire bytes. See [`encode_frame`].
    pub fn encode(&self) -> Vec<u8> {
        encode_frame(self.msg_id, &self.payload)
    }
}

/// Encodes `msg_id` and `payload` into a single wire frame.
///
/// No size limit is applied here; callers must keep payloads below
/// `u32::MAX - 4` bytes.
pub fn encode_frame(msg_id: u32, payload: &[u8]) -> Vec<u8> {
    let length = (payload.len() + MSG_ID_LEN) as u32;
    let mut buf = Vec::with_capacity(HEADER_LEN + MSG_ID_LEN + payload.len());
    buf.extend_from_slice(&length.to_le_bytes());
    buf.extend_from_slice(&msg_id.to_le_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Reads exactly one frame from `reader`.
///
/// # Errors
/// - [`FrameError::ConnectionClosed`] if the stream ends inside (or
///   before) the 4-byte length prefix.
/// - [`FrameError::TruncatedFrame`] if the stream ends before the declared
///   body length has been read.
/// - [`FrameError::MalformedFrame`] if the declared length cannot even hold
///   a message id.
/// - [`FrameError::FrameTooLarge`] if the declared length exceeds
///   `config.max_frame_len`.
pub async fn read_frame<R>(
    reader: &mut R,
    config: &FrameConfig,
) -> Result<Frame, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; HEADER_LEN];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(FrameError::ConnectionClosed);
        }
        Err(e) => return Err(FrameError::Io(e)),
    }

    let length = u32::from_le_bytes(len_buf);
    if (length as usize) < MSG_ID_LEN {
        return Err(FrameError::MalformedFrame(length));
    }
    if length > config.max_frame_len {
        return Err(FrameError::FrameTooLarge {
            size: length,
            max: config.max_frame_len,
        });
    }

    // `take` + `read_to_end` stops at the declared length or at EOF,
    // whichever comes first, so a short stream is detected without
    // reading into the next frame.
    let mut body = Vec::with_capacity(length as usize);
    reader
        .take(u64::from(length))
        .read_to_end(&mut body)
        .await?;
    if body.len() < length as usize {
        return Err(FrameError::TruncatedFrame {
            expected: length,
            received: body.len(),
        });
    }

    let payload = body.split_off(MSG_ID_LEN);
    let msg_id = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
    Ok(Frame { msg_id, payload })
}

#[cfg(test)]
mod tests {
    use tokio::io::{duplex, AsyncWriteExt};

    use super::*;

    async fn decode(bytes: &[u8]) -> Result<Frame, FrameError> {
        let mut reader = bytes;
        read_frame(&mut reader, &FrameConfig::default()).await
    }

    #[test]
    fn test_encode_frame_layout_is_little_endian() {
        let bytes = encode_frame(1001, b"abc");
        assert_eq!(&bytes[..4], &7u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &1001u32.to_le_bytes());
        assert_eq!(&bytes[8..], b"abc");
    }

    #[test]
    fn test_encode_frame_empty_payload_has_length_four() {
        let bytes = encode_frame(2001, &[]);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..4], &4u32.to_le_bytes());
    }

    #[tokio::test]
    async fn test_read_frame_roundtrip_preserves_id_and_payload() {
        for (id, payload) in [
            (0u32, Vec::new()),
            (1001, b"login".to_vec()),
            (u32::MAX, vec![0xAB; 300]),
        ] {
            let frame = decode(&encode_frame(id, &payload)).await.unwrap();
            assert_eq!(frame, Frame::new(id, payload));
        }
    }

    #[tokio::test]
    async fn test_read_frame_sequential_frames_stay_in_sync() {
        let (mut client, mut server) = duplex(1024);
        let config = FrameConfig::default();

        for (id, body) in [(1u32, &b"first"[..]), (2, b""), (3, b"third")] {
            client.write_all(&encode_frame(id, body)).await.unwrap();
        }

        for (id, body) in [(1u32, &b"first"[..]), (2, b""), (3, b"third")] {
            let frame = read_frame(&mut server, &config).await.unwrap();
            assert_eq!(frame.msg_id, id);
            assert_eq!(frame.payload, body);
        }
    }

    #[tokio::test]
    async fn test_read_frame_empty_stream_is_connection_closed() {
        let result = decode(&[]).await;
        assert!(matches!(result, Err(FrameError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_read_frame_partial_header_is_connection_closed() {
        let result = decode(&[9, 0]).await;
        assert!(matches!(result, Err(FrameError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_read_frame_short_body_is_truncated() {
        let mut bytes = encode_frame(1001, b"hello world");
        bytes.truncate(bytes.len() - 3);

        let result = decode(&bytes).await;

        assert!(
            matches!(
                result,
                Err(FrameError::TruncatedFrame { expected: 15, received: 12 })
            ),
            "got {result:?}"
        );
    }

    #[tokio::test]
    async fn test_read_frame_length_below_msg_id_is_malformed() {
        let mut bytes = 2u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[1, 2]);

        let result = decode(&bytes).await;

        assert!(matches!(result, Err(FrameError::MalformedFrame(2))));
    }

    #[tokio::test]
    async fn test_read_frame_oversized_length_is_rejected_before_reading() {
        let config = FrameConfig { max_frame_len: 16 };
        let bytes = encode_frame(1, &[0u8; 64]);
        let mut reader = &bytes[..];

        let result = read_frame(&mut reader, &config).await;

        assert!(matches!(
            result,
            Err(FrameError::FrameTooLarge { size: 68, max: 16 })
        ));
    }
}
