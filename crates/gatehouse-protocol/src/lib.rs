//! Wire protocol for Gatehouse.
//!
//! This crate defines the "language" that game clients and the gateway
//! speak over TCP:
//!
//! - **Frames** ([`Frame`], [`encode_frame`], [`read_frame`]): the
//!   length-prefixed envelope every message travels in.
//! - **Types** ([`LoginRequest`], [`LoginResponse`], [`LoginNotice`],
//!   [`PlayerId`], [`msg_id`]): the payloads the gateway understands.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how payloads are
//!   converted to and from bytes.
//! - **Errors** ([`FrameError`], [`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (TCP bytes) → Frame (msgID + payload) → Codec (typed message)
//! ```
//!
//! Framing and payload encoding are deliberately separate: the frame layer
//! never looks inside a payload, so a router can dispatch on `msg_id`
//! without knowing how any particular message is serialized.

mod codec;
mod error;
mod frame;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::{FrameError, ProtocolError};
pub use frame::{
    encode_frame, read_frame, Frame, FrameConfig, HEADER_LEN, MSG_ID_LEN,
};
pub use types::{msg_id, LoginNotice, LoginRequest, LoginResponse, PlayerId};
