//! Unified error type for the gateway.

use gatehouse_protocol::{FrameError, ProtocolError};
use gatehouse_transport::TransportError;

use crate::bus::BusError;
use crate::presence::PresenceError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Binding or accepting connections failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be read off a stream.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// A payload could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A message-bus request failed or timed out.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// The presence store rejected an operation.
    #[error(transparent)]
    Presence(#[from] PresenceError),
}
