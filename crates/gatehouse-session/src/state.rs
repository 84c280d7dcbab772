//! The per-connection state machine.
//!
//! ```text
//!   Connected ──(login request)──→ LoggingIn ──(code == 0)──→ InGame
//!       ↑                              │
//!       └──────(failure, < limit)──────┘
//!
//!   any state ──(close)──→ Closed
//! ```
//!
//! The state is read and written from several tasks at once (the read
//! loop running a login handler, the grace-period timer, other sessions'
//! handlers evicting a duplicate login), so it lives in an atomic and
//! every transition is a compare-and-set.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a [`Session`](crate::Session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionState {
    /// Just accepted, not authenticated. Initial state.
    Connected = 0,
    /// A login RPC is in flight. Further login requests are ignored.
    LoggingIn = 1,
    /// Authenticated; the session is in the online registry.
    InGame = 2,
    /// Torn down. Terminal.
    Closed = 3,
}

impl SessionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connected,
            1 => Self::LoggingIn,
            2 => Self::InGame,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connected => "connected",
            Self::LoggingIn => "logging-in",
            Self::InGame => "in-game",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// A [`SessionState`] that can be shared between tasks.
///
/// Only values produced from a `SessionState` are ever stored, so the
/// `u8` representation never escapes this type.
#[derive(Debug)]
pub(crate) struct AtomicSessionState(AtomicU8);

impl AtomicSessionState {
    pub(crate) fn new(state: SessionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves from `from` to `to` only if the current state is `from`.
    ///
    /// On failure returns the state that was actually observed.
    pub(crate) fn transition(
        &self,
        from: SessionState,
        to: SessionState,
    ) -> Result<(), SessionState> {
        self.0
            .compare_exchange(
                from as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(SessionState::from_u8)
    }

    /// Unconditionally stores `state`, returning the previous one.
    pub(crate) fn swap(&self, state: SessionState) -> SessionState {
        SessionState::from_u8(self.0.swap(state as u8, Ordering::AcqRel))
    }
}
