//! Connection sessions for Gatehouse.
//!
//! This crate owns everything about a single client connection and the
//! bookkeeping around many of them:
//!
//! 1. **State machine** ([`SessionState`]): connected, logging in, in
//!    game, closed; transitions are atomic compare-and-set.
//! 2. **Session** ([`Session`]): read loop, write loop, bounded outbound
//!    queue, exactly-once close with a business hook.
//! 3. **Routing** ([`Router`]): message id → handler dispatch.
//! 4. **Registries** ([`Registry`], [`Registries`]): typed concurrent
//!    maps of waiting and online sessions.
//!
//! # How it fits in the stack
//!
//! ```text
//! Gateway (above)   ← login/logout policy, broadcasts, presence
//!     ↕
//! Session (this crate) ← per-connection lifecycle and dispatch
//!     ↕
//! Protocol / Transport (below) ← frames and sockets
//! ```
//!
//! The session layer knows nothing about logins. Business cleanup reaches
//! it only through the close hook installed by whoever accepted the
//! connection.

mod error;
mod registry;
mod router;
mod session;
mod state;

pub use error::SessionError;
pub use registry::{Registries, Registry};
pub use router::{Handler, Router};
pub use session::{OutboundQueue, Session, SessionConfig};
pub use state::SessionState;
