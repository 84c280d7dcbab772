//! # Gatehouse
//!
//! TCP gateway for online games.
//!
//! Gatehouse terminates long-lived client connections, speaks a
//! length-prefixed binary protocol, and handles the login handshake on
//! behalf of the rest of the backend: credentials go to a login service
//! over a [`MessageBus`], logged-in players are tracked in registries and
//! mirrored to a [`PresenceStore`], and everyone online hears when players
//! join or leave.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gatehouse::prelude::*;
//!
//! # async fn run() -> Result<(), GatewayError> {
//! let bus = LocalBus::new();
//! gatehouse::login_service::spawn(&bus).await;
//!
//! let server = GatewayServer::builder()
//!     .bind("0.0.0.0:9000")
//!     .gateway_config(GatewayConfig {
//!         gateway_id: "gateway_02".into(),
//!         ..GatewayConfig::default()
//!     })
//!     .build(bus, MemoryPresenceStore::new())
//!     .await?;
//! server.run().await
//! # }
//! ```

pub mod bus;
mod config;
mod error;
pub mod logic;
pub mod login_service;
pub mod presence;
mod server;

pub use bus::{BusError, LocalBus, MessageBus};
pub use config::GatewayConfig;
pub use error::GatewayError;
pub use logic::GatewayLogic;
pub use presence::{MemoryPresenceStore, PresenceError, PresenceStore};
pub use server::{GatewayServer, GatewayServerBuilder, SessionStartHook};

/// Convenience re-exports for running a gateway.
pub mod prelude {
    pub use crate::{
        GatewayConfig, GatewayError, GatewayServer, LocalBus, MemoryPresenceStore,
        MessageBus, PresenceStore,
    };
    pub use gatehouse_protocol::{
        msg_id, Codec, FrameConfig, JsonCodec, LoginNotice, LoginRequest, LoginResponse,
        PlayerId,
    };
    pub use gatehouse_session::{Registries, Session, SessionConfig, SessionState};
}
