//! `GatewayServer` builder and accept loop.
//!
//! This is the entry point for running a gateway. It ties together all the
//! layers: transport → protocol → session → gateway logic.

use std::net::SocketAddr;
use std::sync::Arc;

use gatehouse_protocol::{FrameConfig, JsonCodec};
use gatehouse_session::{Registries, Router, Session, SessionConfig};
use gatehouse_transport::{TcpConnection, TcpTransport, Transport};

use crate::bus::MessageBus;
use crate::logic::GatewayLogic;
use crate::presence::PresenceStore;
use crate::{GatewayConfig, GatewayError};

/// Callback run once per accepted connection, before the session starts
/// reading.
pub type SessionStartHook = Box<dyn Fn(&Arc<Session>) + Send + Sync>;

/// Builder for configuring and starting a gateway.
///
/// # Example
///
/// ```rust,no_run
/// use gatehouse::prelude::*;
///
/// # async fn run() -> Result<(), GatewayError> {
/// let bus = LocalBus::new();
/// gatehouse::login_service::spawn(&bus).await;
///
/// let server = GatewayServer::builder()
///     .bind("0.0.0.0:9000")
///     .build(bus, MemoryPresenceStore::new())
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct GatewayServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
    gateway_config: GatewayConfig,
}

impl GatewayServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:9000".to_string(),
            session_config: SessionConfig::default(),
            gateway_config: GatewayConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the per-connection configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets the inbound frame limits. Shorthand for editing
    /// [`SessionConfig::frame`].
    pub fn frame_config(mut self, config: FrameConfig) -> Self {
        self.session_config.frame = config;
        self
    }

    /// Sets the login and presence policy.
    pub fn gateway_config(mut self, config: GatewayConfig) -> Self {
        self.gateway_config = config;
        self
    }

    /// Binds the listener and wires the gateway logic to `bus` and
    /// `presence`.
    ///
    /// Payloads are encoded with [`JsonCodec`].
    pub async fn build<B, P>(self, bus: B, presence: P) -> Result<GatewayServer, GatewayError>
    where
        B: MessageBus,
        P: PresenceStore,
    {
        let transport = TcpTransport::bind(&self.bind_addr).await?;
        let registries = Arc::new(Registries::new());

        let logic = Arc::new(GatewayLogic::new(
            bus,
            presence,
            JsonCodec,
            Arc::clone(&registries),
            self.gateway_config,
        ));
        let router = logic.router();

        let server = GatewayServer::new(transport, router, registries, self.session_config)
            .on_session_start(move |session| logic.on_session_start(session));
        Ok(server)
    }
}

impl Default for GatewayServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound gateway.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct GatewayServer {
    transport: TcpTransport,
    router: Arc<Router>,
    registries: Arc<Registries>,
    session_config: SessionConfig,
    on_session_start: Option<SessionStartHook>,
}

impl GatewayServer {
    /// Creates a new builder.
    pub fn builder() -> GatewayServerBuilder {
        GatewayServerBuilder::new()
    }

    /// Assembles a server from parts, with no session-start hook.
    ///
    /// Most callers want [`builder()`](Self::builder); this is for running
    /// a custom router over the same accept loop.
    pub fn new(
        transport: TcpTransport,
        router: Router,
        registries: Arc<Registries>,
        session_config: SessionConfig,
    ) -> Self {
        Self {
            transport,
            router: Arc::new(router),
            registries,
            session_config,
            on_session_start: None,
        }
    }

    /// Sets the callback run for every accepted session after it is
    /// registered as waiting and before it starts reading.
    pub fn on_session_start<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Arc<Session>) + Send + Sync + 'static,
    {
        self.on_session_start = Some(Box::new(hook));
        self
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, GatewayError> {
        Ok(self.transport.local_addr()?)
    }

    /// Returns the waiting and online registries.
    pub fn registries(&self) -> Arc<Registries> {
        Arc::clone(&self.registries)
    }

    /// Runs the accept loop.
    ///
    /// Each accepted connection becomes a [`Session`] in the waiting
    /// registry, then gets the session-start hook, then starts its read
    /// and write loops. A failed accept is logged and the loop continues.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), GatewayError> {
        tracing::info!(addr = %self.local_addr()?, "gateway listening");

        loop {
            match self.transport.accept().await {
                Ok(conn) => self.start_session(conn),
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }

    fn start_session(&self, conn: TcpConnection) {
        let addr = conn.peer_addr();
        let (session, outbound) = Session::new(conn.id(), addr, &self.session_config);

        // Registered before any hook runs so cleanup can always find it.
        if let Some(stale) = self.registries.waiting.insert(addr, Arc::clone(&session)) {
            tracing::warn!(%addr, stale = %stale.id(), "replaced waiting session with same address");
        }
        tracing::info!(conn_id = %session.id(), %addr, "connection accepted");

        if let Some(hook) = &self.on_session_start {
            hook(&session);
        }

        let (reader, writer) = conn.into_split();
        session.start(
            reader,
            writer,
            outbound,
            Arc::clone(&self.router),
            self.session_config.frame.clone(),
        );
    }
}
