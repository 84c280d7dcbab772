//! A single client connection: state, outbound queue, and I/O loops.
//!
//! Each session runs two tasks:
//!
//! - the **read loop** decodes frames and dispatches them through the
//!   [`Router`], one at a time, in arrival order;
//! - the **write loop** drains the outbound queue onto the socket, in
//!   enqueue order.
//!
//! Anything holding an `Arc<Session>` may enqueue frames. Every path that
//! ends a connection (read error, write error, a handler, the grace-period
//! timer, a duplicate-login eviction) funnels into [`Session::close`], which
//! runs its side effects exactly once.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use gatehouse_protocol::{read_frame, FrameConfig, FrameError, PlayerId};
use gatehouse_transport::ConnectionId;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};

use crate::state::AtomicSessionState;
use crate::{Router, SessionError, SessionState};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Per-connection settings shared by every session a server creates.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Capacity of each session's outbound queue, in frames.
    ///
    /// A blocking producer waits when the queue is full; a non-blocking
    /// one gets [`SessionError::QueueFull`]. Default: 100.
    pub outbound_capacity: usize,

    /// Decode limits for inbound frames.
    pub frame: FrameConfig,

    /// How long a closing session may spend delivering frames that were
    /// queued before the close. After that the connection is dropped with
    /// whatever is left unsent. Default: 1 second.
    pub flush_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 100,
            frame: FrameConfig::default(),
            flush_timeout: Duration::from_secs(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

type CloseHook =
    Box<dyn Fn(Arc<Session>, SessionState) -> BoxFuture<'static, ()> + Send + Sync>;

/// The server-side record of one live connection.
///
/// Created by the accept loop, shared as `Arc<Session>` between the
/// session's own I/O tasks, the registries, and whatever business logic
/// needs to push frames to it.
pub struct Session {
    id: ConnectionId,
    addr: SocketAddr,
    state: AtomicSessionState,
    /// Bound once, on login success.
    player_id: OnceLock<PlayerId>,
    /// Failed logins on this connection. Never decremented.
    login_attempts: AtomicU32,
    outbound: mpsc::Sender<Vec<u8>>,
    /// Flips to `true` when the session closes; both I/O loops watch it.
    shutdown: watch::Sender<bool>,
    flush_timeout: Duration,
    on_close: OnceLock<CloseHook>,
}

/// Receiving end of a session's outbound queue.
///
/// Normally handed straight to [`Session::start`]. Tests that drive a
/// session without a socket can read from it directly.
pub struct OutboundQueue {
    rx: mpsc::Receiver<Vec<u8>>,
}

impl OutboundQueue {
    /// Waits for the next queued frame.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }

    /// Returns the next queued frame if one is ready.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.rx.try_recv().ok()
    }
}

impl Session {
    /// Creates a session in the [`SessionState::Connected`] state.
    ///
    /// Returns the session together with the receiving end of its
    /// outbound queue. Nothing runs until [`start`](Self::start) is called.
    pub fn new(
        id: ConnectionId,
        addr: SocketAddr,
        config: &SessionConfig,
    ) -> (Arc<Self>, OutboundQueue) {
        let (tx, rx) = mpsc::channel(config.outbound_capacity.max(1));
        let (shutdown, _) = watch::channel(false);
        let session = Arc::new(Self {
            id,
            addr,
            state: AtomicSessionState::new(SessionState::Connected),
            player_id: OnceLock::new(),
            login_attempts: AtomicU32::new(0),
            outbound: tx,
            shutdown,
            flush_timeout: config.flush_timeout,
            on_close: OnceLock::new(),
        });
        (session, OutboundQueue { rx })
    }

    /// Returns the connection id assigned by the transport.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the peer address; this is the waiting-registry key.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the current state.
    pub fn state(&self) -> SessionState {
        self.state.load()
    }

    /// Returns `true` once [`close`](Self::close) has started.
    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    /// Atomically moves from `from` to `to`.
    ///
    /// # Errors
    /// Returns the state actually observed if it was not `from`. `Closed`
    /// can only be entered through [`close`](Self::close), so passing it as
    /// `to` is refused as well.
    pub fn transition(
        &self,
        from: SessionState,
        to: SessionState,
    ) -> Result<(), SessionState> {
        if to == SessionState::Closed {
            return Err(self.state());
        }
        self.state.transition(from, to)
    }

    /// Returns the player bound to this session, if login succeeded.
    pub fn player_id(&self) -> Option<&PlayerId> {
        self.player_id.get()
    }

    /// Binds the player identity. Succeeds only the first time.
    ///
    /// # Errors
    /// Returns the rejected identity if one was already bound.
    pub fn bind_player(&self, player_id: PlayerId) -> Result<(), PlayerId> {
        self.player_id.set(player_id)
    }

    /// Returns how many logins have failed on this connection.
    pub fn login_attempts(&self) -> u32 {
        self.login_attempts.load(Ordering::Acquire)
    }

    /// Records one more failed login and returns the new total.
    pub fn record_login_failure(&self) -> u32 {
        self.login_attempts.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Installs the callback run by [`close`](Self::close).
    ///
    /// The hook receives the state the session was in when close began,
    /// so it can decide what to clean up without racing later changes.
    /// Only the first hook installed is kept.
    pub fn set_close_hook<F, Fut>(&self, hook: F)
    where
        F: Fn(Arc<Session>, SessionState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let boxed: CloseHook = Box::new(move |session, state| {
            Box::pin(hook(session, state))
        });
        if self.on_close.set(boxed).is_err() {
            tracing::warn!(conn_id = %self.id, "close hook already installed");
        }
    }

    /// Enqueues an encoded frame, waiting if the queue is full.
    ///
    /// A wait for queue space ends as soon as the session shuts down.
    ///
    /// # Errors
    /// Returns [`SessionError::Closed`] if the session is closed, closes
    /// while waiting, or its write loop has exited.
    pub async fn send(&self, frame: Vec<u8>) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        let mut shutdown = self.shutdown.subscribe();
        tokio::select! {
            result = self.outbound.send(frame) => {
                result.map_err(|_| SessionError::Closed)
            }
            _ = shutdown.wait_for(|closed| *closed) => Err(SessionError::Closed),
        }
    }

    /// Enqueues an encoded frame without waiting.
    ///
    /// # Errors
    /// - [`SessionError::QueueFull`] if the queue is at capacity.
    /// - [`SessionError::Closed`] if the session is closed.
    pub fn try_send(&self, frame: Vec<u8>) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SessionError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SessionError::Closed,
        })
    }

    /// Closes the session. Safe to call any number of times, from any task.
    ///
    /// Only the first call does anything:
    /// 1. the state becomes [`SessionState::Closed`];
    /// 2. the close hook runs, while `player_id` and the prior state are
    ///    still readable;
    /// 3. the read loop is told to stop reading;
    /// 4. the write loop flushes what was already queued (bounded by
    ///    [`SessionConfig::flush_timeout`]), shuts the socket down, and
    ///    exits. A write already stuck on a peer that stopped reading is
    ///    abandoned and the connection dropped.
    pub async fn close(self: &Arc<Self>) {
        let prior = self.state.swap(SessionState::Closed);
        if prior == SessionState::Closed {
            return;
        }

        tracing::info!(
            conn_id = %self.id,
            addr = %self.addr,
            player_id = self.player_id().map(PlayerId::as_str).unwrap_or(""),
            %prior,
            "closing session"
        );

        if let Some(hook) = self.on_close.get() {
            hook(Arc::clone(self), prior).await;
        }

        self.shutdown.send_replace(true);
    }

    /// Waits until [`close`](Self::close) has signalled shutdown.
    pub async fn closed(&self) {
        let mut rx = self.shutdown.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Spawns the read and write loops for this session.
    ///
    /// `reader` and `writer` are the two halves of the connection; the
    /// session owns them from here on.
    pub fn start<R, W>(
        self: &Arc<Self>,
        reader: R,
        writer: W,
        outbound: OutboundQueue,
        router: Arc<Router>,
        frame_config: FrameConfig,
    ) where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        tracing::debug!(conn_id = %self.id, addr = %self.addr, "session started");
        tokio::spawn(read_loop(Arc::clone(self), reader, router, frame_config));
        tokio::spawn(write_loop(Arc::clone(self), writer, outbound));
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("state", &self.state())
            .field("player_id", &self.player_id())
            .field("login_attempts", &self.login_attempts())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// I/O loops
// ---------------------------------------------------------------------------

async fn read_loop<R>(
    session: Arc<Session>,
    mut reader: R,
    router: Arc<Router>,
    config: FrameConfig,
) where
    R: AsyncRead + Unpin,
{
    let mut shutdown = session.shutdown.subscribe();

    loop {
        let result = tokio::select! {
            biased;
            _ = shutdown.wait_for(|closed| *closed) => break,
            result = read_frame(&mut reader, &config) => result,
        };

        let frame = match result {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => {
                tracing::debug!(conn_id = %session.id, "peer closed connection");
                break;
            }
            Err(e) => {
                tracing::warn!(conn_id = %session.id, error = %e, "frame read failed");
                break;
            }
        };

        let dispatch =
            router.route(frame.msg_id, Arc::clone(&session), frame.payload);
        if let Err(panic) = AssertUnwindSafe(dispatch).catch_unwind().await {
            tracing::error!(
                conn_id = %session.id,
                msg_id = frame.msg_id,
                panic = panic_message(&*panic),
                "handler panicked"
            );
            break;
        }
    }

    session.close().await;
}

/// How the write loop's main phase ended.
enum WriteExit {
    /// Shutdown signalled between frames; queued frames may be flushed.
    Closed,
    /// Shutdown signalled mid-write; the peer is not reading.
    Interrupted,
    /// The socket rejected a write.
    Failed,
}

async fn write_loop<W>(session: Arc<Session>, mut writer: W, mut outbound: OutboundQueue)
where
    W: AsyncWrite + Unpin,
{
    let mut shutdown = session.shutdown.subscribe();

    let exit = loop {
        let frame = tokio::select! {
            biased;
            Some(frame) = outbound.rx.recv() => frame,
            _ = shutdown.wait_for(|closed| *closed) => break WriteExit::Closed,
        };
        let written = tokio::select! {
            biased;
            result = writer.write_all(&frame) => result,
            _ = shutdown.wait_for(|closed| *closed) => break WriteExit::Interrupted,
        };
        if let Err(e) = written {
            tracing::debug!(conn_id = %session.id, error = %e, "write failed");
            break WriteExit::Failed;
        }
    };

    match exit {
        WriteExit::Failed => session.close().await,
        WriteExit::Interrupted => {
            tracing::debug!(conn_id = %session.id, "peer not reading, dropping connection");
        }
        WriteExit::Closed => {
            // Deliver what was queued before the close (e.g. the final
            // login response), then stop accepting more.
            outbound.rx.close();
            let flush = async {
                while let Some(frame) = outbound.rx.recv().await {
                    writer.write_all(&frame).await?;
                }
                writer.shutdown().await
            };
            match tokio::time::timeout(session.flush_timeout, flush).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::debug!(conn_id = %session.id, error = %e, "flush on close failed");
                }
                Err(_) => {
                    tracing::debug!(
                        conn_id = %session.id,
                        timeout_ms = session.flush_timeout.as_millis() as u64,
                        "flush on close timed out, dropping connection"
                    );
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
