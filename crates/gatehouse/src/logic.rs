//! Login, logout, and broadcast orchestration.
//!
//! [`GatewayLogic`] is where transport meets business policy. It is handed
//! its collaborators (message bus, presence store, codec, registries) at
//! construction and never reaches for ambient state.
//!
//! # Login flow
//!
//! ```text
//! 1001 frame ─→ decode ─→ CAS Connected→LoggingIn ─→ bus request (2 s)
//!                              │ (not Connected:                │
//!                              │  duplicate, ignored)           │
//!                              ▼                                ▼
//!                                                 code == 0 ──→ bind player, CAS →InGame,
//!                                                               waiting→online, reply,
//!                                                               presence, join notice
//!                                                 otherwise ──→ attempts += 1, reply,
//!                                                               close at limit, else
//!                                                               CAS →Connected
//! ```
//!
//! Every step after the RPC is gated on the session still being in the
//! state the step expects: a session closed mid-RPC (grace timer, peer
//! hang-up) has its late response discarded.

use std::sync::Arc;

use gatehouse_protocol::{
    encode_frame, msg_id, Codec, LoginNotice, LoginRequest, LoginResponse,
    PlayerId,
};
use gatehouse_session::{
    Registries, Router, Session, SessionError, SessionState,
};
use serde::Serialize;

use crate::bus::{MessageBus, LOGIN_SUBJECT};
use crate::presence::PresenceStore;
use crate::{GatewayConfig, GatewayError};

/// Business logic shared by every connection on one gateway.
pub struct GatewayLogic<B, P, C> {
    bus: B,
    presence: P,
    codec: C,
    registries: Arc<Registries>,
    config: GatewayConfig,
}

impl<B, P, C> GatewayLogic<B, P, C>
where
    B: MessageBus,
    P: PresenceStore,
    C: Codec,
{
    /// Creates the logic with explicit collaborators.
    pub fn new(
        bus: B,
        presence: P,
        codec: C,
        registries: Arc<Registries>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            bus,
            presence,
            codec,
            registries,
            config,
        }
    }

    /// Returns the registries this logic maintains.
    pub fn registries(&self) -> &Arc<Registries> {
        &self.registries
    }

    /// Builds the router for the message ids this gateway understands.
    pub fn router(self: &Arc<Self>) -> Router {
        let mut router = Router::new();
        let logic = Arc::clone(self);
        router.register(msg_id::LOGIN, move |session: Arc<Session>, payload: Vec<u8>| {
            let logic = Arc::clone(&logic);
            async move { logic.handle_login(session, payload).await }
        });
        router
    }

    /// Session-start hook: wires logout into the session's close path and
    /// arms the login grace timer.
    pub fn on_session_start(self: &Arc<Self>, session: &Arc<Session>) {
        let logic = Arc::clone(self);
        session.set_close_hook(move |session, prior| {
            let logic = Arc::clone(&logic);
            async move { logic.handle_logout(session, prior).await }
        });

        let grace = self.config.login_grace;
        let weak = Arc::downgrade(session);
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            // The timer must not keep a finished session alive.
            let Some(session) = weak.upgrade() else {
                return;
            };
            match session.state() {
                SessionState::InGame | SessionState::Closed => {}
                state => {
                    tracing::info!(
                        addr = %session.addr(),
                        %state,
                        grace_secs = grace.as_secs_f64(),
                        "login grace period expired, disconnecting"
                    );
                    session.close().await;
                }
            }
        });
    }

    // -----------------------------------------------------------------
    // Login
    // -----------------------------------------------------------------

    /// Handles a `1001` login request from `session`.
    pub async fn handle_login(&self, session: Arc<Session>, payload: Vec<u8>) {
        let req: LoginRequest = match self.codec.decode(&payload) {
            Ok(req) => req,
            Err(e) => {
                tracing::warn!(addr = %session.addr(), error = %e, "unreadable login request");
                return;
            }
        };

        if let Err(state) =
            session.transition(SessionState::Connected, SessionState::LoggingIn)
        {
            tracing::debug!(
                addr = %session.addr(),
                %state,
                "login request ignored, session not in connected state"
            );
            return;
        }

        tracing::info!(addr = %session.addr(), username = %req.username, "login request");

        let response = match self.call_login_service(payload).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    addr = %session.addr(),
                    username = %req.username,
                    error = %e,
                    "login service call failed"
                );
                LoginResponse::failure(
                    LoginResponse::CODE_UNAVAILABLE,
                    "login service unavailable",
                )
            }
        };

        if session.state() != SessionState::LoggingIn {
            tracing::debug!(
                addr = %session.addr(),
                state = %session.state(),
                "session changed during login, discarding response"
            );
            return;
        }

        if response.is_success() {
            self.login_succeeded(&session, response).await;
        } else {
            self.login_failed(&session, &req, response).await;
        }
    }

    async fn call_login_service(
        &self,
        payload: Vec<u8>,
    ) -> Result<LoginResponse, GatewayError> {
        let reply = self
            .bus
            .request(LOGIN_SUBJECT, payload, self.config.login_timeout)
            .await?;
        Ok(self.codec.decode(&reply)?)
    }

    async fn login_succeeded(&self, session: &Arc<Session>, response: LoginResponse) {
        let player_id = PlayerId::new(response.player_id.clone());

        if !player_id.is_empty() {
            if let Err(rejected) = session.bind_player(player_id.clone()) {
                tracing::error!(
                    addr = %session.addr(),
                    %rejected,
                    "session already bound to a player"
                );
                return;
            }
        }
        if session
            .transition(SessionState::LoggingIn, SessionState::InGame)
            .is_err()
        {
            tracing::debug!(addr = %session.addr(), "session closed before login completed");
            return;
        }

        self.reply(session, msg_id::LOGIN, &response).await;

        // Guests stay keyed by address: no online entry, presence, or notice.
        if player_id.is_empty() {
            tracing::info!(addr = %session.addr(), "guest login");
            return;
        }

        let previous = self
            .registries
            .online
            .insert(player_id.clone(), Arc::clone(session));
        self.registries.waiting.remove(&session.addr(), session);

        if session.is_closed() {
            // Closed between the state change and the insert; its logout
            // could not see the online entry yet.
            self.registries.online.remove(&player_id, session);
            return;
        }

        if let Some(previous) = previous.filter(|p| !Arc::ptr_eq(p, session)) {
            tracing::info!(
                %player_id,
                old_addr = %previous.addr(),
                new_addr = %session.addr(),
                "player logged in again, evicting previous session"
            );
            previous.close().await;
        }

        tracing::info!(%player_id, addr = %session.addr(), "player logged in");

        if let Err(e) = self
            .presence
            .set_online(&player_id, &self.config.gateway_id, self.config.presence_ttl)
            .await
        {
            // The registries stay authoritative; the external record is
            // missing until the next login.
            tracing::warn!(%player_id, error = %e, "presence write failed");
        }

        self.broadcast(
            &LoginNotice {
                message: format!("player [{player_id}] joined"),
            },
            Some(session),
        );
    }

    async fn login_failed(
        &self,
        session: &Arc<Session>,
        req: &LoginRequest,
        response: LoginResponse,
    ) {
        let attempts = session.record_login_failure();
        tracing::info!(
            addr = %session.addr(),
            username = %req.username,
            code = response.code,
            attempts,
            "login failed"
        );

        self.reply(session, msg_id::LOGIN, &response).await;

        if attempts >= self.config.max_login_attempts {
            tracing::info!(addr = %session.addr(), attempts, "too many failed logins, disconnecting");
            session.close().await;
            return;
        }

        if let Err(state) =
            session.transition(SessionState::LoggingIn, SessionState::Connected)
        {
            tracing::debug!(addr = %session.addr(), %state, "session changed after failed login");
        }
    }

    // -----------------------------------------------------------------
    // Logout
    // -----------------------------------------------------------------

    /// Cleans up after a closed session. `prior` is the state the session
    /// was in when close began.
    pub async fn handle_logout(&self, session: Arc<Session>, prior: SessionState) {
        let player_id = match (prior, session.player_id()) {
            (SessionState::InGame, Some(player_id)) => player_id,
            _ => {
                self.registries.waiting.remove(&session.addr(), &session);
                tracing::debug!(addr = %session.addr(), %prior, "unauthenticated session cleaned up");
                return;
            }
        };

        // A session evicted by a newer login no longer owns the online
        // entry, and must not announce a departure or clear presence that
        // now belongs to its successor.
        if !self.registries.online.remove(player_id, &session) {
            tracing::debug!(%player_id, "superseded session closed");
            return;
        }

        tracing::info!(%player_id, addr = %session.addr(), "player logged out");

        self.broadcast(
            &LoginNotice {
                message: format!("player [{player_id}] left"),
            },
            None,
        );

        if let Err(e) = self.presence.clear_online(player_id).await {
            tracing::warn!(%player_id, error = %e, "presence clear failed, record will expire");
        }
    }

    // -----------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------

    /// Queues `notice` to every online session except `except`.
    ///
    /// Never waits: a recipient whose queue is full misses this notice so
    /// that one stalled client cannot hold up everyone else. Returns the
    /// number of sessions the notice was queued to.
    pub fn broadcast(&self, notice: &LoginNotice, except: Option<&Arc<Session>>) -> usize {
        let frame = match self.codec.encode(notice) {
            Ok(payload) => encode_frame(msg_id::NOTICE, &payload),
            Err(e) => {
                tracing::error!(error = %e, "failed to encode notice");
                return 0;
            }
        };

        let mut delivered = 0;
        for target in self.registries.online.sessions() {
            if except.is_some_and(|s| Arc::ptr_eq(s, &target)) {
                continue;
            }
            match target.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(SessionError::QueueFull) => {
                    tracing::warn!(addr = %target.addr(), "outbound queue full, notice dropped");
                }
                Err(SessionError::Closed) => {}
            }
        }
        tracing::debug!(message = %notice.message, delivered, "notice broadcast");
        delivered
    }

    async fn reply<T: Serialize>(&self, session: &Session, id: u32, message: &T) {
        let payload = match self.codec.encode(message) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(msg_id = id, error = %e, "failed to encode reply");
                return;
            }
        };
        if let Err(e) = session.send(encode_frame(id, &payload)).await {
            tracing::debug!(addr = %session.addr(), error = %e, "reply not delivered");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use gatehouse_protocol::{read_frame, Frame, FrameConfig, JsonCodec};
    use gatehouse_session::{OutboundQueue, SessionConfig};
    use gatehouse_transport::ConnectionId;

    use super::*;
    use crate::bus::BusError;
    use crate::presence::{MemoryPresenceStore, PresenceError};

    // -- Test doubles -----------------------------------------------------

    /// Answers every request with a fixed code after an optional delay,
    /// counting calls.
    #[derive(Clone)]
    struct ScriptedBus {
        code: i32,
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedBus {
        fn answering(code: i32) -> Self {
            Self {
                code,
                delay: Duration::ZERO,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl MessageBus for ScriptedBus {
        async fn request(
            &self,
            _subject: &str,
            payload: Vec<u8>,
            _timeout: Duration,
        ) -> Result<Vec<u8>, BusError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let req: LoginRequest = JsonCodec.decode(&payload).unwrap();
            let resp = LoginResponse {
                code: self.code,
                message: "scripted".into(),
                token: "t".into(),
                player_id: req.username,
            };
            Ok(JsonCodec.encode(&resp).unwrap())
        }
    }

    /// Never answers in time.
    struct SilentBus;

    impl MessageBus for SilentBus {
        async fn request(
            &self,
            _subject: &str,
            _payload: Vec<u8>,
            timeout: Duration,
        ) -> Result<Vec<u8>, BusError> {
            Err(BusError::Timeout(timeout))
        }
    }

    /// Records every call; optionally fails writes.
    #[derive(Clone, Default)]
    struct RecordingPresence {
        sets: Arc<Mutex<Vec<String>>>,
        clears: Arc<Mutex<Vec<String>>>,
        fail_writes: bool,
    }

    impl PresenceStore for RecordingPresence {
        async fn set_online(
            &self,
            player_id: &PlayerId,
            _gateway_id: &str,
            _ttl: Duration,
        ) -> Result<(), PresenceError> {
            if self.fail_writes {
                return Err(PresenceError::Backend("unreachable".into()));
            }
            self.sets.lock().unwrap().push(player_id.to_string());
            Ok(())
        }

        async fn clear_online(&self, player_id: &PlayerId) -> Result<(), PresenceError> {
            self.clears.lock().unwrap().push(player_id.to_string());
            Ok(())
        }

        async fn get_gateway(&self, _player_id: &PlayerId) -> Result<Option<String>, PresenceError> {
            Ok(None)
        }
    }

    // -- Helpers ----------------------------------------------------------

    fn logic<B: MessageBus, P: PresenceStore>(
        bus: B,
        presence: P,
    ) -> Arc<GatewayLogic<B, P, JsonCodec>> {
        Arc::new(GatewayLogic::new(
            bus,
            presence,
            JsonCodec,
            Arc::new(Registries::new()),
            GatewayConfig::default(),
        ))
    }

    /// Creates a session the way the accept loop does: registered as
    /// waiting, with the logic's session-start hook applied.
    fn connect<B: MessageBus, P: PresenceStore>(
        logic: &Arc<GatewayLogic<B, P, JsonCodec>>,
        port: u16,
    ) -> (Arc<Session>, OutboundQueue) {
        let addr: SocketAddr = format!("10.0.0.1:{port}").parse().unwrap();
        let (session, queue) = Session::new(
            ConnectionId::new(u64::from(port)),
            addr,
            &SessionConfig::default(),
        );
        logic.registries().waiting.insert(addr, Arc::clone(&session));
        logic.on_session_start(&session);
        (session, queue)
    }

    fn login_payload(username: &str) -> Vec<u8> {
        JsonCodec
            .encode(&LoginRequest {
                username: username.into(),
                password: "password123".into(),
            })
            .unwrap()
    }

    async fn next_frame(queue: &mut OutboundQueue) -> Frame {
        let bytes = tokio::time::timeout(Duration::from_secs(1), queue.recv())
            .await
            .expect("frame should be queued")
            .expect("queue open");
        read_frame(&mut &bytes[..], &FrameConfig::default()).await.unwrap()
    }

    fn decode_response(frame: &Frame) -> LoginResponse {
        assert_eq!(frame.msg_id, msg_id::LOGIN);
        JsonCodec.decode(&frame.payload).unwrap()
    }

    fn decode_notice(frame: &Frame) -> LoginNotice {
        assert_eq!(frame.msg_id, msg_id::NOTICE);
        JsonCodec.decode(&frame.payload).unwrap()
    }

    // =====================================================================
    // handle_login()
    // =====================================================================

    #[tokio::test]
    async fn test_handle_login_success_promotes_session() {
        let presence = RecordingPresence::default();
        let logic = logic(ScriptedBus::answering(0), presence.clone());
        let (session, mut queue) = connect(&logic, 1);

        logic.handle_login(Arc::clone(&session), login_payload("admin")).await;

        assert_eq!(session.state(), SessionState::InGame);
        assert_eq!(session.player_id(), Some(&PlayerId::new("admin")));
        let regs = logic.registries();
        assert!(!regs.waiting.contains_key(&session.addr()));
        assert!(regs.online.contains_key(&PlayerId::new("admin")));
        assert_eq!(*presence.sets.lock().unwrap(), vec!["admin".to_string()]);

        let resp = decode_response(&next_frame(&mut queue).await);
        assert!(resp.is_success());
        assert_eq!(resp.player_id, "admin");
        assert!(queue.try_recv().is_none(), "no self join notice");
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_login_concurrent_duplicate_issues_one_rpc() {
        let bus = ScriptedBus {
            delay: Duration::from_millis(50),
            ..ScriptedBus::answering(0)
        };
        let logic = logic(bus.clone(), MemoryPresenceStore::new());
        let (session, _queue) = connect(&logic, 1);

        tokio::join!(
            logic.handle_login(Arc::clone(&session), login_payload("admin")),
            logic.handle_login(Arc::clone(&session), login_payload("admin")),
        );

        assert_eq!(bus.calls(), 1);
        assert_eq!(session.state(), SessionState::InGame);
    }

    #[tokio::test]
    async fn test_handle_login_after_in_game_is_ignored() {
        let bus = ScriptedBus::answering(0);
        let logic = logic(bus.clone(), MemoryPresenceStore::new());
        let (session, _queue) = connect(&logic, 1);

        logic.handle_login(Arc::clone(&session), login_payload("admin")).await;
        logic.handle_login(Arc::clone(&session), login_payload("other")).await;

        assert_eq!(bus.calls(), 1);
        assert_eq!(session.player_id(), Some(&PlayerId::new("admin")));
    }

    #[tokio::test]
    async fn test_handle_login_rejected_returns_to_connected() {
        let logic = logic(ScriptedBus::answering(1), MemoryPresenceStore::new());
        let (session, mut queue) = connect(&logic, 1);

        logic.handle_login(Arc::clone(&session), login_payload("admin")).await;

        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(session.login_attempts(), 1);
        assert!(logic.registries().waiting.contains_key(&session.addr()));
        assert_eq!(decode_response(&next_frame(&mut queue).await).code, 1);
    }

    #[tokio::test]
    async fn test_handle_login_third_failure_closes_session() {
        let logic = logic(ScriptedBus::answering(7), MemoryPresenceStore::new());
        let (session, mut queue) = connect(&logic, 1);

        for expected_attempts in 1..=3 {
            logic.handle_login(Arc::clone(&session), login_payload("admin")).await;
            assert_eq!(session.login_attempts(), expected_attempts);
            assert_eq!(decode_response(&next_frame(&mut queue).await).code, 7);
        }

        assert!(session.is_closed());
        assert!(!logic.registries().holds(&session));
    }

    #[tokio::test]
    async fn test_handle_login_timeout_counts_as_failure() {
        let logic = logic(SilentBus, MemoryPresenceStore::new());
        let (session, mut queue) = connect(&logic, 1);

        logic.handle_login(Arc::clone(&session), login_payload("admin")).await;

        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(session.login_attempts(), 1);
        let resp = decode_response(&next_frame(&mut queue).await);
        assert_eq!(resp.code, LoginResponse::CODE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_handle_login_garbage_payload_changes_nothing() {
        let bus = ScriptedBus::answering(0);
        let logic = logic(bus.clone(), MemoryPresenceStore::new());
        let (session, _queue) = connect(&logic, 1);

        logic.handle_login(Arc::clone(&session), b"\xff\xfe".to_vec()).await;

        assert_eq!(bus.calls(), 0);
        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(session.login_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_login_response_after_close_is_discarded() {
        let presence = RecordingPresence::default();
        let bus = ScriptedBus {
            delay: Duration::from_millis(100),
            ..ScriptedBus::answering(0)
        };
        let logic = logic(bus, presence.clone());
        let (session, _queue) = connect(&logic, 1);

        let login = logic.handle_login(Arc::clone(&session), login_payload("admin"));
        let kick = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            session.close().await;
        };
        tokio::join!(login, kick);

        assert!(session.player_id().is_none());
        assert!(logic.registries().online.is_empty());
        assert!(logic.registries().waiting.is_empty());
        assert!(presence.sets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_presence_failure_does_not_block_login() {
        let presence = RecordingPresence {
            fail_writes: true,
            ..RecordingPresence::default()
        };
        let logic = logic(ScriptedBus::answering(0), presence);
        let (session, _queue) = connect(&logic, 1);

        logic.handle_login(Arc::clone(&session), login_payload("admin")).await;

        assert_eq!(session.state(), SessionState::InGame);
        assert!(logic.registries().online.contains_key(&PlayerId::new("admin")));
    }

    #[tokio::test]
    async fn test_guest_login_stays_in_waiting_registry() {
        let presence = RecordingPresence::default();
        let logic = logic(ScriptedBus::answering(0), presence.clone());
        let (session, _queue) = connect(&logic, 1);

        // The scripted bus echoes the username back as the player id.
        logic.handle_login(Arc::clone(&session), login_payload("")).await;

        assert_eq!(session.state(), SessionState::InGame);
        assert!(session.player_id().is_none());
        assert!(logic.registries().online.is_empty());

        session.close().await;
        assert!(logic.registries().waiting.is_empty());
        assert!(presence.sets.lock().unwrap().is_empty());
        assert!(presence.clears.lock().unwrap().is_empty());
    }

    // =====================================================================
    // Notices and logout
    // =====================================================================

    #[tokio::test]
    async fn test_second_player_join_notifies_first() {
        let logic = logic(ScriptedBus::answering(0), MemoryPresenceStore::new());
        let (admin, mut admin_queue) = connect(&logic, 1);
        let (bob, mut bob_queue) = connect(&logic, 2);

        logic.handle_login(Arc::clone(&admin), login_payload("admin")).await;
        next_frame(&mut admin_queue).await;
        logic.handle_login(Arc::clone(&bob), login_payload("bob")).await;

        let notice = decode_notice(&next_frame(&mut admin_queue).await);
        assert!(notice.message.contains("bob"));
        assert!(decode_response(&next_frame(&mut bob_queue).await).is_success());
        assert!(bob_queue.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_close_twice_runs_logout_side_effects_once() {
        let presence = RecordingPresence::default();
        let logic = logic(ScriptedBus::answering(0), presence.clone());
        let (admin, _admin_queue) = connect(&logic, 1);
        let (watcher, mut watcher_queue) = connect(&logic, 2);
        logic.handle_login(Arc::clone(&watcher), login_payload("watcher")).await;
        next_frame(&mut watcher_queue).await;
        logic.handle_login(Arc::clone(&admin), login_payload("admin")).await;
        let joined = decode_notice(&next_frame(&mut watcher_queue).await);
        assert!(joined.message.contains("admin"));

        tokio::join!(admin.close(), admin.close());
        admin.close().await;

        assert_eq!(*presence.clears.lock().unwrap(), vec!["admin".to_string()]);
        let left = decode_notice(&next_frame(&mut watcher_queue).await);
        assert!(left.message.contains("admin"));
        assert!(watcher_queue.try_recv().is_none(), "exactly one departure notice");
        assert!(!logic.registries().holds(&admin));
    }

    #[tokio::test]
    async fn test_duplicate_player_login_evicts_previous_session() {
        let presence = MemoryPresenceStore::new();
        let logic = logic(ScriptedBus::answering(0), presence.clone());
        let (first, _q1) = connect(&logic, 1);
        let (second, _q2) = connect(&logic, 2);

        logic.handle_login(Arc::clone(&first), login_payload("admin")).await;
        logic.handle_login(Arc::clone(&second), login_payload("admin")).await;

        assert!(first.is_closed());
        let owner = logic.registries().online.get(&PlayerId::new("admin")).unwrap();
        assert!(Arc::ptr_eq(&owner, &second));
        assert_eq!(
            presence.get_gateway(&PlayerId::new("admin")).await.unwrap().as_deref(),
            Some("gateway_01"),
            "evicted session must not clear its successor's presence"
        );
    }

    #[tokio::test]
    async fn test_broadcast_skips_full_queue_without_blocking() {
        let logic = logic(ScriptedBus::answering(0), MemoryPresenceStore::new());
        let config = SessionConfig {
            outbound_capacity: 1,
            ..SessionConfig::default()
        };
        let (slow, _slow_queue) =
            Session::new(ConnectionId::new(9), "10.0.0.9:9".parse().unwrap(), &config);
        slow.try_send(vec![0]).unwrap();
        logic.registries().online.insert(PlayerId::new("slow"), Arc::clone(&slow));
        let (fast, mut fast_queue) = connect(&logic, 1);
        logic.registries().online.insert(PlayerId::new("fast"), Arc::clone(&fast));

        let delivered = logic.broadcast(
            &LoginNotice {
                message: "hello".into(),
            },
            None,
        );

        assert_eq!(delivered, 1);
        assert_eq!(decode_notice(&next_frame(&mut fast_queue).await).message, "hello");
    }

    // =====================================================================
    // Grace period
    // =====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_grace_timer_closes_unauthenticated_session() {
        let logic = logic(ScriptedBus::answering(0), MemoryPresenceStore::new());
        let (session, _queue) = connect(&logic, 1);

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(!session.is_closed());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(session.is_closed());
        assert!(logic.registries().waiting.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_timer_spares_logged_in_session() {
        let logic = logic(ScriptedBus::answering(0), MemoryPresenceStore::new());
        let (session, _queue) = connect(&logic, 1);
        logic.handle_login(Arc::clone(&session), login_payload("admin")).await;

        tokio::time::sleep(Duration::from_secs(31)).await;

        assert_eq!(session.state(), SessionState::InGame);
    }
}
