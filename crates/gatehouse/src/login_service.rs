//! A minimal login service reachable over a [`LocalBus`].
//!
//! Real deployments run the login service as its own process behind a
//! network bus; this one exists so a single binary (and the test suite)
//! can exercise the full login path. It is stateless: every well-formed
//! request with a non-empty username is accepted, and the username becomes
//! the player id.

use gatehouse_protocol::{Codec, JsonCodec, LoginRequest, LoginResponse};
use rand::Rng;
use tokio::task::JoinHandle;

use crate::bus::{BusMessage, LocalBus, LOGIN_SUBJECT};

/// Subscribes to [`LOGIN_SUBJECT`] on `bus` and answers requests until
/// the bus stops delivering them.
pub async fn spawn(bus: &LocalBus) -> JoinHandle<()> {
    let mut inbox = bus.subscribe(LOGIN_SUBJECT).await;
    tracing::info!(subject = LOGIN_SUBJECT, "login service started");

    tokio::spawn(async move {
        while let Some(message) = inbox.recv().await {
            handle(message);
        }
        tracing::info!("login service stopped");
    })
}

fn handle(message: BusMessage) {
    let codec = JsonCodec;
    let response = match codec.decode::<LoginRequest>(&message.payload) {
        Ok(req) => respond_to(&req),
        Err(e) => {
            tracing::debug!(error = %e, "unreadable login request");
            LoginResponse::failure(LoginResponse::CODE_REJECTED, "malformed request")
        }
    };

    let bytes = match codec.encode(&response) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode login response");
            return;
        }
    };
    if let Err(e) = message.respond(bytes) {
        tracing::debug!(error = %e, "requester went away before reply");
    }
}

fn respond_to(req: &LoginRequest) -> LoginResponse {
    if req.username.trim().is_empty() {
        return LoginResponse::failure(LoginResponse::CODE_REJECTED, "username required");
    }
    tracing::debug!(username = %req.username, "login accepted");
    LoginResponse {
        code: LoginResponse::CODE_OK,
        message: "Login Success".to_string(),
        token: generate_token(),
        player_id: req.username.clone(),
    }
}

/// Generates a random 32-character hex string (128 bits of entropy).
fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
