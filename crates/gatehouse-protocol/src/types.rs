//! Message types carried inside frames.
//!
//! Each type here is the payload of exactly one message id from
//! [`msg_id`]. Payloads are serialized with a [`Codec`](crate::Codec);
//! the frame layer never inspects them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Message-type identifiers used on the wire.
pub mod msg_id {
    /// Login request (client → gateway) and login response (gateway → client).
    pub const LOGIN: u32 = 1001;

    /// Broadcast notice (gateway → client only).
    pub const NOTICE: u32 = 2001;
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The identity a player receives from the login service.
///
/// A newtype over `String` so that player ids and connection addresses,
/// which both key registries, can never be confused.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Wraps a raw identity string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the empty identity (a guest login).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

/// Client → gateway, and gateway → login service: credentials to check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Account name; the bundled login service uses it as the player id.
    pub username: String,
    /// Checked by the login service only. The gateway never reads it.
    pub password: String,
}

/// Login service → gateway → client: the verdict.
///
/// `code == 0` is the only success value. The gateway forwards the
/// service's response to the client verbatim; when the service cannot be
/// reached it synthesizes one with [`LoginResponse::CODE_UNAVAILABLE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Result code. `0` is success; anything else is a failure.
    pub code: i32,
    /// Human-readable result, shown to the player.
    pub message: String,
    /// Session token issued on success. Empty on failure.
    #[serde(default)]
    pub token: String,
    /// Identity the session is bound to on success. Empty on failure, or
    /// for a guest login.
    #[serde(default)]
    pub player_id: String,
}

impl LoginResponse {
    /// Credentials accepted.
    pub const CODE_OK: i32 = 0;

    /// Credentials rejected by the login service.
    pub const CODE_REJECTED: i32 = 1;

    /// The login service did not answer in time or could not be reached.
    pub const CODE_UNAVAILABLE: i32 = 503;

    /// Returns `true` if the login succeeded.
    pub fn is_success(&self) -> bool {
        self.code == Self::CODE_OK
    }

    /// Builds a failure response with no token or identity.
    pub fn failure(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            token: String::new(),
            player_id: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Notices
// ---------------------------------------------------------------------------

/// Gateway → client: a human-readable broadcast (player joined / left).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginNotice {
    /// Text to show the player, e.g. `player [bob] joined`.
    pub message: String,
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_display_is_raw_identity() {
        assert_eq!(PlayerId::new("admin").to_string(), "admin");
    }

    #[test]
    fn test_player_id_serializes_transparently() {
        let json = serde_json::to_string(&PlayerId::new("p1")).unwrap();
        assert_eq!(json, "\"p1\"");
    }

    #[test]
    fn test_login_response_success_only_for_code_zero() {
        let ok = LoginResponse {
            code: 0,
            message: "Login Success".into(),
            token: "t".into(),
            player_id: "admin".into(),
        };
        assert!(ok.is_success());
        assert!(!LoginResponse::failure(LoginResponse::CODE_REJECTED, "no")
            .is_success());
        assert!(!LoginResponse::failure(-1, "negative").is_success());
    }

    #[test]
    fn test_login_response_missing_optional_fields_default_empty() {
        let resp: LoginResponse =
            serde_json::from_str(r#"{"code":1,"message":"bad password"}"#)
                .unwrap();
        assert_eq!(resp.code, 1);
        assert!(resp.player_id.is_empty());
        assert!(resp.token.is_empty());
    }
}
