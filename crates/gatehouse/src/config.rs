//! Gateway configuration.

use std::time::Duration;

/// Business-policy settings for login handling and presence.
///
/// Transport-level settings (queue sizes, frame limits) live in
/// [`SessionConfig`](gatehouse_session::SessionConfig).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// This gateway's identity, recorded in the presence store.
    /// Default: `"gateway_01"`.
    pub gateway_id: String,

    /// How long a login RPC may take before it counts as a failure.
    /// Default: 2 seconds.
    pub login_timeout: Duration,

    /// Failed logins allowed per connection before it is dropped.
    /// Default: 3.
    pub max_login_attempts: u32,

    /// How long after accept a connection has to reach the in-game state.
    /// Default: 30 seconds. The clock does not pause while a login is in
    /// flight.
    pub login_grace: Duration,

    /// Expiry on presence records. A safety net for records a crashed
    /// gateway never cleared; normal cleanup happens on disconnect.
    /// Default: 24 hours.
    pub presence_ttl: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            gateway_id: "gateway_01".to_string(),
            login_timeout: Duration::from_secs(2),
            max_login_attempts: 3,
            login_grace: Duration::from_secs(30),
            presence_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}
