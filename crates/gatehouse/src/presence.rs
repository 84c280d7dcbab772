//! Presence store: which gateway currently holds a player's connection.
//!
//! The store is a best-effort side record for other services. This
//! gateway's own registries remain the source of truth for its
//! connections: a failed presence write is logged, and the player stays
//! logged in gateway-side regardless.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use gatehouse_protocol::PlayerId;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Errors returned by a [`PresenceStore`].
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    /// The backing store failed or could not be reached.
    #[error("presence store error: {0}")]
    Backend(String),
}

/// Key under which a player's presence record is stored.
pub fn presence_key(player_id: &PlayerId) -> String {
    format!("player:online:{player_id}")
}

/// Key/value store with expiry recording player → gateway ownership.
pub trait PresenceStore: Send + Sync + 'static {
    /// Records that `player_id` is connected to `gateway_id`, expiring
    /// after `ttl`.
    fn set_online(
        &self,
        player_id: &PlayerId,
        gateway_id: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), PresenceError>> + Send;

    /// Deletes the player's record. Deleting a missing record is not an
    /// error.
    fn clear_online(
        &self,
        player_id: &PlayerId,
    ) -> impl Future<Output = Result<(), PresenceError>> + Send;

    /// Returns the gateway currently recorded for the player, if any.
    fn get_gateway(
        &self,
        player_id: &PlayerId,
    ) -> impl Future<Output = Result<Option<String>, PresenceError>> + Send;
}

/// An in-memory [`PresenceStore`].
///
/// Expired records are dropped lazily, the next time they are read.
/// Clones share the same records.
#[derive(Clone, Default)]
pub struct MemoryPresenceStore {
    records: Arc<Mutex<HashMap<String, (String, Instant)>>>,
}

impl MemoryPresenceStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PresenceStore for MemoryPresenceStore {
    async fn set_online(
        &self,
        player_id: &PlayerId,
        gateway_id: &str,
        ttl: Duration,
    ) -> Result<(), PresenceError> {
        let expires_at = Instant::now() + ttl;
        self.records
            .lock()
            .await
            .insert(presence_key(player_id), (gateway_id.to_string(), expires_at));
        Ok(())
    }

    async fn clear_online(&self, player_id: &PlayerId) -> Result<(), PresenceError> {
        self.records.lock().await.remove(&presence_key(player_id));
        Ok(())
    }

    async fn get_gateway(&self, player_id: &PlayerId) -> Result<Option<String>, PresenceError> {
        let key = presence_key(player_id);
        let mut records = self.records.lock().await;
        let live = records
            .get(&key)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(gateway_id, _)| gateway_id.clone());
        if live.is_none() {
            records.remove(&key);
        }
        Ok(live)
    }
}
