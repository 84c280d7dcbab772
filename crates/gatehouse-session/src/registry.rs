//! Concurrent session registries.
//!
//! The gateway keeps two of them: sessions still waiting to log in, keyed
//! by peer address, and authenticated sessions, keyed by player id. Both
//! are [`Registry`] instances over different key types, so the compiler
//! keeps the two key spaces apart.
//!
//! Every operation is individually atomic. Nothing holds a lock across
//! operations, so compound sequences (check-then-insert) can interleave
//! with other tasks; callers are written to tolerate that.

use std::hash::Hash;
use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use gatehouse_protocol::PlayerId;

use crate::Session;

/// A typed concurrent map from `K` to live sessions.
pub struct Registry<K: Eq + Hash> {
    inner: DashMap<K, Arc<Session>>,
}

impl<K: Eq + Hash + Clone> Registry<K> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Stores `session` under `key`, returning whatever it replaced.
    pub fn insert(&self, key: K, session: Arc<Session>) -> Option<Arc<Session>> {
        self.inner.insert(key, session)
    }

    /// Removes the entry for `key`, but only if it still refers to
    /// `session`.
    ///
    /// A session that has been superseded under the same key (a newer
    /// login for the same player, say) never removes its successor.
    /// Returns `true` if an entry was removed.
    pub fn remove(&self, key: &K, session: &Arc<Session>) -> bool {
        self.inner
            .remove_if(key, |_, current| Arc::ptr_eq(current, session))
            .is_some()
    }

    /// Looks up the session stored under `key`.
    pub fn get(&self, key: &K) -> Option<Arc<Session>> {
        self.inner.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns `true` if anything is stored under `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    /// Returns a point-in-time copy of every session in the registry.
    ///
    /// Entries added or removed while the copy is taken may or may not
    /// appear. No shard lock is held once this returns, so callers are
    /// free to await while walking the result.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.inner
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<K: Eq + Hash + Clone> Default for Registry<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// The two registries a gateway maintains.
///
/// A session is in at most one of them at a time: `waiting` from accept
/// until login succeeds, `online` from then until it closes.
#[derive(Default)]
pub struct Registries {
    /// Unauthenticated sessions, keyed by peer address.
    pub waiting: Registry<SocketAddr>,
    /// Authenticated sessions, keyed by player id.
    pub online: Registry<PlayerId>,
}

impl Registries {
    /// Creates empty registries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if either registry still refers to `session`.
    pub fn holds(&self, session: &Arc<Session>) -> bool {
        let waiting = self
            .waiting
            .get(&session.addr())
            .is_some_and(|s| Arc::ptr_eq(&s, session));
        let online = session
            .player_id()
            .and_then(|id| self.online.get(id))
            .is_some_and(|s| Arc::ptr_eq(&s, session));
        waiting || online
    }
}
