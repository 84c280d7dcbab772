//! Message routing: dispatch inbound frames to handlers by message id.
//!
//! The [`Router`] is built once at startup, wrapped in an `Arc`, and shared
//! by every session's read loop. After setup it is only read, so it needs
//! no locking.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::Session;

/// Something that can handle one message type.
///
/// Implemented for any `Fn(Arc<Session>, Vec<u8>) -> impl Future` closure,
/// so handlers are usually registered as closures or method wrappers.
pub trait Handler: Send + Sync + 'static {
    /// Handles one payload received on `session`.
    fn call(&self, session: Arc<Session>, payload: Vec<u8>) -> BoxFuture<'static, ()>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Arc<Session>, Vec<u8>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn call(&self, session: Arc<Session>, payload: Vec<u8>) -> BoxFuture<'static, ()> {
        Box::pin(self(session, payload))
    }
}

/// Maps message ids to handlers.
#[derive(Default)]
pub struct Router {
    handlers: HashMap<u32, Box<dyn Handler>>,
}

impl Router {
    /// Creates an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `msg_id`.
    ///
    /// Registering the same id twice replaces the earlier handler (last
    /// writer wins).
    pub fn register<H: Handler>(&mut self, msg_id: u32, handler: H) -> &mut Self {
        if self.handlers.insert(msg_id, Box::new(handler)).is_some() {
            tracing::debug!(msg_id, "replaced existing handler");
        }
        self
    }

    /// Returns `true` if a handler is registered for `msg_id`.
    pub fn contains(&self, msg_id: u32) -> bool {
        self.handlers.contains_key(&msg_id)
    }

    /// Runs the handler for `msg_id` to completion on the calling task.
    ///
    /// Unknown ids are logged and dropped. Returns whether a handler ran.
    pub async fn route(&self, msg_id: u32, session: Arc<Session>, payload: Vec<u8>) -> bool {
        match self.handlers.get(&msg_id) {
            Some(handler) => {
                handler.call(session, payload).await;
                true
            }
            None => {
                tracing::warn!(
                    msg_id,
                    conn_id = %session.id(),
                    "no handler registered, dropping message"
                );
                false
            }
        }
    }
}
