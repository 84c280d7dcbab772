//! Message-bus client used to reach backend services.
//!
//! The gateway only needs request/reply: it sends a login request to a
//! subject and waits, with a deadline, for one answer. [`MessageBus`] is
//! that contract. [`LocalBus`] implements it in-process, with the
//! delivery rules of a queue-group subscription: each request goes to
//! exactly one subscriber of the subject, chosen round-robin.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};

/// Subject the login service listens on.
pub const LOGIN_SUBJECT: &str = "service.login";

/// Capacity of each subscriber's inbox on a [`LocalBus`].
const SUBSCRIBER_CAPACITY: usize = 64;

/// Errors returned by a [`MessageBus`].
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// Nobody is subscribed to the subject.
    #[error("no responders for subject {0}")]
    NoResponders(String),

    /// No reply arrived before the deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The responder dropped the request without replying.
    #[error("responder dropped request on subject {0}")]
    NoReply(String),
}

/// Request/reply access to backend services.
///
/// Implementations must be cheap to share: one instance serves every
/// connection's login handler concurrently.
pub trait MessageBus: Send + Sync + 'static {
    /// Sends `payload` to one subscriber of `subject` and waits up to
    /// `timeout` for its reply.
    ///
    /// # Errors
    /// - [`BusError::NoResponders`] if nobody listens on `subject`.
    /// - [`BusError::Timeout`] if the deadline passes first.
    /// - [`BusError::NoReply`] if the responder went away.
    fn request(
        &self,
        subject: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<u8>, BusError>> + Send;
}

// ---------------------------------------------------------------------------
// LocalBus
// ---------------------------------------------------------------------------

/// A message delivered to a [`LocalBus`] subscriber.
#[derive(Debug)]
pub struct BusMessage {
    /// The subject it was sent to.
    pub subject: String,
    /// The raw payload.
    pub payload: Vec<u8>,
    reply: oneshot::Sender<Vec<u8>>,
}

impl BusMessage {
    /// Answers a request.
    ///
    /// # Errors
    /// Returns [`BusError::NoReply`] if the requester already gave up.
    pub fn respond(self, payload: Vec<u8>) -> Result<(), BusError> {
        self.reply
            .send(payload)
            .map_err(|_| BusError::NoReply(self.subject))
    }
}

#[derive(Default)]
struct Subscribers {
    senders: Vec<mpsc::Sender<BusMessage>>,
    next: usize,
}

impl Subscribers {
    /// Picks the next live subscriber, forgetting any that have gone away.
    fn next_live(&mut self) -> Option<mpsc::Sender<BusMessage>> {
        self.senders.retain(|tx| !tx.is_closed());
        if self.senders.is_empty() {
            return None;
        }
        let idx = self.next % self.senders.len();
        self.next = self.next.wrapping_add(1);
        Some(self.senders[idx].clone())
    }
}

/// An in-process [`MessageBus`].
///
/// Cloning is cheap; every clone talks to the same set of subjects.
#[derive(Clone, Default)]
pub struct LocalBus {
    subjects: Arc<Mutex<HashMap<String, Subscribers>>>,
}

impl LocalBus {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the queue group for `subject`.
    ///
    /// Requests on the subject are spread round-robin across everyone
    /// subscribed. Dropping the
    /// receiver unsubscribes.
    pub async fn subscribe(&self, subject: &str) -> mpsc::Receiver<BusMessage> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        self.subjects
            .lock()
            .await
            .entry(subject.to_string())
            .or_default()
            .senders
            .push(tx);
        tracing::debug!(subject, "bus subscriber added");
        rx
    }
}

impl MessageBus for LocalBus {
    async fn request(
        &self,
        subject: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, BusError> {
        let target = self
            .subjects
            .lock()
            .await
            .get_mut(subject)
            .and_then(Subscribers::next_live)
            .ok_or_else(|| BusError::NoResponders(subject.to_string()))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        let message = BusMessage {
            subject: subject.to_string(),
            payload,
            reply: reply_tx,
        };

        let exchange = async {
            target
                .send(message)
                .await
                .map_err(|_| BusError::NoResponders(subject.to_string()))?;
            reply_rx
                .await
                .map_err(|_| BusError::NoReply(subject.to_string()))
        };

        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| BusError::Timeout(timeout))?
    }
}
