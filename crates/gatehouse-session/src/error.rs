//! Error types for the session layer.

/// Errors returned when pushing frames onto a session's outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The session has been closed; nothing more will be written.
    #[error("session closed")]
    Closed,

    /// The outbound queue is at capacity (non-blocking sends only).
    #[error("outbound queue full")]
    QueueFull,
}
