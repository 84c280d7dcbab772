/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listening socket failed.
    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        /// The address we tried to bind.
        addr: String,
        /// The underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// Accepting an incoming connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Reading socket metadata (local/peer address) failed.
    #[error("socket address unavailable: {0}")]
    Address(#[source] std::io::Error),
}
