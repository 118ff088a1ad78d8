/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to the specified address.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to bind the specified local address.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on an established transport.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport has no open connection.
    #[error("transport not connected")]
    NotConnected,

    /// A datagram transport was asked to send without a remote address.
    #[error("no remote address configured")]
    NoRemote,
}

pub type Result<T> = std::result::Result<T, TransportError>;
