/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A command was issued without an open control connection.
    #[error("no active connection")]
    NotConnected,

    /// Frame construction or decoding failed.
    #[error("frame error: {0}")]
    Frame(#[from] netsdr_frame::FrameError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] netsdr_transport::TransportError),

    /// Sample sink error.
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// No response arrived within the configured limit.
    #[error("response timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The control connection ended while a response was outstanding.
    #[error("control connection closed before a response arrived")]
    Disconnected,

    /// The session configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be read.
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid JSON for the session config.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by sample sinks.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Writing samples failed.
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The downstream consumer is gone.
    #[error("sample consumer closed")]
    Closed,

    /// The downstream consumer is not keeping up.
    #[error("sample consumer full; batch {sequence} dropped")]
    Full { sequence: u16 },

    /// The configured sample width cannot be written.
    #[error("unsupported sample width {0} bytes (supported 1..=4)")]
    InvalidWidth(usize),
}

pub type Result<T> = std::result::Result<T, SessionError>;
