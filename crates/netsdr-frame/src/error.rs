use crate::header::MessageType;

/// Errors that can occur while building or reading NetSDR messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The encoded message would not fit the 13-bit length field.
    #[error("message length exceeds allowed value ({length} bytes, max {max})")]
    LengthExceeded { length: usize, max: usize },

    /// The buffer is too short to hold the fixed header fields.
    #[error("malformed frame ({actual} bytes, need at least {needed})")]
    Truncated { needed: usize, actual: usize },

    /// A control-category frame carries a code outside the known set.
    #[error("unknown control item code 0x{0:04x}")]
    UnknownCode(u16),

    /// The message type does not belong to the requested item category.
    #[error("message type {0} cannot carry this item")]
    WrongCategory(MessageType),

    /// The sample bit depth has no supported byte-group size.
    #[error("sample bit depth {0} out of range (supported 1..=32)")]
    BitDepthOutOfRange(u16),

    /// A header on a byte stream declares a length that cannot delimit a frame.
    #[error("invalid declared frame length {declared}")]
    InvalidLength { declared: usize },

    /// An I/O error occurred while splitting a byte stream.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
