//! NetSDR message codec.
//!
//! Every message starts with a 16-bit little-endian header word:
//! - the top 3 bits carry the [`MessageType`]
//! - the low 13 bits carry the total message length, header included
//!
//! Control items follow the header with a 16-bit [`ControlItemCode`] and opaque
//! parameters. Data items follow it with a 16-bit sequence number and a body of
//! samples. All functions here are pure; no state is shared between calls.

pub mod code;
pub mod codec;
pub mod error;
pub mod header;
pub mod samples;
#[cfg(feature = "async")]
pub mod splitter;

pub use code::ControlItemCode;
pub use codec::{decode, encode_control_item, encode_data_item, try_decode, Message};
pub use error::{FrameError, Result};
pub use header::{
    encode_header, translate_header, Header, MessageType, FIXED_FIELDS_SIZE, HEADER_SIZE,
    MAX_DATA_ITEM_LENGTH, MAX_MESSAGE_LENGTH,
};
pub use samples::{extract_samples, sample_width, Samples, MAX_BIT_DEPTH};
#[cfg(feature = "async")]
pub use splitter::FrameSplitter;
