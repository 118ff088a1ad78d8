//! The 16-bit message header.
//!
//! ```text
//!  15  14  13  12                                   0
//! ┌───────────┬──────────────────────────────────────┐
//! │ type (3b) │ total length incl. header (13b)      │
//! └───────────┴──────────────────────────────────────┘
//! ```
//!
//! The word is sent little-endian. Data items may use the full 8194-byte block,
//! which does not fit 13 bits and is sent as length `0`.

use std::fmt;

use crate::error::{FrameError, Result};

/// Size of the header word in bytes.
pub const HEADER_SIZE: usize = 2;

/// Header plus the 16-bit code or sequence field.
pub const FIXED_FIELDS_SIZE: usize = 4;

/// Largest length representable in the 13-bit length field.
pub const MAX_MESSAGE_LENGTH: usize = 8191;

/// Largest data-item frame; encoded with a zero length field.
pub const MAX_DATA_ITEM_LENGTH: usize = 8194;

const TYPE_SHIFT: u16 = 13;
const LENGTH_MASK: u16 = 0x1FFF;

/// Message category carried in the top three header bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Host request to set a control item.
    SetControlItem,
    /// Request for (or report of) the current value of a control item.
    CurrentControlItem,
    /// Request for (or report of) the valid range of a control item.
    ControlItemRange,
    /// Acknowledge.
    Ack,
    DataItem0,
    DataItem1,
    DataItem2,
    DataItem3,
}

impl MessageType {
    /// Every message type, ordered by wire value.
    pub const ALL: [MessageType; 8] = [
        MessageType::SetControlItem,
        MessageType::CurrentControlItem,
        MessageType::ControlItemRange,
        MessageType::Ack,
        MessageType::DataItem0,
        MessageType::DataItem1,
        MessageType::DataItem2,
        MessageType::DataItem3,
    ];

    /// The 3-bit wire value.
    pub const fn bits(self) -> u16 {
        match self {
            MessageType::SetControlItem => 0,
            MessageType::CurrentControlItem => 1,
            MessageType::ControlItemRange => 2,
            MessageType::Ack => 3,
            MessageType::DataItem0 => 4,
            MessageType::DataItem1 => 5,
            MessageType::DataItem2 => 6,
            MessageType::DataItem3 => 7,
        }
    }

    /// Map a 3-bit wire value to a message type. Bits above the low three are ignored.
    pub const fn from_bits(bits: u16) -> Self {
        match bits & 0b111 {
            0 => MessageType::SetControlItem,
            1 => MessageType::CurrentControlItem,
            2 => MessageType::ControlItemRange,
            3 => MessageType::Ack,
            4 => MessageType::DataItem0,
            5 => MessageType::DataItem1,
            6 => MessageType::DataItem2,
            _ => MessageType::DataItem3,
        }
    }

    /// Returns true for the four streamed data-item types.
    pub const fn is_data_item(self) -> bool {
        matches!(
            self,
            MessageType::DataItem0
                | MessageType::DataItem1
                | MessageType::DataItem2
                | MessageType::DataItem3
        )
    }

    /// Returns true for the control-item request/response types.
    pub const fn is_control_item(self) -> bool {
        !self.is_data_item()
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            MessageType::SetControlItem => "SET_CONTROL_ITEM",
            MessageType::CurrentControlItem => "CURRENT_CONTROL_ITEM",
            MessageType::ControlItemRange => "CONTROL_ITEM_RANGE",
            MessageType::Ack => "ACK",
            MessageType::DataItem0 => "DATA_ITEM_0",
            MessageType::DataItem1 => "DATA_ITEM_1",
            MessageType::DataItem2 => "DATA_ITEM_2",
            MessageType::DataItem3 => "DATA_ITEM_3",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded header: message type and total frame length in bytes (header included).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    message_type: MessageType,
    length: usize,
}

impl Header {
    /// Build a header, rejecting lengths the 13-bit field cannot carry.
    pub fn new(message_type: MessageType, length: usize) -> Result<Self> {
        let fits = length <= MAX_MESSAGE_LENGTH
            || (message_type.is_data_item() && length == MAX_DATA_ITEM_LENGTH);
        if !fits {
            return Err(FrameError::LengthExceeded {
                length,
                max: MAX_MESSAGE_LENGTH,
            });
        }
        Ok(Self {
            message_type,
            length,
        })
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Total frame length, header included.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Pack into the 16-bit header word.
    pub fn to_word(&self) -> u16 {
        let length = if self.length == MAX_DATA_ITEM_LENGTH {
            0
        } else {
            self.length as u16 & LENGTH_MASK
        };
        (self.message_type.bits() << TYPE_SHIFT) | length
    }

    /// Unpack a 16-bit header word. Every word is a valid header.
    pub fn from_word(word: u16) -> Self {
        let message_type = MessageType::from_bits(word >> TYPE_SHIFT);
        let mut length = (word & LENGTH_MASK) as usize;
        if length == 0 && message_type.is_data_item() {
            length = MAX_DATA_ITEM_LENGTH;
        }
        Self {
            message_type,
            length,
        }
    }

    /// Wire bytes (little-endian word).
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        self.to_word().to_le_bytes()
    }
}

/// Encode the header for a frame of `length` total bytes.
pub fn encode_header(message_type: MessageType, length: usize) -> Result<[u8; HEADER_SIZE]> {
    Header::new(message_type, length).map(|header| header.to_bytes())
}

/// Read the header from the start of `src`.
pub fn translate_header(src: &[u8]) -> Result<Header> {
    if src.len() < HEADER_SIZE {
        return Err(FrameError::Truncated {
            needed: HEADER_SIZE,
            actual: src.len(),
        });
    }
    let word = u16::from_le_bytes([src[0], src[1]]);
    Ok(Header::from_word(word))
}
