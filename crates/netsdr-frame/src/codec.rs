use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::code::ControlItemCode;
use crate::error::{FrameError, Result};
use crate::header::{translate_header, Header, MessageType, FIXED_FIELDS_SIZE, HEADER_SIZE};

/// A decoded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Category from the header.
    pub message_type: MessageType,
    /// Control item code; [`ControlItemCode::None`] for data items.
    pub code: ControlItemCode,
    /// Sequence number; only set for data items.
    pub sequence: Option<u16>,
    /// Everything after the code or sequence field.
    pub body: Bytes,
    /// Length field from the header. Informational only.
    pub declared_length: usize,
}

impl Message {
    /// Total wire size of this message as decoded.
    pub fn wire_size(&self) -> usize {
        FIXED_FIELDS_SIZE + self.body.len()
    }

    /// Returns true when the header length field matches the physical size.
    pub fn length_matches(&self) -> bool {
        self.declared_length == self.wire_size()
    }
}

/// Encode a control item.
///
/// Wire format:
/// ```text
/// ┌──────────────┬───────────┬─────────────────┐
/// │ Header (2B)  │ Code      │ Parameters      │
/// │ type|length  │ (2B LE)   │ (N bytes)       │
/// └──────────────┴───────────┴─────────────────┘
/// ```
pub fn encode_control_item(
    message_type: MessageType,
    code: ControlItemCode,
    parameters: &[u8],
) -> Result<Bytes> {
    if !message_type.is_control_item() {
        return Err(FrameError::WrongCategory(message_type));
    }
    encode_item(message_type, code.value(), parameters)
}

/// Encode a data item.
///
/// Wire format:
/// ```text
/// ┌──────────────┬───────────┬─────────────────┐
/// │ Header (2B)  │ Sequence  │ Body            │
/// │ type|length  │ (2B LE)   │ (N bytes)       │
/// └──────────────┴───────────┴─────────────────┘
/// ```
pub fn encode_data_item(message_type: MessageType, sequence: u16, body: &[u8]) -> Result<Bytes> {
    if !message_type.is_data_item() {
        return Err(FrameError::WrongCategory(message_type));
    }
    encode_item(message_type, sequence, body)
}

fn encode_item(message_type: MessageType, field: u16, payload: &[u8]) -> Result<Bytes> {
    let length = FIXED_FIELDS_SIZE.saturating_add(payload.len());
    let header = Header::new(message_type, length)?;

    let mut dst = BytesMut::with_capacity(length);
    dst.put_slice(&header.to_bytes());
    dst.put_u16_le(field);
    dst.put_slice(payload);
    Ok(dst.freeze())
}

/// Decode one complete frame.
///
/// The body is everything after the code or sequence field; the header length
/// is reported but never used to slice the buffer.
pub fn decode(frame: &[u8]) -> Result<Message> {
    if frame.len() < FIXED_FIELDS_SIZE {
        return Err(FrameError::Truncated {
            needed: FIXED_FIELDS_SIZE,
            actual: frame.len(),
        });
    }

    let header = translate_header(frame)?;
    let field = u16::from_le_bytes([frame[HEADER_SIZE], frame[HEADER_SIZE + 1]]);
    let body = Bytes::copy_from_slice(&frame[FIXED_FIELDS_SIZE..]);

    let (code, sequence) = if header.message_type().is_data_item() {
        (ControlItemCode::None, Some(field))
    } else {
        (ControlItemCode::try_from(field)?, None)
    };

    Ok(Message {
        message_type: header.message_type(),
        code,
        sequence,
        body,
        declared_length: header.length(),
    })
}

/// Decode one frame, discarding the failure reason.
pub fn try_decode(frame: &[u8]) -> Option<Message> {
    match decode(frame) {
        Ok(message) => Some(message),
        Err(err) => {
            debug!(error = %err, size = frame.len(), "frame rejected");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{encode_header, MAX_DATA_ITEM_LENGTH, MAX_MESSAGE_LENGTH};

    #[test]
    fn control_item_roundtrip() {
        let params = [1u8, 2, 3];
        let frame = encode_control_item(
            MessageType::CurrentControlItem,
            ControlItemCode::RfFilter,
            &params,
        )
        .unwrap();

        let message = decode(&frame).unwrap();
        assert_eq!(message.message_type, MessageType::CurrentControlItem);
        assert_eq!(message.code, ControlItemCode::RfFilter);
        assert_eq!(message.sequence, None);
        assert_eq!(message.body.as_ref(), &params);
        assert!(message.length_matches());
    }

    #[test]
    fn data_item_roundtrip() {
        let body = [10u8, 20, 30, 40];
        let frame = encode_data_item(MessageType::DataItem3, 42, &body).unwrap();

        let message = decode(&frame).unwrap();
        assert_eq!(message.message_type, MessageType::DataItem3);
        assert_eq!(message.code, ControlItemCode::None);
        assert_eq!(message.sequence, Some(42));
        assert_eq!(message.body.as_ref(), &body);
    }

    #[test]
    fn ack_with_large_parameters() {
        let frame =
            encode_control_item(MessageType::Ack, ControlItemCode::ReceiverState, &[0u8; 7500])
                .unwrap();
        assert_eq!(frame.len(), 7504);

        let header = translate_header(&frame).unwrap();
        assert_eq!(header.message_type(), MessageType::Ack);
        assert_eq!(header.length(), frame.len());

        let code = i16::from_le_bytes([frame[2], frame[3]]);
        assert_eq!(code as u16, ControlItemCode::ReceiverState.value());
        assert_eq!(frame[4..].len(), 7500);
    }

    #[test]
    fn frequency_sized_control_item() {
        let frame = encode_control_item(
            MessageType::Ack,
            ControlItemCode::ReceiverFrequency,
            &[0u8; 5],
        )
        .unwrap();
        assert_eq!(frame.len(), 9);
    }

    #[test]
    fn data_item_length_includes_sequence() {
        let frame = encode_data_item(MessageType::DataItem0, 0, &[0u8; 10]).unwrap();
        assert_eq!(frame.len(), 14);
        assert_eq!(translate_header(&frame).unwrap().length(), 14);
    }

    #[test]
    fn declared_length_equals_frame_length() {
        for len in [0usize, 1, 17, 1024, MAX_MESSAGE_LENGTH - 4] {
            let payload = vec![0x5A; len];
            let frame =
                encode_control_item(MessageType::SetControlItem, ControlItemCode::AdModes, &payload)
                    .unwrap();
            let header = translate_header(&frame).unwrap();
            assert_eq!(header.length(), frame.len());
            assert_eq!(frame.len(), 4 + len);
        }
    }

    #[test]
    fn oversized_control_item_rejected() {
        let err = encode_control_item(
            MessageType::Ack,
            ControlItemCode::ReceiverFrequency,
            &[0u8; 9000],
        )
        .unwrap_err();
        assert!(matches!(err, FrameError::LengthExceeded { length: 9004, .. }));
        assert!(err.to_string().contains("message length exceeds allowed value"));
    }

    #[test]
    fn one_byte_over_limit_rejected() {
        let err = encode_data_item(MessageType::DataItem1, 7, &[0u8; MAX_MESSAGE_LENGTH - 3])
            .unwrap_err();
        assert!(matches!(err, FrameError::LengthExceeded { .. }));
    }

    #[test]
    fn full_data_block_accepted() {
        let body = vec![0xEE; MAX_DATA_ITEM_LENGTH - 4];
        let frame = encode_data_item(MessageType::DataItem0, 9, &body).unwrap();
        assert_eq!(frame.len(), MAX_DATA_ITEM_LENGTH);
        assert_eq!(&frame[..2], &(MessageType::DataItem0.bits() << 13).to_le_bytes());

        let message = decode(&frame).unwrap();
        assert_eq!(message.declared_length, MAX_DATA_ITEM_LENGTH);
        assert_eq!(message.body.len(), body.len());
    }

    #[test]
    fn categories_are_enforced_on_encode() {
        let err = encode_control_item(MessageType::DataItem2, ControlItemCode::RfFilter, &[])
            .unwrap_err();
        assert!(matches!(err, FrameError::WrongCategory(MessageType::DataItem2)));

        let err = encode_data_item(MessageType::Ack, 1, &[]).unwrap_err();
        assert!(matches!(err, FrameError::WrongCategory(MessageType::Ack)));
    }

    #[test]
    fn unknown_code_fails_decode() {
        let mut frame = Vec::new();
        frame.extend_from_slice(&encode_header(MessageType::CurrentControlItem, 6).unwrap());
        frame.extend_from_slice(&9999u16.to_le_bytes());
        frame.extend_from_slice(&[1, 2]);

        assert!(matches!(decode(&frame), Err(FrameError::UnknownCode(9999))));
        assert!(try_decode(&frame).is_none());
    }

    #[test]
    fn short_buffers_are_malformed() {
        for len in 0..FIXED_FIELDS_SIZE {
            let frame = vec![0u8; len];
            assert!(matches!(decode(&frame), Err(FrameError::Truncated { .. })));
        }
    }

    #[test]
    fn body_ignores_declared_length() {
        let mut frame = encode_data_item(MessageType::DataItem0, 3, &[1, 2]).unwrap().to_vec();
        frame.extend_from_slice(&[3, 4, 5]);

        let message = decode(&frame).unwrap();
        assert_eq!(message.declared_length, 6);
        assert_eq!(message.body.as_ref(), &[1, 2, 3, 4, 5]);
        assert!(!message.length_matches());
    }

    #[test]
    fn raw_fixture_from_receiver() {
        // Ack of an I/Q sample rate request carrying 100 kHz.
        let frame = [0x09, 0x00, 0xb8, 0x00, 0xa0, 0x86, 0x01, 0x00, 0x00];
        let message = decode(&frame).unwrap();

        assert_eq!(message.message_type, MessageType::SetControlItem);
        assert_eq!(message.code, ControlItemCode::IqOutputDataSampleRate);
        assert_eq!(message.body.as_ref(), &[0xa0, 0x86, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn empty_payloads() {
        let frame = encode_control_item(
            MessageType::CurrentControlItem,
            ControlItemCode::ReceiverState,
            &[],
        )
        .unwrap();
        assert_eq!(frame.len(), FIXED_FIELDS_SIZE);
        assert!(decode(&frame).unwrap().body.is_empty());
    }

    mod properties {
        use proptest::prelude::*;

        use crate::code::ControlItemCode;
        use crate::codec::{decode, encode_control_item, encode_data_item};
        use crate::error::FrameError;
        use crate::header::{
            MessageType, FIXED_FIELDS_SIZE, MAX_DATA_ITEM_LENGTH, MAX_MESSAGE_LENGTH,
        };

        fn control_type() -> impl Strategy<Value = MessageType> {
            (0u16..4).prop_map(MessageType::from_bits)
        }

        fn data_type() -> impl Strategy<Value = MessageType> {
            (4u16..8).prop_map(MessageType::from_bits)
        }

        fn control_code() -> impl Strategy<Value = ControlItemCode> {
            prop::sample::select(ControlItemCode::ALL.to_vec())
        }

        /// Bodies that fit a data item: up to the 13-bit limit, or exactly a full block.
        fn data_body() -> impl Strategy<Value = Vec<u8>> {
            prop_oneof![
                prop::collection::vec(any::<u8>(), 0..=MAX_MESSAGE_LENGTH - FIXED_FIELDS_SIZE),
                prop::collection::vec(any::<u8>(), MAX_DATA_ITEM_LENGTH - FIXED_FIELDS_SIZE),
            ]
        }

        proptest! {
            #[test]
            fn control_items_decode_to_what_was_encoded(
                message_type in control_type(),
                code in control_code(),
                parameters in prop::collection::vec(any::<u8>(), 0..=MAX_MESSAGE_LENGTH - FIXED_FIELDS_SIZE),
            ) {
                let frame = encode_control_item(message_type, code, &parameters).unwrap();
                let message = decode(&frame).unwrap();

                prop_assert_eq!(message.message_type, message_type);
                prop_assert_eq!(message.code, code);
                prop_assert_eq!(message.sequence, None);
                prop_assert_eq!(message.body.as_ref(), parameters.as_slice());
                prop_assert_eq!(message.declared_length, frame.len());
                prop_assert_eq!(frame.len(), FIXED_FIELDS_SIZE + parameters.len());
            }

            #[test]
            fn data_items_decode_to_what_was_encoded(
                message_type in data_type(),
                sequence in any::<u16>(),
                body in data_body(),
            ) {
                let frame = encode_data_item(message_type, sequence, &body).unwrap();
                let message = decode(&frame).unwrap();

                prop_assert_eq!(message.message_type, message_type);
                prop_assert_eq!(message.code, ControlItemCode::None);
                prop_assert_eq!(message.sequence, Some(sequence));
                prop_assert_eq!(message.body.as_ref(), body.as_slice());
                prop_assert_eq!(message.declared_length, frame.len());
                prop_assert_eq!(frame.len(), FIXED_FIELDS_SIZE + body.len());
                prop_assert!(message.length_matches());
            }

            #[test]
            fn oversized_control_items_are_rejected(
                message_type in control_type(),
                code in control_code(),
                extra in 1usize..64,
            ) {
                let parameters = vec![0u8; MAX_MESSAGE_LENGTH - FIXED_FIELDS_SIZE + extra];
                let err = encode_control_item(message_type, code, &parameters).unwrap_err();
                prop_assert!(
                    matches!(err, FrameError::LengthExceeded { .. }),
                    "unexpected error: {}",
                    err
                );
            }
        }
    }
}
