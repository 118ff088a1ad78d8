//! Stream framing for byte-stream transports.
//!
//! On a stream the header length is the frame delimiter. Single-buffer
//! [`decode`](crate::codec::decode) never relies on it.

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{FrameError, Result};
use crate::header::{translate_header, HEADER_SIZE};

/// Splits a byte stream into complete frames using the header length field.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameSplitter;

impl FrameSplitter {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for FrameSplitter {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        if src.len() < HEADER_SIZE {
            return Ok(None); // Need more data
        }

        let header = translate_header(&src[..])?;
        if header.length() < HEADER_SIZE {
            return Err(FrameError::InvalidLength {
                declared: header.length(),
            });
        }

        if src.len() < header.length() {
            src.reserve(header.length() - src.len());
            return Ok(None);
        }

        Ok(Some(src.split_to(header.length()).freeze()))
    }
}

impl Encoder<Bytes> for FrameSplitter {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(item.len());
        dst.put_slice(&item);
        Ok(())
    }
}
