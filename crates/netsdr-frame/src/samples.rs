//! Sample extraction from data-item bodies.

use std::iter::FusedIterator;
use std::slice::Chunks;

use crate::error::{FrameError, Result};

/// Widest supported sample, in bits.
pub const MAX_BIT_DEPTH: u16 = 32;

/// Byte-group size for a bit depth: `ceil(bit_depth / 8)`.
pub fn sample_width(bit_depth: u16) -> Result<usize> {
    if bit_depth == 0 || bit_depth > MAX_BIT_DEPTH {
        return Err(FrameError::BitDepthOutOfRange(bit_depth));
    }
    Ok(usize::from(bit_depth).div_ceil(8))
}

/// Split `body` into little-endian samples of `bit_depth` bits.
///
/// The depth is validated before any sample is produced. A trailing group
/// shorter than the sample width still yields one sample from the bytes present.
pub fn extract_samples(bit_depth: u16, body: &[u8]) -> Result<Samples<'_>> {
    let width = sample_width(bit_depth)?;
    Ok(Samples {
        chunks: body.chunks(width),
        width,
    })
}

/// Lazy iterator over decoded samples. Clone it to restart from the current position.
///
/// Groups narrower than four bytes are zero-extended; four-byte groups are
/// two's-complement.
#[derive(Debug, Clone)]
pub struct Samples<'a> {
    chunks: Chunks<'a, u8>,
    width: usize,
}

impl Samples<'_> {
    /// Bytes consumed per sample.
    pub fn width(&self) -> usize {
        self.width
    }
}

impl Iterator for Samples<'_> {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        let chunk = self.chunks.next()?;
        let mut raw = [0u8; 4];
        raw[..chunk.len()].copy_from_slice(chunk);
        Some(i32::from_le_bytes(raw))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for Samples<'_> {}

impl FusedIterator for Samples<'_> {}
