//! Parameter payloads for the control items the client issues.

use crate::error::{Result, SessionError};

/// Default number of frequency bytes after the channel byte.
pub const FREQUENCY_WIDTH: usize = 5;

/// A frequency is at most an `i64`.
pub const MAX_FREQUENCY_WIDTH: usize = 8;

/// Bytes of the I/Q sample rate parameter.
pub const SAMPLE_RATE_WIDTH: usize = 5;

/// RF filter selection: automatic.
pub const RF_FILTER_AUTO: [u8; 2] = [0x00, 0x00];

/// A/D modes: dither on, gain 1.5.
pub const AD_MODES_DEFAULT: [u8; 2] = [0x00, 0x03];

/// Receiver state: complex I/Q data, run, 16-bit contiguous capture, one block.
pub const RECEIVER_RUN_IQ: [u8; 4] = [0x80, 0x02, 0x01, 0x01];

/// Receiver state: stop.
pub const RECEIVER_STOP: [u8; 4] = [0x00, 0x01, 0x00, 0x00];

/// Channel byte followed by the low `width` bytes of `frequency`, little-endian.
///
/// Negative and out-of-range frequencies are encoded as given; the receiver
/// validates them.
pub fn frequency_parameters(frequency: i64, channel: u8, width: usize) -> Result<Vec<u8>> {
    if width == 0 || width > MAX_FREQUENCY_WIDTH {
        return Err(SessionError::Config(format!(
            "frequency width must be 1..={MAX_FREQUENCY_WIDTH}, got {width}"
        )));
    }
    let mut params = Vec::with_capacity(1 + width);
    params.push(channel);
    params.extend_from_slice(&frequency.to_le_bytes()[..width]);
    Ok(params)
}

/// Low five bytes of the sample rate, little-endian.
pub fn sample_rate_parameters(rate: u64) -> [u8; SAMPLE_RATE_WIDTH] {
    let bytes = rate.to_le_bytes();
    let mut out = [0u8; SAMPLE_RATE_WIDTH];
    out.copy_from_slice(&bytes[..SAMPLE_RATE_WIDTH]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_layout() {
        let params = frequency_parameters(100_000_000, 1, FREQUENCY_WIDTH).unwrap();
        assert_eq!(params, vec![0x01, 0x00, 0xE1, 0xF5, 0x05, 0x00]);
    }

    #[test]
    fn negative_frequency_is_encoded() {
        let params = frequency_parameters(-1_000_000, 1, FREQUENCY_WIDTH).unwrap();
        assert_eq!(params.len(), 6);
        assert_eq!(&params[1..], &(-1_000_000i64).to_le_bytes()[..5]);
    }

    #[test]
    fn max_frequency_truncates_to_width() {
        let params = frequency_parameters(i64::MAX, 255, FREQUENCY_WIDTH).unwrap();
        assert_eq!(params, vec![0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn width_is_configurable() {
        let params = frequency_parameters(0x0102_0304, 0, 4).unwrap();
        assert_eq!(params, vec![0x00, 0x04, 0x03, 0x02, 0x01]);

        assert!(frequency_parameters(1, 0, 0).is_err());
        assert!(frequency_parameters(1, 0, 9).is_err());
    }

    #[test]
    fn sample_rate_bytes() {
        assert_eq!(sample_rate_parameters(100_000), [0xA0, 0x86, 0x01, 0x00, 0x00]);
    }
}
