//! Control item codes.
//!
//! The code set is closed: a control-category frame carrying any other 16-bit
//! value does not decode.

use std::fmt;

use crate::error::FrameError;

/// Receiver parameter addressed by a control item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlItemCode {
    /// Sentinel reported for frames that carry no code (data items).
    None,
    /// Receiver run/stop state and capture mode.
    ReceiverState,
    /// NCO center frequency for a channel.
    ReceiverFrequency,
    /// RF filter selection.
    RfFilter,
    /// A/D converter modes (dither, gain).
    AdModes,
    /// I/Q output sample rate.
    IqOutputDataSampleRate,
}

impl ControlItemCode {
    pub const ALL: [ControlItemCode; 6] = [
        ControlItemCode::None,
        ControlItemCode::ReceiverState,
        ControlItemCode::ReceiverFrequency,
        ControlItemCode::RfFilter,
        ControlItemCode::AdModes,
        ControlItemCode::IqOutputDataSampleRate,
    ];

    /// The 16-bit wire value.
    pub const fn value(self) -> u16 {
        match self {
            ControlItemCode::None => 0x0000,
            ControlItemCode::ReceiverState => 0x0018,
            ControlItemCode::ReceiverFrequency => 0x0020,
            ControlItemCode::RfFilter => 0x0044,
            ControlItemCode::AdModes => 0x008A,
            ControlItemCode::IqOutputDataSampleRate => 0x00B8,
        }
    }

    /// Look up a wire value in the known set.
    pub const fn from_value(value: u16) -> Option<Self> {
        match value {
            0x0000 => Some(ControlItemCode::None),
            0x0018 => Some(ControlItemCode::ReceiverState),
            0x0020 => Some(ControlItemCode::ReceiverFrequency),
            0x0044 => Some(ControlItemCode::RfFilter),
            0x008A => Some(ControlItemCode::AdModes),
            0x00B8 => Some(ControlItemCode::IqOutputDataSampleRate),
            _ => None,
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            ControlItemCode::None => "NONE",
            ControlItemCode::ReceiverState => "RECEIVER_STATE",
            ControlItemCode::ReceiverFrequency => "RECEIVER_FREQUENCY",
            ControlItemCode::RfFilter => "RF_FILTER",
            ControlItemCode::AdModes => "AD_MODES",
            ControlItemCode::IqOutputDataSampleRate => "IQ_OUTPUT_SAMPLE_RATE",
        }
    }
}

impl TryFrom<u16> for ControlItemCode {
    type Error = FrameError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::from_value(value).ok_or(FrameError::UnknownCode(value))
    }
}

impl fmt::Display for ControlItemCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
