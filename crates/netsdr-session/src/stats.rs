use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared by the session and its background tasks.
#[derive(Debug, Default)]
pub struct SessionStats {
    commands_sent: AtomicU64,
    control_received: AtomicU64,
    unsolicited: AtomicU64,
    data_frames: AtomicU64,
    samples: AtomicU64,
    decode_errors: AtomicU64,
    sequence_gaps: AtomicU64,
    sink_errors: AtomicU64,
}

/// Point-in-time copy of [`SessionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub commands_sent: u64,
    pub control_received: u64,
    pub unsolicited: u64,
    pub data_frames: u64,
    pub samples: u64,
    pub decode_errors: u64,
    pub sequence_gaps: u64,
    pub sink_errors: u64,
}

impl SessionStats {
    pub(crate) fn command_sent(&self) {
        self.commands_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn control_received(&self, solicited: bool) {
        self.control_received.fetch_add(1, Ordering::Relaxed);
        if !solicited {
            self.unsolicited.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn data_frame(&self, samples: usize) {
        self.data_frames.fetch_add(1, Ordering::Relaxed);
        self.samples.fetch_add(samples as u64, Ordering::Relaxed);
    }

    pub(crate) fn decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn sequence_gap(&self) {
        self.sequence_gaps.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn sink_error(&self) {
        self.sink_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            control_received: self.control_received.load(Ordering::Relaxed),
            unsolicited: self.unsolicited.load(Ordering::Relaxed),
            data_frames: self.data_frames.load(Ordering::Relaxed),
            samples: self.samples.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            sequence_gaps: self.sequence_gaps.load(Ordering::Relaxed),
            sink_errors: self.sink_errors.load(Ordering::Relaxed),
        }
    }
}
