//! Background tasks that drain the transports' incoming channels.
//!
//! The control task hands each reply to whichever command is waiting. The data
//! task decodes data items into samples and appends them to the sink. The two
//! share nothing but the session counters.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use netsdr_frame::{decode, extract_samples, ControlItemCode, FrameError};
use netsdr_transport::Incoming;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::sink::{SampleBatch, SampleSink};
use crate::stats::SessionStats;

/// The command awaiting a reply and the code its reply must carry.
pub(crate) struct PendingCommand {
    code: ControlItemCode,
    reply: oneshot::Sender<Bytes>,
}

impl PendingCommand {
    pub(crate) fn new(code: ControlItemCode, reply: oneshot::Sender<Bytes>) -> Self {
        Self { code, reply }
    }

    /// A reply for another code is a late answer to an earlier command.
    /// Frames that do not decode, NAKs included, are handed to the waiter.
    fn accepts(&self, reply_code: Option<ControlItemCode>) -> bool {
        reply_code.is_none_or(|code| code == self.code)
    }
}

/// Slot for the one command awaiting a reply.
pub(crate) type PendingSlot = Arc<Mutex<Option<PendingCommand>>>;

/// A sink shared between the session and its data task.
pub type SharedSink = Arc<Mutex<dyn SampleSink>>;

pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Sequence number that follows `current`. Zero is never produced.
pub fn next_sequence(current: u16) -> u16 {
    if current == u16::MAX {
        1
    } else {
        current + 1
    }
}

/// Log a control message and complete the pending command if the message
/// answers it.
pub(crate) fn dispatch_control(pending: &PendingSlot, stats: &SessionStats, frame: Bytes) {
    let reply_code = match decode(&frame) {
        Ok(message) => {
            info!(
                message_type = %message.message_type,
                code = %message.code,
                size = frame.len(),
                "control message received"
            );
            Some(message.code)
        }
        Err(err) => {
            stats.decode_error();
            warn!(error = %err, size = frame.len(), "control message failed to decode");
            None
        }
    };

    let waiter = {
        let mut slot = lock(pending);
        match slot.as_ref() {
            Some(waiting) if !waiting.accepts(reply_code) => {
                debug!(expected = %waiting.code, "reply is for an earlier command");
                None
            }
            _ => slot.take(),
        }
    };
    stats.control_received(waiter.is_some());
    match waiter {
        Some(waiter) => {
            if waiter.reply.send(frame).is_err() {
                debug!("command stopped waiting before its reply arrived");
            }
        }
        None => debug!("unsolicited control message"),
    }
}

pub(crate) async fn run_control(
    mut incoming: Incoming,
    pending: PendingSlot,
    stats: Arc<SessionStats>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            next = incoming.recv() => match next {
                Some(frame) => dispatch_control(&pending, &stats, frame),
                None => {
                    info!("control channel closed");
                    break;
                }
            },
        }
    }

    // Dropping the sender resolves a waiting command as disconnected.
    lock(&pending).take();
}

/// Sample extraction state for the data path.
pub(crate) struct DataPath {
    sink: SharedSink,
    bit_depth: u16,
    last_sequence: Mutex<Option<u16>>,
    stats: Arc<SessionStats>,
}

impl DataPath {
    pub(crate) fn new(sink: SharedSink, bit_depth: u16, stats: Arc<SessionStats>) -> Self {
        Self {
            sink,
            bit_depth,
            last_sequence: Mutex::new(None),
            stats,
        }
    }

    pub(crate) fn sink(&self) -> &SharedSink {
        &self.sink
    }

    /// Forget the peer sequence so a restarted stream is not reported as a gap.
    pub(crate) fn reset(&self) {
        *lock(&self.last_sequence) = None;
    }

    /// Decode one data item and append its samples. Returns the sample count.
    pub(crate) fn ingest(&self, frame: &[u8]) -> Result<usize> {
        let message = decode(frame).inspect_err(|_| self.stats.decode_error())?;
        let Some(sequence) = message.sequence else {
            self.stats.decode_error();
            return Err(FrameError::WrongCategory(message.message_type).into());
        };
        self.track_sequence(sequence);

        let samples: Vec<i32> = extract_samples(self.bit_depth, &message.body)?.collect();
        let count = samples.len();
        let batch = SampleBatch { sequence, samples };
        lock(&self.sink)
            .append(&batch)
            .inspect_err(|_| self.stats.sink_error())?;

        self.stats.data_frame(count);
        debug!(sequence, samples = count, "data item ingested");
        Ok(count)
    }

    fn track_sequence(&self, sequence: u16) {
        let mut last = lock(&self.last_sequence);
        if let Some(previous) = *last {
            let expected = next_sequence(previous);
            // Some receivers wrap through zero.
            let wrapped = previous == u16::MAX && sequence == 0;
            if sequence != expected && !wrapped {
                self.stats.sequence_gap();
                warn!(expected, received = sequence, "data sequence gap");
            }
        }
        *last = Some(sequence);
    }

    fn flush(&self) {
        if let Err(err) = lock(&self.sink).flush() {
            warn!(error = %err, "sample sink flush failed");
        }
    }
}

pub(crate) async fn run_data(mut incoming: Incoming, path: Arc<DataPath>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            next = incoming.recv() => match next {
                Some(frame) => {
                    if let Err(err) = path.ingest(&frame) {
                        warn!(error = %err, size = frame.len(), "data item dropped");
                    }
                }
                None => {
                    info!("data channel closed");
                    break;
                }
            },
        }
    }

    path.flush();
}
