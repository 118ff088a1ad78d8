//! Sample sinks: where decoded sample batches go.
//!
//! Sinks are only written from the data path. The session keeps its sink
//! behind a mutex, so a sink shared with another writer sees one append at a
//! time.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use crate::error::SinkError;

/// Samples decoded from one data item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBatch {
    /// Sequence number of the data item the samples came from.
    pub sequence: u16,
    pub samples: Vec<i32>,
}

/// Destination for decoded samples.
pub trait SampleSink: Send {
    /// Append one batch.
    fn append(&mut self, batch: &SampleBatch) -> Result<(), SinkError>;

    /// Push buffered samples to their destination.
    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Drops every batch. For sessions that only use the control channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl SampleSink for DiscardSink {
    fn append(&mut self, _batch: &SampleBatch) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Appends samples to a file as fixed-width little-endian integers.
///
/// Each batch is flushed before `append` returns, so an interrupted session
/// leaves only whole batches behind.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    writer: BufWriter<File>,
    sample_width: usize,
    samples_written: u64,
}

impl FileSink {
    /// Default on-disk sample width: 16-bit.
    pub const DEFAULT_SAMPLE_WIDTH: usize = 2;

    /// Open `path` for appending with the default sample width.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        Self::with_width(path, Self::DEFAULT_SAMPLE_WIDTH)
    }

    /// Open `path` for appending, writing `sample_width` bytes per sample.
    pub fn with_width(path: impl AsRef<Path>, sample_width: usize) -> Result<Self, SinkError> {
        if !(1..=4).contains(&sample_width) {
            return Err(SinkError::InvalidWidth(sample_width));
        }
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!(?path, sample_width, "sample file opened");
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            sample_width,
            samples_written: 0,
        })
    }

    /// File being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Samples written since the sink was opened.
    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }
}

impl SampleSink for FileSink {
    fn append(&mut self, batch: &SampleBatch) -> Result<(), SinkError> {
        for sample in &batch.samples {
            self.writer
                .write_all(&sample.to_le_bytes()[..self.sample_width])?;
        }
        self.writer.flush()?;
        self.samples_written += batch.samples.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Forwards batches to a [`SampleStream`].
///
/// Appending never waits: a full channel drops the batch with [`SinkError::Full`].
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<SampleBatch>,
}

impl ChannelSink {
    /// Create a sink and the stream that receives its batches.
    pub fn new(capacity: usize) -> (Self, SampleStream) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, SampleStream { rx })
    }
}

impl SampleSink for ChannelSink {
    fn append(&mut self, batch: &SampleBatch) -> Result<(), SinkError> {
        match self.tx.try_send(batch.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(batch)) => Err(SinkError::Full {
                sequence: batch.sequence,
            }),
            Err(TrySendError::Closed(_)) => Err(SinkError::Closed),
        }
    }
}

/// Stream of sample batches fed by a [`ChannelSink`].
#[derive(Debug)]
pub struct SampleStream {
    rx: mpsc::Receiver<SampleBatch>,
}

impl SampleStream {
    /// Wait for the next batch. `None` once every sink handle is gone.
    pub async fn recv(&mut self) -> Option<SampleBatch> {
        self.rx.recv().await
    }
}

impl Stream for SampleStream {
    type Item = SampleBatch;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
