//! NetSDR client session.
//!
//! A [`ClientSession`] drives one receiver over two connections. Commands go
//! out on the control connection and wait for the matching reply. Samples
//! arrive on the data connection and are appended to a [`SampleSink`].

pub mod config;
pub mod dispatch;
pub mod error;
pub mod params;
pub mod session;
pub mod sink;
pub mod stats;

pub use config::SessionConfig;
pub use dispatch::{next_sequence, SharedSink};
pub use error::{Result, SessionError, SinkError};
pub use params::{
    frequency_parameters, sample_rate_parameters, AD_MODES_DEFAULT, FREQUENCY_WIDTH,
    MAX_FREQUENCY_WIDTH, RECEIVER_RUN_IQ, RECEIVER_STOP, RF_FILTER_AUTO, SAMPLE_RATE_WIDTH,
};
pub use session::{ClientSession, Response};
pub use sink::{ChannelSink, DiscardSink, FileSink, SampleBatch, SampleSink, SampleStream};
pub use stats::{SessionStats, StatsSnapshot};
