use std::path::Path;
use std::time::Duration;

use netsdr_frame::sample_width;
use netsdr_transport::{TcpConfig, UdpConfig, DEFAULT_CONTROL_PORT, DEFAULT_DATA_PORT};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};
use crate::params::{FREQUENCY_WIDTH, MAX_FREQUENCY_WIDTH};

/// Session behavior configuration.
///
/// Every field has a default, so a JSON config file only needs the keys it
/// overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Receiver control address, `host:port`.
    pub control_addr: String,
    /// Local address the data stream is received on.
    pub data_bind_addr: String,
    /// Destination for outgoing data items. Receive-only when unset.
    pub data_remote_addr: Option<String>,
    /// Limit on establishing the control connection, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Limit on waiting for a control response, in milliseconds. Unset waits forever.
    pub response_timeout_ms: Option<u64>,
    /// Bit depth used to split data-item bodies into samples.
    pub bit_depth: u16,
    /// Bytes of the frequency written after the channel byte.
    pub frequency_width: usize,
    /// I/Q output sample rate sent during bring-up, in Hz.
    pub sample_rate: u64,
    /// Send the bring-up commands (sample rate, RF filter, A/D modes) on connect.
    pub configure_on_connect: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            control_addr: format!("127.0.0.1:{DEFAULT_CONTROL_PORT}"),
            data_bind_addr: format!("0.0.0.0:{DEFAULT_DATA_PORT}"),
            data_remote_addr: None,
            connect_timeout_ms: 5_000,
            response_timeout_ms: None,
            bit_depth: 16,
            frequency_width: FREQUENCY_WIDTH,
            sample_rate: 100_000,
            configure_on_connect: true,
        }
    }
}

impl SessionConfig {
    /// Load a config from a JSON file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read(path)?;
        let config: Self = serde_json::from_slice(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the codec cannot honor.
    pub fn validate(&self) -> Result<()> {
        sample_width(self.bit_depth)?;
        if self.frequency_width == 0 || self.frequency_width > MAX_FREQUENCY_WIDTH {
            return Err(SessionError::Config(format!(
                "frequency_width must be 1..={MAX_FREQUENCY_WIDTH}, got {}",
                self.frequency_width
            )));
        }
        if self.control_addr.trim().is_empty() {
            return Err(SessionError::Config("control_addr must not be empty".into()));
        }
        Ok(())
    }

    /// Response wait limit, if any.
    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout_ms.map(Duration::from_millis)
    }

    /// Control transport settings derived from this config.
    pub fn tcp_config(&self) -> TcpConfig {
        TcpConfig {
            addr: self.control_addr.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            ..TcpConfig::default()
        }
    }

    /// Data transport settings derived from this config.
    pub fn udp_config(&self) -> UdpConfig {
        let udp = UdpConfig::new(self.data_bind_addr.clone());
        match &self.data_remote_addr {
            Some(remote) => udp.with_remote(remote.clone()),
            None => udp,
        }
    }
}
