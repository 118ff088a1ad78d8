use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use netsdr_frame::FrameSplitter;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::{Incoming, Transport, INCOMING_CAPACITY};

/// Default NetSDR control port.
pub const DEFAULT_CONTROL_PORT: u16 = 50000;

/// Configuration for the TCP control transport.
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Receiver address, `host:port`.
    pub addr: String,
    /// Limit on establishing the connection.
    pub connect_timeout: Duration,
    /// Disable Nagle's algorithm; control frames are small and latency bound.
    pub nodelay: bool,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            addr: format!("127.0.0.1:{DEFAULT_CONTROL_PORT}"),
            connect_timeout: Duration::from_secs(5),
            nodelay: true,
        }
    }
}

impl TcpConfig {
    /// Config for `addr` with default settings otherwise.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Self::default()
        }
    }
}

/// Stream-oriented transport for the control channel.
///
/// Received bytes are split into frames on the header length field.
pub struct TcpTransport {
    config: TcpConfig,
    writer: Option<OwnedWriteHalf>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
    reader: Option<JoinHandle<()>>,
    peer_addr: Option<SocketAddr>,
}

impl TcpTransport {
    pub fn new(config: TcpConfig) -> Self {
        Self {
            config,
            writer: None,
            connected: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            reader: None,
            peer_addr: None,
        }
    }

    /// Address of the connected receiver.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Current configuration.
    pub fn config(&self) -> &TcpConfig {
        &self.config
    }

    async fn open(&mut self) -> Result<Incoming> {
        let addr = self.config.addr.clone();
        let stream = tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| TransportError::Connect {
                addr: addr.clone(),
                source: std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"),
            })?
            .map_err(|source| TransportError::Connect {
                addr: addr.clone(),
                source,
            })?;
        stream.set_nodelay(self.config.nodelay)?;
        let peer_addr = stream.peer_addr().ok();

        let (read_half, write_half) = stream.into_split();
        let (tx, rx) = mpsc::channel(INCOMING_CAPACITY);

        self.cancel = CancellationToken::new();
        self.connected.store(true, Ordering::SeqCst);
        self.reader = Some(tokio::spawn(read_frames(
            read_half,
            tx,
            self.cancel.clone(),
            Arc::clone(&self.connected),
        )));
        self.writer = Some(write_half);
        self.peer_addr = peer_addr;

        info!(%addr, "control connection established");
        Ok(rx)
    }

    async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(mut writer) = self.writer.take() {
            if let Err(err) = writer.shutdown().await {
                debug!(error = %err, "control write half shutdown failed");
            }
        }
        if let Some(reader) = self.reader.take() {
            let _ = reader.await;
        }
        self.connected.store(false, Ordering::SeqCst);
        self.peer_addr = None;
    }
}

impl Transport for TcpTransport {
    async fn connect(&mut self) -> Result<Incoming> {
        if self.writer.is_some() {
            self.shutdown().await;
        }
        self.open().await
    }

    async fn close(&mut self) -> Result<()> {
        if self.writer.is_some() || self.reader.is_some() {
            self.shutdown().await;
            info!(addr = %self.config.addr, "control connection closed");
        }
        Ok(())
    }

    async fn send(&mut self, message: Bytes) -> Result<()> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let writer = self.writer.as_mut().ok_or(TransportError::NotConnected)?;

        let written = writer.write_all(&message).await;
        if let Err(err) = written {
            warn!(error = %err, "control write failed; closing connection");
            self.shutdown().await;
            return Err(TransportError::Io(err));
        }
        debug!(size = message.len(), "control frame sent");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn read_frames(
    read_half: OwnedReadHalf,
    tx: mpsc::Sender<Bytes>,
    cancel: CancellationToken,
    connected: Arc<AtomicBool>,
) {
    let mut frames = FramedRead::new(read_half, FrameSplitter::new());

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            next = frames.next() => match next {
                Some(Ok(frame)) => {
                    debug!(size = frame.len(), "control frame received");
                    if tx.send(frame).await.is_err() {
                        debug!("control receiver dropped");
                        break;
                    }
                }
                Some(Err(err)) => {
                    warn!(error = %err, "control stream unusable; closing");
                    break;
                }
                None => {
                    info!("receiver closed control connection");
                    break;
                }
            },
        }
    }

    connected.store(false, Ordering::SeqCst);
}
