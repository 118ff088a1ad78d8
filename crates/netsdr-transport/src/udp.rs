use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::{Incoming, Transport, INCOMING_CAPACITY};

/// Default NetSDR data port.
pub const DEFAULT_DATA_PORT: u16 = 60000;

/// Largest datagram the receive loop accepts.
pub const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// Consecutive receive failures after which the receive loop gives up.
pub const MAX_RECEIVE_FAILURES: u32 = 16;

const RECEIVE_RETRY_BASE: Duration = Duration::from_millis(10);
const RECEIVE_RETRY_MAX: Duration = Duration::from_secs(1);

/// Configuration for the UDP data transport.
#[derive(Debug, Clone)]
pub struct UdpConfig {
    /// Local address the data stream arrives on.
    pub bind_addr: String,
    /// Destination for outgoing datagrams. Receive-only when unset.
    pub remote_addr: Option<String>,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_DATA_PORT}"),
            remote_addr: None,
        }
    }
}

impl UdpConfig {
    /// Config bound to `bind_addr` with no remote.
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            remote_addr: None,
        }
    }

    /// Set the destination for outgoing datagrams.
    pub fn with_remote(mut self, remote_addr: impl Into<String>) -> Self {
        self.remote_addr = Some(remote_addr.into());
        self
    }
}

/// Datagram-oriented transport for the data channel.
///
/// Every received datagram is delivered as one frame. When the consumer falls
/// behind, datagrams are dropped rather than stalling the socket.
pub struct UdpTransport {
    config: UdpConfig,
    socket: Option<Arc<UdpSocket>>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
    receiver: Option<JoinHandle<()>>,
}

impl UdpTransport {
    pub fn new(config: UdpConfig) -> Self {
        Self {
            config,
            socket: None,
            connected: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            receiver: None,
        }
    }

    /// The bound local address, once connected.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket
            .as_ref()
            .and_then(|socket| socket.local_addr().ok())
    }

    /// Current configuration.
    pub fn config(&self) -> &UdpConfig {
        &self.config
    }

    async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(receiver) = self.receiver.take() {
            let _ = receiver.await;
        }
        self.socket = None;
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl Transport for UdpTransport {
    async fn connect(&mut self) -> Result<Incoming> {
        if self.socket.is_some() {
            self.shutdown().await;
        }

        let addr = self.config.bind_addr.clone();
        let socket = UdpSocket::bind(&addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let socket = Arc::new(socket);
        let (tx, rx) = mpsc::channel(INCOMING_CAPACITY);

        self.cancel = CancellationToken::new();
        self.connected.store(true, Ordering::SeqCst);
        self.receiver = Some(tokio::spawn(receive_datagrams(
            Arc::clone(&socket),
            tx,
            self.cancel.clone(),
            Arc::clone(&self.connected),
        )));
        info!(local = ?socket.local_addr().ok(), "data listener started");
        self.socket = Some(socket);

        Ok(rx)
    }

    async fn close(&mut self) -> Result<()> {
        if self.socket.is_some() {
            self.shutdown().await;
            info!(addr = %self.config.bind_addr, "data listener stopped");
        }
        Ok(())
    }

    async fn send(&mut self, message: Bytes) -> Result<()> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotConnected)?;
        let remote = self
            .config
            .remote_addr
            .as_deref()
            .ok_or(TransportError::NoRemote)?;

        socket.send_to(&message, remote).await?;
        debug!(size = message.len(), %remote, "data frame sent");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn transport_name(&self) -> &'static str {
        "udp"
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn receive_datagrams(
    socket: Arc<UdpSocket>,
    tx: mpsc::Sender<Bytes>,
    cancel: CancellationToken,
    connected: Arc<AtomicBool>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    let mut failures = 0u32;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            received = socket.recv_from(&mut buf) => match received {
                Ok((size, from)) => {
                    failures = 0;
                    let datagram = Bytes::copy_from_slice(&buf[..size]);
                    match tx.try_send(datagram) {
                        Ok(()) => debug!(size, %from, "data frame received"),
                        Err(TrySendError::Full(_)) => {
                            warn!(size, %from, "data consumer behind; datagram dropped");
                        }
                        Err(TrySendError::Closed(_)) => {
                            debug!("data receiver dropped");
                            break;
                        }
                    }
                }
                Err(err) => {
                    // Datagram sockets surface per-packet errors (e.g. ICMP unreachable).
                    failures += 1;
                    let Some(delay) = receive_retry_delay(failures) else {
                        error!(error = %err, failures, "data receive keeps failing; closing");
                        break;
                    };
                    warn!(error = %err, failures, ?delay, "data receive failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            },
        }
    }

    connected.store(false, Ordering::SeqCst);
}

/// Backoff before retrying after `failures` consecutive receive errors, or
/// `None` once the loop should stop.
fn receive_retry_delay(failures: u32) -> Option<Duration> {
    if failures >= MAX_RECEIVE_FAILURES {
        return None;
    }
    let factor = 1u32 << failures.saturating_sub(1).min(10);
    Some(RECEIVE_RETRY_BASE.saturating_mul(factor).min(RECEIVE_RETRY_MAX))
}

#[cfg(test)]
mod tests {
    use netsdr_frame::{decode, encode_data_item, MessageType};

    use super::*;

    #[tokio::test]
    async fn delivers_one_frame_per_datagram() {
        let mut listener = UdpTransport::new(UdpConfig::new("127.0.0.1:0"));
        let mut incoming = listener.connect().await.expect("bind listener");
        let target = listener.local_addr().expect("bound address").to_string();

        let mut sender = UdpTransport::new(UdpConfig::new("127.0.0.1:0").with_remote(target));
        let _ignored = sender.connect().await.expect("bind sender");

        for sequence in 1..=3u16 {
            let frame = encode_data_item(MessageType::DataItem0, sequence, &[0xAA; 8]).unwrap();
            sender.send(frame).await.expect("send datagram");
        }

        for expected in 1..=3u16 {
            let frame = tokio::time::timeout(Duration::from_secs(2), incoming.recv())
                .await
                .expect("datagram should arrive")
                .expect("channel open");
            let message = decode(&frame).unwrap();
            assert_eq!(message.sequence, Some(expected));
            assert_eq!(message.body.len(), 8);
        }

        listener.close().await.unwrap();
        assert!(!listener.is_connected());
        assert!(incoming.recv().await.is_none());
    }

    #[tokio::test]
    async fn send_requires_remote() {
        let mut transport = UdpTransport::new(UdpConfig::new("127.0.0.1:0"));
        let _incoming = transport.connect().await.expect("bind");

        let err = transport.send(Bytes::from_static(&[0x04, 0x80, 0x01, 0x00])).await;
        assert!(matches!(err, Err(TransportError::NoRemote)));
    }

    #[tokio::test]
    async fn send_requires_socket() {
        let mut transport =
            UdpTransport::new(UdpConfig::new("127.0.0.1:0").with_remote("127.0.0.1:9"));
        let err = transport.send(Bytes::from_static(&[0x04, 0x80, 0x01, 0x00])).await;
        assert!(matches!(err, Err(TransportError::NotConnected)));
    }

    #[test]
    fn receive_failures_back_off_then_stop() {
        assert_eq!(receive_retry_delay(1), Some(Duration::from_millis(10)));
        assert_eq!(receive_retry_delay(2), Some(Duration::from_millis(20)));
        assert_eq!(receive_retry_delay(8), Some(Duration::from_millis(1000)));
        assert_eq!(receive_retry_delay(MAX_RECEIVE_FAILURES - 1), Some(Duration::from_secs(1)));
        assert_eq!(receive_retry_delay(MAX_RECEIVE_FAILURES), None);
    }

    #[tokio::test]
    async fn bind_failure_reports_address() {
        let mut transport = UdpTransport::new(UdpConfig::new("not-an-address"));
        let err = transport.connect().await.unwrap_err();
        assert!(matches!(err, TransportError::Bind { .. }));
    }
}
