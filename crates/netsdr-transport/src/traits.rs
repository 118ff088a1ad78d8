use std::future::Future;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::Result;

/// Capacity of the incoming message channel handed out by [`Transport::connect`].
pub const INCOMING_CAPACITY: usize = 256;

/// Messages received on a connection, one complete frame per item.
///
/// The channel closes when the connection ends, whether the peer went away,
/// an I/O error occurred, or [`Transport::close`] was called.
pub type Incoming = mpsc::Receiver<Bytes>;

/// A connection that carries NetSDR frames.
///
/// Stream transports deliver frames split on the header length; datagram
/// transports deliver one datagram per frame.
pub trait Transport: Send + 'static {
    /// Open the connection and start delivering received frames.
    ///
    /// Connecting an open transport closes the previous connection first.
    fn connect(&mut self) -> impl Future<Output = Result<Incoming>> + Send;

    /// Close the connection. Closing a closed transport is a no-op.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Send one encoded frame.
    fn send(&mut self, message: Bytes) -> impl Future<Output = Result<()>> + Send;

    /// Whether the connection is currently open.
    fn is_connected(&self) -> bool;

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str;
}
