//! Async transports for NetSDR sessions.
//!
//! A session uses two connections:
//! - a stream-oriented control connection ([`TcpTransport`])
//! - a datagram-oriented data connection ([`UdpTransport`])
//!
//! Both implement [`Transport`]: connect, close, send, and an [`Incoming`]
//! channel that stands in for the "message received" event.

pub mod error;
pub mod tcp;
pub mod traits;
pub mod udp;

pub use error::{Result, TransportError};
pub use tcp::{TcpConfig, TcpTransport, DEFAULT_CONTROL_PORT};
pub use traits::{Incoming, Transport, INCOMING_CAPACITY};
pub use udp::{UdpConfig, UdpTransport, DEFAULT_DATA_PORT, MAX_DATAGRAM_SIZE, MAX_RECEIVE_FAILURES};
