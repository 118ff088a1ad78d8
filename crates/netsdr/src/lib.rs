//! NetSDR receiver client.
//!
//! Talks to NetSDR-compatible software-defined radio receivers: control items
//! over a TCP stream, I/Q samples over UDP datagrams.
//!
//! # Crate Structure
//!
//! - [`frame`]: message codec (headers, control items, data items, samples)
//! - [`transport`]: async TCP and UDP transports
//! - [`session`]: client session and sample sinks (behind `session` feature)

/// Re-export frame types.
pub mod frame {
    pub use netsdr_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use netsdr_transport::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use netsdr_session::*;
}
