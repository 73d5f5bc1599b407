//! Byte transport layer for device drivers.
//!
//! Provides the non-blocking [`IoStream`] contract that the framing layer
//! drives, plus the concrete transports a byte-oriented device usually
//! speaks over: serial lines, TCP and UDP sockets, raw file descriptors,
//! plain files/FIFOs, and an in-memory test stream.
//!
//! This crate is Unix-only: readiness waits go through `poll(2)` and
//! serial setup speaks termios.

pub mod error;
pub mod fd;
pub mod serial;
pub mod stream;
pub mod tcp;
pub mod test;
pub mod udp;
pub mod uri;

pub use error::{Result, TransportError};
pub use fd::FdStream;
pub use stream::IoStream;
pub use test::TestStream;
pub use udp::UdpServerStream;
