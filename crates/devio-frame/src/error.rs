use std::fmt;
use std::time::Duration;

use devio_transport::TransportError;

/// Which timeout bound expired during a read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// No byte at all arrived within the first-byte bound.
    FirstByte,
    /// Bytes may have arrived, but no complete packet within the packet bound.
    Packet,
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutKind::FirstByte => f.write_str("first-byte"),
            TimeoutKind::Packet => f.write_str("packet"),
        }
    }
}

/// Errors raised by the framing engine.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The caller-supplied output buffer cannot hold a maximum-size packet.
    #[error("output buffer too small (got {got} bytes, need at least {need})")]
    BufferTooSmall { got: usize, need: usize },

    /// The extractor claimed more bytes than it was shown.
    #[error("extractor claimed {claimed} bytes but only {available} were buffered")]
    ExtractorOverrun { claimed: usize, available: usize },

    /// The internal buffer filled up without a packet boundary in sight.
    #[error("current packet too large for the {max_packet_size} byte internal buffer")]
    PacketTooLarge { max_packet_size: usize },

    /// No packet materialized within the allotted time.
    #[error("{kind} timeout after {}ms", .waited.as_millis())]
    Timeout { kind: TimeoutKind, waited: Duration },

    /// A read or write was attempted without an attached stream.
    #[error("no stream attached, did you forget to open one?")]
    NotOpen,

    /// The transport failed underneath the framer.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, FrameError>;
