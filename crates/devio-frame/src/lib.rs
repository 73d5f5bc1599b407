//! Packet framing for byte-oriented device drivers.
//!
//! This is the core value-add layer of devio. A [`Framer`] turns the
//! unreliable, partially-buffered byte stream of a device transport into
//! discrete packets:
//! - a user-supplied [`PacketExtractor`] decides where packets begin and end,
//! - a bounded internal buffer stages unframed bytes,
//! - layered first-byte / whole-packet timeouts bound every wait,
//! - a [`Status`] accounts for every byte as accepted, rejected or queued.
//!
//! No partial packets, no buffer management in user code.

pub mod display;
pub mod error;
pub mod extractor;
pub mod framer;
pub mod listener;
pub mod status;
pub mod timeout;

pub use error::{FrameError, Result, TimeoutKind};
pub use extractor::{Extract, PacketExtractor};
pub use framer::Framer;
pub use listener::{IoListener, ListenerId};
pub use status::Status;
pub use timeout::Timeout;
