use std::time::SystemTime;

use serde::Serialize;

/// Running I/O counters for a framer.
///
/// `stamp` is the only wall-clock value in the crate and is purely
/// observational; everything that drives timeout behavior measures
/// against the monotonic [`Timeout`](crate::Timeout) instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Status {
    /// Wall-clock time of the last accounted I/O activity.
    pub stamp: Option<SystemTime>,
    /// Bytes successfully transmitted.
    pub tx: u64,
    /// Received bytes that were part of an emitted packet.
    ///
    /// In extract-last mode this also counts earlier packet candidates
    /// that a fresher candidate superseded within the same buffer
    /// snapshot, so it can exceed the sum of delivered packet lengths.
    /// That is how throughput counters are defined here.
    pub good_rx: u64,
    /// Received bytes discarded as garbage before a packet start.
    pub bad_rx: u64,
    /// Bytes currently queued in the internal buffer.
    pub queued_bytes: usize,
}
