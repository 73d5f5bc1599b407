use std::os::fd::RawFd;
use std::time::Duration;

use crate::error::Result;

/// A byte transport driven by the framing layer.
///
/// Reads and writes never block: a read with nothing pending returns 0,
/// a write reports however many bytes the transport accepted right now.
/// Blocking happens only inside `wait_read`/`wait_write`, under the
/// explicit deadline the caller computed.
pub trait IoStream: std::fmt::Debug {
    /// Read available bytes into `buf`. Returns 0 when no data is ready.
    ///
    /// An orderly end-of-file on a connected byte stream is reported as
    /// [`TransportError::Closed`](crate::TransportError::Closed), not as 0.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write as many bytes of `buf` as the transport accepts right now.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Block until the stream is readable, up to `timeout`.
    ///
    /// Returns [`TransportError::WaitTimeout`](crate::TransportError::WaitTimeout)
    /// when nothing becomes ready in time.
    fn wait_read(&mut self, timeout: Duration) -> Result<()>;

    /// Block until the stream is writable, up to `timeout`.
    fn wait_write(&mut self, timeout: Duration) -> Result<()>;

    /// Discard any bytes buffered inside the transport.
    fn clear(&mut self) -> Result<()>;

    /// The underlying descriptor, if the transport has one.
    fn fd(&self) -> Option<RawFd> {
        None
    }
}
