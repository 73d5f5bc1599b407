use std::fs::OpenOptions;
use std::io;
use std::os::fd::{IntoRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::stream::IoStream;

/// Readiness condition for [`wait_fd`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Readiness {
    Read,
    Write,
}

/// Block until `fd` reports the requested readiness, up to `timeout`.
///
/// Interrupted waits are resumed against the original deadline.
pub(crate) fn wait_fd(fd: RawFd, readiness: Readiness, timeout: Duration) -> Result<()> {
    let events = match readiness {
        Readiness::Read => libc::POLLIN,
        Readiness::Write => libc::POLLOUT,
    };
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let millis = remaining.as_millis().min(i32::MAX as u128) as i32;
        let mut pollfd = libc::pollfd {
            fd,
            events,
            revents: 0,
        };
        // SAFETY: `pollfd` is a valid array of one pollfd for the duration
        // of the call and `fd` is an open descriptor.
        let rc = unsafe { libc::poll(&mut pollfd, 1, millis) };
        if rc > 0 {
            return Ok(());
        }
        if rc == 0 {
            return Err(TransportError::WaitTimeout);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(TransportError::Io(err));
        }
    }
}

/// A stream over a raw file descriptor.
///
/// Serial ports, TCP connections, connected UDP sockets and plain files
/// all reduce to this once opened and switched to non-blocking mode.
#[derive(Debug)]
pub struct FdStream {
    fd: RawFd,
    auto_close: bool,
}

impl FdStream {
    /// Wrap an already-configured non-blocking descriptor.
    ///
    /// When `auto_close` is set the descriptor is closed on drop.
    pub fn new(fd: RawFd, auto_close: bool) -> Self {
        Self { fd, auto_close }
    }

    /// The wrapped descriptor.
    pub fn as_raw_fd(&self) -> RawFd {
        self.fd
    }

    /// Put a descriptor into non-blocking mode.
    pub fn set_nonblocking(fd: RawFd) -> Result<()> {
        // SAFETY: F_GETFL/F_SETFL on an open descriptor do not touch memory.
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags < 0 {
            return Err(io::Error::last_os_error().into());
        }
        // SAFETY: see above.
        let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
        if rc < 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(())
    }
}

impl IoStream for FdStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        // SAFETY: `buf` is a valid writable region of `buf.len()` bytes.
        let rc = unsafe { libc::read(self.fd, buf.as_mut_ptr().cast(), buf.len()) };
        if rc > 0 {
            return Ok(rc as usize);
        }
        if rc == 0 {
            return Err(TransportError::Closed);
        }
        let err = io::Error::last_os_error();
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => Ok(0),
            _ => Err(TransportError::Io(err)),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        // SAFETY: `buf` is a valid readable region of `buf.len()` bytes.
        let rc = unsafe { libc::write(self.fd, buf.as_ptr().cast(), buf.len()) };
        if rc >= 0 {
            return Ok(rc as usize);
        }
        let err = io::Error::last_os_error();
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => Ok(0),
            _ => Err(TransportError::Io(err)),
        }
    }

    fn wait_read(&mut self, timeout: Duration) -> Result<()> {
        wait_fd(self.fd, Readiness::Read, timeout)
    }

    fn wait_write(&mut self, timeout: Duration) -> Result<()> {
        wait_fd(self.fd, Readiness::Write, timeout)
    }

    fn clear(&mut self) -> Result<()> {
        let mut scratch = [0u8; 256];
        loop {
            match self.read(&mut scratch) {
                Ok(0) => return Ok(()),
                Ok(_) => continue,
                Err(TransportError::Closed) => return Ok(()),
                Err(err) => return Err(err),
            }
        }
    }

    fn fd(&self) -> Option<RawFd> {
        Some(self.fd)
    }
}

impl Drop for FdStream {
    fn drop(&mut self) {
        if self.auto_close {
            // SAFETY: the descriptor is owned by this stream and not closed
            // anywhere else.
            unsafe { libc::close(self.fd) };
        }
    }
}

/// Open a file-like path (FIFO, device node, plain file) read-write.
pub fn open_file(path: impl AsRef<Path>) -> Result<FdStream> {
    let path = path.as_ref();
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_SYNC | libc::O_NONBLOCK)
        .open(path)
        .map_err(|source| TransportError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(?path, "opened file stream");
    Ok(FdStream::new(file.into_raw_fd(), true))
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;
    use std::os::unix::net::UnixStream;

    use super::*;

    fn nonblocking_pair() -> (FdStream, UnixStream) {
        let (ours, theirs) = UnixStream::pair().unwrap();
        ours.set_nonblocking(true).unwrap();
        (FdStream::new(ours.into_raw_fd(), true), theirs)
    }

    #[test]
    fn read_returns_zero_when_no_data() {
        let (mut stream, _other) = nonblocking_pair();
        let mut buf = [0u8; 16];
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn read_delivers_written_bytes() {
        let (mut stream, mut other) = nonblocking_pair();
        other.write_all(b"hello").unwrap();

        stream.wait_read(Duration::from_secs(1)).unwrap();
        let mut buf = [0u8; 16];
        let n = stream.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn write_then_peer_reads() {
        use std::io::Read as _;

        let (mut stream, mut other) = nonblocking_pair();
        let n = stream.write(b"ping").unwrap();
        assert_eq!(n, 4);

        let mut buf = [0u8; 16];
        let read = other.read(&mut buf).unwrap();
        assert_eq!(&buf[..read], b"ping");
    }

    #[test]
    fn wait_read_times_out() {
        let (mut stream, _other) = nonblocking_pair();
        let err = stream.wait_read(Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, TransportError::WaitTimeout));
    }

    #[test]
    fn closed_peer_is_reported() {
        let (mut stream, other) = nonblocking_pair();
        drop(other);

        let mut buf = [0u8; 16];
        let err = stream.read(&mut buf).unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[test]
    fn clear_drains_pending_bytes() {
        let (mut stream, mut other) = nonblocking_pair();
        other.write_all(&[0xAB; 1000]).unwrap();

        stream.wait_read(Duration::from_secs(1)).unwrap();
        stream.clear().unwrap();

        let mut buf = [0u8; 16];
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn open_file_rejects_missing_path() {
        let err = open_file("/nonexistent/devio/path").unwrap_err();
        assert!(matches!(err, TransportError::Open { .. }));
    }
}
