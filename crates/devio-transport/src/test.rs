use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::{Buf, BytesMut};

use crate::error::{Result, TransportError};
use crate::stream::IoStream;

#[derive(Debug, Default)]
struct Inner {
    /// Bytes staged for the framing layer to read.
    rx: BytesMut,
    /// Bytes the framing layer has written.
    tx: BytesMut,
}

/// In-memory stream for exercising the framing layer without a device.
///
/// Clones share the same buffers, so a test can keep one handle to feed
/// and inspect bytes while the framer owns the other. `wait_read` fails
/// immediately when nothing is staged: no device exists that could still
/// deliver data.
#[derive(Debug, Clone, Default)]
pub struct TestStream {
    inner: Arc<Mutex<Inner>>,
}

impl TestStream {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stage bytes for the framing layer to read.
    pub fn feed(&self, data: &[u8]) {
        self.lock().rx.extend_from_slice(data);
    }

    /// Bytes the framing layer has written so far.
    pub fn written(&self) -> Vec<u8> {
        self.lock().tx.to_vec()
    }

    /// Take the written bytes, leaving the write side empty.
    pub fn take_written(&self) -> Vec<u8> {
        let mut inner = self.lock();
        let out = inner.tx.to_vec();
        inner.tx.clear();
        out
    }
}

impl IoStream for TestStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut inner = self.lock();
        let n = buf.len().min(inner.rx.len());
        buf[..n].copy_from_slice(&inner.rx[..n]);
        inner.rx.advance(n);
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.lock().tx.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn wait_read(&mut self, _timeout: Duration) -> Result<()> {
        if self.lock().rx.is_empty() {
            Err(TransportError::WaitTimeout)
        } else {
            Ok(())
        }
    }

    fn wait_write(&mut self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.lock().rx.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_then_read() {
        let handle = TestStream::new();
        let mut stream = handle.clone();

        handle.feed(b"abc");
        let mut buf = [0u8; 2];
        assert_eq!(stream.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf, b"ab");
        let mut buf = [0u8; 8];
        assert_eq!(stream.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], b'c');
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn written_bytes_are_observable() {
        let handle = TestStream::new();
        let mut stream = handle.clone();

        stream.write(b"out").unwrap();
        assert_eq!(handle.written(), b"out");
        assert_eq!(handle.take_written(), b"out");
        assert!(handle.written().is_empty());
    }

    #[test]
    fn wait_read_fails_when_empty() {
        let mut stream = TestStream::new();
        let err = stream.wait_read(Duration::from_millis(5)).unwrap_err();
        assert!(matches!(err, TransportError::WaitTimeout));
    }

    #[test]
    fn clear_discards_staged_bytes() {
        let handle = TestStream::new();
        let mut stream = handle.clone();

        handle.feed(b"stale");
        stream.clear().unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn no_descriptor() {
        let stream = TestStream::new();
        assert!(stream.fd().is_none());
    }
}
