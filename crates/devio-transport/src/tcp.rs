use std::net::TcpStream;
use std::os::fd::IntoRawFd;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::fd::FdStream;

/// Connect a TCP client stream.
///
/// `TCP_NODELAY` is set so small device packets leave immediately, and the
/// socket is switched to non-blocking mode before it is handed over.
pub fn connect(host: &str, port: u16) -> Result<FdStream> {
    let stream = TcpStream::connect((host, port)).map_err(|source| TransportError::Connect {
        addr: format!("{host}:{port}"),
        source,
    })?;
    stream.set_nodelay(true)?;
    stream.set_nonblocking(true)?;
    debug!(host, port, "connected TCP stream");
    Ok(FdStream::new(stream.into_raw_fd(), true))
}

#[cfg(test)]
mod tests {
    use std::io::{Read as _, Write as _};
    use std::net::TcpListener;
    use std::time::Duration;

    use super::*;
    use crate::stream::IoStream;

    #[test]
    fn connect_and_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut stream = connect("127.0.0.1", port).unwrap();
        let (mut server, _addr) = listener.accept().unwrap();

        assert_eq!(stream.write(b"ping").unwrap(), 4);
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");

        server.write_all(b"pong").unwrap();
        stream.wait_read(Duration::from_secs(1)).unwrap();
        let mut buf = [0u8; 16];
        let n = stream.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"pong");
    }

    #[test]
    fn connect_refused_is_reported() {
        // Bind-then-drop to get a port nothing is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = connect("127.0.0.1", port).unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }
}
