use std::path::PathBuf;

/// Errors raised by transport construction and stream I/O.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The URI does not start with a recognized scheme.
    #[error("unknown URI scheme in {0:?}")]
    UnknownScheme(String),

    /// The URI is missing or mangles a required component.
    #[error("malformed URI {uri:?}: {reason}")]
    InvalidUri { uri: String, reason: &'static str },

    /// The requested baud rate has no termios equivalent on this platform.
    #[error("unsupported baud rate {0}")]
    UnsupportedBaudRate(u32),

    /// Failed to open a device or file path.
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to a remote endpoint.
    #[error("cannot connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to bind a local socket.
    #[error("cannot bind local port {port}: {source}")]
    Bind { port: u16, source: std::io::Error },

    /// Host name resolution produced no usable address.
    #[error("cannot resolve any address for {0}")]
    NoAddress(String),

    /// A datagram write was attempted before any peer was known.
    #[error("no datagram peer known yet")]
    NoPeer,

    /// The peer closed the connection.
    #[error("stream closed by peer")]
    Closed,

    /// A wait for stream readiness ran out of time.
    #[error("wait for stream readiness timed out")]
    WaitTimeout,

    /// An I/O error occurred on the stream.
    #[error("stream I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
