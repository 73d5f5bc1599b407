use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::os::fd::{AsRawFd, IntoRawFd, RawFd};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::fd::{wait_fd, FdStream, Readiness};
use crate::stream::IoStream;

fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    let addr = format!("{host}:{port}");
    (host, port)
        .to_socket_addrs()
        .map_err(|source| TransportError::Connect {
            addr: addr.clone(),
            source,
        })?
        .next()
        .ok_or(TransportError::NoAddress(addr))
}

fn bind_any(port: u16) -> Result<UdpSocket> {
    let local = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
    UdpSocket::bind(local).map_err(|source| TransportError::Bind { port, source })
}

/// Connect a UDP client socket to a fixed remote endpoint.
///
/// The socket is connected, so plain reads and writes work on it and it
/// reduces to an [`FdStream`] like the other point-to-point transports.
pub fn connect(host: &str, port: u16) -> Result<FdStream> {
    let remote = resolve(host, port)?;
    let local = if remote.is_ipv4() {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
    } else {
        SocketAddr::new(IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED), 0)
    };
    let socket = UdpSocket::bind(local).map_err(|source| TransportError::Bind { port: 0, source })?;
    socket
        .connect(remote)
        .map_err(|source| TransportError::Connect {
            addr: remote.to_string(),
            source,
        })?;
    socket.set_nonblocking(true)?;
    debug!(%remote, "connected UDP stream");
    Ok(FdStream::new(socket.into_raw_fd(), true))
}

/// Datagram server stream.
///
/// Reads remember the sender of the most recent datagram; writes answer
/// that peer. A write before any datagram has arrived (and without a
/// fixed peer) fails with [`TransportError::NoPeer`].
///
/// Datagrams longer than the read buffer are truncated to fit, as usual
/// for UDP.
#[derive(Debug)]
pub struct UdpServerStream {
    socket: UdpSocket,
    peer: Option<SocketAddr>,
}

/// Bind a datagram server on `port`, answering whoever talked last.
pub fn bind_server(port: u16) -> Result<UdpServerStream> {
    let socket = bind_any(port)?;
    socket.set_nonblocking(true)?;
    info!(port, "listening on UDP");
    Ok(UdpServerStream { socket, peer: None })
}

/// Bind a datagram server on `in_port` with a fixed peer at `host:out_port`.
pub fn bind_bidirectional(host: &str, out_port: u16, in_port: u16) -> Result<UdpServerStream> {
    let peer = resolve(host, out_port)?;
    let socket = bind_any(in_port)?;
    socket.set_nonblocking(true)?;
    info!(in_port, %peer, "listening on bidirectional UDP");
    Ok(UdpServerStream {
        socket,
        peer: Some(peer),
    })
}

impl UdpServerStream {
    /// The port this server is bound to.
    pub fn local_port(&self) -> Result<u16> {
        Ok(self.socket.local_addr()?.port())
    }

    /// The peer writes currently go to, if one is known.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }
}

impl IoStream for UdpServerStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.socket.recv_from(buf) {
            Ok((received, peer)) => {
                self.peer = Some(peer);
                Ok(received)
            }
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            }
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let peer = self.peer.ok_or(TransportError::NoPeer)?;
        match self.socket.send_to(buf, peer) {
            Ok(sent) => Ok(sent),
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            }
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn wait_read(&mut self, timeout: Duration) -> Result<()> {
        wait_fd(self.socket.as_raw_fd(), Readiness::Read, timeout)
    }

    fn wait_write(&mut self, timeout: Duration) -> Result<()> {
        wait_fd(self.socket.as_raw_fd(), Readiness::Write, timeout)
    }

    fn clear(&mut self) -> Result<()> {
        let mut scratch = [0u8; 2048];
        loop {
            match self.socket.recv_from(&mut scratch) {
                Ok(_) => continue,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn fd(&self) -> Option<RawFd> {
        Some(self.socket.as_raw_fd())
    }
}
