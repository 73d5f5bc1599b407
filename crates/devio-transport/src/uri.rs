use std::str::FromStr;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::stream::IoStream;
use crate::test::TestStream;
use crate::{fd, serial, tcp, udp};

/// Open a transport described by a URI.
///
/// Recognized forms:
/// - `serial://device:baud`
/// - `tcp://host:port`
/// - `udp://host:port`, or bidirectional `udp://host:out_port:in_port`
/// - `udpserver://port`
/// - `file://path`
/// - `test://`
pub fn open(uri: &str) -> Result<Box<dyn IoStream>> {
    let (scheme, rest) = uri
        .split_once("://")
        .ok_or_else(|| TransportError::UnknownScheme(uri.to_string()))?;
    debug!(scheme, "opening stream from URI");

    match scheme {
        "serial" => {
            let (device, baud) = split_tail(rest, uri, "missing baud rate")?;
            let baud = parse_num(baud, uri, "baud rate is not a number")?;
            Ok(Box::new(serial::open(device, baud)?))
        }
        "tcp" => {
            let (host, port) = split_tail(rest, uri, "missing port")?;
            let port = parse_num(port, uri, "port is not a number")?;
            Ok(Box::new(tcp::connect(host, port)?))
        }
        "udp" => {
            let (head, tail) = split_tail(rest, uri, "missing port")?;
            let tail_port = parse_num(tail, uri, "port is not a number")?;
            match head.rsplit_once(':') {
                Some((host, out_port)) => {
                    let out_port = parse_num(out_port, uri, "port is not a number")?;
                    Ok(Box::new(udp::bind_bidirectional(host, out_port, tail_port)?))
                }
                None => Ok(Box::new(udp::connect(head, tail_port)?)),
            }
        }
        "udpserver" => {
            let port = parse_num(rest, uri, "port is not a number")?;
            Ok(Box::new(udp::bind_server(port)?))
        }
        "file" => Ok(Box::new(fd::open_file(rest)?)),
        "test" => Ok(Box::new(TestStream::new())),
        _ => Err(TransportError::UnknownScheme(uri.to_string())),
    }
}

fn split_tail<'a>(rest: &'a str, uri: &str, reason: &'static str) -> Result<(&'a str, &'a str)> {
    rest.rsplit_once(':')
        .ok_or_else(|| TransportError::InvalidUri {
            uri: uri.to_string(),
            reason,
        })
}

fn parse_num<T: FromStr>(text: &str, uri: &str, reason: &'static str) -> Result<T> {
    text.parse().map_err(|_| TransportError::InvalidUri {
        uri: uri.to_string(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_opens_in_memory_stream() {
        let stream = open("test://").unwrap();
        assert!(stream.fd().is_none());
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let err = open("carrier-pigeon://coop").unwrap_err();
        assert!(matches!(err, TransportError::UnknownScheme(_)));

        let err = open("not a uri at all").unwrap_err();
        assert!(matches!(err, TransportError::UnknownScheme(_)));
    }

    #[test]
    fn serial_requires_baud_rate() {
        let err = open("serial:///dev/ttyUSB0").unwrap_err();
        assert!(matches!(
            err,
            TransportError::InvalidUri {
                reason: "missing baud rate",
                ..
            }
        ));

        let err = open("serial:///dev/ttyUSB0:fast").unwrap_err();
        assert!(matches!(err, TransportError::InvalidUri { .. }));
    }

    #[test]
    fn tcp_requires_numeric_port() {
        let err = open("tcp://localhost").unwrap_err();
        assert!(matches!(err, TransportError::InvalidUri { .. }));

        let err = open("tcp://localhost:http").unwrap_err();
        assert!(matches!(err, TransportError::InvalidUri { .. }));
    }

    #[test]
    fn udpserver_binds() {
        let stream = open("udpserver://0").unwrap();
        assert!(stream.fd().is_some());
    }

    #[test]
    fn udp_client_resolves_loopback() {
        let stream = open("udp://127.0.0.1:9").unwrap();
        assert!(stream.fd().is_some());
    }

    #[test]
    fn bad_serial_rate_in_uri() {
        let err = open("serial:///dev/null:31250").unwrap_err();
        assert!(matches!(err, TransportError::UnsupportedBaudRate(31250)));
    }
}
