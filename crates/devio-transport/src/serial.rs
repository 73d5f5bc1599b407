use std::fs::OpenOptions;
use std::io;
use std::os::fd::IntoRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use tracing::info;

use crate::error::{Result, TransportError};
use crate::fd::FdStream;

/// Map a numeric baud rate to its termios constant.
///
/// Rates above 230400 only exist on Linux.
fn baud_constant(rate: u32) -> Option<libc::speed_t> {
    match rate {
        1200 => Some(libc::B1200),
        2400 => Some(libc::B2400),
        4800 => Some(libc::B4800),
        9600 => Some(libc::B9600),
        19200 => Some(libc::B19200),
        38400 => Some(libc::B38400),
        57600 => Some(libc::B57600),
        115200 => Some(libc::B115200),
        230400 => Some(libc::B230400),
        #[cfg(target_os = "linux")]
        460800 => Some(libc::B460800),
        #[cfg(target_os = "linux")]
        576000 => Some(libc::B576000),
        #[cfg(target_os = "linux")]
        921600 => Some(libc::B921600),
        _ => None,
    }
}

/// Open and configure a serial device.
///
/// The line is set up raw: 8 data bits, receiver enabled, breaks ignored,
/// no flow control, at the requested baud rate. The descriptor is
/// non-blocking and owned by the returned stream.
pub fn open(path: impl AsRef<Path>, baud_rate: u32) -> Result<FdStream> {
    let path = path.as_ref();
    let speed = baud_constant(baud_rate).ok_or(TransportError::UnsupportedBaudRate(baud_rate))?;

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOCTTY | libc::O_SYNC | libc::O_NONBLOCK)
        .open(path)
        .map_err(|source| TransportError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    // The stream takes ownership first so the descriptor is closed again
    // if line configuration fails below.
    let stream = FdStream::new(file.into_raw_fd(), true);
    let fd = stream.as_raw_fd();

    // SAFETY: an all-zero termios is a valid starting configuration.
    let mut tio: libc::termios = unsafe { std::mem::zeroed() };
    tio.c_cflag = libc::CS8 | libc::CREAD;
    tio.c_iflag = libc::IGNBRK;

    // SAFETY: `tio` is a valid termios and `fd` is open for the whole call.
    let rc = unsafe { libc::cfsetispeed(&mut tio, speed) };
    if rc != 0 {
        return Err(TransportError::Open {
            path: path.to_path_buf(),
            source: io::Error::last_os_error(),
        });
    }
    // SAFETY: see above.
    let rc = unsafe { libc::cfsetospeed(&mut tio, speed) };
    if rc != 0 {
        return Err(TransportError::Open {
            path: path.to_path_buf(),
            source: io::Error::last_os_error(),
        });
    }
    // SAFETY: see above.
    let rc = unsafe { libc::tcsetattr(fd, libc::TCSANOW, &tio) };
    if rc != 0 {
        return Err(TransportError::Open {
            path: path.to_path_buf(),
            source: io::Error::last_os_error(),
        });
    }

    info!(?path, baud_rate, "opened serial device");
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_baud_rate() {
        let err = open("/dev/null", 31250).unwrap_err();
        assert!(matches!(err, TransportError::UnsupportedBaudRate(31250)));
    }

    #[test]
    fn rejects_missing_device() {
        let err = open("/nonexistent/devio/tty", 115200).unwrap_err();
        assert!(matches!(err, TransportError::Open { .. }));
    }

    #[test]
    fn standard_rates_have_constants() {
        for rate in [1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200, 230400] {
            assert!(baud_constant(rate).is_some(), "rate {rate} should map");
        }
        assert!(baud_constant(12345).is_none());
    }
}
