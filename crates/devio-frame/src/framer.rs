use std::fmt;
use std::time::{Duration, SystemTime};

use devio_transport::{IoStream, TransportError};
use tracing::debug;

use crate::error::{FrameError, Result, TimeoutKind};
use crate::extractor::{Extract, PacketExtractor};
use crate::listener::{IoListener, ListenerId, ListenerSet};
use crate::status::Status;
use crate::timeout::Timeout;

/// Default read and write budget when none is given explicitly.
const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(1);

/// Margin added to the packet bound to derive the default first-byte
/// bound. The layering rule then treats the result as disabled.
const DEFAULT_FIRST_BYTE_MARGIN: Duration = Duration::from_secs(1);

/// Location of a packet candidate inside one buffer snapshot.
///
/// `size == 0` means no packet; `start` then covers leading bytes the
/// search decided to discard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidate {
    start: usize,
    size: usize,
}

/// Byte counts tentatively accepted while searching in extract-last mode.
#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    bad: u64,
    good: u64,
    touched: bool,
}

/// Search one buffer snapshot for a packet.
///
/// Walks the buffer with a rolling offset, consulting the extractor after
/// every skip. First-match mode returns the earliest packet; extract-last
/// mode keeps walking and returns the freshest one. In extract-last mode
/// every non-[`NeedMore`](Extract::NeedMore) verdict is tentatively
/// accepted into `tally`, even when a later candidate supersedes it —
/// that is how the throughput counters are defined.
fn search<E: PacketExtractor>(
    extractor: &E,
    buf: &[u8],
    extract_last: bool,
    tally: &mut Tally,
) -> Result<Candidate> {
    let mut offset = 0;
    let mut first_candidate = None;
    let mut last_packet = None;

    while offset < buf.len() {
        let window = &buf[offset..];
        let (start, size) = match extractor.extract(window) {
            Extract::NeedMore => break,
            Extract::Skip(count) => {
                let count = count.get();
                if count > window.len() {
                    return Err(FrameError::ExtractorOverrun {
                        claimed: count,
                        available: window.len(),
                    });
                }
                (count, 0)
            }
            Extract::Packet(len) => {
                let len = len.get();
                if len > window.len() {
                    return Err(FrameError::ExtractorOverrun {
                        claimed: len,
                        available: window.len(),
                    });
                }
                (0, len)
            }
        };

        if extract_last {
            tally.bad += start as u64;
            tally.good += size as u64;
            tally.touched = true;
        }

        let candidate = Candidate {
            start: offset + start,
            size,
        };
        if first_candidate.is_none() {
            first_candidate = Some(candidate);
        }

        if size > 0 {
            if !extract_last {
                return Ok(candidate);
            }
            last_packet = Some(candidate);
        }

        offset += start + size;
    }

    if extract_last {
        // Freshest packet wins; with none found, only the leading
        // candidate's span is reported as discardable.
        return Ok(last_packet
            .or(first_candidate)
            .unwrap_or(Candidate { start: 0, size: 0 }));
    }

    // Nothing but garbage (and possibly an undecided tail): report the
    // skipped span so the caller compacts it away.
    Ok(Candidate {
        start: offset,
        size: 0,
    })
}

/// Turns an unreliable byte stream into discrete packets.
///
/// A `Framer` owns a bounded staging buffer of `max_packet_size` bytes,
/// an optional transport stream and a set of passive I/O listeners. The
/// supplied [`PacketExtractor`] decides where packets begin and end; the
/// framer drives the stream under layered first-byte / whole-packet
/// timeouts and keeps byte-level accounting in a [`Status`].
///
/// A framer is single-threaded cooperative: every operation takes
/// `&mut self` and the only blocking points are the stream's deadline-
/// bounded readiness waits.
pub struct Framer<E> {
    extractor: E,
    buf: Box<[u8]>,
    used: usize,
    stream: Option<Box<dyn IoStream>>,
    listeners: ListenerSet,
    extract_last: bool,
    read_timeout: Duration,
    write_timeout: Duration,
    stats: Status,
}

impl<E: PacketExtractor> Framer<E> {
    /// Create a framer delivering the earliest packet candidate per
    /// buffer snapshot.
    ///
    /// # Panics
    ///
    /// Panics when `max_packet_size` is zero.
    pub fn new(max_packet_size: usize, extractor: E) -> Self {
        Self::with_extract_last(max_packet_size, extractor, false)
    }

    /// Create a framer with an explicit packet selection policy.
    ///
    /// # Panics
    ///
    /// Panics when `max_packet_size` is zero.
    pub fn with_extract_last(max_packet_size: usize, extractor: E, extract_last: bool) -> Self {
        assert!(max_packet_size > 0, "max_packet_size must be positive");
        Self {
            extractor,
            buf: vec![0u8; max_packet_size].into_boxed_slice(),
            used: 0,
            stream: None,
            listeners: ListenerSet::default(),
            extract_last,
            read_timeout: DEFAULT_IO_TIMEOUT,
            write_timeout: DEFAULT_IO_TIMEOUT,
            stats: Status::default(),
        }
    }

    /// Capacity of the internal buffer, and the minimum size of any
    /// caller-supplied output buffer.
    pub fn max_packet_size(&self) -> usize {
        self.buf.len()
    }

    /// Attach a stream, dropping any previous one.
    pub fn set_stream(&mut self, stream: Box<dyn IoStream>) {
        self.stream = Some(stream);
    }

    /// The attached stream, if any.
    pub fn stream(&self) -> Option<&dyn IoStream> {
        self.stream.as_deref()
    }

    /// Mutable access to the attached stream, if any.
    pub fn stream_mut(&mut self) -> Option<&mut (dyn IoStream + '_)> {
        self.stream.as_mut().map(|s| &mut **s as &mut (dyn IoStream + '_))
    }

    /// Detach and drop the attached stream.
    pub fn close(&mut self) {
        self.stream = None;
    }

    /// True when a stream is attached.
    pub fn is_valid(&self) -> bool {
        self.stream.is_some()
    }

    /// Register a listener; the returned handle removes it again.
    pub fn add_listener(&mut self, listener: Box<dyn IoListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    /// Remove a listener, returning it to the caller.
    pub fn remove_listener(&mut self, id: ListenerId) -> Option<Box<dyn IoListener>> {
        self.listeners.remove(id)
    }

    /// Select last-match (`true`) or first-match packet selection.
    pub fn set_extract_last(&mut self, extract_last: bool) {
        self.extract_last = extract_last;
    }

    /// Current packet selection policy.
    pub fn extract_last(&self) -> bool {
        self.extract_last
    }

    /// Set the default budget for [`read_packet`](Self::read_packet).
    pub fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    /// Default read budget.
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Set the default budget for [`write_packet`](Self::write_packet).
    pub fn set_write_timeout(&mut self, timeout: Duration) {
        self.write_timeout = timeout;
    }

    /// Default write budget.
    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// Snapshot of the I/O counters with `queued_bytes` filled in.
    pub fn status(&self) -> Status {
        let mut stats = self.stats.clone();
        stats.queued_bytes = self.used;
        stats
    }

    /// Zero all counters and clear the activity stamp.
    ///
    /// The internal buffer and the stream are untouched; see
    /// [`clear`](Self::clear) for those.
    pub fn reset_status(&mut self) {
        self.stats = Status::default();
    }

    /// Discard transport-buffered and internally staged bytes.
    ///
    /// Statistics are untouched; see [`reset_status`](Self::reset_status)
    /// for those.
    pub fn clear(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.as_deref_mut() {
            stream.clear()?;
        }
        self.used = 0;
        Ok(())
    }

    /// Stage bytes directly into the internal buffer, bypassing the
    /// stream.
    ///
    /// This is the out-of-band route for callers that receive device
    /// bytes through a side channel: [`read_packet`](Self::read_packet)
    /// frames them even with no stream attached. Listeners and counters
    /// only see bytes once framing decides their fate.
    pub fn push_bytes(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > self.buf.len() - self.used {
            return Err(FrameError::PacketTooLarge {
                max_packet_size: self.buf.len(),
            });
        }
        self.buf[self.used..self.used + data.len()].copy_from_slice(data);
        self.used += data.len();
        Ok(())
    }

    /// True when the current internal buffer already holds a complete
    /// packet.
    ///
    /// Side-effect free: statistics are not touched, and a misbehaving
    /// extractor reads as `false` here and surfaces as an error on the
    /// next read.
    pub fn has_packet(&self) -> bool {
        if self.used == 0 {
            return false;
        }
        let mut tally = Tally::default();
        match search(
            &self.extractor,
            &self.buf[..self.used],
            self.extract_last,
            &mut tally,
        ) {
            Ok(candidate) => candidate.size > 0,
            Err(_) => false,
        }
    }

    /// Run one packet search against the internal buffer, copy the
    /// winning packet (possibly empty) into `out` and compact the buffer.
    fn do_packet_extraction(&mut self, out: &mut [u8]) -> Result<usize> {
        let mut tally = Tally::default();
        let candidate = search(
            &self.extractor,
            &self.buf[..self.used],
            self.extract_last,
            &mut tally,
        )?;

        if self.extract_last {
            if tally.touched {
                self.stats.stamp = Some(SystemTime::now());
                self.stats.bad_rx += tally.bad;
                self.stats.good_rx += tally.good;
            }
        } else {
            self.stats.stamp = Some(SystemTime::now());
            self.stats.bad_rx += candidate.start as u64;
            self.stats.good_rx += candidate.size as u64;
        }

        let consumed = candidate.start + candidate.size;
        out[..candidate.size].copy_from_slice(&self.buf[candidate.start..consumed]);
        // The regions overlap whenever a packet is cut out of the middle.
        self.buf.copy_within(consumed..self.used, 0);
        self.used -= consumed;

        Ok(candidate.size)
    }

    /// Drain packets from the internal buffer alone, without touching the
    /// stream. The boolean mirrors `read_packet_internal`'s "read
    /// something" flag and is always false here.
    fn extract_from_internal(&mut self, out: &mut [u8]) -> Result<(usize, bool)> {
        let mut result = 0;
        while self.used > 0 {
            let size = self.do_packet_extraction(out)?;
            if size > 0 {
                result = size;
            }
            if size == 0 || !self.extract_last {
                break;
            }
        }
        Ok((result, false))
    }

    /// One non-blocking pass: drain the staged bytes, then pull whatever
    /// the stream has ready, extracting after every read.
    fn read_packet_internal(&mut self, out: &mut [u8]) -> Result<(usize, bool)> {
        if out.len() < self.buf.len() {
            return Err(FrameError::BufferTooSmall {
                got: out.len(),
                need: self.buf.len(),
            });
        }

        let mut packet_size = 0;
        if self.used > 0 {
            packet_size = self.do_packet_extraction(out)?;
            if packet_size > 0 && !self.extract_last {
                return Ok((packet_size, false));
            }
        }

        let mut received_something = false;
        loop {
            let read = match self.stream {
                Some(ref mut stream) => stream.read(&mut self.buf[self.used..])?,
                None => return Err(FrameError::NotOpen),
            };
            if read == 0 {
                return Ok((packet_size, received_something));
            }

            self.listeners
                .notify_read(&self.buf[self.used..self.used + read]);
            received_something = true;
            self.used += read;

            let new_packet = self.do_packet_extraction(out)?;
            if new_packet > 0 {
                if !self.extract_last {
                    return Ok((new_packet, true));
                }
                packet_size = new_packet;
            }

            if self.used == self.buf.len() {
                return Err(FrameError::PacketTooLarge {
                    max_packet_size: self.buf.len(),
                });
            }
        }
    }

    /// Read one packet using the default read timeout for both bounds.
    pub fn read_packet(&mut self, out: &mut [u8]) -> Result<usize> {
        self.read_packet_with_timeout(out, self.read_timeout)
    }

    /// Read one packet, waiting up to `packet_timeout` for it to
    /// complete.
    ///
    /// The first-byte bound defaults to `packet_timeout + 1s`, which the
    /// layering rule treats as disabled.
    pub fn read_packet_with_timeout(
        &mut self,
        out: &mut [u8],
        packet_timeout: Duration,
    ) -> Result<usize> {
        self.read_packet_with_timeouts(
            out,
            packet_timeout,
            packet_timeout + DEFAULT_FIRST_BYTE_MARGIN,
        )
    }

    /// Read one packet under layered timeouts.
    ///
    /// `first_byte_timeout` bounds the wait for any byte at all and is
    /// meant as the earlier failure bound; when it exceeds
    /// `packet_timeout` it is disabled. `packet_timeout` bounds the whole
    /// packet. A zero `packet_timeout` fails immediately unless a packet
    /// can be cut from bytes already buffered.
    ///
    /// Without an attached stream the internal buffer alone is served,
    /// supporting the out-of-band route of
    /// [`push_bytes`](Self::push_bytes).
    pub fn read_packet_with_timeouts(
        &mut self,
        out: &mut [u8],
        packet_timeout: Duration,
        first_byte_timeout: Duration,
    ) -> Result<usize> {
        let first_byte_timeout =
            (first_byte_timeout <= packet_timeout).then_some(first_byte_timeout);

        if out.len() < self.buf.len() {
            return Err(FrameError::BufferTooSmall {
                got: out.len(),
                need: self.buf.len(),
            });
        }

        if self.stream.is_none() {
            let (size, _) = self.extract_from_internal(out)?;
            if size > 0 {
                return Ok(size);
            }
            debug!("no packet in the internal buffer and no stream to read from");
            return Err(FrameError::Timeout {
                kind: TimeoutKind::Packet,
                waited: Duration::ZERO,
            });
        }

        let deadline = Timeout::default();
        let mut read_something = false;
        loop {
            let (packet_size, got_data) = self.read_packet_internal(out)?;
            read_something = read_something || got_data;
            if packet_size > 0 {
                return Ok(packet_size);
            }

            if packet_timeout.is_zero() && !read_something {
                return Err(FrameError::Timeout {
                    kind: TimeoutKind::FirstByte,
                    waited: Duration::ZERO,
                });
            }

            let (bound, kind) = match first_byte_timeout {
                Some(first_byte) if !read_something => (first_byte, TimeoutKind::FirstByte),
                _ => (packet_timeout, TimeoutKind::Packet),
            };

            if deadline.elapsed_with(bound) {
                return Err(FrameError::Timeout {
                    kind,
                    waited: bound,
                });
            }

            let remaining = deadline.remaining_with(bound);
            let wait = match self.stream.as_deref_mut() {
                Some(stream) => stream.wait_read(remaining),
                None => return Err(FrameError::NotOpen),
            };
            match wait {
                Ok(()) => {}
                Err(TransportError::WaitTimeout) => {
                    return Err(FrameError::Timeout {
                        kind,
                        waited: bound,
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Write all of `data` using the default write timeout.
    pub fn write_packet(&mut self, data: &[u8]) -> Result<()> {
        self.write_packet_with_timeout(data, self.write_timeout)
    }

    /// Write all of `data`, failing once `timeout` elapses.
    ///
    /// Listeners observe every successfully written span before the
    /// transmit counter is updated. Partial progress is invisible to the
    /// caller: either everything is written, or the call fails.
    pub fn write_packet_with_timeout(&mut self, data: &[u8], timeout: Duration) -> Result<()> {
        if self.stream.is_none() {
            return Err(FrameError::NotOpen);
        }

        let deadline = Timeout::new(timeout);
        let mut written = 0;
        loop {
            let sent = match self.stream.as_deref_mut() {
                Some(stream) => stream.write(&data[written..])?,
                None => return Err(FrameError::NotOpen),
            };
            if sent > 0 {
                self.listeners.notify_write(&data[written..written + sent]);
                written += sent;
            }

            if written == data.len() {
                self.stats.stamp = Some(SystemTime::now());
                self.stats.tx += data.len() as u64;
                return Ok(());
            }

            if deadline.elapsed() {
                return Err(FrameError::Timeout {
                    kind: TimeoutKind::Packet,
                    waited: timeout,
                });
            }

            let remaining = deadline.remaining();
            let wait = match self.stream.as_deref_mut() {
                Some(stream) => stream.wait_write(remaining),
                None => return Err(FrameError::NotOpen),
            };
            match wait {
                Ok(()) => {}
                Err(TransportError::WaitTimeout) => {
                    return Err(FrameError::Timeout {
                        kind: TimeoutKind::Packet,
                        waited: timeout,
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

impl<E> fmt::Debug for Framer<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Framer")
            .field("max_packet_size", &self.buf.len())
            .field("used", &self.used)
            .field("extract_last", &self.extract_last)
            .field("stream", &self.stream.is_some())
            .finish()
    }
}
