//! Input byte stream.
//!
//! Owns the bounded buffer between the terminal descriptor and the parser.
//! Bytes arrive either from `read`/`read_timeout` on the descriptor or from
//! `buffer` (test replay and error-recovery re-injection); the parser pulls
//! them back out through `get_buffered`/`consume`/`peek`.
//!
//! The buffer self-compacts once more than half its capacity has been
//! consumed, so memory stays bounded without copying on every consume. A
//! read or injection that would exceed capacity is an overflow error, never
//! a silent truncation.

use crate::error::InputError;

#[cfg(unix)]
use std::os::unix::io::RawFd;

/// Running counters for the stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Total bytes accepted into the buffer.
    pub bytes_in: u64,
    /// Reads/injections rejected because the buffer was full.
    pub overflows: u64,
}

/// Fixed-capacity byte buffer fed from a terminal descriptor.
#[derive(Debug)]
pub struct InputStream {
    #[cfg(unix)]
    fd: Option<RawFd>,
    buf: Vec<u8>,
    read_pos: usize,
    capacity: usize,
    blocking: bool,
    flow_paused: bool,
    stats: StreamStats,
}

impl InputStream {
    /// A stream with no descriptor: bytes arrive only via [`buffer`].
    ///
    /// [`buffer`]: InputStream::buffer
    pub fn new(capacity: usize) -> Self {
        Self {
            #[cfg(unix)]
            fd: None,
            buf: Vec::with_capacity(capacity.min(4096)),
            read_pos: 0,
            capacity,
            blocking: true,
            flow_paused: false,
            stats: StreamStats::default(),
        }
    }

    /// A stream reading from an already-open descriptor (not owned; the
    /// caller closes it).
    #[cfg(unix)]
    pub fn from_fd(fd: RawFd, capacity: usize) -> Self {
        let mut s = Self::new(capacity);
        s.fd = Some(fd);
        s
    }

    /// A stream on stdin.
    #[cfg(unix)]
    pub fn stdin(capacity: usize) -> Self {
        Self::from_fd(libc::STDIN_FILENO, capacity)
    }

    // =========================================================================
    // Descriptor reads
    // =========================================================================

    /// Read up to `max` bytes from the descriptor into the buffer.
    ///
    /// Returns the number of bytes read; 0 means EOF, no data in
    /// non-blocking mode, or flow control paused.
    #[cfg(unix)]
    pub fn read(&mut self, max: usize) -> Result<usize, InputError> {
        if self.flow_paused {
            return Ok(0);
        }
        let fd = self
            .fd
            .ok_or(InputError::InvalidParameter("stream has no descriptor"))?;

        self.compact_if_needed();
        let room = self.capacity - self.available();
        if room == 0 {
            self.stats.overflows += 1;
            return Err(InputError::BufferOverflow { bytes: Vec::new() });
        }

        let want = max.min(room);
        let mut chunk = vec![0u8; want];
        loop {
            let n = unsafe { libc::read(fd, chunk.as_mut_ptr().cast(), want) };
            if n >= 0 {
                let n = n as usize;
                self.buf.extend_from_slice(&chunk[..n]);
                self.stats.bytes_in += n as u64;
                return Ok(n);
            }
            let err = std::io::Error::last_os_error();
            match err.kind() {
                std::io::ErrorKind::Interrupted => continue,
                std::io::ErrorKind::WouldBlock => return Ok(0),
                _ => return Err(InputError::SystemCall(err)),
            }
        }
    }

    /// Wait up to `timeout` for readability, then read. A `None` timeout
    /// blocks indefinitely; `Some(ZERO)` is a pure poll.
    #[cfg(unix)]
    pub fn read_timeout(
        &mut self,
        max: usize,
        timeout: Option<std::time::Duration>,
    ) -> Result<usize, InputError> {
        if self.flow_paused {
            return Ok(0);
        }
        let fd = self
            .fd
            .ok_or(InputError::InvalidParameter("stream has no descriptor"))?;

        let mut pollfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let timeout_ms = match timeout {
            Some(t) => i32::try_from(t.as_millis()).unwrap_or(i32::MAX),
            None => -1,
        };
        let rc = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                // A signal woke us; the caller's loop checks its flags.
                return Ok(0);
            }
            return Err(InputError::SystemCall(err));
        }
        if rc == 0 {
            return Ok(0);
        }
        self.read(max)
    }

    /// Switch the descriptor between blocking and non-blocking mode.
    #[cfg(unix)]
    pub fn set_blocking(&mut self, blocking: bool) -> Result<(), InputError> {
        if let Some(fd) = self.fd {
            let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
            if flags < 0 {
                return Err(InputError::SystemCall(std::io::Error::last_os_error()));
            }
            let flags = if blocking {
                flags & !libc::O_NONBLOCK
            } else {
                flags | libc::O_NONBLOCK
            };
            if unsafe { libc::fcntl(fd, libc::F_SETFL, flags) } < 0 {
                return Err(InputError::SystemCall(std::io::Error::last_os_error()));
            }
        }
        self.blocking = blocking;
        Ok(())
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    // =========================================================================
    // Buffer access
    // =========================================================================

    /// Inject bytes directly, bypassing the descriptor. Used for test replay
    /// and recovery re-injection.
    pub fn buffer(&mut self, data: &[u8]) -> Result<(), InputError> {
        self.compact_if_needed();
        if self.available() + data.len() > self.capacity {
            self.stats.overflows += 1;
            return Err(InputError::BufferOverflow {
                bytes: data.to_vec(),
            });
        }
        self.buf.extend_from_slice(data);
        self.stats.bytes_in += data.len() as u64;
        Ok(())
    }

    /// The unconsumed bytes.
    pub fn get_buffered(&self) -> &[u8] {
        &self.buf[self.read_pos..]
    }

    /// Mark `n` bytes consumed. Consuming beyond the available bytes is a
    /// contract violation.
    pub fn consume(&mut self, n: usize) -> Result<(), InputError> {
        if n > self.available() {
            return Err(InputError::InvalidParameter(
                "consume beyond buffered bytes",
            ));
        }
        self.read_pos += n;
        self.compact_if_needed();
        Ok(())
    }

    /// Look at an unconsumed byte without consuming it.
    pub fn peek(&self, offset: usize) -> Option<u8> {
        self.buf.get(self.read_pos + offset).copied()
    }

    /// Number of unconsumed bytes.
    pub fn get_available(&self) -> usize {
        self.available()
    }

    /// Pause or resume accepting new bytes from the descriptor.
    pub fn set_flow_control(&mut self, paused: bool) {
        self.flow_paused = paused;
    }

    pub fn is_flow_paused(&self) -> bool {
        self.flow_paused
    }

    /// Drop all buffered data. Counters survive; the descriptor and mode
    /// flags are untouched.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.read_pos = 0;
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    fn available(&self) -> usize {
        self.buf.len() - self.read_pos
    }

    /// Move the unread tail to offset 0 once more than half the capacity has
    /// been consumed.
    fn compact_if_needed(&mut self) {
        if self.read_pos > self.capacity / 2 {
            self.buf.drain(..self.read_pos);
            self.read_pos = 0;
        }
    }
}
