//! Error taxonomy for the input parsing engine.
//!
//! The split that matters here is recoverable vs. not:
//!
//! - `InvalidEncoding`, `InvalidFormat`, `BufferOverflow`, `Timeout` and
//!   `InvalidState` are absorbed by the recovery layer and converted into a
//!   substitute event or silent continuation. They never reach the caller.
//! - `InvalidParameter` is a contract violation and fails fast.
//! - `SystemCall` is an I/O failure on the underlying descriptor.
//! - `OutOfMemory` is allocator exhaustion, propagated as-is.
//!
//! No malformed byte sequence, however truncated or mistimed, may halt line
//! editing. The worst the user sees is a replacement character or the literal
//! bytes instead of the intended symbolic construct.

use std::io;
use thiserror::Error;

/// Errors produced while turning raw terminal bytes into input events.
#[derive(Debug, Error)]
pub enum InputError {
    /// Caller violated an API contract (e.g. `consume` beyond available).
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// Allocation failed. Propagated to the caller.
    #[error("out of memory")]
    OutOfMemory,

    /// A byte violated UTF-8 encoding rules.
    #[error("invalid UTF-8 encoding at byte {byte:#04x}")]
    InvalidEncoding { byte: u8 },

    /// A structurally malformed escape or mouse sequence.
    ///
    /// `bytes` holds the offending bytes when they are worth replaying as
    /// literal text; an empty vector means skip-and-continue.
    #[error("malformed sequence ({context})")]
    InvalidFormat {
        context: &'static str,
        bytes: Vec<u8>,
    },

    /// An accumulation buffer hit its capacity limit.
    ///
    /// Carries the accumulated bytes so recovery can replay them.
    #[error("buffer overflow ({} bytes)", bytes.len())]
    BufferOverflow { bytes: Vec<u8> },

    /// A sequence stalled past its completion deadline.
    #[error("sequence timed out")]
    Timeout,

    /// A sub-parser observed a state it cannot make progress from.
    #[error("invalid parser state")]
    InvalidState,

    /// The underlying read/poll/fcntl call failed.
    #[error("system call failed: {0}")]
    SystemCall(#[from] io::Error),
}

impl InputError {
    /// Whether the recovery layer absorbs this error.
    ///
    /// Non-recoverable errors (`InvalidParameter`, `OutOfMemory`,
    /// `SystemCall`) propagate to the caller as real failures.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            InputError::InvalidParameter(_)
                | InputError::OutOfMemory
                | InputError::SystemCall(_)
        )
    }
}
