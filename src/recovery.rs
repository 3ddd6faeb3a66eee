//! Error recovery.
//!
//! Converts recoverable parse errors into substitute events so malformed
//! input degrades to visible text instead of halting the editor:
//!
//! - invalid UTF-8 becomes U+FFFD;
//! - overflowed or malformed sequences replay their printable bytes as
//!   literal text (an empty byte set means skip and count);
//! - a timeout force-resolves any held key match and resets the in-flight
//!   parsers;
//! - an invalid-state report resets every sub-parser.
//!
//! Buffered stream bytes are never dropped here; only parser-internal
//! accumulation state is cleared.

use crate::error::InputError;
use crate::event::{InputPayload, ParsedInput, TextInput};
use crate::keys::KeyDetector;
use crate::mouse::MouseParser;
use crate::sequence::SequenceParser;
use crate::stream::InputStream;
use crate::utf8::Utf8Processor;

/// Per-category recovery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorStats {
    /// Encoding violations substituted with U+FFFD.
    pub encoding: u64,
    /// Malformed sequences (replayed or skipped).
    pub malformed: u64,
    /// Accumulation buffer overflows.
    pub overflows: u64,
    /// Stalled-sequence and ambiguity timeouts recovered.
    pub timeouts: u64,
    /// Full parser resets from invalid-state reports.
    pub state_resets: u64,
    /// Bytes replayed as literal text.
    pub bytes_replayed: u64,
    /// Non-printable bytes dropped during replay.
    pub bytes_dropped: u64,
}

/// Mutable views of every sub-parser, handed in per recovery call so the
/// coordinator keeps ownership.
pub struct RecoveryTargets<'a> {
    pub stream: &'a mut InputStream,
    pub utf8: &'a mut Utf8Processor,
    pub sequence: &'a mut SequenceParser,
    pub keys: &'a mut KeyDetector,
    pub mouse: &'a mut MouseParser,
}

#[derive(Debug, Default)]
pub struct ErrorRecovery {
    stats: ErrorStats,
}

impl ErrorRecovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb a recoverable error and produce its substitute events.
    pub fn recover(
        &mut self,
        error: &InputError,
        targets: RecoveryTargets<'_>,
    ) -> Vec<ParsedInput> {
        debug_assert!(error.is_recoverable());
        match error {
            InputError::InvalidEncoding { byte } => {
                tracing::debug!(byte = *byte, "invalid UTF-8, substituting U+FFFD");
                self.stats.encoding += 1;
                vec![ParsedInput::new(InputPayload::Text(
                    TextInput::replacement(),
                ))]
            }
            InputError::BufferOverflow { bytes } => {
                tracing::debug!(len = bytes.len(), "buffer overflow, replaying as text");
                self.stats.overflows += 1;
                self.replay(bytes)
            }
            InputError::InvalidFormat { context, bytes } => {
                tracing::debug!(context, len = bytes.len(), "malformed sequence");
                self.stats.malformed += 1;
                if bytes.is_empty() {
                    Vec::new()
                } else {
                    self.replay(bytes)
                }
            }
            InputError::Timeout => {
                tracing::debug!("sequence timeout, resolving held state");
                self.stats.timeouts += 1;
                let mut out = Vec::new();
                if let Some(key) = targets.keys.force_resolution() {
                    out.push(ParsedInput::key(key));
                }
                targets.sequence.reset();
                targets.mouse.reset();
                targets.utf8.reset();
                out
            }
            // InvalidState and anything unanticipated: reset every parser.
            _ => {
                tracing::debug!(%error, "unrecoverable parser state, full reset");
                self.stats.state_resets += 1;
                targets.utf8.reset();
                targets.sequence.reset();
                targets.keys.reset();
                targets.mouse.reset();
                Vec::new()
            }
        }
    }

    /// Replay bytes as literal text events. Printable ASCII comes back as
    /// typed characters; control and high bytes are dropped and counted.
    pub fn replay(&mut self, bytes: &[u8]) -> Vec<ParsedInput> {
        let mut out = Vec::new();
        for &b in bytes {
            if (0x20..=0x7E).contains(&b) {
                self.stats.bytes_replayed += 1;
                out.push(ParsedInput::text(b as char));
            } else {
                self.stats.bytes_dropped += 1;
            }
        }
        out
    }

    pub fn stats(&self) -> ErrorStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;
    use crate::event::KeyCode;
    use std::time::Instant;

    struct Fixture {
        stream: InputStream,
        utf8: Utf8Processor,
        sequence: SequenceParser,
        keys: KeyDetector,
        mouse: MouseParser,
    }

    impl Fixture {
        fn new() -> Self {
            let cfg = ParserConfig::default();
            Self {
                stream: InputStream::new(cfg.stream_capacity),
                utf8: Utf8Processor::new(),
                sequence: SequenceParser::new(cfg.sequence_buffer_capacity),
                keys: KeyDetector::new(&cfg),
                mouse: MouseParser::new(),
            }
        }

        fn targets(&mut self) -> RecoveryTargets<'_> {
            RecoveryTargets {
                stream: &mut self.stream,
                utf8: &mut self.utf8,
                sequence: &mut self.sequence,
                keys: &mut self.keys,
                mouse: &mut self.mouse,
            }
        }
    }

    #[test]
    fn test_encoding_error_substitutes_replacement() {
        let mut r = ErrorRecovery::new();
        let mut f = Fixture::new();
        let events = r.recover(&InputError::InvalidEncoding { byte: 0xFF }, f.targets());
        assert_eq!(events.len(), 1);
        match &events[0].payload {
            InputPayload::Text(t) => assert_eq!(t.codepoint, '\u{FFFD}'),
            other => panic!("expected Text, got {other:?}"),
        }
        assert_eq!(r.stats().encoding, 1);
    }

    #[test]
    fn test_overflow_replays_printables_only() {
        let mut r = ErrorRecovery::new();
        let mut f = Fixture::new();
        let events = r.recover(
            &InputError::BufferOverflow {
                bytes: b"\x1b[abc".to_vec(),
            },
            f.targets(),
        );
        let chars: Vec<char> = events
            .iter()
            .filter_map(|e| match &e.payload {
                InputPayload::Text(t) => Some(t.codepoint),
                _ => None,
            })
            .collect();
        // ESC is dropped; the printable remainder comes back as text.
        assert_eq!(chars, vec!['[', 'a', 'b', 'c']);
        assert_eq!(r.stats().bytes_dropped, 1);
        assert_eq!(r.stats().bytes_replayed, 4);
    }

    #[test]
    fn test_empty_invalid_format_skips() {
        let mut r = ErrorRecovery::new();
        let mut f = Fixture::new();
        let events = r.recover(
            &InputError::InvalidFormat {
                context: "test",
                bytes: Vec::new(),
            },
            f.targets(),
        );
        assert!(events.is_empty());
        assert_eq!(r.stats().malformed, 1);
    }

    #[test]
    fn test_timeout_force_resolves_held_key() {
        let mut r = ErrorRecovery::new();
        let mut f = Fixture::new();
        // A lone ESC is an ambiguous hold in the key detector.
        f.keys.process_sequence(b"\x1b", Instant::now());
        let events = r.recover(&InputError::Timeout, f.targets());
        assert_eq!(events.len(), 1);
        match &events[0].payload {
            InputPayload::Key(k) => assert_eq!(k.code, KeyCode::Escape),
            other => panic!("expected Key, got {other:?}"),
        }
        assert!(!f.keys.is_waiting());
    }

    #[test]
    fn test_invalid_state_resets_everything() {
        let mut r = ErrorRecovery::new();
        let mut f = Fixture::new();
        f.sequence.begin(Instant::now());
        f.utf8.process_byte(0xE4).unwrap();
        let events = r.recover(&InputError::InvalidState, f.targets());
        assert!(events.is_empty());
        assert!(!f.sequence.is_active());
        assert!(!f.utf8.has_partial());
        assert_eq!(r.stats().state_resets, 1);
    }
}
