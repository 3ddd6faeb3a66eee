//! Parser system coordinator.
//!
//! Owns the stream, the sub-parsers, and the recovery layer, and routes
//! every byte to exactly one consumer:
//!
//! ```text
//!                    ┌──────────────┐
//!   raw bytes ─────▶ │ InputStream  │
//!                    └──────┬───────┘
//!                           │ one byte at a time
//!              ┌────────────┼────────────────┐
//!              ▼            ▼                ▼
//!        MouseParser  SequenceParser   Utf8Processor
//!              │            │                │
//!              │            ▼                │
//!              │       KeyDetector           │
//!              └────────────┼────────────────┘
//!                           ▼
//!                     ParsedInput
//! ```
//!
//! Routing priority: an active mouse report wins, then an active escape
//! sequence, then bracketed-paste accumulation, then normal-state dispatch
//! on the byte class (ESC, control byte, UTF-8). Recoverable errors from
//! any sub-parser detour through [`ErrorRecovery`] and come back as
//! substitute events.

use std::time::{Duration, Instant};

use crate::config::ParserConfig;
use crate::error::InputError;
use crate::event::{
    ControlSequence, InputPayload, KeyCode, KeyInput, Modifiers, ParsedInput, SequenceKind,
    TextInput,
};
use crate::keys::{KeyDetector, KeyMatch, KeyStats};
use crate::mouse::{MouseParser, MouseStats};
use crate::recovery::{ErrorRecovery, ErrorStats, RecoveryTargets};
use crate::sequence::{SequenceParser, SequenceStats, SequenceStep};
use crate::stream::{InputStream, StreamStats};
use crate::utf8::{Utf8Processor, Utf8Stats};

/// Bytes requested per descriptor read.
#[cfg(unix)]
const READ_CHUNK: usize = 1024;

/// Paste accumulation flushes at this size; content is emitted in segments
/// rather than growing without bound.
const PASTE_FLUSH_LIMIT: usize = 64 * 1024;

const PASTE_END: &[u8] = b"\x1b[201~";

// =============================================================================
// State machine
// =============================================================================

/// Coordinator-level parse state, mirroring which consumer owns the next
/// byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParserState {
    #[default]
    Normal,
    /// Bare ESC seen, family not yet known.
    Escape,
    Csi,
    Osc,
    Dcs,
    SingleShift,
    /// Mid multi-byte UTF-8 sequence.
    Utf8,
    Mouse,
    Paste,
    Recovery,
}

/// Tracks the current state plus transition counters.
#[derive(Debug, Default)]
pub struct ParserStateMachine {
    current: ParserState,
    previous: ParserState,
    transitions: u64,
    recoveries: u64,
}

impl ParserStateMachine {
    fn transition(&mut self, to: ParserState) {
        if to == self.current {
            return;
        }
        self.previous = self.current;
        self.current = to;
        self.transitions += 1;
        if to == ParserState::Recovery {
            self.recoveries += 1;
        }
    }

    pub fn current(&self) -> ParserState {
        self.current
    }

    pub fn previous(&self) -> ParserState {
        self.previous
    }

    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    pub fn recoveries(&self) -> u64 {
        self.recoveries
    }
}

// =============================================================================
// Metrics
// =============================================================================

/// Aggregated counters from every component.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParserMetrics {
    pub stream: StreamStats,
    pub utf8: Utf8Stats,
    pub sequence: SequenceStats,
    pub keys: KeyStats,
    pub mouse: MouseStats,
    pub errors: ErrorStats,
    pub state_transitions: u64,
    pub recoveries: u64,
}

// =============================================================================
// Coordinator
// =============================================================================

/// The full input parsing system: feed bytes in, get [`ParsedInput`] out.
///
/// All timing is injected through `now` arguments so timeout behavior is
/// deterministic under test; the descriptor-driven [`read_events`] wrapper
/// supplies wall-clock time itself.
///
/// [`read_events`]: InputParserSystem::read_events
#[derive(Debug)]
pub struct InputParserSystem {
    config: ParserConfig,
    stream: InputStream,
    utf8: Utf8Processor,
    sequence: SequenceParser,
    keys: KeyDetector,
    mouse: MouseParser,
    recovery: ErrorRecovery,
    state: ParserStateMachine,
    /// Accumulating paste content while bracketed-paste mode is active.
    paste: Option<Vec<u8>>,
    /// First-byte timestamp of the construct being parsed.
    construct_start: Option<Instant>,
}

impl InputParserSystem {
    /// A system with no descriptor: bytes arrive via [`process_data`].
    ///
    /// [`process_data`]: InputParserSystem::process_data
    pub fn new(config: ParserConfig) -> Self {
        Self {
            stream: InputStream::new(config.stream_capacity),
            utf8: Utf8Processor::new(),
            sequence: SequenceParser::new(config.sequence_buffer_capacity),
            keys: KeyDetector::new(&config),
            mouse: MouseParser::new(),
            recovery: ErrorRecovery::new(),
            state: ParserStateMachine::default(),
            paste: None,
            construct_start: None,
            config,
        }
    }

    /// A system reading from an already-open descriptor.
    #[cfg(unix)]
    pub fn with_fd(fd: std::os::unix::io::RawFd, config: ParserConfig) -> Self {
        let mut s = Self::new(config.clone());
        s.stream = InputStream::from_fd(fd, config.stream_capacity);
        s
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    /// Buffer `data` and parse as far as possible. Timeout checks run after
    /// the drain, so a stalled construct resolves on the next call even with
    /// empty `data`.
    pub fn process_data(
        &mut self,
        data: &[u8],
        now: Instant,
    ) -> Result<Vec<ParsedInput>, InputError> {
        let mut out = Vec::new();
        if !data.is_empty() {
            if let Err(err) = self.stream.buffer(data) {
                self.absorb(err, &mut out)?;
            }
        }
        self.drain(now, &mut out)?;
        self.check_timeouts(now, &mut out);
        Ok(out)
    }

    /// Run only the timeout checks. Call periodically while no new bytes
    /// arrive so held constructs (bare ESC, ambiguous keys) resolve.
    pub fn tick(&mut self, now: Instant) -> Vec<ParsedInput> {
        let mut out = Vec::new();
        self.check_timeouts(now, &mut out);
        out
    }

    /// Poll the descriptor, then parse. The poll timeout shortens to
    /// `pending_poll_timeout` while any construct is mid-flight so timeouts
    /// fire promptly.
    #[cfg(unix)]
    pub fn read_events(&mut self) -> Result<Vec<ParsedInput>, InputError> {
        let timeout = if self.is_pending() {
            Some(self.config.pending_poll_timeout)
        } else {
            None
        };
        self.stream.read_timeout(READ_CHUNK, timeout)?;
        let now = Instant::now();
        let mut out = Vec::new();
        self.drain(now, &mut out)?;
        self.check_timeouts(now, &mut out);
        Ok(out)
    }

    /// Whether any construct is mid-flight (a read loop should poll with a
    /// short timeout instead of blocking).
    pub fn is_pending(&self) -> bool {
        self.sequence.is_active()
            || self.mouse.is_active()
            || self.utf8.has_partial()
            || self.keys.is_waiting()
            || self.paste.is_some()
            || self.stream.get_available() > 0
    }

    // =========================================================================
    // Byte routing
    // =========================================================================

    fn drain(&mut self, now: Instant, out: &mut Vec<ParsedInput>) -> Result<(), InputError> {
        while self.stream.get_available() > 0 {
            if !self.step(now, out)? {
                break;
            }
        }
        Ok(())
    }

    /// Route one byte (or one paste segment). Returns `false` when more
    /// bytes are needed before progress can be made.
    fn step(&mut self, now: Instant, out: &mut Vec<ParsedInput>) -> Result<bool, InputError> {
        if self.paste.is_some() {
            return self.step_paste(now, out);
        }
        let byte = match self.stream.peek(0) {
            Some(b) => b,
            None => return Ok(false),
        };

        if self.mouse.is_active() {
            self.stream.consume(1)?;
            match self.mouse.feed(byte, now, &self.config) {
                Ok(Some(event)) => {
                    self.state.transition(ParserState::Normal);
                    let parsed = self.finish(InputPayload::Mouse(event), now);
                    out.push(parsed);
                }
                Ok(None) => {}
                Err(err) => self.absorb(err, out)?,
            }
            return Ok(true);
        }

        if self.sequence.is_active() {
            self.stream.consume(1)?;
            match self.sequence.feed(byte) {
                Ok(step) => self.apply_step(step, now, out)?,
                Err(err) => self.absorb(err, out)?,
            }
            return Ok(true);
        }

        // A truncated multi-byte sequence: the pending bytes are invalid,
        // and the interrupting byte is re-dispatched on the next step.
        if self.utf8.has_partial() && byte & 0xC0 != 0x80 {
            self.utf8.reset();
            self.absorb(InputError::InvalidEncoding { byte }, out)?;
            return Ok(true);
        }

        self.stream.consume(1)?;
        match byte {
            0x1B => {
                self.construct_start = Some(now);
                self.sequence.begin(now);
                self.state.transition(ParserState::Escape);
            }
            0x00..=0x1F | 0x7F => {
                self.construct_start.get_or_insert(now);
                match self.keys.process_sequence(&[byte], now) {
                    KeyMatch::Exact(key) => {
                        let parsed = self.finish(InputPayload::Key(key), now);
                        out.push(parsed);
                    }
                    _ => {
                        // Unmapped control byte: preserved as literal text.
                        self.keys.reset();
                        let parsed = self.finish_text(byte as char, now);
                        out.push(parsed);
                    }
                }
            }
            _ => {
                if !self.utf8.has_partial() {
                    self.construct_start.get_or_insert(now);
                }
                match self.utf8.process_byte(byte) {
                    Ok(Some(decoded)) => {
                        self.state.transition(ParserState::Normal);
                        let parsed = self.finish_text(decoded.codepoint, now);
                        out.push(parsed);
                    }
                    Ok(None) => self.state.transition(ParserState::Utf8),
                    Err(err) => self.absorb(err, out)?,
                }
            }
        }
        Ok(true)
    }

    fn apply_step(
        &mut self,
        step: SequenceStep,
        now: Instant,
        out: &mut Vec<ParsedInput>,
    ) -> Result<(), InputError> {
        match step {
            SequenceStep::Pending => {
                let state = match self.sequence.kind() {
                    Some(SequenceKind::Csi) => ParserState::Csi,
                    Some(SequenceKind::Osc) => ParserState::Osc,
                    Some(SequenceKind::Dcs) => ParserState::Dcs,
                    Some(SequenceKind::Ss2) | Some(SequenceKind::Ss3) => ParserState::SingleShift,
                    _ => ParserState::Escape,
                };
                self.state.transition(state);
            }
            SequenceStep::AltKey(byte) => {
                self.state.transition(ParserState::Normal);
                let key = match self.keys.process_sequence(&[0x1B, byte], now) {
                    KeyMatch::Exact(key) => key,
                    _ => {
                        self.keys.reset();
                        KeyInput::new(
                            KeyCode::Char(byte as char),
                            Modifiers::ALT,
                            "Alt+Char",
                            vec![0x1B, byte],
                        )
                    }
                };
                let parsed = self.finish(InputPayload::Key(key), now);
                out.push(parsed);
            }
            SequenceStep::EscPair(byte) => {
                self.state.transition(ParserState::Normal);
                let sequence = ControlSequence {
                    kind: SequenceKind::EscPair,
                    params: Vec::new(),
                    intermediates: Vec::new(),
                    final_byte: byte,
                    payload: Vec::new(),
                    raw: vec![0x1B, byte],
                };
                let parsed = self.finish(InputPayload::Sequence(sequence), now);
                out.push(parsed);
            }
            SequenceStep::Mouse(protocol) => {
                self.mouse.begin(protocol);
                self.state.transition(ParserState::Mouse);
            }
            SequenceStep::Complete(sequence) => self.complete_sequence(sequence, now, out),
        }
        Ok(())
    }

    /// A structurally complete sequence: paste and focus markers first, then
    /// the key table, then a generic sequence event.
    fn complete_sequence(
        &mut self,
        sequence: ControlSequence,
        now: Instant,
        out: &mut Vec<ParsedInput>,
    ) {
        self.state.transition(ParserState::Normal);

        if sequence.kind == SequenceKind::Csi && sequence.intermediates.is_empty() {
            if sequence.final_byte == b'~' && sequence.params == [200] {
                self.paste = Some(Vec::new());
                self.state.transition(ParserState::Paste);
                return;
            }
            if sequence.final_byte == b'~' && sequence.params == [201] {
                // Stray end marker with no paste in flight.
                return;
            }
            if sequence.params.is_empty() && sequence.final_byte == b'I' {
                let parsed = self.finish(InputPayload::Focus(true), now);
                out.push(parsed);
                return;
            }
            if sequence.params.is_empty() && sequence.final_byte == b'O' {
                let parsed = self.finish(InputPayload::Focus(false), now);
                out.push(parsed);
                return;
            }
        }

        match sequence.kind {
            SequenceKind::Csi | SequenceKind::Ss2 | SequenceKind::Ss3 => {
                match self.keys.process_sequence(&sequence.raw, now) {
                    KeyMatch::Exact(key) => {
                        let parsed = self.finish(InputPayload::Key(key), now);
                        out.push(parsed);
                    }
                    _ => {
                        self.keys.reset();
                        let parsed = self.finish(InputPayload::Sequence(sequence), now);
                        out.push(parsed);
                    }
                }
            }
            _ => {
                let parsed = self.finish(InputPayload::Sequence(sequence), now);
                out.push(parsed);
            }
        }
    }

    /// Accumulate paste content up to the end marker. Everything between the
    /// markers is literal, including lone ESC bytes that do not begin the
    /// end marker.
    fn step_paste(&mut self, now: Instant, out: &mut Vec<ParsedInput>) -> Result<bool, InputError> {
        let buffered = self.stream.get_buffered();
        let esc_at = buffered.iter().position(|&b| b == 0x1B);

        match esc_at {
            None => {
                let chunk = buffered.to_vec();
                self.stream.consume(chunk.len())?;
                self.paste_push(&chunk, now, out);
                Ok(false)
            }
            Some(0) => {
                if buffered.len() >= PASTE_END.len() {
                    if buffered.starts_with(PASTE_END) {
                        self.stream.consume(PASTE_END.len())?;
                        let bytes = self.paste.take().unwrap_or_default();
                        let text = String::from_utf8_lossy(&bytes).into_owned();
                        self.state.transition(ParserState::Normal);
                        let parsed = self.finish(InputPayload::Paste(text), now);
                        out.push(parsed);
                        Ok(true)
                    } else {
                        // ESC that is not the end marker: literal content.
                        self.stream.consume(1)?;
                        self.paste_push(&[0x1B], now, out);
                        Ok(true)
                    }
                } else if PASTE_END.starts_with(buffered) {
                    // Could still be the end marker; wait for more bytes.
                    Ok(false)
                } else {
                    self.stream.consume(1)?;
                    self.paste_push(&[0x1B], now, out);
                    Ok(true)
                }
            }
            Some(i) => {
                let chunk = buffered[..i].to_vec();
                self.stream.consume(chunk.len())?;
                self.paste_push(&chunk, now, out);
                Ok(true)
            }
        }
    }

    /// Append to the paste buffer, flushing a segment when it grows past the
    /// limit so memory stays bounded during huge pastes.
    fn paste_push(&mut self, bytes: &[u8], now: Instant, out: &mut Vec<ParsedInput>) {
        if let Some(paste) = self.paste.as_mut() {
            paste.extend_from_slice(bytes);
            if paste.len() >= PASTE_FLUSH_LIMIT {
                let segment = std::mem::take(paste);
                let text = String::from_utf8_lossy(&segment).into_owned();
                let parsed = self.finish(InputPayload::Paste(text), now);
                out.push(parsed);
            }
        }
    }

    // =========================================================================
    // Timeouts and recovery
    // =========================================================================

    fn check_timeouts(&mut self, now: Instant, out: &mut Vec<ParsedInput>) {
        // A bare ESC past the standalone window is the Escape key.
        if self
            .sequence
            .check_timeout(now, self.config.esc_standalone_timeout)
        {
            self.state.transition(ParserState::Normal);
            let key = KeyInput::new(KeyCode::Escape, Modifiers::NONE, "Escape", vec![0x1B]);
            let parsed = self.finish(InputPayload::Key(key), now);
            out.push(parsed);
        }

        // A sequence with a body that stalled: resolve held state and replay
        // whatever accumulated as literal text.
        if self.sequence.is_active() {
            if let Some(start) = self.sequence.started_at() {
                if now.saturating_duration_since(start) >= self.config.sequence_timeout {
                    let bytes = self.sequence.take_raw();
                    self.state.transition(ParserState::Recovery);
                    let events = self.recovery.recover(
                        &InputError::Timeout,
                        RecoveryTargets {
                            stream: &mut self.stream,
                            utf8: &mut self.utf8,
                            sequence: &mut self.sequence,
                            keys: &mut self.keys,
                            mouse: &mut self.mouse,
                        },
                    );
                    out.extend(events);
                    out.extend(self.recovery.replay(&bytes));
                    self.state.transition(ParserState::Normal);
                    self.construct_start = None;
                }
            }
        }

        // An ambiguous key match held past its window resolves to the held
        // exact match.
        if let Some(since) = self.keys.pending_since() {
            if now.saturating_duration_since(since) >= self.config.key_ambiguity_timeout {
                if let Some(key) = self.keys.force_resolution() {
                    let parsed = self.finish(InputPayload::Key(key), now);
                    out.push(parsed);
                }
            }
        }
    }

    /// Detour a recoverable error through the recovery layer; anything else
    /// propagates.
    fn absorb(&mut self, error: InputError, out: &mut Vec<ParsedInput>) -> Result<(), InputError> {
        if !error.is_recoverable() {
            return Err(error);
        }
        self.state.transition(ParserState::Recovery);
        let events = self.recovery.recover(
            &error,
            RecoveryTargets {
                stream: &mut self.stream,
                utf8: &mut self.utf8,
                sequence: &mut self.sequence,
                keys: &mut self.keys,
                mouse: &mut self.mouse,
            },
        );
        out.extend(events);
        self.construct_start = None;
        self.state.transition(ParserState::Normal);
        Ok(())
    }

    // =========================================================================
    // Emission
    // =========================================================================

    fn finish(&mut self, payload: InputPayload, now: Instant) -> ParsedInput {
        let duration = self
            .construct_start
            .take()
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or(Duration::ZERO);
        ParsedInput::with_duration(payload, duration)
    }

    fn finish_text(&mut self, ch: char, now: Instant) -> ParsedInput {
        self.finish(InputPayload::Text(TextInput::from_char(ch)), now)
    }

    // =========================================================================
    // Control surface
    // =========================================================================

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn state(&self) -> ParserState {
        self.state.current()
    }

    pub fn set_mouse_tracking(&mut self, enabled: bool) {
        self.mouse.set_tracking(enabled);
    }

    /// Pause or resume pulling bytes from the descriptor.
    pub fn set_flow_control(&mut self, paused: bool) {
        self.stream.set_flow_control(paused);
    }

    /// Drop all in-flight state: buffered bytes, partial sequences, held
    /// matches, paste accumulation. Counters survive.
    pub fn reset(&mut self) {
        self.stream.reset();
        self.utf8.reset();
        self.sequence.reset();
        self.keys.reset();
        self.mouse.reset();
        self.paste = None;
        self.construct_start = None;
        self.state.transition(ParserState::Normal);
    }

    /// Recovery counters alone, without the full metric aggregation.
    pub fn error_stats(&self) -> ErrorStats {
        self.recovery.stats()
    }

    pub fn metrics(&self) -> ParserMetrics {
        ParserMetrics {
            stream: self.stream.stats(),
            utf8: self.utf8.stats(),
            sequence: self.sequence.stats(),
            keys: self.keys.stats(),
            mouse: self.mouse.stats(),
            errors: self.recovery.stats(),
            state_transitions: self.state.transitions(),
            recoveries: self.state.recoveries(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{MouseAction, MouseButton};

    fn system() -> InputParserSystem {
        InputParserSystem::new(ParserConfig::default())
    }

    fn payloads(events: &[ParsedInput]) -> Vec<&InputPayload> {
        events.iter().map(|e| &e.payload).collect()
    }

    #[test]
    fn test_plain_text_bytes() {
        let mut p = system();
        let events = p.process_data(b"hi", Instant::now()).unwrap();
        assert_eq!(events.len(), 2);
        match &events[0].payload {
            InputPayload::Text(t) => assert_eq!(t.codepoint, 'h'),
            other => panic!("expected Text, got {other:?}"),
        }
    }

    #[test]
    fn test_arrow_key_whole_sequence() {
        let mut p = system();
        let events = p.process_data(b"\x1b[A", Instant::now()).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0].payload {
            InputPayload::Key(k) => assert_eq!(k.code, KeyCode::Up),
            other => panic!("expected Key, got {other:?}"),
        }
        assert_eq!(p.state(), ParserState::Normal);
    }

    #[test]
    fn test_arrow_key_byte_at_a_time() {
        let mut p = system();
        let now = Instant::now();
        assert!(p.process_data(b"\x1b", now).unwrap().is_empty());
        assert_eq!(p.state(), ParserState::Escape);
        assert!(p.process_data(b"[", now).unwrap().is_empty());
        assert_eq!(p.state(), ParserState::Csi);
        let events = p.process_data(b"B", now).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0].payload {
            InputPayload::Key(k) => assert_eq!(k.code, KeyCode::Down),
            other => panic!("expected Key, got {other:?}"),
        }
    }

    #[test]
    fn test_ctrl_key_and_enter() {
        let mut p = system();
        let events = p.process_data(b"\x03\x0d", Instant::now()).unwrap();
        assert_eq!(events.len(), 2);
        match (&events[0].payload, &events[1].payload) {
            (InputPayload::Key(a), InputPayload::Key(b)) => {
                assert_eq!(a.name, "Ctrl+C");
                assert_eq!(b.code, KeyCode::Enter);
            }
            other => panic!("expected two keys, got {other:?}"),
        }
    }

    #[test]
    fn test_alt_letter() {
        let mut p = system();
        let events = p.process_data(b"\x1bf", Instant::now()).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0].payload {
            InputPayload::Key(k) => {
                assert_eq!(k.code, KeyCode::Char('f'));
                assert_eq!(k.modifiers, Modifiers::ALT);
            }
            other => panic!("expected Key, got {other:?}"),
        }
    }

    #[test]
    fn test_utf8_split_across_calls() {
        let mut p = system();
        let now = Instant::now();
        let bytes = "é".as_bytes();
        assert!(p.process_data(&bytes[..1], now).unwrap().is_empty());
        assert_eq!(p.state(), ParserState::Utf8);
        let events = p.process_data(&bytes[1..], now).unwrap();
        match &events[0].payload {
            InputPayload::Text(t) => assert_eq!(t.codepoint, 'é'),
            other => panic!("expected Text, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_utf8_becomes_replacement() {
        let mut p = system();
        let events = p.process_data(b"a\xFFb", Instant::now()).unwrap();
        let chars: Vec<char> = events
            .iter()
            .filter_map(|e| match &e.payload {
                InputPayload::Text(t) => Some(t.codepoint),
                _ => None,
            })
            .collect();
        assert_eq!(chars, vec!['a', '\u{FFFD}', 'b']);
    }

    #[test]
    fn test_truncated_utf8_then_escape() {
        let mut p = system();
        let now = Instant::now();
        // 0xE4 opens a 3-byte sequence; ESC truncates it.
        let events = p.process_data(b"\xE4\x1b[A", now).unwrap();
        assert_eq!(events.len(), 2);
        match (&events[0].payload, &events[1].payload) {
            (InputPayload::Text(t), InputPayload::Key(k)) => {
                assert_eq!(t.codepoint, '\u{FFFD}');
                assert_eq!(k.code, KeyCode::Up);
            }
            other => panic!("expected replacement then key, got {other:?}"),
        }
    }

    #[test]
    fn test_sgr_mouse_press() {
        let mut p = system();
        let events = p.process_data(b"\x1b[<0;10;5M", Instant::now()).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0].payload {
            InputPayload::Mouse(m) => {
                assert_eq!(m.action, MouseAction::Press);
                assert_eq!(m.button, MouseButton::Left);
                assert_eq!((m.x, m.y), (9, 4));
            }
            other => panic!("expected Mouse, got {other:?}"),
        }
    }

    #[test]
    fn test_x10_mouse_press() {
        let mut p = system();
        let events = p
            .process_data(b"\x1b[M\x20\x21\x21", Instant::now())
            .unwrap();
        assert_eq!(events.len(), 1);
        match &events[0].payload {
            InputPayload::Mouse(m) => {
                assert_eq!(m.action, MouseAction::Press);
                assert_eq!((m.x, m.y), (0, 0));
            }
            other => panic!("expected Mouse, got {other:?}"),
        }
    }

    #[test]
    fn test_bracketed_paste() {
        let mut p = system();
        let events = p
            .process_data(b"\x1b[200~hello world\x1b[201~", Instant::now())
            .unwrap();
        assert_eq!(events.len(), 1);
        match &events[0].payload {
            InputPayload::Paste(text) => assert_eq!(text, "hello world"),
            other => panic!("expected Paste, got {other:?}"),
        }
        assert_eq!(p.state(), ParserState::Normal);
    }

    #[test]
    fn test_paste_with_embedded_escape() {
        let mut p = system();
        let events = p
            .process_data(b"\x1b[200~a\x1b[Ab\x1b[201~", Instant::now())
            .unwrap();
        assert_eq!(events.len(), 1);
        match &events[0].payload {
            InputPayload::Paste(text) => assert_eq!(text, "a\x1b[Ab"),
            other => panic!("expected Paste, got {other:?}"),
        }
    }

    #[test]
    fn test_paste_split_across_calls() {
        let mut p = system();
        let now = Instant::now();
        assert!(p.process_data(b"\x1b[200~par", now).unwrap().is_empty());
        assert_eq!(p.state(), ParserState::Paste);
        assert!(p.process_data(b"tial\x1b[20", now).unwrap().is_empty());
        let events = p.process_data(b"1~", now).unwrap();
        match &events[0].payload {
            InputPayload::Paste(text) => assert_eq!(text, "partial"),
            other => panic!("expected Paste, got {other:?}"),
        }
    }

    #[test]
    fn test_focus_events() {
        let mut p = system();
        let events = p.process_data(b"\x1b[I\x1b[O", Instant::now()).unwrap();
        assert_eq!(
            payloads(&events),
            vec![&InputPayload::Focus(true), &InputPayload::Focus(false)]
        );
    }

    #[test]
    fn test_unmatched_csi_is_generic_sequence() {
        let mut p = system();
        let events = p.process_data(b"\x1b[?2004h", Instant::now()).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0].payload {
            InputPayload::Sequence(s) => {
                assert_eq!(s.kind, SequenceKind::Csi);
                assert_eq!(s.params, vec![2004]);
                assert_eq!(s.final_byte, b'h');
            }
            other => panic!("expected Sequence, got {other:?}"),
        }
    }

    #[test]
    fn test_osc_sequence_event() {
        let mut p = system();
        let events = p.process_data(b"\x1b]0;title\x07", Instant::now()).unwrap();
        match &events[0].payload {
            InputPayload::Sequence(s) => {
                assert_eq!(s.kind, SequenceKind::Osc);
                assert_eq!(s.payload, b"0;title");
            }
            other => panic!("expected Sequence, got {other:?}"),
        }
    }

    #[test]
    fn test_bare_esc_resolves_on_timeout() {
        let mut p = system();
        let t0 = Instant::now();
        assert!(p.process_data(b"\x1b", t0).unwrap().is_empty());
        assert!(p.is_pending());

        let later = t0 + p.config().esc_standalone_timeout + Duration::from_millis(1);
        let events = p.tick(later);
        assert_eq!(events.len(), 1);
        match &events[0].payload {
            InputPayload::Key(k) => assert_eq!(k.code, KeyCode::Escape),
            other => panic!("expected Escape, got {other:?}"),
        }
        assert_eq!(p.state(), ParserState::Normal);
    }

    #[test]
    fn test_stalled_sequence_replays_printables() {
        let mut p = system();
        let t0 = Instant::now();
        assert!(p.process_data(b"\x1b[1;", t0).unwrap().is_empty());

        let later = t0 + p.config().sequence_timeout + Duration::from_millis(1);
        let events = p.tick(later);
        let chars: Vec<char> = events
            .iter()
            .filter_map(|e| match &e.payload {
                InputPayload::Text(t) => Some(t.codepoint),
                _ => None,
            })
            .collect();
        assert_eq!(chars, vec!['[', '1', ';']);
        assert_eq!(p.state(), ParserState::Normal);
        assert_eq!(p.metrics().errors.timeouts, 1);
    }

    #[test]
    fn test_mixed_stream_text_keys_mouse() {
        let mut p = system();
        let events = p
            .process_data(b"ab\x1b[A\x1b[<0;1;1Mc", Instant::now())
            .unwrap();
        assert_eq!(events.len(), 5);
        assert!(matches!(events[0].payload, InputPayload::Text(_)));
        assert!(matches!(events[1].payload, InputPayload::Text(_)));
        assert!(matches!(events[2].payload, InputPayload::Key(_)));
        assert!(matches!(events[3].payload, InputPayload::Mouse(_)));
        assert!(matches!(events[4].payload, InputPayload::Text(_)));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut p = system();
        let now = Instant::now();
        p.process_data(b"\x1b[200~abc", now).unwrap();
        assert!(p.is_pending());
        p.reset();
        assert!(!p.is_pending());
        assert_eq!(p.state(), ParserState::Normal);

        // Still parses normally afterwards.
        let events = p.process_data(b"\x1b[A", now).unwrap();
        assert!(matches!(events[0].payload, InputPayload::Key(_)));
    }

    #[test]
    fn test_metrics_accumulate() {
        let mut p = system();
        let now = Instant::now();
        p.process_data(b"abc\x1b[A\xFF", now).unwrap();
        let m = p.metrics();
        assert_eq!(m.stream.bytes_in, 7);
        assert_eq!(m.utf8.codepoints, 3);
        assert_eq!(m.sequence.completed, 1);
        assert_eq!(m.keys.detections, 1);
        assert_eq!(m.errors.encoding, 1);
    }

    #[test]
    fn test_parse_duration_recorded() {
        let mut p = system();
        let t0 = Instant::now();
        p.process_data(b"\x1b[", t0).unwrap();
        let events = p
            .process_data(b"A", t0 + Duration::from_millis(5))
            .unwrap();
        assert_eq!(events[0].parse_duration, Duration::from_millis(5));
    }
}
