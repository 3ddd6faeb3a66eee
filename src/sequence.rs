//! Escape sequence state machine.
//!
//! Accumulates CSI/OSC/DCS/SS2/SS3 bytes after an ESC and tells the
//! coordinator what to do with them:
//!
//! ```text
//! ESC ─┬─ '['  → CSI: params/intermediates until final 0x40-0x7E
//!      │        (first body byte 'M' or '<' reclassifies as mouse)
//!      ├─ ']'  → OSC: payload until BEL or ESC \
//!      ├─ 'P'  → DCS: payload until BEL or ESC \
//!      ├─ 'N'  → SS2: exactly one more byte
//!      ├─ 'O'  → SS3: exactly one more byte
//!      ├─ printable / DEL → Alt+char (meta convention)
//!      └─ other → two-byte control pair
//! ```
//!
//! The accumulation buffer is bounded; overflow forces a reset and surfaces
//! the accumulated bytes for replay. A bare ESC that stalls past the
//! standalone timeout is reported through `check_timeout` so the coordinator
//! can emit the Escape key.

use std::time::Instant;

use crate::error::InputError;
use crate::event::{ControlSequence, SequenceKind};
use crate::mouse::MouseProtocol;

/// Maximum numeric parameters a CSI sequence may carry.
const MAX_CSI_PARAMS: usize = 16;

/// What the coordinator should do after feeding a byte.
#[derive(Debug, Clone, PartialEq)]
pub enum SequenceStep {
    /// Sequence still accumulating.
    Pending,
    /// ESC + printable: emit the char with the Alt/Meta modifier.
    AltKey(u8),
    /// ESC + non-printable control: a two-byte control pair.
    EscPair(u8),
    /// CSI turned out to be a mouse report; the mouse parser owns the
    /// following bytes.
    Mouse(MouseProtocol),
    /// A full sequence terminated.
    Complete(ControlSequence),
}

/// Running counters for the sequence parser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceStats {
    pub completed: u64,
    pub malformed: u64,
    pub timeouts: u64,
}

#[derive(Debug)]
pub struct SequenceParser {
    /// Family selected by the byte after ESC; `None` until then.
    kind: Option<SequenceKind>,
    /// Raw accumulation, ESC included.
    buf: Vec<u8>,
    capacity: usize,
    params: Vec<u32>,
    current_param: Option<u32>,
    intermediates: Vec<u8>,
    /// Inside OSC/DCS: an ESC was seen, `\` would complete the ST.
    st_pending: bool,
    started_at: Option<Instant>,
    stats: SequenceStats,
}

impl SequenceParser {
    pub fn new(capacity: usize) -> Self {
        Self {
            kind: None,
            buf: Vec::with_capacity(capacity.min(128)),
            capacity,
            params: Vec::new(),
            current_param: None,
            intermediates: Vec::new(),
            st_pending: false,
            started_at: None,
            stats: SequenceStats::default(),
        }
    }

    /// Start a sequence: an ESC arrived.
    pub fn begin(&mut self, now: Instant) {
        self.clear();
        self.buf.push(0x1B);
        self.started_at = Some(now);
    }

    /// Whether a sequence is mid-flight.
    pub fn is_active(&self) -> bool {
        self.started_at.is_some()
    }

    /// Whether the parser holds exactly a bare ESC (the ambiguous case the
    /// standalone timeout resolves).
    pub fn holds_bare_esc(&self) -> bool {
        self.kind.is_none() && self.buf.len() == 1 && self.is_active()
    }

    /// When the in-flight sequence started.
    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// Sequence family, once the byte after ESC has classified it.
    pub fn kind(&self) -> Option<SequenceKind> {
        self.kind
    }

    /// Feed the next byte of an active sequence.
    pub fn feed(&mut self, byte: u8) -> Result<SequenceStep, InputError> {
        if !self.is_active() {
            return Err(InputError::InvalidState);
        }
        if self.buf.len() >= self.capacity {
            self.stats.malformed += 1;
            let mut bytes = self.take_raw();
            bytes.push(byte);
            return Err(InputError::BufferOverflow { bytes });
        }
        self.buf.push(byte);

        match self.kind {
            None => self.dispatch_escape(byte),
            Some(SequenceKind::Csi) => self.feed_csi(byte),
            Some(SequenceKind::Osc) | Some(SequenceKind::Dcs) => self.feed_string(byte),
            Some(SequenceKind::Ss2) | Some(SequenceKind::Ss3) => Ok(self.complete_single(byte)),
            // EscPair never stays active.
            Some(SequenceKind::EscPair) => Err(InputError::InvalidState),
        }
    }

    /// Classify the byte after ESC.
    fn dispatch_escape(&mut self, byte: u8) -> Result<SequenceStep, InputError> {
        match byte {
            b'[' => {
                self.kind = Some(SequenceKind::Csi);
                Ok(SequenceStep::Pending)
            }
            b']' => {
                self.kind = Some(SequenceKind::Osc);
                Ok(SequenceStep::Pending)
            }
            b'P' => {
                self.kind = Some(SequenceKind::Dcs);
                Ok(SequenceStep::Pending)
            }
            b'N' => {
                self.kind = Some(SequenceKind::Ss2);
                Ok(SequenceStep::Pending)
            }
            b'O' => {
                self.kind = Some(SequenceKind::Ss3);
                Ok(SequenceStep::Pending)
            }
            // Meta/Alt convention: ESC + printable (or DEL).
            0x20..=0x7E | 0x7F => {
                self.clear();
                Ok(SequenceStep::AltKey(byte))
            }
            // Anything else: a two-byte control pair.
            _ => {
                self.clear();
                Ok(SequenceStep::EscPair(byte))
            }
        }
    }

    fn feed_csi(&mut self, byte: u8) -> Result<SequenceStep, InputError> {
        // The byte right after "ESC [" may reclassify the sequence as a
        // mouse report.
        if self.buf.len() == 3 {
            if byte == b'M' {
                self.clear();
                return Ok(SequenceStep::Mouse(MouseProtocol::X10));
            }
            if byte == b'<' {
                self.clear();
                return Ok(SequenceStep::Mouse(MouseProtocol::Sgr));
            }
        }

        match byte {
            b'0'..=b'9' => {
                let cur = self.current_param.get_or_insert(0);
                *cur = cur.saturating_mul(10) + u32::from(byte - b'0');
                Ok(SequenceStep::Pending)
            }
            b';' => {
                self.push_param()?;
                Ok(SequenceStep::Pending)
            }
            // Intermediates, plus the 0x3A-0x3F private markers.
            0x20..=0x2F | 0x3A..=0x3F => {
                self.intermediates.push(byte);
                Ok(SequenceStep::Pending)
            }
            // Final byte.
            0x40..=0x7E => {
                if self.current_param.is_some() {
                    self.push_param()?;
                }
                Ok(self.complete(SequenceKind::Csi, byte, Vec::new()))
            }
            // Control bytes do not belong inside a CSI sequence.
            _ => {
                self.stats.malformed += 1;
                let bytes = self.take_raw();
                Err(InputError::InvalidFormat {
                    context: "control byte inside CSI",
                    bytes,
                })
            }
        }
    }

    fn feed_string(&mut self, byte: u8) -> Result<SequenceStep, InputError> {
        if self.st_pending {
            if byte == b'\\' {
                // ESC \ string terminator: strip both from the payload.
                let kind = self.kind.unwrap_or(SequenceKind::Osc);
                let payload_end = self.buf.len().saturating_sub(2);
                let payload = self.buf[2..payload_end].to_vec();
                return Ok(self.complete(kind, byte, payload));
            }
            self.st_pending = byte == 0x1B;
            return Ok(SequenceStep::Pending);
        }
        match byte {
            0x07 => {
                // BEL terminator.
                let kind = self.kind.unwrap_or(SequenceKind::Osc);
                let payload_end = self.buf.len().saturating_sub(1);
                let payload = self.buf[2..payload_end].to_vec();
                Ok(self.complete(kind, byte, payload))
            }
            0x1B => {
                self.st_pending = true;
                Ok(SequenceStep::Pending)
            }
            _ => Ok(SequenceStep::Pending),
        }
    }

    /// SS2/SS3: exactly one byte follows the introducer.
    fn complete_single(&mut self, byte: u8) -> SequenceStep {
        let kind = self.kind.unwrap_or(SequenceKind::Ss3);
        self.complete(kind, byte, Vec::new())
    }

    fn complete(&mut self, kind: SequenceKind, final_byte: u8, payload: Vec<u8>) -> SequenceStep {
        self.stats.completed += 1;
        let sequence = ControlSequence {
            kind,
            params: std::mem::take(&mut self.params),
            intermediates: std::mem::take(&mut self.intermediates),
            final_byte,
            payload,
            raw: std::mem::take(&mut self.buf),
        };
        self.clear();
        SequenceStep::Complete(sequence)
    }

    fn push_param(&mut self) -> Result<(), InputError> {
        if self.params.len() >= MAX_CSI_PARAMS {
            self.stats.malformed += 1;
            let bytes = self.take_raw();
            return Err(InputError::InvalidFormat {
                context: "too many CSI parameters",
                bytes,
            });
        }
        self.params.push(self.current_param.take().unwrap_or(0));
        Ok(())
    }

    /// Detect a stalled bare ESC. Once `threshold` has elapsed the caller
    /// emits a standalone Escape key; this parser just resets.
    pub fn check_timeout(&mut self, now: Instant, threshold: std::time::Duration) -> bool {
        if !self.holds_bare_esc() {
            return false;
        }
        match self.started_at {
            Some(start) if now.saturating_duration_since(start) >= threshold => {
                self.stats.timeouts += 1;
                self.clear();
                true
            }
            _ => false,
        }
    }

    /// Surrender the accumulated bytes (for recovery replay) and reset.
    pub fn take_raw(&mut self) -> Vec<u8> {
        let raw = std::mem::take(&mut self.buf);
        self.clear();
        raw
    }

    pub fn reset(&mut self) {
        self.clear();
    }

    pub fn stats(&self) -> SequenceStats {
        self.stats
    }

    fn clear(&mut self) {
        self.kind = None;
        self.buf.clear();
        self.params.clear();
        self.current_param = None;
        self.intermediates.clear();
        self.st_pending = false;
        self.started_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn run(bytes: &[u8]) -> SequenceStep {
        let mut p = SequenceParser::new(128);
        p.begin(Instant::now());
        let mut last = SequenceStep::Pending;
        for &b in &bytes[1..] {
            last = p.feed(b).unwrap();
        }
        last
    }

    #[test]
    fn test_csi_with_params_and_final() {
        match run(b"\x1b[1;5C") {
            SequenceStep::Complete(cs) => {
                assert_eq!(cs.kind, SequenceKind::Csi);
                assert_eq!(cs.params, vec![1, 5]);
                assert_eq!(cs.final_byte, b'C');
                assert_eq!(cs.raw, b"\x1b[1;5C");
            }
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[test]
    fn test_csi_empty_params() {
        match run(b"\x1b[A") {
            SequenceStep::Complete(cs) => {
                assert!(cs.params.is_empty());
                assert_eq!(cs.final_byte, b'A');
            }
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[test]
    fn test_csi_intermediates_and_private_markers() {
        match run(b"\x1b[?2004h") {
            SequenceStep::Complete(cs) => {
                assert_eq!(cs.intermediates, vec![b'?']);
                assert_eq!(cs.params, vec![2004]);
                assert_eq!(cs.final_byte, b'h');
            }
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[test]
    fn test_mouse_reclassification() {
        assert_eq!(run(b"\x1b[M"), SequenceStep::Mouse(MouseProtocol::X10));
        assert_eq!(run(b"\x1b[<"), SequenceStep::Mouse(MouseProtocol::Sgr));
    }

    #[test]
    fn test_alt_char_convention() {
        assert_eq!(run(b"\x1bx"), SequenceStep::AltKey(b'x'));
        assert_eq!(run(b"\x1b\x7f"), SequenceStep::AltKey(0x7F));
    }

    #[test]
    fn test_esc_pair_for_control_byte() {
        assert_eq!(run(b"\x1b\x01"), SequenceStep::EscPair(0x01));
    }

    #[test]
    fn test_osc_bel_terminated() {
        match run(b"\x1b]0;title\x07") {
            SequenceStep::Complete(cs) => {
                assert_eq!(cs.kind, SequenceKind::Osc);
                assert_eq!(cs.payload, b"0;title");
                assert_eq!(cs.final_byte, 0x07);
            }
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[test]
    fn test_osc_st_terminated() {
        match run(b"\x1b]0;title\x1b\\") {
            SequenceStep::Complete(cs) => {
                assert_eq!(cs.kind, SequenceKind::Osc);
                assert_eq!(cs.payload, b"0;title");
                assert_eq!(cs.final_byte, b'\\');
            }
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[test]
    fn test_dcs_st_terminated() {
        match run(b"\x1bPdata\x1b\\") {
            SequenceStep::Complete(cs) => {
                assert_eq!(cs.kind, SequenceKind::Dcs);
                assert_eq!(cs.payload, b"data");
            }
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[test]
    fn test_ss3_single_byte() {
        match run(b"\x1bOP") {
            SequenceStep::Complete(cs) => {
                assert_eq!(cs.kind, SequenceKind::Ss3);
                assert_eq!(cs.final_byte, b'P');
                assert_eq!(cs.raw, b"\x1bOP");
            }
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[test]
    fn test_ss2_single_byte() {
        match run(b"\x1bNA") {
            SequenceStep::Complete(cs) => assert_eq!(cs.kind, SequenceKind::Ss2),
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[test]
    fn test_overflow_forces_reset_with_bytes() {
        let mut p = SequenceParser::new(8);
        p.begin(Instant::now());
        p.feed(b']').unwrap();
        let mut result = Ok(SequenceStep::Pending);
        for &b in b"0123456789" {
            result = p.feed(b);
            if result.is_err() {
                break;
            }
        }
        match result {
            Err(InputError::BufferOverflow { bytes }) => {
                assert!(bytes.starts_with(b"\x1b]"));
                assert!(!p.is_active());
                assert_eq!(p.stats().malformed, 1);
            }
            other => panic!("expected overflow, got {other:?}"),
        }
    }

    #[test]
    fn test_control_byte_inside_csi_is_malformed() {
        let mut p = SequenceParser::new(64);
        p.begin(Instant::now());
        p.feed(b'[').unwrap();
        p.feed(b'1').unwrap();
        let err = p.feed(0x01).unwrap_err();
        match err {
            InputError::InvalidFormat { bytes, .. } => {
                assert_eq!(bytes, b"\x1b[1\x01");
            }
            other => panic!("expected InvalidFormat, got {other:?}"),
        }
    }

    #[test]
    fn test_bare_esc_timeout() {
        let mut p = SequenceParser::new(64);
        let start = Instant::now();
        p.begin(start);
        assert!(p.holds_bare_esc());
        assert!(!p.check_timeout(start + Duration::from_millis(10), Duration::from_millis(300)));
        assert!(p.check_timeout(start + Duration::from_millis(301), Duration::from_millis(300)));
        assert!(!p.is_active());
        assert_eq!(p.stats().timeouts, 1);
    }

    #[test]
    fn test_timeout_not_triggered_mid_sequence() {
        let mut p = SequenceParser::new(64);
        let start = Instant::now();
        p.begin(start);
        p.feed(b'[').unwrap();
        assert!(!p.check_timeout(start + Duration::from_secs(1), Duration::from_millis(300)));
        assert!(p.is_active());
    }
}
