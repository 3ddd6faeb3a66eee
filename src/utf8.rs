//! Streaming UTF-8 decoder.
//!
//! Consumes one byte at a time (or a whole buffer) and yields codepoints plus
//! a grapheme-boundary flag. A codepoint is only emitted once every
//! continuation byte for its declared length has validated; a violation
//! clears the partial state and reports `InvalidEncoding`.
//!
//! Boundary detection is a deliberately simplified codepoint-level heuristic,
//! not UAX #29 segmentation: every decoded codepoint starts a new grapheme
//! unless it is a combining diacritic, a variation selector, a zero-width
//! joiner, or follows a zero-width joiner.

use unicode_width::UnicodeWidthChar;

use crate::error::InputError;

/// Zero-width joiner, glues emoji sequences together.
const ZWJ: char = '\u{200D}';

/// One decoded codepoint plus its boundary classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedChar {
    pub codepoint: char,
    /// Whether this codepoint begins a new user-perceived character under
    /// the simplified heuristic.
    pub is_boundary: bool,
}

/// Running counters for the decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Utf8Stats {
    /// Codepoints successfully decoded.
    pub codepoints: u64,
    /// Encoding violations observed.
    pub invalid: u64,
    /// Grapheme boundaries seen (heuristic).
    pub graphemes: u64,
}

/// Streaming decoder state. At most 4 bytes of partial sequence are held
/// between calls.
#[derive(Debug, Default)]
pub struct Utf8Processor {
    partial: [u8; 4],
    partial_len: u8,
    expected_len: u8,
    codepoint: u32,
    prev_codepoint: Option<char>,
    stats: Utf8Stats,
}

impl Utf8Processor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte. Returns a decoded codepoint once its sequence
    /// completes, `None` while mid-sequence.
    pub fn process_byte(&mut self, byte: u8) -> Result<Option<DecodedChar>, InputError> {
        if self.partial_len == 0 {
            return self.start_sequence(byte);
        }

        // Continuation bytes must match 10xxxxxx.
        if byte & 0xC0 != 0x80 {
            self.clear_partial();
            self.stats.invalid += 1;
            return Err(InputError::InvalidEncoding { byte });
        }

        self.partial[self.partial_len as usize] = byte;
        self.partial_len += 1;
        self.codepoint = (self.codepoint << 6) | u32::from(byte & 0x3F);

        if self.partial_len < self.expected_len {
            return Ok(None);
        }

        let value = self.codepoint;
        let len = self.expected_len;
        self.clear_partial();

        // Overlong encodings, surrogates, and out-of-range values are
        // invalid even when structurally well-formed.
        let min = match len {
            2 => 0x80,
            3 => 0x800,
            _ => 0x1_0000,
        };
        if value < min || (0xD800..=0xDFFF).contains(&value) || value > 0x10_FFFF {
            self.stats.invalid += 1;
            return Err(InputError::InvalidEncoding { byte });
        }

        match char::from_u32(value) {
            Some(ch) => Ok(Some(self.emit(ch))),
            None => {
                self.stats.invalid += 1;
                Err(InputError::InvalidEncoding { byte })
            }
        }
    }

    fn start_sequence(&mut self, byte: u8) -> Result<Option<DecodedChar>, InputError> {
        match byte {
            // 0xxxxxxx: ASCII, complete immediately.
            0x00..=0x7F => Ok(Some(self.emit(byte as char))),
            // 110xxxxx: two bytes. 0xC0/0xC1 can only encode overlong forms.
            0xC2..=0xDF => {
                self.begin(byte, 2, byte & 0x1F);
                Ok(None)
            }
            // 1110xxxx: three bytes.
            0xE0..=0xEF => {
                self.begin(byte, 3, byte & 0x0F);
                Ok(None)
            }
            // 11110xxx: four bytes. Above 0xF4 exceeds U+10FFFF.
            0xF0..=0xF4 => {
                self.begin(byte, 4, byte & 0x07);
                Ok(None)
            }
            // Stray continuation byte or invalid leading byte.
            _ => {
                self.stats.invalid += 1;
                Err(InputError::InvalidEncoding { byte })
            }
        }
    }

    fn begin(&mut self, byte: u8, expected: u8, payload: u8) {
        self.partial[0] = byte;
        self.partial_len = 1;
        self.expected_len = expected;
        self.codepoint = u32::from(payload);
    }

    fn emit(&mut self, ch: char) -> DecodedChar {
        let is_boundary = Self::begins_grapheme(self.prev_codepoint, ch);
        self.prev_codepoint = Some(ch);
        self.stats.codepoints += 1;
        if is_boundary {
            self.stats.graphemes += 1;
        }
        DecodedChar {
            codepoint: ch,
            is_boundary,
        }
    }

    fn clear_partial(&mut self) {
        self.partial_len = 0;
        self.expected_len = 0;
        self.codepoint = 0;
    }

    /// Simplified boundary heuristic (not UAX #29).
    fn begins_grapheme(prev: Option<char>, ch: char) -> bool {
        if prev == Some(ZWJ) {
            return false;
        }
        !matches!(ch, '\u{0300}'..='\u{036F}' | '\u{FE00}'..='\u{FE0F}' | ZWJ)
    }

    /// Feed a whole buffer. Returns the decoded codepoints and how many
    /// bytes were consumed. Consumption stops at the first invalid byte;
    /// trailing bytes of an incomplete sequence are consumed and held as
    /// partial state. When the returned count is short of `data.len()` and
    /// no partial is held, the byte at that offset is invalid.
    pub fn process_buffer(&mut self, data: &[u8]) -> (Vec<char>, usize) {
        let mut out = Vec::new();
        for (i, &byte) in data.iter().enumerate() {
            match self.process_byte(byte) {
                Ok(Some(decoded)) => out.push(decoded.codepoint),
                Ok(None) => {}
                Err(_) => return (out, i),
            }
        }
        (out, data.len())
    }

    /// Whether a multi-byte sequence is mid-flight.
    pub fn has_partial(&self) -> bool {
        self.partial_len > 0
    }

    /// How many more continuation bytes the current sequence needs.
    pub fn bytes_needed(&self) -> usize {
        usize::from(self.expected_len.saturating_sub(self.partial_len))
    }

    /// Drop any partial state and boundary context. Counters survive.
    pub fn reset(&mut self) {
        self.clear_partial();
        self.prev_codepoint = None;
    }

    pub fn stats(&self) -> Utf8Stats {
        self.stats
    }

    // =========================================================================
    // Convenience wrappers
    // =========================================================================

    /// Length of the longest prefix of `data` made of complete, valid UTF-8
    /// sequences. The byte at the returned offset (if any) begins an
    /// incomplete or invalid sequence.
    pub fn validate(data: &[u8]) -> usize {
        let mut decoder = Utf8Processor::new();
        let mut valid_end = 0;
        for (i, &byte) in data.iter().enumerate() {
            match decoder.process_byte(byte) {
                Ok(Some(_)) => valid_end = i + 1,
                Ok(None) => {}
                Err(_) => break,
            }
        }
        valid_end
    }

    /// Number of codepoints in `text`.
    pub fn count_codepoints(text: &str) -> usize {
        text.chars().count()
    }

    /// Number of graphemes in `text` under the simplified heuristic.
    pub fn count_graphemes(text: &str) -> usize {
        let mut prev = None;
        let mut count = 0;
        for ch in text.chars() {
            if Self::begins_grapheme(prev, ch) {
                count += 1;
            }
            prev = Some(ch);
        }
        count
    }

    /// Display columns for `text`: 2 per wide/emoji codepoint, 0 for
    /// combining marks, else 1.
    pub fn display_width(text: &str) -> usize {
        text.chars().map(|ch| ch.width().unwrap_or(1)).sum()
    }
}
