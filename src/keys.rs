//! Key sequence detector.
//!
//! Accumulates bytes and matches them against a sequence table to resolve
//! symbolic keys. The scan classifies the accumulated buffer as one of:
//!
//! - `Exact`  — one entry matches the buffer exactly and nothing longer
//!              could; resolve immediately.
//! - `Prefix` — no exact match, but at least one longer entry starts with
//!              the buffer; wait for more bytes.
//! - `Ambiguous` — an exact match exists *and* a longer entry could still
//!              match; hold the exact match and arm the ambiguity timeout.
//! - `None`   — nothing matches; discard.
//!
//! The table is built once at init. The linear scan is fine at this table
//! size; the match contract is table-shape independent, so a trie could
//! replace `scan` without touching the API.

use std::time::Instant;

use crate::config::ParserConfig;
use crate::event::{KeyCode, KeyInput, Modifiers};

// =============================================================================
// Table
// =============================================================================

/// One known byte sequence and the key it resolves to.
#[derive(Debug, Clone)]
pub struct KeyTableEntry {
    pub sequence: Vec<u8>,
    pub code: KeyCode,
    pub modifiers: Modifiers,
    pub name: &'static str,
}

impl KeyTableEntry {
    pub fn new(sequence: &[u8], code: KeyCode, modifiers: Modifiers, name: &'static str) -> Self {
        Self {
            sequence: sequence.to_vec(),
            code,
            modifiers,
            name,
        }
    }
}

const CTRL_NAMES: [&str; 26] = [
    "Ctrl+A", "Ctrl+B", "Ctrl+C", "Ctrl+D", "Ctrl+E", "Ctrl+F", "Ctrl+G", "Ctrl+H", "Ctrl+I",
    "Ctrl+J", "Ctrl+K", "Ctrl+L", "Ctrl+M", "Ctrl+N", "Ctrl+O", "Ctrl+P", "Ctrl+Q", "Ctrl+R",
    "Ctrl+S", "Ctrl+T", "Ctrl+U", "Ctrl+V", "Ctrl+W", "Ctrl+X", "Ctrl+Y", "Ctrl+Z",
];

const ALT_NAMES: [&str; 26] = [
    "Alt+A", "Alt+B", "Alt+C", "Alt+D", "Alt+E", "Alt+F", "Alt+G", "Alt+H", "Alt+I", "Alt+J",
    "Alt+K", "Alt+L", "Alt+M", "Alt+N", "Alt+O", "Alt+P", "Alt+Q", "Alt+R", "Alt+S", "Alt+T",
    "Alt+U", "Alt+V", "Alt+W", "Alt+X", "Alt+Y", "Alt+Z",
];

/// The default sequence table: cursor and navigation keys in their CSI and
/// SS3 encodings, function keys, modified cursor keys, control codes, and
/// Alt+letter pairs.
pub fn default_table() -> Vec<KeyTableEntry> {
    use KeyCode::*;
    let none = Modifiers::NONE;
    let mut t = vec![
        // Cursor keys, CSI and SS3 (application mode) encodings.
        KeyTableEntry::new(b"\x1b[A", Up, none, "Up"),
        KeyTableEntry::new(b"\x1b[B", Down, none, "Down"),
        KeyTableEntry::new(b"\x1b[C", Right, none, "Right"),
        KeyTableEntry::new(b"\x1b[D", Left, none, "Left"),
        KeyTableEntry::new(b"\x1bOA", Up, none, "Up"),
        KeyTableEntry::new(b"\x1bOB", Down, none, "Down"),
        KeyTableEntry::new(b"\x1bOC", Right, none, "Right"),
        KeyTableEntry::new(b"\x1bOD", Left, none, "Left"),
        // Home/End in all their historical spellings.
        KeyTableEntry::new(b"\x1b[H", Home, none, "Home"),
        KeyTableEntry::new(b"\x1bOH", Home, none, "Home"),
        KeyTableEntry::new(b"\x1b[1~", Home, none, "Home"),
        KeyTableEntry::new(b"\x1b[7~", Home, none, "Home"),
        KeyTableEntry::new(b"\x1b[F", End, none, "End"),
        KeyTableEntry::new(b"\x1bOF", End, none, "End"),
        KeyTableEntry::new(b"\x1b[4~", End, none, "End"),
        KeyTableEntry::new(b"\x1b[8~", End, none, "End"),
        // Navigation block.
        KeyTableEntry::new(b"\x1b[2~", Insert, none, "Insert"),
        KeyTableEntry::new(b"\x1b[3~", Delete, none, "Delete"),
        KeyTableEntry::new(b"\x1b[5~", PageUp, none, "PageUp"),
        KeyTableEntry::new(b"\x1b[6~", PageDown, none, "PageDown"),
        // Function keys: SS3 for F1-F4, legacy CSI codes, tilde codes.
        KeyTableEntry::new(b"\x1bOP", F(1), none, "F1"),
        KeyTableEntry::new(b"\x1bOQ", F(2), none, "F2"),
        KeyTableEntry::new(b"\x1bOR", F(3), none, "F3"),
        KeyTableEntry::new(b"\x1bOS", F(4), none, "F4"),
        KeyTableEntry::new(b"\x1b[11~", F(1), none, "F1"),
        KeyTableEntry::new(b"\x1b[12~", F(2), none, "F2"),
        KeyTableEntry::new(b"\x1b[13~", F(3), none, "F3"),
        KeyTableEntry::new(b"\x1b[14~", F(4), none, "F4"),
        KeyTableEntry::new(b"\x1b[15~", F(5), none, "F5"),
        KeyTableEntry::new(b"\x1b[17~", F(6), none, "F6"),
        KeyTableEntry::new(b"\x1b[18~", F(7), none, "F7"),
        KeyTableEntry::new(b"\x1b[19~", F(8), none, "F8"),
        KeyTableEntry::new(b"\x1b[20~", F(9), none, "F9"),
        KeyTableEntry::new(b"\x1b[21~", F(10), none, "F10"),
        KeyTableEntry::new(b"\x1b[23~", F(11), none, "F11"),
        KeyTableEntry::new(b"\x1b[24~", F(12), none, "F12"),
        // Modified cursor keys (CSI 1 ; m X).
        KeyTableEntry::new(b"\x1b[1;2A", Up, Modifiers::SHIFT, "Shift+Up"),
        KeyTableEntry::new(b"\x1b[1;2B", Down, Modifiers::SHIFT, "Shift+Down"),
        KeyTableEntry::new(b"\x1b[1;2C", Right, Modifiers::SHIFT, "Shift+Right"),
        KeyTableEntry::new(b"\x1b[1;2D", Left, Modifiers::SHIFT, "Shift+Left"),
        KeyTableEntry::new(b"\x1b[1;3A", Up, Modifiers::ALT, "Alt+Up"),
        KeyTableEntry::new(b"\x1b[1;3B", Down, Modifiers::ALT, "Alt+Down"),
        KeyTableEntry::new(b"\x1b[1;3C", Right, Modifiers::ALT, "Alt+Right"),
        KeyTableEntry::new(b"\x1b[1;3D", Left, Modifiers::ALT, "Alt+Left"),
        KeyTableEntry::new(b"\x1b[1;5A", Up, Modifiers::CTRL, "Ctrl+Up"),
        KeyTableEntry::new(b"\x1b[1;5B", Down, Modifiers::CTRL, "Ctrl+Down"),
        KeyTableEntry::new(b"\x1b[1;5C", Right, Modifiers::CTRL, "Ctrl+Right"),
        KeyTableEntry::new(b"\x1b[1;5D", Left, Modifiers::CTRL, "Ctrl+Left"),
        KeyTableEntry::new(b"\x1b[Z", Tab, Modifiers::SHIFT, "Shift+Tab"),
        // Single-byte keys.
        KeyTableEntry::new(b"\x0d", Enter, none, "Enter"),
        KeyTableEntry::new(b"\x0a", Enter, none, "Enter"),
        KeyTableEntry::new(b"\x09", Tab, none, "Tab"),
        KeyTableEntry::new(b"\x7f", Backspace, none, "Backspace"),
        KeyTableEntry::new(b"\x08", Backspace, none, "Backspace"),
        KeyTableEntry::new(b"\x1b", Escape, none, "Escape"),
        KeyTableEntry::new(b"\x00", Null, Modifiers::CTRL, "Ctrl+Space"),
    ];

    // Ctrl+letter control codes. H/I/J/M already mapped above as
    // Backspace/Tab/Enter.
    for i in 0..26u8 {
        let byte = i + 1;
        if matches!(byte, 0x08 | 0x09 | 0x0A | 0x0D) {
            continue;
        }
        t.push(KeyTableEntry::new(
            &[byte],
            KeyCode::Char((b'a' + i) as char),
            Modifiers::CTRL,
            CTRL_NAMES[i as usize],
        ));
    }

    // Alt+letter meta combinations (ESC-prefix convention).
    for i in 0..26u8 {
        t.push(KeyTableEntry::new(
            &[0x1B, b'a' + i],
            KeyCode::Char((b'a' + i) as char),
            Modifiers::ALT,
            ALT_NAMES[i as usize],
        ));
    }

    t
}

// =============================================================================
// Detector
// =============================================================================

/// Outcome of matching the accumulated buffer against the table.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyMatch {
    /// Nothing matches; the buffer was discarded.
    None,
    /// The buffer is a strict prefix of at least one entry; wait.
    Prefix,
    /// Resolved. The detector has reset.
    Exact(KeyInput),
    /// An exact match is held but a longer entry could still match; the
    /// ambiguity timeout is armed.
    Ambiguous,
}

/// Running counters for the detector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyStats {
    /// Keys resolved (immediate and forced).
    pub detections: u64,
    /// Ambiguous holds resolved by timeout.
    pub forced_resolutions: u64,
    /// Buffers discarded with no match.
    pub discarded: u64,
}

/// Accumulating matcher over the key sequence table.
#[derive(Debug)]
pub struct KeyDetector {
    table: Vec<KeyTableEntry>,
    buf: Vec<u8>,
    max_len: usize,
    /// Index of the exact match held during an ambiguous wait.
    pending: Option<usize>,
    pending_since: Option<Instant>,
    stats: KeyStats,
}

impl KeyDetector {
    pub fn new(config: &ParserConfig) -> Self {
        Self::with_table(default_table(), config.key_buffer_max)
    }

    /// A detector over a custom table. Used by tests and by callers with
    /// terminal-specific extensions.
    pub fn with_table(table: Vec<KeyTableEntry>, max_len: usize) -> Self {
        Self {
            table,
            buf: Vec::with_capacity(max_len),
            max_len,
            pending: None,
            pending_since: None,
            stats: KeyStats::default(),
        }
    }

    /// Append `bytes` to the accumulation buffer and classify it.
    pub fn process_sequence(&mut self, bytes: &[u8], now: Instant) -> KeyMatch {
        for &b in bytes {
            if self.buf.len() >= self.max_len {
                // Accumulation never exceeds the configured maximum.
                self.stats.discarded += 1;
                self.reset();
                return KeyMatch::None;
            }
            self.buf.push(b);
        }

        let (exact, longer_prefix) = self.scan();
        match (exact, longer_prefix) {
            (Some(idx), true) => {
                self.pending = Some(idx);
                self.pending_since.get_or_insert(now);
                KeyMatch::Ambiguous
            }
            (Some(idx), false) => {
                self.stats.detections += 1;
                let key = self.make_key(idx);
                self.reset();
                KeyMatch::Exact(key)
            }
            (None, true) => {
                // Any held exact match no longer equals the buffer.
                self.pending = None;
                self.pending_since = None;
                KeyMatch::Prefix
            }
            (None, false) => {
                self.stats.discarded += 1;
                self.reset();
                KeyMatch::None
            }
        }
    }

    /// Resolve a held ambiguous match (the ambiguity timeout elapsed).
    pub fn force_resolution(&mut self) -> Option<KeyInput> {
        let idx = self.pending?;
        self.stats.detections += 1;
        self.stats.forced_resolutions += 1;
        let key = self.make_key(idx);
        self.reset();
        Some(key)
    }

    /// Whether bytes are accumulated awaiting more input or a timeout.
    pub fn is_waiting(&self) -> bool {
        !self.buf.is_empty()
    }

    /// When the current ambiguous hold started.
    pub fn pending_since(&self) -> Option<Instant> {
        self.pending_since
    }

    pub fn reset(&mut self) {
        self.buf.clear();
        self.pending = None;
        self.pending_since = None;
    }

    pub fn stats(&self) -> KeyStats {
        self.stats
    }

    /// One pass over the table: is there an entry equal to the buffer, and
    /// is there a longer entry the buffer strictly prefixes?
    fn scan(&self) -> (Option<usize>, bool) {
        let mut exact = None;
        let mut longer_prefix = false;
        for (i, entry) in self.table.iter().enumerate() {
            if entry.sequence == self.buf {
                exact = Some(i);
            } else if entry.sequence.len() > self.buf.len()
                && entry.sequence.starts_with(&self.buf)
            {
                longer_prefix = true;
            }
        }
        (exact, longer_prefix)
    }

    fn make_key(&self, idx: usize) -> KeyInput {
        let entry = &self.table[idx];
        KeyInput::new(entry.code, entry.modifiers, entry.name, self.buf.clone())
    }
}
