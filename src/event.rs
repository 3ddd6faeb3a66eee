//! Parsed input event types.
//!
//! `ParsedInput` is the single output currency of the parser system: a tagged
//! payload plus bookkeeping (handled flag, parse duration). Payload variants
//! carry their own fields so every dispatch site gets exhaustiveness checking
//! from the compiler.

use std::time::{Duration, Instant};

use unicode_width::UnicodeWidthChar;

// =============================================================================
// Modifiers
// =============================================================================

bitflags::bitflags! {
    /// Keyboard modifier state, shared by key and mouse events.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Modifiers: u8 {
        const NONE  = 0;
        const SHIFT = 1 << 0;
        const ALT   = 1 << 1;
        const CTRL  = 1 << 2;
        const SUPER = 1 << 3;
    }
}

impl Default for Modifiers {
    fn default() -> Self {
        Self::NONE
    }
}

// =============================================================================
// Key events
// =============================================================================

/// Symbolic key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    Char(char),
    Enter,
    Tab,
    Backspace,
    Escape,
    Delete,
    Insert,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    F(u8),
    Null,
}

/// A resolved symbolic key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInput {
    pub code: KeyCode,
    pub modifiers: Modifiers,
    /// Human-readable name, e.g. `"Up"` or `"Ctrl+C"`.
    pub name: &'static str,
    /// The wire bytes that produced this key.
    pub raw: Vec<u8>,
}

impl KeyInput {
    pub fn new(code: KeyCode, modifiers: Modifiers, name: &'static str, raw: Vec<u8>) -> Self {
        Self {
            code,
            modifiers,
            name,
            raw,
        }
    }
}

// =============================================================================
// Text
// =============================================================================

/// A single decoded codepoint of printable text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextInput {
    pub codepoint: char,
    /// UTF-8 encoding of `codepoint`, inline.
    bytes: [u8; 4],
    len: u8,
    /// Display columns (2 for wide/emoji, 0 for combining, else 1).
    pub width: u8,
}

impl TextInput {
    pub fn from_char(codepoint: char) -> Self {
        let mut bytes = [0u8; 4];
        let len = codepoint.encode_utf8(&mut bytes).len() as u8;
        let width = codepoint.width().unwrap_or(1) as u8;
        Self {
            codepoint,
            bytes,
            len,
            width,
        }
    }

    /// The replacement character U+FFFD, substituted for invalid encodings.
    pub fn replacement() -> Self {
        Self::from_char('\u{FFFD}')
    }

    /// UTF-8 bytes of the codepoint.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

// =============================================================================
// Mouse events
// =============================================================================

/// What the mouse did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseAction {
    Press,
    Release,
    Move,
    Drag,
    Wheel,
}

/// Which button was involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    #[default]
    None,
}

/// A decoded mouse report, common to the X10 and SGR wire formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    pub action: MouseAction,
    pub button: MouseButton,
    /// Column, 0-based (wire formats are 1-based).
    pub x: u16,
    /// Row, 0-based.
    pub y: u16,
    pub modifiers: Modifiers,
    /// +1 for wheel up, -1 for wheel down, 0 otherwise.
    pub wheel_delta: i8,
    pub double_click: bool,
    pub triple_click: bool,
    pub timestamp: Instant,
}

// =============================================================================
// Control sequences
// =============================================================================

/// Escape sequence family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceKind {
    /// `ESC [` Control Sequence Introducer.
    Csi,
    /// `ESC ]` Operating System Command.
    Osc,
    /// `ESC P` Device Control String.
    Dcs,
    /// `ESC N` Single Shift Two.
    Ss2,
    /// `ESC O` Single Shift Three.
    Ss3,
    /// `ESC <byte>` two-byte control pair that matched no other family.
    EscPair,
}

/// A completed escape sequence that did not resolve to a symbolic key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlSequence {
    pub kind: SequenceKind,
    /// Parsed numeric CSI parameters (at most 16).
    pub params: Vec<u32>,
    /// Intermediate bytes (`0x20`-`0x2F`) and private markers.
    pub intermediates: Vec<u8>,
    /// Final byte (`0x40`-`0x7E`), or the terminating byte for OSC/DCS.
    pub final_byte: u8,
    /// String payload for OSC/DCS, empty otherwise.
    pub payload: Vec<u8>,
    /// The complete wire bytes.
    pub raw: Vec<u8>,
}

// =============================================================================
// ParsedInput
// =============================================================================

/// The payload of a parsed construct. A true sum type: matching on it is
/// exhaustive at every dispatch site.
#[derive(Debug, Clone, PartialEq)]
pub enum InputPayload {
    /// One printable codepoint.
    Text(TextInput),
    /// A resolved symbolic key.
    Key(KeyInput),
    /// A decoded mouse report.
    Mouse(MouseEvent),
    /// A structurally valid escape sequence with no key mapping.
    Sequence(ControlSequence),
    /// Bracketed paste contents.
    Paste(String),
    /// Terminal focus gained (`true`) or lost (`false`).
    Focus(bool),
}

/// One recognized input construct, consumed immediately by event generation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedInput {
    pub payload: InputPayload,
    /// Set by the keybinding hook when a binding claims this input.
    pub handled: bool,
    /// Wall time from first byte of the construct to emission.
    pub parse_duration: Duration,
}

impl ParsedInput {
    pub fn new(payload: InputPayload) -> Self {
        Self {
            payload,
            handled: false,
            parse_duration: Duration::ZERO,
        }
    }

    pub fn with_duration(payload: InputPayload, parse_duration: Duration) -> Self {
        Self {
            payload,
            handled: false,
            parse_duration,
        }
    }

    /// Shorthand for a text event.
    pub fn text(codepoint: char) -> Self {
        Self::new(InputPayload::Text(TextInput::from_char(codepoint)))
    }

    /// Shorthand for a key event.
    pub fn key(key: KeyInput) -> Self {
        Self::new(InputPayload::Key(key))
    }
}
