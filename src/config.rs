//! Parser configuration.
//!
//! Every timeout is an independent knob. The original system nominally shared
//! one sequence-completion constant but its call sites disagreed (ESC
//! disambiguation, click windows, and poll shortening all used different
//! values), so nothing here assumes a common constant.

use std::time::Duration;

/// Tunable timeouts and buffer capacities for the whole parser system.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// How long an escape sequence may accumulate before it is declared
    /// stalled and recovered.
    pub sequence_timeout: Duration,

    /// How long the key detector holds an ambiguous match (an exact match
    /// that is also a strict prefix of a longer entry) before resolving to
    /// the exact match.
    pub key_ambiguity_timeout: Duration,

    /// How long a lone ESC byte waits before it is emitted as a standalone
    /// Escape key instead of the start of an Alt/Meta sequence.
    pub esc_standalone_timeout: Duration,

    /// Maximum gap between two presses for the second to count as a
    /// double-click.
    pub double_click_window: Duration,

    /// Maximum gap between the second and third press for the third to count
    /// as a triple-click.
    pub triple_click_window: Duration,

    /// Shortened poll timeout used while any sub-parser is mid-sequence, so
    /// a bare ESC or a just-finished Alt+key resolves promptly.
    pub pending_poll_timeout: Duration,

    /// Hard capacity of the input stream's byte buffer.
    pub stream_capacity: usize,

    /// Hard capacity of the escape-sequence accumulation buffer.
    pub sequence_buffer_capacity: usize,

    /// Maximum bytes the key detector will accumulate while matching.
    pub key_buffer_max: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            sequence_timeout: Duration::from_millis(500),
            key_ambiguity_timeout: Duration::from_millis(300),
            esc_standalone_timeout: Duration::from_millis(300),
            double_click_window: Duration::from_millis(400),
            triple_click_window: Duration::from_millis(500),
            pending_poll_timeout: Duration::from_millis(50),
            stream_capacity: 4096,
            sequence_buffer_capacity: 128,
            key_buffer_max: 32,
        }
    }
}
