//! spark-input - terminal input parsing for interactive line editing.
//!
//! Turns the raw byte stream of a terminal in raw mode into typed input
//! events: text, symbolic keys, mouse reports, bracketed paste, focus
//! changes, and structurally valid escape sequences with no higher-level
//! meaning.
//!
//! # Architecture
//!
//! ```text
//!   terminal fd                 InputParserSystem                 editor
//!   ───────────                 ─────────────────                 ──────
//!   raw bytes ──▶ InputStream ──▶ byte router ──▶ ParsedInput ──▶ EventDispatcher
//!                                │                                  │
//!                     ┌──────────┼──────────┐                       │ keybinding
//!                     ▼          ▼          ▼                       │ lookup +
//!               SequenceParser  Utf8    MouseParser                 ▼ hooks
//!                     │       Processor                        OutputEvent
//!                     ▼
//!                KeyDetector         recoverable errors detour through
//!                                    ErrorRecovery and come back as
//!                                    substitute events (U+FFFD, replayed
//!                                    literal text) - parsing never halts
//! ```
//!
//! All timing is injected (`now: Instant` parameters), so escape
//! disambiguation, key ambiguity holds, and multi-click promotion are
//! deterministic under test. The descriptor-driven entry point
//! [`InputParserSystem::read_events`] supplies wall-clock time itself and
//! shortens its poll while any construct is mid-flight.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod keys;
pub mod machine;
pub mod mouse;
pub mod recovery;
pub mod sequence;
pub mod stream;
pub mod utf8;

#[cfg(unix)]
pub mod signal;

pub use config::ParserConfig;
pub use dispatch::{
    ActionId, EventDispatcher, EventKind, EventPriority, EventSink, KeybindingEngine, OutputEvent,
    WidgetHooks,
};
pub use error::InputError;
pub use event::{
    ControlSequence, InputPayload, KeyCode, KeyInput, Modifiers, MouseAction, MouseButton,
    MouseEvent, ParsedInput, SequenceKind, TextInput,
};
pub use keys::{KeyDetector, KeyMatch, KeyTableEntry};
pub use machine::{InputParserSystem, ParserMetrics, ParserState};
pub use mouse::{MouseParser, MouseProtocol};
pub use recovery::{ErrorRecovery, ErrorStats};
pub use sequence::{SequenceParser, SequenceStep};
pub use stream::InputStream;
pub use utf8::{DecodedChar, Utf8Processor};

#[cfg(unix)]
pub use signal::SignalFlags;
