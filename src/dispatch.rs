//! Event generation and dispatch.
//!
//! Wraps each [`ParsedInput`] in an [`OutputEvent`] with a classification,
//! a delivery priority, and a monotonic sequence number, then runs the two
//! optional integration hooks:
//!
//! - a [`KeybindingEngine`] gets first refusal on key events and marks the
//!   input handled when a binding claims it;
//! - [`WidgetHooks`] observe every event after classification.
//!
//! Both hooks are plain trait objects handed in by the embedding editor; a
//! dispatcher with neither installed just classifies and numbers.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::event::{InputPayload, KeyInput, ParsedInput};

/// Identifier of an editor action bound to a key.
pub type ActionId = u64;

/// Coarse classification of an output event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Text,
    KeyPress,
    /// A structurally valid sequence with no key mapping.
    KeySequence,
    Mouse,
    Paste,
    /// Terminal focus changes and similar state reports.
    TerminalState,
}

/// Delivery priority. Higher-priority events should be acted on before
/// buffered text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventPriority {
    Low,
    Normal,
    High,
}

/// One dispatched event.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputEvent {
    pub kind: EventKind,
    pub priority: EventPriority,
    /// Monotonic per-dispatcher ordinal.
    pub sequence: u64,
    /// The action a keybinding resolved this event to, if any.
    pub action: Option<ActionId>,
    pub input: ParsedInput,
}

/// Resolves key events to editor actions.
pub trait KeybindingEngine: Send {
    fn lookup(&self, key: &KeyInput) -> Option<ActionId>;
}

/// Observes every dispatched event (focus tracking, widget invalidation).
pub trait WidgetHooks: Send {
    fn on_event(&mut self, event: &OutputEvent);
}

/// Receives the final event stream.
pub trait EventSink: Send {
    fn accept(&mut self, event: OutputEvent);
}

/// Classifier and fan-out point for parsed inputs.
#[derive(Default)]
pub struct EventDispatcher {
    sequence: AtomicU64,
    keybindings: Option<Box<dyn KeybindingEngine>>,
    hooks: Option<Box<dyn WidgetHooks>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_keybindings(&mut self, engine: Box<dyn KeybindingEngine>) {
        self.keybindings = Some(engine);
    }

    pub fn set_widget_hooks(&mut self, hooks: Box<dyn WidgetHooks>) {
        self.hooks = Some(hooks);
    }

    /// Classify and number a batch of parsed inputs.
    pub fn generate_events(&mut self, inputs: Vec<ParsedInput>) -> Vec<OutputEvent> {
        inputs.into_iter().map(|i| self.generate(i)).collect()
    }

    /// Classify, number, and deliver straight into a sink.
    pub fn dispatch(&mut self, inputs: Vec<ParsedInput>, sink: &mut dyn EventSink) {
        for input in inputs {
            let event = self.generate(input);
            sink.accept(event);
        }
    }

    fn generate(&mut self, mut input: ParsedInput) -> OutputEvent {
        let (kind, priority) = classify(&input.payload);

        let mut action = None;
        if let InputPayload::Key(key) = &input.payload {
            if let Some(engine) = &self.keybindings {
                action = engine.lookup(key);
                if action.is_some() {
                    input.handled = true;
                }
            }
        }

        let event = OutputEvent {
            kind,
            priority,
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            action,
            input,
        };
        if let Some(hooks) = self.hooks.as_mut() {
            hooks.on_event(&event);
        }
        event
    }
}

fn classify(payload: &InputPayload) -> (EventKind, EventPriority) {
    match payload {
        InputPayload::Text(_) => (EventKind::Text, EventPriority::Low),
        InputPayload::Key(_) => (EventKind::KeyPress, EventPriority::Normal),
        InputPayload::Sequence(_) => (EventKind::KeySequence, EventPriority::High),
        InputPayload::Mouse(_) => (EventKind::Mouse, EventPriority::High),
        InputPayload::Paste(_) => (EventKind::Paste, EventPriority::Low),
        InputPayload::Focus(_) => (EventKind::TerminalState, EventPriority::High),
    }
}
