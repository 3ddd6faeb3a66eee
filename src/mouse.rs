//! Mouse protocol decoders.
//!
//! Two wire formats feed the same `MouseEvent`:
//!
//! - X10: fixed `ESC [ M <btn+32> <x+33> <y+33>` — byte-biased, coordinates
//!   capped by the printable-byte encoding.
//! - SGR: `ESC [ < btn ; x ; y (M|m)` — decimal, unbounded coordinates,
//!   trailing `M` press / `m` release.
//!
//! The coordinator hands this parser the bytes *after* the `ESC [ M` /
//! `ESC [ <` introducer. Decoding is stateless per report; the only
//! cross-call state is the pressed-button mask (distinguishes Move from
//! Drag) and the click clock (double/triple promotion).

use std::time::Instant;

use crate::config::ParserConfig;
use crate::error::InputError;
use crate::event::{Modifiers, MouseAction, MouseButton, MouseEvent};

/// Which wire format the in-flight report uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseProtocol {
    X10,
    Sgr,
}

/// Running counters for the mouse parser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MouseStats {
    pub parsed: u64,
    pub invalid: u64,
}

/// X10 body: button, x, y.
const X10_BODY_LEN: usize = 3;
/// SGR body cap: three decimal numbers and two separators is far below this.
const SGR_MAX_BODY: usize = 24;

/// Button-byte bit layout shared by both protocols.
const BTN_BASE_MASK: u16 = 0x03;
const BTN_SHIFT: u16 = 0x04;
const BTN_ALT: u16 = 0x08;
const BTN_CTRL: u16 = 0x10;
const BTN_MOTION: u16 = 0x20;
const BTN_WHEEL: u16 = 0x40;

#[derive(Debug)]
pub struct MouseParser {
    tracking_enabled: bool,
    active: Option<MouseProtocol>,
    buf: Vec<u8>,
    last_x: u16,
    last_y: u16,
    /// Bitmask of currently pressed buttons (bit 0 = left).
    pressed: u8,
    last_press: Option<Instant>,
    click_count: u32,
    stats: MouseStats,
}

impl MouseParser {
    pub fn new() -> Self {
        Self {
            tracking_enabled: true,
            active: None,
            buf: Vec::with_capacity(SGR_MAX_BODY),
            last_x: 0,
            last_y: 0,
            pressed: 0,
            last_press: None,
            click_count: 0,
            stats: MouseStats::default(),
        }
    }

    pub fn set_tracking(&mut self, enabled: bool) {
        self.tracking_enabled = enabled;
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking_enabled
    }

    /// Start accumulating a report. The introducer bytes are already gone.
    pub fn begin(&mut self, protocol: MouseProtocol) {
        self.active = Some(protocol);
        self.buf.clear();
    }

    /// Whether a report is mid-flight.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Feed one body byte. Returns the decoded event once the report
    /// completes.
    pub fn feed(
        &mut self,
        byte: u8,
        now: Instant,
        config: &ParserConfig,
    ) -> Result<Option<MouseEvent>, InputError> {
        match self.active {
            None => Err(InputError::InvalidState),
            Some(MouseProtocol::X10) => {
                self.buf.push(byte);
                if self.buf.len() < X10_BODY_LEN {
                    return Ok(None);
                }
                self.active = None;
                let cb = u16::from(self.buf[0].wrapping_sub(32));
                let x = u16::from(self.buf[1].wrapping_sub(33));
                let y = u16::from(self.buf[2].wrapping_sub(33));
                Ok(Some(self.resolve(cb, x, y, true, false, now, config)))
            }
            Some(MouseProtocol::Sgr) => match byte {
                b'M' | b'm' => {
                    self.active = None;
                    self.decode_sgr(byte == b'm', now, config).map(Some)
                }
                b'0'..=b'9' | b';' => {
                    if self.buf.len() >= SGR_MAX_BODY {
                        self.active = None;
                        self.stats.invalid += 1;
                        return Err(InputError::BufferOverflow {
                            bytes: std::mem::take(&mut self.buf),
                        });
                    }
                    self.buf.push(byte);
                    Ok(None)
                }
                _ => {
                    self.active = None;
                    self.buf.clear();
                    self.stats.invalid += 1;
                    Err(InputError::InvalidFormat {
                        context: "SGR mouse report",
                        bytes: Vec::new(),
                    })
                }
            },
        }
    }

    fn decode_sgr(
        &mut self,
        is_release: bool,
        now: Instant,
        config: &ParserConfig,
    ) -> Result<MouseEvent, InputError> {
        let body = std::mem::take(&mut self.buf);
        let mut parts = [0u32; 3];
        let mut count = 0;
        for field in body.split(|&b| b == b';') {
            if count == 3 || field.is_empty() {
                count = usize::MAX;
                break;
            }
            let mut value: u32 = 0;
            for &d in field {
                value = value.saturating_mul(10) + u32::from(d - b'0');
            }
            parts[count] = value;
            count += 1;
        }
        if count != 3 {
            self.stats.invalid += 1;
            return Err(InputError::InvalidFormat {
                context: "SGR mouse parameters",
                bytes: Vec::new(),
            });
        }

        let cb = parts[0].min(u32::from(u16::MAX)) as u16;
        // 1-based wire coordinates to 0-based.
        let x = parts[1].saturating_sub(1).min(u32::from(u16::MAX)) as u16;
        let y = parts[2].saturating_sub(1).min(u32::from(u16::MAX)) as u16;
        Ok(self.resolve(cb, x, y, false, is_release, now, config))
    }

    /// Shared event-type resolution over the decoded button byte.
    fn resolve(
        &mut self,
        cb: u16,
        x: u16,
        y: u16,
        from_x10: bool,
        sgr_release: bool,
        now: Instant,
        config: &ParserConfig,
    ) -> MouseEvent {
        let mut modifiers = Modifiers::NONE;
        if cb & BTN_SHIFT != 0 {
            modifiers |= Modifiers::SHIFT;
        }
        if cb & BTN_ALT != 0 {
            modifiers |= Modifiers::ALT;
        }
        if cb & BTN_CTRL != 0 {
            modifiers |= Modifiers::CTRL;
        }
        let base = cb & BTN_BASE_MASK;

        let mut event = MouseEvent {
            action: MouseAction::Press,
            button: MouseButton::None,
            x,
            y,
            modifiers,
            wheel_delta: 0,
            double_click: false,
            triple_click: false,
            timestamp: now,
        };

        if cb & BTN_WHEEL != 0 {
            event.action = MouseAction::Wheel;
            event.wheel_delta = if base & 1 == 0 { 1 } else { -1 };
        } else if cb & BTN_MOTION != 0 {
            if self.pressed == 0 {
                event.action = MouseAction::Move;
            } else {
                event.action = MouseAction::Drag;
                event.button = if base < 3 {
                    button_from_base(base)
                } else {
                    self.lowest_pressed()
                };
            }
        } else if from_x10 && base == 3 {
            // X10 reports "a release" without saying which button.
            event.action = MouseAction::Release;
            event.button = self.lowest_pressed();
            self.pressed = 0;
        } else if sgr_release {
            event.action = MouseAction::Release;
            event.button = button_from_base(base);
            if base < 3 {
                self.pressed &= !(1 << base);
            }
        } else {
            event.action = MouseAction::Press;
            event.button = button_from_base(base);
            if base < 3 {
                self.pressed |= 1 << base;
            }
            self.register_click(now, config);
            event.double_click = self.click_count == 2;
            event.triple_click = self.click_count >= 3;
        }

        self.last_x = x;
        self.last_y = y;
        self.stats.parsed += 1;
        event
    }

    /// Multi-click promotion. The second press is judged against the
    /// double-click window, the third (and beyond) against the triple-click
    /// window.
    fn register_click(&mut self, now: Instant, config: &ParserConfig) {
        let window = if self.click_count >= 2 {
            config.triple_click_window
        } else {
            config.double_click_window
        };
        match self.last_press {
            Some(prev) if now.saturating_duration_since(prev) <= window => {
                self.click_count += 1;
            }
            _ => self.click_count = 1,
        }
        self.last_press = Some(now);
    }

    fn lowest_pressed(&self) -> MouseButton {
        if self.pressed & 0b001 != 0 {
            MouseButton::Left
        } else if self.pressed & 0b010 != 0 {
            MouseButton::Middle
        } else if self.pressed & 0b100 != 0 {
            MouseButton::Right
        } else {
            MouseButton::Left
        }
    }

    /// Last known pointer position.
    pub fn position(&self) -> (u16, u16) {
        (self.last_x, self.last_y)
    }

    pub fn reset(&mut self) {
        self.active = None;
        self.buf.clear();
        self.pressed = 0;
        self.last_press = None;
        self.click_count = 0;
    }

    pub fn stats(&self) -> MouseStats {
        self.stats
    }
}

impl Default for MouseParser {
    fn default() -> Self {
        Self::new()
    }
}

fn button_from_base(base: u16) -> MouseButton {
    match base {
        0 => MouseButton::Left,
        1 => MouseButton::Middle,
        2 => MouseButton::Right,
        _ => MouseButton::None,
    }
}
