//! Async-signal-safe terminal signal observation.
//!
//! Handlers do nothing but set a flag; the read loop polls the flags between
//! events and reacts on its own thread. Registration is once per process:
//! the flags are cloneable and shared instead of re-registered.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::InputError;

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Flag set observed by the read loop.
#[derive(Debug, Clone)]
pub struct SignalFlags {
    resize: Arc<AtomicBool>,
    suspend: Arc<AtomicBool>,
    resume: Arc<AtomicBool>,
}

impl SignalFlags {
    /// Register handlers for SIGWINCH, SIGTSTP, and SIGCONT.
    ///
    /// Only one installation per process; further calls fail rather than
    /// stacking handlers. Clone the returned flags to share them.
    pub fn install() -> Result<Self, InputError> {
        if INSTALLED.swap(true, Ordering::SeqCst) {
            return Err(InputError::InvalidParameter(
                "signal handlers already installed",
            ));
        }
        let flags = Self {
            resize: Arc::new(AtomicBool::new(false)),
            suspend: Arc::new(AtomicBool::new(false)),
            resume: Arc::new(AtomicBool::new(false)),
        };
        signal_hook::flag::register(signal_hook::consts::SIGWINCH, Arc::clone(&flags.resize))?;
        signal_hook::flag::register(signal_hook::consts::SIGTSTP, Arc::clone(&flags.suspend))?;
        signal_hook::flag::register(signal_hook::consts::SIGCONT, Arc::clone(&flags.resume))?;
        Ok(flags)
    }

    /// Check and clear the resize flag.
    pub fn take_resize(&self) -> bool {
        self.resize.swap(false, Ordering::SeqCst)
    }

    /// Check and clear the suspend flag.
    pub fn take_suspend(&self) -> bool {
        self.suspend.swap(false, Ordering::SeqCst)
    }

    /// Check and clear the resume flag.
    pub fn take_resume(&self) -> bool {
        self.resume.swap(false, Ordering::SeqCst)
    }
}
