//! Single-key shortcuts routed to the controls of the active phase.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::{ControlKey, ControlRegistry};
use crate::schema::{Counter, Phase};

/// A key-down event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// The character produced by the key.
    pub key: char,
    /// Control modifier held.
    pub ctrl: bool,
    /// Alt/option modifier held.
    pub alt: bool,
    /// Meta/command modifier held.
    pub meta: bool,
}

impl KeyEvent {
    /// A key pressed with no modifiers.
    #[must_use]
    pub fn plain(key: char) -> Self {
        Self {
            key,
            ctrl: false,
            alt: false,
            meta: false,
        }
    }

    fn has_modifier(&self) -> bool {
        self.ctrl || self.alt || self.meta
    }
}

/// UI state the dispatcher reads but does not own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchContext {
    /// Phase whose tab has focus.
    pub active_phase: Phase,
    /// Whether a text input currently has focus.
    pub text_input_focused: bool,
}

impl DispatchContext {
    /// Context with `phase` active and no text input focused.
    #[must_use]
    pub fn phase(phase: Phase) -> Self {
        Self {
            active_phase: phase,
            text_input_focused: false,
        }
    }
}

/// What a key is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    /// Increment a counter of the active phase.
    Count(Counter),
    /// Start or pause every stopwatch of the active phase.
    ToggleStopwatches,
    /// Save every stopwatch that is running or holds time.
    SaveStopwatches,
    /// Reset every stopwatch.
    ResetStopwatches,
}

impl Shortcut {
    /// The fixed routing table.
    #[must_use]
    pub fn for_key(key: char) -> Option<Self> {
        let shortcut = match key {
            '1' => Self::Count(Counter::CoralLevel1),
            '2' => Self::Count(Counter::CoralLevel2),
            '3' => Self::Count(Counter::CoralLevel3),
            '4' => Self::Count(Counter::CoralLevel4),
            'P' | 'p' => Self::Count(Counter::Processor),
            'N' | 'n' => Self::Count(Counter::Net),
            ' ' => Self::ToggleStopwatches,
            'S' | 's' => Self::SaveStopwatches,
            'R' | 'r' => Self::ResetStopwatches,
            _ => return None,
        };
        Some(shortcut)
    }
}

impl fmt::Display for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(counter) => write!(f, "count {}", counter.name()),
            Self::ToggleStopwatches => f.write_str("toggle stopwatches"),
            Self::SaveStopwatches => f.write_str("save stopwatches"),
            Self::ResetStopwatches => f.write_str("reset stopwatches"),
        }
    }
}

/// Result of dispatching one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A text input had focus or a modifier was held.
    Suppressed,
    /// The key has no shortcut.
    Unbound,
    /// Bound, but nothing is mounted for it under the active phase.
    NoHandle(Shortcut),
    /// Fired on `controls` controls.
    Handled {
        /// The shortcut that fired.
        shortcut: Shortcut,
        /// How many controls it reached.
        controls: usize,
    },
}

/// Routes key-down events to mounted controls.
#[derive(Debug, Clone)]
pub struct KeyboardDispatcher {
    registry: Arc<ControlRegistry>,
}

impl KeyboardDispatcher {
    /// Create a dispatcher over a registry.
    #[must_use]
    pub fn new(registry: Arc<ControlRegistry>) -> Self {
        Self { registry }
    }

    /// Handle one key-down event.
    pub fn dispatch(&self, event: KeyEvent, context: DispatchContext) -> Dispatch {
        if context.text_input_focused || event.has_modifier() {
            trace!(key = ?event.key, "Shortcut suppressed");
            return Dispatch::Suppressed;
        }
        let Some(shortcut) = Shortcut::for_key(event.key) else {
            return Dispatch::Unbound;
        };
        let phase = context.active_phase;

        let controls = match shortcut {
            Shortcut::Count(counter) => {
                match self.registry.get(phase, ControlKey::Counter(counter)) {
                    Some(handle) => {
                        handle.trigger();
                        1
                    }
                    None => 0,
                }
            }
            Shortcut::ToggleStopwatches => {
                let stopwatches = self.registry.stopwatches(phase);
                for stopwatch in &stopwatches {
                    stopwatch.trigger();
                }
                stopwatches.len()
            }
            Shortcut::SaveStopwatches => {
                let mut saved = 0;
                for stopwatch in self.registry.stopwatches(phase) {
                    if stopwatch.is_running() || stopwatch.has_recorded_time() {
                        stopwatch.save();
                        saved += 1;
                    }
                }
                saved
            }
            Shortcut::ResetStopwatches => {
                let stopwatches = self.registry.stopwatches(phase);
                for stopwatch in &stopwatches {
                    stopwatch.reset();
                }
                stopwatches.len()
            }
        };

        if controls == 0 {
            trace!(phase = %phase, %shortcut, "No control mounted for shortcut");
            Dispatch::NoHandle(shortcut)
        } else {
            debug!(phase = %phase, %shortcut, controls, "Shortcut handled");
            Dispatch::Handled { shortcut, controls }
        }
    }

    /// Dispatch events from a channel until every sender is dropped.
    pub fn spawn(self, mut events: mpsc::Receiver<(KeyEvent, DispatchContext)>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some((event, context)) = events.recv().await {
                self.dispatch(event, context);
            }
            debug!("Key event channel closed");
        })
    }
}
