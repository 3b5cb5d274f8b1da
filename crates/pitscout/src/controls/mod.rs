//! Live input controls and the directory the keyboard drives them through.
//!
//! Controls register themselves in a [`ControlRegistry`] under a
//! `(phase, key)` pair while they are mounted. The registry is an explicit
//! object owned by the form view, never a process global. Registration
//! returns a guard; dropping the guard unmounts the control.

pub mod dispatcher;
pub mod stopwatch;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, trace};

use crate::schema::{Counter, Phase, CYCLE_TIMES};

pub use dispatcher::{Dispatch, DispatchContext, KeyEvent, KeyboardDispatcher, Shortcut};
pub use stopwatch::{Stopwatch, StopwatchState, StopwatchStatus, TimeSink, TICK};

/// Something a shortcut can fire.
pub trait Control: Send + Sync {
    /// Perform the control's primary action.
    fn trigger(&self);
}

/// A timer control. `trigger` toggles between running and paused.
pub trait StopwatchControl: Control {
    /// Whether time is accumulating.
    fn is_running(&self) -> bool;

    /// Whether there is unsaved elapsed time.
    fn has_recorded_time(&self) -> bool;

    /// Freeze elapsed time.
    fn pause(&self);

    /// Zero elapsed time and stop.
    fn reset(&self);

    /// Record the elapsed time and return to idle.
    ///
    /// Returns the recorded seconds, or `None` when nothing had elapsed.
    fn save(&self) -> Option<f64>;
}

/// Fields that are recorded with a stopwatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimedField {
    /// "Cycle Times" inside a cycle group.
    CycleTimes,
    /// "Defense Times".
    DefenseTimes,
}

impl TimedField {
    /// Human-readable field key.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::CycleTimes => CYCLE_TIMES,
            Self::DefenseTimes => "Defense Times",
        }
    }
}

/// The field half of a registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKey {
    /// A scoring counter.
    Counter(Counter),
    /// A stopwatch.
    Stopwatch(TimedField),
}

impl fmt::Display for ControlKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Counter(c) => f.write_str(c.name()),
            Self::Stopwatch(t) => f.write_str(t.name()),
        }
    }
}

/// A registered control's capabilities.
#[derive(Clone)]
pub enum ControlHandle {
    /// Fires once per trigger.
    Counter(Arc<dyn Control>),
    /// A stopwatch with its full capability set.
    Stopwatch(Arc<dyn StopwatchControl>),
}

impl fmt::Debug for ControlHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Counter(_) => f.write_str("ControlHandle::Counter"),
            Self::Stopwatch(s) => f
                .debug_struct("ControlHandle::Stopwatch")
                .field("running", &s.is_running())
                .finish(),
        }
    }
}

impl ControlHandle {
    /// Fire the control's primary action.
    pub fn trigger(&self) {
        match self {
            Self::Counter(c) => c.trigger(),
            Self::Stopwatch(s) => s.trigger(),
        }
    }
}

#[derive(Debug)]
struct Slot {
    token: u64,
    handle: ControlHandle,
}

/// Directory of mounted controls, keyed by `(phase, key)`.
#[derive(Debug, Default)]
pub struct ControlRegistry {
    slots: Mutex<HashMap<(Phase, ControlKey), Slot>>,
    next_token: AtomicU64,
}

impl ControlRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<(Phase, ControlKey), Slot>> {
        // The map holds no invariant a panicking holder could break.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mount a control. A later registration for the same key replaces
    /// this one; the returned guard deregisters only its own slot.
    #[must_use = "dropping the registration unmounts the control immediately"]
    pub fn register(
        self: &Arc<Self>,
        phase: Phase,
        key: ControlKey,
        handle: ControlHandle,
    ) -> Registration {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let replaced = self
            .slots()
            .insert((phase, key), Slot { token, handle })
            .is_some();
        debug!(phase = %phase, key = %key, replaced, "Control registered");
        Registration {
            registry: Arc::downgrade(self),
            phase,
            key,
            token,
        }
    }

    fn deregister(&self, phase: Phase, key: ControlKey, token: u64) {
        let mut slots = self.slots();
        if slots.get(&(phase, key)).is_some_and(|slot| slot.token == token) {
            slots.remove(&(phase, key));
            debug!(phase = %phase, key = %key, "Control deregistered");
        } else {
            trace!(phase = %phase, key = %key, "Stale registration dropped");
        }
    }

    /// The control mounted at a key, if any.
    #[must_use]
    pub fn get(&self, phase: Phase, key: ControlKey) -> Option<ControlHandle> {
        self.slots().get(&(phase, key)).map(|slot| slot.handle.clone())
    }

    /// Every stopwatch mounted under a phase.
    #[must_use]
    pub fn stopwatches(&self, phase: Phase) -> Vec<Arc<dyn StopwatchControl>> {
        self.slots()
            .iter()
            .filter(|((p, _), _)| *p == phase)
            .filter_map(|(_, slot)| match &slot.handle {
                ControlHandle::Stopwatch(s) => Some(Arc::clone(s)),
                ControlHandle::Counter(_) => None,
            })
            .collect()
    }

    /// Number of mounted controls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    /// Whether no control is mounted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }
}

/// Keeps a control mounted until dropped.
#[derive(Debug)]
pub struct Registration {
    registry: Weak<ControlRegistry>,
    phase: Phase,
    key: ControlKey,
    token: u64,
}

impl Registration {
    /// The phase the control is mounted under.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The key the control is mounted at.
    #[must_use]
    pub fn key(&self) -> ControlKey {
        self.key
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.deregister(self.phase, self.key, self.token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Tally(AtomicUsize);

    impl Control for Tally {
        fn trigger(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counter_key() -> ControlKey {
        ControlKey::Counter(Counter::Net)
    }

    #[test]
    fn test_register_and_unmount() {
        let registry = ControlRegistry::new();
        let tally = Arc::new(Tally::default());

        let registration = registry.register(
            Phase::Teleop,
            counter_key(),
            ControlHandle::Counter(tally.clone()),
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registration.phase(), Phase::Teleop);

        registry.get(Phase::Teleop, counter_key()).unwrap().trigger();
        assert_eq!(tally.0.load(Ordering::SeqCst), 1);

        drop(registration);
        assert!(registry.is_empty());
        assert!(registry.get(Phase::Teleop, counter_key()).is_none());
    }

    #[test]
    fn test_same_key_in_other_phase_is_separate() {
        let registry = ControlRegistry::new();
        let _auto = registry.register(
            Phase::Autonomous,
            counter_key(),
            ControlHandle::Counter(Arc::new(Tally::default())),
        );
        let _teleop = registry.register(
            Phase::Teleop,
            counter_key(),
            ControlHandle::Counter(Arc::new(Tally::default())),
        );
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = ControlRegistry::new();
        let first = Arc::new(Tally::default());
        let second = Arc::new(Tally::default());

        let first_reg = registry.register(
            Phase::Teleop,
            counter_key(),
            ControlHandle::Counter(first.clone()),
        );
        let _second_reg = registry.register(
            Phase::Teleop,
            counter_key(),
            ControlHandle::Counter(second.clone()),
        );
        registry.get(Phase::Teleop, counter_key()).unwrap().trigger();
        assert_eq!(first.0.load(Ordering::SeqCst), 0);
        assert_eq!(second.0.load(Ordering::SeqCst), 1);

        // Unmounting the replaced control leaves the newer one in place.
        drop(first_reg);
        assert_eq!(registry.len(), 1);
        registry.get(Phase::Teleop, counter_key()).unwrap().trigger();
        assert_eq!(second.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_registration_outliving_registry() {
        let registry = ControlRegistry::new();
        let registration = registry.register(
            Phase::Misc,
            counter_key(),
            ControlHandle::Counter(Arc::new(Tally::default())),
        );
        drop(registry);
        drop(registration);
    }

    #[test]
    fn test_control_key_display() {
        assert_eq!(ControlKey::Counter(Counter::CoralLevel2).to_string(), "Coral Level 2");
        assert_eq!(
            ControlKey::Stopwatch(TimedField::CycleTimes).to_string(),
            "Cycle Times"
        );
    }
}
