//! The active form's draft record and the controls that write into it.
//!
//! Counter and stopwatch controls write straight into the draft held by a
//! [`LiveForm`]. The store only sees the record when it is submitted.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::controls::{
    Control, ControlHandle, ControlKey, ControlRegistry, Registration, Stopwatch, TimeSink,
    TimedField,
};
use crate::error::{Error, Result};
use crate::remote::{RemoteTarget, SheetAppender};
use crate::schema::{self, Counter, CycleGroup, FieldPath, LeafField, Phase, Value};
use crate::store::SubmissionStore;
use crate::submission::Submission;

/// A recorded-times sequence in the draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimesField {
    /// "Cycle Times" of a cycle group.
    Cycle(CycleGroup),
    /// "Defense Times".
    Defense,
}

impl TimesField {
    /// Every times field, in mount order.
    pub const ALL: [TimesField; 3] = [
        TimesField::Cycle(CycleGroup::Autonomous),
        TimesField::Cycle(CycleGroup::Teleop),
        TimesField::Defense,
    ];

    /// The field a stopwatch mounted at `(phase, field)` records into.
    #[must_use]
    pub fn for_control(phase: Phase, field: TimedField) -> Option<Self> {
        match (field, CycleGroup::for_phase(phase)) {
            (TimedField::CycleTimes, Some(group)) => Some(Self::Cycle(group)),
            (TimedField::DefenseTimes, None) => Some(Self::Defense),
            _ => None,
        }
    }

    /// Where a stopwatch for this field is mounted.
    #[must_use]
    pub fn control_slot(self) -> (Phase, TimedField) {
        match self {
            Self::Cycle(CycleGroup::Autonomous) => (Phase::Autonomous, TimedField::CycleTimes),
            Self::Cycle(CycleGroup::Teleop) => (Phase::Teleop, TimedField::CycleTimes),
            Self::Defense => (Phase::Misc, TimedField::DefenseTimes),
        }
    }

    /// The schema path of the sequence.
    #[must_use]
    pub fn path(self) -> FieldPath {
        match self {
            Self::Cycle(group) => FieldPath::Cycle(group, schema::CycleLeaf::CycleTimes),
            Self::Defense => FieldPath::Leaf(LeafField::DefenseTimes),
        }
    }

    fn times_mut(self, draft: &mut Submission) -> &mut Vec<f64> {
        match self {
            Self::Cycle(group) => &mut draft.cycles_mut(group).cycle_times,
            Self::Defense => &mut draft.defense_times,
        }
    }
}

/// What happened to the remote append after a local commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    /// No appender or no target configured.
    Skipped,
    /// The collaborator confirmed the append.
    Sent(String),
    /// The append failed; the local record stands.
    Failed(String),
}

/// Outcome of [`LiveForm::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    /// Index of the committed record in the store.
    pub index: usize,
    /// Remote append result.
    pub remote: RemoteStatus,
}

/// The draft record of the form currently on screen.
#[derive(Debug, Clone, Default)]
pub struct LiveForm {
    draft: Arc<Mutex<Submission>>,
}

impl LiveForm {
    /// An empty draft.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A draft pre-filled from an existing record.
    #[must_use]
    pub fn from_submission(record: Submission) -> Self {
        Self {
            draft: Arc::new(Mutex::new(record)),
        }
    }

    fn draft(&self) -> MutexGuard<'_, Submission> {
        // Every write to the draft is a single assignment.
        self.draft.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the draft.
    #[must_use]
    pub fn snapshot(&self) -> Submission {
        self.draft().clone()
    }

    /// Set a field from textual input.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unknown paths or rejected input; the
    /// draft is then unchanged.
    pub fn set_field(&self, path: &str, raw: &str) -> Result<Value> {
        let path: FieldPath = path.parse()?;
        let value = schema::coerce(path, raw)?;
        self.draft().set(path, value.clone())?;
        Ok(value)
    }

    /// Add one to a counter. Returns the new count.
    pub fn increment(&self, group: CycleGroup, counter: Counter) -> u32 {
        let mut draft = self.draft();
        let slot = draft.cycles_mut(group).counter_mut(counter);
        *slot = slot.saturating_add(1);
        *slot
    }

    /// Append a time, rounded to hundredths. Non-positive times are dropped.
    pub fn record_time(&self, field: TimesField, seconds: f64) {
        let seconds = schema::round_hundredths(seconds);
        if seconds <= 0.0 || !seconds.is_finite() {
            warn!(path = %field.path(), seconds, "Ignoring non-positive time");
            return;
        }
        field.times_mut(&mut self.draft()).push(seconds);
    }

    /// Delete a recorded time by index. Returns the removed time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] if there is no time at `index`.
    pub fn remove_time(&self, field: TimesField, index: usize) -> Result<f64> {
        let mut draft = self.draft();
        let times = field.times_mut(&mut draft);
        if index >= times.len() {
            return Err(Error::IndexOutOfRange {
                index,
                len: times.len(),
            });
        }
        Ok(times.remove(index))
    }

    /// Discard the draft.
    pub fn clear(&self) {
        *self.draft() = Submission::default();
    }

    /// A control that increments one counter.
    #[must_use]
    pub fn counter_control(&self, group: CycleGroup, counter: Counter) -> Arc<dyn Control> {
        Arc::new(CounterControl {
            form: self.clone(),
            group,
            counter,
        })
    }

    /// A stopwatch whose saves append to `field`.
    ///
    /// # Errors
    ///
    /// Returns an error when called outside a tokio runtime.
    pub fn stopwatch(&self, field: TimesField) -> Result<Arc<Stopwatch>> {
        let sink = Arc::new(TimesSink {
            form: self.clone(),
            field,
        });
        Ok(Arc::new(Stopwatch::new(field.path().to_string(), sink)?))
    }

    /// Mount every counter and stopwatch of the form into `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error when called outside a tokio runtime.
    pub fn mount(&self, registry: &Arc<ControlRegistry>) -> Result<MountedControls> {
        let mut registrations = Vec::new();
        for group in [CycleGroup::Autonomous, CycleGroup::Teleop] {
            let phase = match group {
                CycleGroup::Autonomous => Phase::Autonomous,
                CycleGroup::Teleop => Phase::Teleop,
            };
            for counter in Counter::ALL {
                registrations.push(registry.register(
                    phase,
                    ControlKey::Counter(counter),
                    ControlHandle::Counter(self.counter_control(group, counter)),
                ));
            }
        }

        let mut stopwatches = Vec::new();
        for field in TimesField::ALL {
            let stopwatch = self.stopwatch(field)?;
            let (phase, timed) = field.control_slot();
            registrations.push(registry.register(
                phase,
                ControlKey::Stopwatch(timed),
                ControlHandle::Stopwatch(stopwatch.clone()),
            ));
            stopwatches.push((field, stopwatch));
        }

        debug!(controls = registrations.len(), "Form controls mounted");
        Ok(MountedControls {
            registrations,
            stopwatches,
        })
    }

    /// Validate the draft, commit it to the store, then send it remotely.
    ///
    /// The local commit happens first; a remote failure is reported in the
    /// receipt and does not undo it.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the draft is incomplete, or a
    /// persistence error if the store cannot write. Nothing is sent then.
    pub async fn submit(
        &self,
        store: &SubmissionStore,
        remote: Option<(&dyn SheetAppender, &RemoteTarget)>,
    ) -> Result<SubmitReceipt> {
        let record = self.snapshot();
        record.validate()?;
        let index = store.append(record.clone())?;

        let remote = match remote {
            None => RemoteStatus::Skipped,
            Some((appender, target)) => match appender.append(&record, target).await {
                Ok(message) => {
                    info!(index, "Submission sent to remote sheet");
                    RemoteStatus::Sent(message)
                }
                Err(e) => {
                    warn!(index, error = %e, "Remote append failed, record kept locally");
                    RemoteStatus::Failed(e.to_string())
                }
            },
        };
        Ok(SubmitReceipt { index, remote })
    }
}

/// Controls mounted by [`LiveForm::mount`]. Dropping this unmounts them.
#[derive(Debug)]
pub struct MountedControls {
    registrations: Vec<Registration>,
    stopwatches: Vec<(TimesField, Arc<Stopwatch>)>,
}

impl MountedControls {
    /// Number of mounted controls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Whether nothing was mounted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// The stopwatch recording into `field`.
    #[must_use]
    pub fn stopwatch(&self, field: TimesField) -> Option<&Arc<Stopwatch>> {
        self.stopwatches
            .iter()
            .find_map(|(f, s)| (*f == field).then_some(s))
    }
}

struct CounterControl {
    form: LiveForm,
    group: CycleGroup,
    counter: Counter,
}

impl Control for CounterControl {
    fn trigger(&self) {
        let count = self.form.increment(self.group, self.counter);
        debug!(counter = self.counter.name(), count, "Counter incremented");
    }
}

struct TimesSink {
    form: LiveForm,
    field: TimesField,
}

impl TimeSink for TimesSink {
    fn record(&self, seconds: f64) {
        self.form.record_time(self.field, seconds);
    }
}
