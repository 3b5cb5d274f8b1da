//! Elapsed-time stopwatch for timed fields.
//!
//! [`StopwatchState`] is the pure state machine; [`Stopwatch`] drives it
//! from a tokio interval task while running and hands saved times to a
//! [`TimeSink`].

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, trace};

use super::{Control, StopwatchControl};
use crate::error::{Error, Result};

/// Tick resolution. Each tick adds one hundredth of a second.
pub const TICK: Duration = Duration::from_millis(10);

/// Coarse lifecycle position of a stopwatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopwatchStatus {
    /// Zero elapsed, not running.
    Idle,
    /// Accumulating time.
    Running,
    /// Elapsed time frozen, may resume.
    Paused,
}

impl fmt::Display for StopwatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
        })
    }
}

/// Elapsed hundredths plus a running flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopwatchState {
    elapsed_hundredths: u64,
    running: bool,
}

impl StopwatchState {
    /// Elapsed time in hundredths of a second.
    #[must_use]
    pub fn elapsed_hundredths(&self) -> u64 {
        self.elapsed_hundredths
    }

    /// Elapsed time in seconds, two decimal places.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_hundredths as f64 / 100.0
    }

    /// Whether time is accumulating.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Where the stopwatch is in its lifecycle.
    #[must_use]
    pub fn status(&self) -> StopwatchStatus {
        match (self.running, self.elapsed_hundredths) {
            (true, _) => StopwatchStatus::Running,
            (false, 0) => StopwatchStatus::Idle,
            (false, _) => StopwatchStatus::Paused,
        }
    }

    /// Idle or paused to running. Returns `false` if already running.
    pub fn start(&mut self) -> bool {
        !std::mem::replace(&mut self.running, true)
    }

    /// Running to paused. Returns `false` if not running.
    pub fn pause(&mut self) -> bool {
        std::mem::replace(&mut self.running, false)
    }

    /// Any state to idle.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Advance one tick if running.
    pub fn tick(&mut self) {
        if self.running {
            self.elapsed_hundredths += 1;
        }
    }

    /// Return to idle, yielding the elapsed seconds if any time had elapsed.
    pub fn save(&mut self) -> Option<f64> {
        let seconds = (self.elapsed_hundredths > 0).then(|| self.elapsed_seconds());
        self.reset();
        seconds
    }
}

/// Receives times saved by a stopwatch.
pub trait TimeSink: Send + Sync {
    /// Append one saved time, in seconds.
    fn record(&self, seconds: f64);
}

/// A stopwatch ticking on the tokio runtime it was created on.
pub struct Stopwatch {
    label: String,
    state: Arc<Mutex<StopwatchState>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    sink: Arc<dyn TimeSink>,
    runtime: Handle,
}

impl fmt::Debug for Stopwatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stopwatch")
            .field("label", &self.label)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Both guarded values stay consistent across a panic.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Stopwatch {
    /// Create an idle stopwatch feeding `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error when called outside a tokio runtime.
    pub fn new(label: impl Into<String>, sink: Arc<dyn TimeSink>) -> Result<Self> {
        let runtime =
            Handle::try_current().map_err(|_| Error::internal("stopwatch needs a tokio runtime"))?;
        Ok(Self {
            label: label.into(),
            state: Arc::new(Mutex::new(StopwatchState::default())),
            ticker: Mutex::new(None),
            sink,
            runtime,
        })
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> StopwatchState {
        *lock(&self.state)
    }

    /// Idle or paused to running.
    pub fn start(&self) {
        // The ticker lock is taken before the state lock on every transition.
        let mut ticker = lock(&self.ticker);
        if !lock(&self.state).start() {
            return;
        }
        let state = Arc::clone(&self.state);
        let task = self.runtime.spawn(async move {
            let mut ticks = interval_at(Instant::now() + TICK, TICK);
            loop {
                ticks.tick().await;
                lock(&state).tick();
            }
        });
        if let Some(stale) = ticker.replace(task) {
            stale.abort();
        }
        drop(ticker);
        debug!(stopwatch = %self.label, "Stopwatch started");
    }

    /// Apply a transition out of running and cancel the ticker under one lock.
    fn stop<R>(&self, change: impl FnOnce(&mut StopwatchState) -> R) -> R {
        let mut ticker = lock(&self.ticker);
        let result = change(&mut *lock(&self.state));
        if let Some(task) = ticker.take() {
            task.abort();
            trace!(stopwatch = %self.label, "Ticker cancelled");
        }
        result
    }
}

impl Control for Stopwatch {
    fn trigger(&self) {
        if self.is_running() {
            self.pause();
        } else {
            self.start();
        }
    }
}

impl StopwatchControl for Stopwatch {
    fn is_running(&self) -> bool {
        lock(&self.state).is_running()
    }

    fn has_recorded_time(&self) -> bool {
        lock(&self.state).elapsed_hundredths() > 0
    }

    fn pause(&self) {
        let paused = self.stop(StopwatchState::pause);
        if paused {
            debug!(stopwatch = %self.label, "Stopwatch paused");
        }
    }

    fn reset(&self) {
        self.stop(StopwatchState::reset);
        debug!(stopwatch = %self.label, "Stopwatch reset");
    }

    fn save(&self) -> Option<f64> {
        let saved = self.stop(StopwatchState::save);
        if let Some(seconds) = saved {
            self.sink.record(seconds);
            debug!(stopwatch = %self.label, seconds, "Time saved");
        }
        saved
    }
}

impl Drop for Stopwatch {
    fn drop(&mut self) {
        self.stop(|_| ());
    }
}
