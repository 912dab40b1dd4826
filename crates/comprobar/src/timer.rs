//! Claim Timing
//!
//! Each simple claim measures its own elapsed time through a [`Timer`]
//! created by the [`TimerFactory`] it was constructed with. Nothing here reads
//! an ambient clock on its own: [`MonotonicTimer`] is the default capability,
//! [`FixedTimer`] replaces it in tests.

use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Measures the elapsed time of one claim validation.
pub trait Timer {
    /// Begin measuring
    fn start(&mut self);

    /// Stop measuring
    fn stop(&mut self);

    /// Elapsed time between `start` and `stop`, in milliseconds
    fn duration_in_millis(&self) -> f64;
}

/// Produces a fresh [`Timer`] for every validation.
#[derive(Clone)]
pub struct TimerFactory {
    make: Rc<dyn Fn() -> Box<dyn Timer>>,
}

impl TimerFactory {
    /// Create a factory from a constructor closure
    pub fn new(make: impl Fn() -> Box<dyn Timer> + 'static) -> Self {
        Self {
            make: Rc::new(make),
        }
    }

    /// Factory producing [`MonotonicTimer`]s
    #[must_use]
    pub fn monotonic() -> Self {
        Self::new(|| Box::new(MonotonicTimer::default()))
    }

    /// Factory producing timers that always report `millis`
    #[must_use]
    pub fn fixed(millis: f64) -> Self {
        Self::new(move || Box::new(FixedTimer::new(millis)))
    }

    /// Create a new timer
    #[must_use]
    pub fn timer(&self) -> Box<dyn Timer> {
        (self.make)()
    }
}

impl Default for TimerFactory {
    fn default() -> Self {
        Self::monotonic()
    }
}

impl fmt::Debug for TimerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerFactory").finish_non_exhaustive()
    }
}

/// Timer backed by [`Instant`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicTimer {
    started: Option<Instant>,
    elapsed: Duration,
}

impl Timer for MonotonicTimer {
    fn start(&mut self) {
        self.started = Some(Instant::now());
        self.elapsed = Duration::ZERO;
    }

    fn stop(&mut self) {
        if let Some(started) = self.started.take() {
            self.elapsed = started.elapsed();
        }
    }

    fn duration_in_millis(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

/// Timer that ignores the clock and reports a preset duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedTimer {
    millis: f64,
    running: bool,
}

impl FixedTimer {
    /// Create a timer reporting `millis` once stopped
    #[must_use]
    pub const fn new(millis: f64) -> Self {
        Self {
            millis,
            running: false,
        }
    }
}

impl Timer for FixedTimer {
    fn start(&mut self) {
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn duration_in_millis(&self) -> f64 {
        if self.running {
            0.0
        } else {
            self.millis
        }
    }
}
