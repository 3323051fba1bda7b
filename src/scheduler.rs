//! Frame scheduling
//!
//! The engine never drives itself. A [`FrameLoop`] is registered with a clock and
//! pumped from the host's animation callback: one call, at most one tick. Once
//! cancelled it refuses to run anything further.

use std::cell::Cell;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::engine::LayoutEngine;
use crate::frame::Frame;

/// Nominal tick length (60 frames per second)
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Smallest time step handed to the engine
pub const MIN_DT: f64 = 0.1;

/// Largest time step handed to the engine; slow frames slow the layout down
pub const MAX_DT: f64 = 1.0;

/// Monotonic time source
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`]
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-advanced clock for headless runs and tests
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

/// Drives an engine from an external clock
#[derive(Debug)]
pub struct FrameLoop<C: Clock> {
    clock: C,
    last: Option<Duration>,
    registered: bool,
}

impl<C: Clock> FrameLoop<C> {
    /// Register a loop; the first tick uses a full-length time step
    pub fn register(clock: C) -> Self {
        Self {
            clock,
            last: None,
            registered: true,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Time step for a tick happening now, in units of [`FRAME_INTERVAL`]
    fn next_dt(&mut self) -> f64 {
        let now = self.clock.now();
        let dt = match self.last {
            Some(last) => {
                let elapsed = now.saturating_sub(last);
                (elapsed.as_secs_f64() / FRAME_INTERVAL.as_secs_f64()).clamp(MIN_DT, MAX_DT)
            }
            None => MAX_DT,
        };
        self.last = Some(now);
        dt
    }

    /// Run at most one tick; `None` once cancelled or when the engine is not running
    pub fn tick(&mut self, engine: &mut LayoutEngine) -> Option<Frame> {
        if !self.registered {
            return None;
        }
        let dt = self.next_dt();
        engine.step(dt)
    }

    /// Deregister and stop the engine; no tick can run afterwards
    pub fn cancel(&mut self, engine: &mut LayoutEngine) {
        if self.registered {
            debug!(ticks = engine.ticks(), "cancelled frame loop");
        }
        self.registered = false;
        self.last = None;
        engine.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::dataset::fallback_records;
    use crate::graph::build;

    fn running_engine() -> LayoutEngine {
        let mut engine = LayoutEngine::new(build(&fallback_records()), LayoutConfig::default());
        engine.start();
        engine
    }

    #[test]
    fn one_tick_per_call() {
        let clock = ManualClock::new();
        let mut frames = FrameLoop::register(&clock);
        let mut engine = running_engine();

        for _ in 0..5 {
            clock.advance(FRAME_INTERVAL);
            assert!(frames.tick(&mut engine).is_some());
        }
        assert_eq!(engine.ticks(), 5);
    }

    #[test]
    fn dt_follows_clock_within_bounds() {
        let clock = ManualClock::new();
        let mut frames = FrameLoop::register(&clock);

        assert_eq!(frames.next_dt(), MAX_DT);
        clock.advance(FRAME_INTERVAL / 2);
        assert!((frames.next_dt() - 0.5).abs() < 1e-9);
        clock.advance(Duration::from_secs(5));
        assert_eq!(frames.next_dt(), MAX_DT);
        assert_eq!(frames.next_dt(), MIN_DT);
    }

    #[test]
    fn cancelled_loop_never_ticks_again() {
        let clock = ManualClock::new();
        let mut frames = FrameLoop::register(&clock);
        let mut engine = running_engine();

        frames.tick(&mut engine);
        frames.cancel(&mut engine);
        let after_cancel = engine.frame();

        clock.advance(FRAME_INTERVAL);
        assert!(!frames.is_registered());
        assert!(frames.tick(&mut engine).is_none());
        assert_eq!(engine.frame(), after_cancel);
        assert_eq!(engine.ticks(), 1);
    }

    #[test]
    fn same_clock_same_layout() {
        let run = || {
            let clock = ManualClock::new();
            let mut frames = FrameLoop::register(&clock);
            let mut engine = running_engine();
            for i in 0..40 {
                clock.advance(FRAME_INTERVAL * (1 + i % 3));
                frames.tick(&mut engine);
            }
            engine.frame()
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
