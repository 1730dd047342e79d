//! Tick scheduling
//!
//! The control loop never reads the wall clock directly: it asks a
//! [`TickSource`] how much time passed since the previous tick and feeds that
//! to the integrator. Tests drive a [`ManualClock`] instead of sleeping.

use std::time::{Duration, Instant};

/// Something that reports elapsed time between ticks
pub trait TickSource {
    /// Time elapsed since the previous call (or since creation)
    fn elapsed(&mut self) -> Duration;

    /// Wait until the next tick is due
    fn pause(&mut self, interval: Duration);
}

/// Real-time tick source backed by `Instant`
#[derive(Debug)]
pub struct WallClock {
    last: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self { last: Instant::now() }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for WallClock {
    fn elapsed(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last);
        self.last = now;
        elapsed
    }

    fn pause(&mut self, interval: Duration) {
        std::thread::sleep(interval);
    }
}

/// Simulated tick source: every tick advances by a fixed step, pauses are free
#[derive(Debug, Clone, Copy)]
pub struct ManualClock {
    step: Duration,
}

impl ManualClock {
    pub fn new(step: Duration) -> Self {
        Self { step }
    }

    pub fn set_step(&mut self, step: Duration) {
        self.step = step;
    }
}

impl TickSource for ManualClock {
    fn elapsed(&mut self) -> Duration {
        self.step
    }

    fn pause(&mut self, _interval: Duration) {}
}

/// Rate gate: fires at most once per `interval` of simulated time
///
/// A fresh gate has never fired, so its first poll always fires.
#[derive(Debug, Clone, Copy)]
pub struct Gate {
    interval: Duration,
    last_fired: Option<Duration>,
}

impl Gate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_fired: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Fire if at least `interval` passed since the last firing
    pub fn poll(&mut self, now: Duration) -> bool {
        let due = match self.last_fired {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.interval,
        };
        if due {
            self.last_fired = Some(now);
        }
        due
    }

    /// Forget the last firing
    pub fn reset(&mut self) {
        self.last_fired = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_first_poll_fires() {
        let mut gate = Gate::new(Duration::from_millis(500));
        assert!(gate.poll(Duration::ZERO));
        assert!(!gate.poll(Duration::from_millis(499)));
        assert!(gate.poll(Duration::from_millis(500)));
        assert!(!gate.poll(Duration::from_millis(900)));
        assert!(gate.poll(Duration::from_millis(1000)));
    }

    #[test]
    fn test_gate_reset() {
        let mut gate = Gate::new(Duration::from_millis(10));
        assert!(gate.poll(Duration::from_millis(3)));
        gate.reset();
        assert!(gate.poll(Duration::from_millis(4)));
    }

    #[test]
    fn test_manual_clock() {
        let mut clock = ManualClock::new(Duration::from_millis(5));
        assert_eq!(clock.elapsed(), Duration::from_millis(5));
        clock.set_step(Duration::from_millis(500));
        clock.pause(Duration::from_secs(10));
        assert_eq!(clock.elapsed(), Duration::from_millis(500));
    }
}
