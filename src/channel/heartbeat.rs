//! Heartbeat monitor.
//!
//! One interval timer per channel. Every interval that elapses without a
//! qualifying receive counts as a miss; reaching the threshold is fatal for the
//! channel. Reconnecting is left to the caller.

use std::time::Duration;

/// Outcome of advancing the monitor by one update tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatTick {
    /// Interval not yet elapsed, or monitoring disabled.
    Idle,
    /// An interval elapsed without a receive; `count` misses so far.
    Missed { count: u32 },
    /// `count` consecutive misses reached the threshold.
    TimedOut { count: u32 },
}

#[derive(Debug, Clone)]
pub struct HeartbeatState {
    interval: Duration,
    elapsed: Duration,
    missed: u32,
    threshold: u32,
}

impl HeartbeatState {
    pub fn new(interval: Duration, threshold: u32) -> Self {
        Self {
            interval,
            elapsed: Duration::ZERO,
            missed: 0,
            threshold: threshold.max(1),
        }
    }

    /// Advance by `delta`. A single tick longer than several intervals counts as one miss.
    pub fn tick(&mut self, delta: Duration) -> HeartbeatTick {
        if self.interval.is_zero() {
            return HeartbeatTick::Idle;
        }

        self.elapsed += delta;
        if self.elapsed < self.interval {
            return HeartbeatTick::Idle;
        }

        self.elapsed = Duration::ZERO;
        self.missed = self.missed.saturating_add(1);
        if self.missed >= self.threshold {
            HeartbeatTick::TimedOut { count: self.missed }
        } else {
            HeartbeatTick::Missed { count: self.missed }
        }
    }

    /// Clear the miss counter, and optionally restart the current interval.
    pub fn reset(&mut self, reset_elapsed: bool) {
        if reset_elapsed {
            self.elapsed = Duration::ZERO;
        }
        self.missed = 0;
    }

    pub fn missed_count(&self) -> u32 {
        self.missed
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: Duration = Duration::from_secs(1);

    #[test]
    fn misses_accumulate_until_threshold() {
        let mut hb = HeartbeatState::new(SEC, 3);
        assert_eq!(hb.tick(SEC / 2), HeartbeatTick::Idle);
        assert_eq!(hb.tick(SEC / 2), HeartbeatTick::Missed { count: 1 });
        assert_eq!(hb.tick(SEC), HeartbeatTick::Missed { count: 2 });
        assert_eq!(hb.tick(SEC), HeartbeatTick::TimedOut { count: 3 });
    }

    #[test]
    fn reset_clears_misses() {
        let mut hb = HeartbeatState::new(SEC, 2);
        hb.tick(SEC);
        assert_eq!(hb.missed_count(), 1);
        hb.reset(false);
        assert_eq!(hb.missed_count(), 0);
        assert_eq!(hb.tick(SEC), HeartbeatTick::Missed { count: 1 });
    }

    #[test]
    fn reset_elapsed_restarts_interval() {
        let mut hb = HeartbeatState::new(SEC, 5);
        hb.tick(SEC * 3 / 4);
        hb.reset(false);
        assert_eq!(hb.tick(SEC / 4), HeartbeatTick::Missed { count: 1 });

        hb.tick(SEC * 3 / 4);
        hb.reset(true);
        assert_eq!(hb.elapsed(), Duration::ZERO);
        assert_eq!(hb.tick(SEC / 4), HeartbeatTick::Idle);
    }

    #[test]
    fn zero_interval_disables() {
        let mut hb = HeartbeatState::new(Duration::ZERO, 1);
        assert_eq!(hb.tick(SEC * 100), HeartbeatTick::Idle);
        assert_eq!(hb.missed_count(), 0);
    }

    #[test]
    fn long_tick_counts_once() {
        let mut hb = HeartbeatState::new(SEC, 3);
        assert_eq!(hb.tick(SEC * 10), HeartbeatTick::Missed { count: 1 });
    }
}
