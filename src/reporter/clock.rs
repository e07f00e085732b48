//! Device time from GPS time
//!
//! The device clock may be wrong. Each fix carries GPS time, so the offset
//! between the two is re-estimated on every fix and every scheduling
//! decision uses wall clock plus offset.

use std::cell::Cell;
use std::rc::Rc;

use time::OffsetDateTime;
use tracing::debug;

/// Source of raw wall-clock time, ms since the epoch
pub trait WallClock {
    fn now_millis(&self) -> i64;
}

pub struct SystemClock;

impl WallClock for SystemClock {
    fn now_millis(&self) -> i64 {
        (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
    }
}

/// Hand-driven clock for replays and tests; clones share the same time
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<i64>>,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: Rc::new(Cell::new(now)),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.set(now);
    }

    pub fn advance(&self, millis: i64) {
        self.now.set(self.now.get() + millis);
    }
}

impl WallClock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.get()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClockOffset {
    /// GPS time minus wall-clock time, ms
    offset: i64,
}

impl ClockOffset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-estimates the offset from a fix received at `wall`
    pub fn observe(&mut self, fix_time: i64, wall: i64) {
        let offset = fix_time - wall;
        if offset != self.offset {
            debug!(offset, "clock offset updated");
        }
        self.offset = offset;
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Corrected device time for a wall-clock reading
    pub fn device_time(&self, wall: i64) -> i64 {
        wall + self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::{ClockOffset, ManualClock, WallClock};

    #[test]
    fn corrects_by_latest_fix() {
        let mut clock = ClockOffset::new();
        assert_eq!(5_000, clock.device_time(5_000));

        clock.observe(100_000, 40_000);
        assert_eq!(60_000, clock.offset());
        assert_eq!(65_000, clock.device_time(5_000));

        clock.observe(100_000, 100_250);
        assert_eq!(-250, clock.offset());
    }

    #[test]
    fn manual_clock_is_shared() {
        let clock = ManualClock::new(10);
        let view = clock.clone();
        clock.advance(5);
        assert_eq!(15, view.now_millis());
        view.set(3);
        assert_eq!(3, clock.now_millis());
    }
}
