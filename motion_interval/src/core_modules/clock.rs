// THEORY:
// Interval timestamps are wall-clock read times, taken at the moment an edge is accepted.
// The clock is a trait so the state machine can be driven with fully controlled time.

use chrono::{DateTime, Duration, Local};
use std::cell::Cell;

pub type Timestamp = DateTime<Local>;

pub trait Clock {
    fn now(&self) -> Timestamp;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Local::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    current: Cell<Timestamp>,
}

impl ManualClock {
    pub fn starting_at(start: Timestamp) -> Self {
        Self {
            current: Cell::new(start),
        }
    }

    pub fn set(&self, at: Timestamp) {
        self.current.set(at);
    }

    pub fn advance(&self, by: Duration) {
        self.current.set(self.current.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.current.get()
    }
}
