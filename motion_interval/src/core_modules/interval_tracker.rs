// THEORY:
// The `interval_tracker` module is the temporal half of the engine. It turns the noisy
// per-frame motion count into a clean, alternating list of start/end events, which is
// the only thing the interval table is built from.
//
// Key architectural principles:
// 1.  **Two-sample window**: the `MotionSignal` keeps exactly the previous and current
//     count. Before any sample exists both slots hold the "no sample" sentinel.
// 2.  **Edge policy**: `Presence` normalises the count to "any motion at all", so a
//     scene going from one to two moving regions is still one interval.
//     `ExactCount` reproduces the literal `0 -> 1` / `1 -> 0` comparison, which misses
//     any transition through a multi-region state.
// 3.  **State gating**: an edge is only accepted when it moves the machine between
//     `Idle` and `Active`. Events therefore always alternate start/end, whatever the
//     policy reports.
// 4.  **Termination**: when the session stops while `Active`, a synthetic end event is
//     appended at the stop time so every start has a matching end.

use crate::core_modules::clock::{Clock, Timestamp};
use serde::Deserialize;
use tracing::{debug, info};

/// How the motion count is reduced to the binary signal that edges are detected on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgePolicy {
    /// Motion is present whenever at least one region was counted.
    #[default]
    Presence,
    /// Only a count of exactly one opens, and exactly one followed by zero closes.
    ExactCount,
}

impl EdgePolicy {
    fn edge(self, previous: Option<usize>, current: usize) -> Option<EventKind> {
        match self {
            EdgePolicy::Presence => match (previous.map(|count| count > 0), current > 0) {
                (None | Some(false), true) => Some(EventKind::MotionStart),
                (Some(true), false) => Some(EventKind::MotionEnd),
                _ => None,
            },
            EdgePolicy::ExactCount => match (previous, current) {
                (Some(0), 1) => Some(EventKind::MotionStart),
                (Some(1), 0) => Some(EventKind::MotionEnd),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    MotionStart,
    MotionEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampEvent {
    pub kind: EventKind,
    pub at: Timestamp,
}

/// The two most recent motion counts, oldest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotionSignal {
    window: [Option<usize>; 2],
}

impl MotionSignal {
    pub fn push(&mut self, count: usize) {
        self.window = [self.window[1], Some(count)];
    }

    pub fn previous(&self) -> Option<usize> {
        self.window[0]
    }

    pub fn current(&self) -> Option<usize> {
        self.window[1]
    }

    pub fn window(&self) -> [Option<usize>; 2] {
        self.window
    }
}

#[derive(Debug, Clone)]
pub struct IntervalTracker {
    policy: EdgePolicy,
    state: TrackerState,
    signal: MotionSignal,
    events: Vec<TimestampEvent>,
}

impl IntervalTracker {
    pub fn new(policy: EdgePolicy) -> Self {
        Self {
            policy,
            state: TrackerState::Idle,
            signal: MotionSignal::default(),
            events: Vec::new(),
        }
    }

    /// Feeds one classified sample. The clock is read only if an edge is accepted.
    pub fn observe<C: Clock>(&mut self, count: usize, clock: &C) -> Option<TimestampEvent> {
        self.signal.push(count);
        let kind = self.policy.edge(self.signal.previous(), count)?;

        let next_state = match (kind, self.state) {
            (EventKind::MotionStart, TrackerState::Idle) => TrackerState::Active,
            (EventKind::MotionEnd, TrackerState::Active) => TrackerState::Idle,
            _ => {
                debug!(?kind, state = ?self.state, "edge ignored in current state");
                return None;
            }
        };

        let event = TimestampEvent {
            kind,
            at: clock.now(),
        };
        info!(?kind, at = %event.at, "motion edge");
        self.state = next_state;
        self.events.push(event);
        Some(event)
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn signal(&self) -> MotionSignal {
        self.signal
    }

    pub fn events(&self) -> &[TimestampEvent] {
        &self.events
    }

    /// Ends the session, closing an open interval at the current time.
    pub fn finish<C: Clock>(mut self, clock: &C) -> Vec<TimestampEvent> {
        if self.state == TrackerState::Active {
            let event = TimestampEvent {
                kind: EventKind::MotionEnd,
                at: clock.now(),
            };
            info!(at = %event.at, "closing open interval at termination");
            self.events.push(event);
            self.state = TrackerState::Idle;
        }
        self.events
    }
}
