// THEORY:
// The accumulator is the last stage of a session. The tracker guarantees an alternating,
// even-length event list, so pairing is purely positional: event 0 with 1, 2 with 3.
// A list that breaks that shape is an internal defect, never something an operator did.
//
// The resulting `IntervalTable` is the only durable artifact of a session. It is
// written as CSV with exactly two columns and one row per interval.

use crate::core_modules::clock::Timestamp;
use crate::core_modules::interval_tracker::{EventKind, TimestampEvent};
use crate::error::{Result, SessionError};
use chrono::Duration;
use serde::{Serialize, Serializer};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Sortable wall-clock rendering used in the CSV output.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl Interval {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

#[derive(Serialize)]
struct IntervalRow<'a> {
    #[serde(rename = "Start Time", serialize_with = "render_timestamp")]
    start: &'a Timestamp,
    #[serde(rename = "End Time", serialize_with = "render_timestamp")]
    end: &'a Timestamp,
}

fn render_timestamp<S: Serializer>(at: &&Timestamp, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(&at.format(TIMESTAMP_FORMAT))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntervalTable {
    intervals: Vec<Interval>,
}

impl IntervalTable {
    /// Pairs an alternating start/end event list into intervals, in arrival order.
    pub fn from_events(events: &[TimestampEvent]) -> Result<Self> {
        if events.len() % 2 != 0 {
            return Err(SessionError::InvariantViolation(format!(
                "{} motion events cannot be paired into intervals",
                events.len()
            )));
        }

        let intervals = events
            .chunks_exact(2)
            .map(|pair| match (pair[0].kind, pair[1].kind) {
                (EventKind::MotionStart, EventKind::MotionEnd) => Ok(Interval {
                    start: pair[0].at,
                    end: pair[1].at,
                }),
                (first, second) => Err(SessionError::InvariantViolation(format!(
                    "expected a start/end pair, found {first:?} then {second:?}"
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { intervals })
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Interval> {
        self.intervals.iter()
    }

    pub fn total_duration(&self) -> Duration {
        self.intervals
            .iter()
            .fold(Duration::zero(), |total, interval| total + interval.duration())
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        // Header written by hand so that an empty table still carries it.
        let mut csv = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
        csv.write_record(["Start Time", "End Time"])?;
        for interval in &self.intervals {
            csv.serialize(IntervalRow {
                start: &interval.start,
                end: &interval.end,
            })?;
        }
        csv.flush()?;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        self.write_csv(file)
    }
}
