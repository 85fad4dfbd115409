// THEORY:
// This file is the entry point of the `motion_interval` library crate. The public API
// is the `MotionSession` and the two session drivers in `pipeline`, together with the
// collaborator traits a caller implements to plug in cameras, decoders and sinks.
//
// The stages themselves live in `core_modules`, leaves first:
// frame -> preprocessor -> reference_frame -> motion_classifier -> interval_tracker
// -> interval_accumulator. Each stage is usable on its own, which is how the tests
// drive the interval state machine with synthetic motion counts.

pub mod collaborators;
pub mod config;
pub mod core_modules;
pub mod error;
pub mod pipeline;
pub mod sources;

pub use crate::collaborators::{DisplaySink, FrameSource, OutputSink};
pub use crate::config::DetectorConfig;
pub use crate::core_modules::clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use crate::core_modules::frame::RawFrame;
pub use crate::core_modules::interval_accumulator::{Interval, IntervalTable};
pub use crate::core_modules::interval_tracker::{EdgePolicy, EventKind, TimestampEvent};
pub use crate::core_modules::motion_classifier::{BoundingBox, MotionSample};
pub use crate::error::{Result, SessionError};
pub use crate::pipeline::{FrameReport, MotionSession, run_live_session, run_replay_session};
pub use tokio_util::sync::CancellationToken;
