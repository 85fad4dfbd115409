// THEORY:
// The `pipeline` module is the top-level API of the engine. `MotionSession` owns every
// piece of per-session state (baseline, motion window, event list) and runs one frame
// through all stages. The driver functions wrap a session in the frame loop and wire up
// the external collaborators.
//
// Live recording and replay share a single loop. They differ only in their capability
// set: a live session may mirror every raw frame to an `OutputSink`, a replay never
// re-emits video. Neither sink can influence detection; a failing sink is detached and
// the session goes on.

use crate::collaborators::{DisplaySink, FrameSource, OutputSink};
use crate::config::DetectorConfig;
use crate::core_modules::clock::{Clock, SystemClock};
use crate::core_modules::frame::RawFrame;
use crate::core_modules::interval_accumulator::IntervalTable;
use crate::core_modules::interval_tracker::{IntervalTracker, TimestampEvent, TrackerState};
use crate::core_modules::motion_classifier::{MotionClassifier, MotionSample};
use crate::core_modules::overlay::draw_motion_boxes;
use crate::core_modules::preprocessor::Preprocessor;
use crate::core_modules::reference_frame::{Observation, ReferenceFrame};
use crate::error::{Result, SessionError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What a single frame did to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameReport {
    /// The frame became the session baseline.
    Baseline,
    /// The frame was classified; `event` is set when it opened or closed an interval.
    Classified {
        sample: MotionSample,
        event: Option<TimestampEvent>,
    },
}

/// All state of one detection session.
pub struct MotionSession<C: Clock = SystemClock> {
    preprocessor: Preprocessor,
    reference: ReferenceFrame,
    classifier: MotionClassifier,
    tracker: IntervalTracker,
    clock: C,
    frames_classified: u64,
}

impl MotionSession<SystemClock> {
    pub fn new(config: &DetectorConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> MotionSession<C> {
    pub fn with_clock(config: &DetectorConfig, clock: C) -> Self {
        Self {
            preprocessor: Preprocessor::new(config.blur_kernel_size),
            reference: ReferenceFrame::new(),
            classifier: MotionClassifier::new(config),
            tracker: IntervalTracker::new(config.edge_policy),
            clock,
            frames_classified: 0,
        }
    }

    /// Runs one frame through preprocessing, classification and interval tracking.
    ///
    /// A malformed frame leaves the session untouched and returns `MalformedFrame`.
    pub fn process_frame(&mut self, frame: &RawFrame) -> Result<FrameReport> {
        // Stage 1: Preprocessing
        let gray = self.preprocessor.process(frame)?;

        // Stage 2: Baseline
        let baseline = match self.reference.observe(&gray) {
            Observation::Captured => {
                info!(width = frame.width, height = frame.height, "reference frame captured");
                return Ok(FrameReport::Baseline);
            }
            Observation::Baseline(baseline) => baseline,
        };

        // Stage 3: Classification
        let sample = self.classifier.classify(&gray, baseline)?;

        // Stage 4: Interval Tracking
        let event = self.tracker.observe(sample.count, &self.clock);
        self.frames_classified += 1;
        debug!(count = sample.count, state = ?self.tracker.state(), "frame processed");

        Ok(FrameReport::Classified { sample, event })
    }

    pub fn state(&self) -> TrackerState {
        self.tracker.state()
    }

    pub fn events(&self) -> &[TimestampEvent] {
        self.tracker.events()
    }

    pub fn frames_classified(&self) -> u64 {
        self.frames_classified
    }

    /// Closes any open interval at the current time and pairs the events up.
    pub fn finish(self) -> Result<IntervalTable> {
        let events = self.tracker.finish(&self.clock);
        let table = IntervalTable::from_events(&events)?;
        info!(
            frames = self.frames_classified,
            intervals = table.len(),
            "session finished"
        );
        Ok(table)
    }
}

struct Sinks<'o, 'd> {
    output: Option<&'o mut dyn OutputSink>,
    display: Option<&'d mut dyn DisplaySink>,
}

impl Sinks<'_, '_> {
    fn forward_raw(&mut self, frame: &RawFrame) {
        if let Some(output) = self.output.as_deref_mut() {
            if let Err(e) = output.write_frame(frame) {
                warn!(error = %e, "output sink failed, no further frames will be written");
                self.output = None;
            }
        }
    }

    fn forward_annotated(&mut self, frame: &RawFrame, report: &FrameReport) {
        let Some(display) = self.display.as_deref_mut() else {
            return;
        };
        let result = frame.to_rgb_image().and_then(|mut image| {
            if let FrameReport::Classified { sample, .. } = report {
                draw_motion_boxes(&mut image, &sample.boxes);
            }
            display.show(&image)
        });
        if let Err(e) = result {
            warn!(error = %e, "display sink failed and was detached");
            self.display = None;
        }
    }

    fn finish(&mut self) {
        if let Some(output) = self.output.as_deref_mut() {
            if let Err(e) = output.finish() {
                warn!(error = %e, "output sink failed to finish");
            }
        }
    }
}

/// Records from a live source, optionally mirroring every raw frame to `output`.
pub fn run_live_session<S, C>(
    source: &mut S,
    output: Option<&mut dyn OutputSink>,
    display: Option<&mut dyn DisplaySink>,
    session: MotionSession<C>,
    cancel: &CancellationToken,
) -> Result<IntervalTable>
where
    S: FrameSource + ?Sized,
    C: Clock,
{
    info!("starting live session");
    drive(source, Sinks { output, display }, session, cancel)
}

/// Replays a decoded file. No video is re-emitted.
pub fn run_replay_session<S, C>(
    source: &mut S,
    display: Option<&mut dyn DisplaySink>,
    session: MotionSession<C>,
    cancel: &CancellationToken,
) -> Result<IntervalTable>
where
    S: FrameSource + ?Sized,
    C: Clock,
{
    info!("starting replay session");
    let sinks = Sinks {
        output: None,
        display,
    };
    drive(source, sinks, session, cancel)
}

fn drive<S, C>(
    source: &mut S,
    mut sinks: Sinks<'_, '_>,
    mut session: MotionSession<C>,
    cancel: &CancellationToken,
) -> Result<IntervalTable>
where
    S: FrameSource + ?Sized,
    C: Clock,
{
    let mut pulled: u64 = 0;
    let mut decoded: u64 = 0;
    let mut rejected: u64 = 0;

    loop {
        let pulled_frame = source.next_frame(cancel);
        pulled += 1;
        match pulled_frame {
            Ok(Some(frame)) => {
                if frame.validate().is_ok() {
                    decoded += 1;
                    sinks.forward_raw(&frame);
                }

                match session.process_frame(&frame) {
                    Ok(report) => sinks.forward_annotated(&frame, &report),
                    Err(SessionError::MalformedFrame(reason)) => {
                        rejected += 1;
                        warn!(%reason, "skipping malformed frame");
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(None) if decoded == 0 && !cancel.is_cancelled() => {
                return Err(SessionError::SourceUnavailable(
                    "source produced no decodable frames".into(),
                ));
            }
            Ok(None) => {
                info!(frames = decoded, "frame source exhausted");
                break;
            }
            Err(SessionError::MalformedFrame(reason)) => {
                rejected += 1;
                warn!(%reason, "skipping undecodable frame");
            }
            Err(e) if decoded == 0 => {
                return Err(SessionError::SourceUnavailable(e.to_string()));
            }
            Err(e) => {
                warn!(error = %e, frames = decoded, "frame pull failed, closing session");
                break;
            }
        }

        if cancel.is_cancelled() {
            info!(pulled, frames = decoded, "stop requested");
            break;
        }
    }

    sinks.finish();
    if rejected > 0 {
        warn!(rejected, "frames were skipped during the session");
    }
    session.finish()
}
