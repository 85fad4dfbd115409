use chrono::{Duration, Local, TimeZone};
use image::{Rgb, RgbImage};
use motion_interval::sources::{ImageSequenceSink, ImageSequenceSource};
use motion_interval::{
    CancellationToken, Clock, DetectorConfig, DisplaySink, EdgePolicy, FrameSource,
    ManualClock, MotionSession, OutputSink, RawFrame, Result, SessionError, Timestamp,
    run_live_session, run_replay_session,
};
use std::collections::VecDeque;

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;

fn base() -> Timestamp {
    Local.with_ymd_and_hms(2024, 3, 9, 18, 0, 0).unwrap()
}

fn quiet() -> RawFrame {
    RawFrame::filled(WIDTH, HEIGHT, [0, 0, 0])
}

/// A dark frame with white squares given as `(left, top, side)`.
fn moving(squares: &[(u32, u32, u32)]) -> RawFrame {
    let mut image = RgbImage::new(WIDTH, HEIGHT);
    for &(left, top, side) in squares {
        for y in top..top + side {
            for x in left..left + side {
                image.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
    }
    RawFrame::from_rgb_image(image)
}

fn one_object() -> RawFrame {
    moving(&[(100, 60, 120)])
}

fn two_objects() -> RawFrame {
    moving(&[(20, 20, 100), (200, 120, 100)])
}

fn malformed() -> RawFrame {
    RawFrame::new(WIDTH, HEIGHT, vec![0; 10])
}

/// Yields frames in order, moving the clock one second forward per frame.
/// Optionally cancels the session right after handing out the n-th frame.
struct ScriptedSource<'a> {
    frames: VecDeque<RawFrame>,
    clock: &'a ManualClock,
    cancel_after: Option<(usize, CancellationToken)>,
    pulled: usize,
}

impl<'a> ScriptedSource<'a> {
    fn new(frames: Vec<RawFrame>, clock: &'a ManualClock) -> Self {
        Self {
            frames: frames.into(),
            clock,
            cancel_after: None,
            pulled: 0,
        }
    }
}

impl FrameSource for ScriptedSource<'_> {
    fn next_frame(&mut self, _cancel: &CancellationToken) -> Result<Option<RawFrame>> {
        let Some(frame) = self.frames.pop_front() else {
            return Ok(None);
        };
        self.pulled += 1;
        self.clock.advance(Duration::seconds(1));
        if let Some((n, token)) = &self.cancel_after {
            if self.pulled == *n {
                token.cancel();
            }
        }
        Ok(Some(frame))
    }
}

struct FailingSource;

impl FrameSource for FailingSource {
    fn next_frame(&mut self, _cancel: &CancellationToken) -> Result<Option<RawFrame>> {
        Err(SessionError::Source("device disconnected".into()))
    }
}

/// Hands out its good frames first, then reports every further pull as undecodable.
struct FlakySource {
    good: VecDeque<RawFrame>,
    undecodable: usize,
    cancel_at: Option<(usize, CancellationToken)>,
    pulled: usize,
}

impl FlakySource {
    fn new(good: Vec<RawFrame>, undecodable: usize) -> Self {
        Self {
            good: good.into(),
            undecodable,
            cancel_at: None,
            pulled: 0,
        }
    }
}

impl FrameSource for FlakySource {
    fn next_frame(&mut self, _cancel: &CancellationToken) -> Result<Option<RawFrame>> {
        self.pulled += 1;
        if let Some((n, token)) = &self.cancel_at {
            if self.pulled == *n {
                token.cancel();
            }
        }
        if let Some(frame) = self.good.pop_front() {
            return Ok(Some(frame));
        }
        if self.undecodable == 0 {
            return Ok(None);
        }
        self.undecodable -= 1;
        Err(SessionError::MalformedFrame("corrupt frame".into()))
    }
}

#[derive(Default)]
struct RecordingSink {
    frames: Vec<RawFrame>,
    finished: bool,
}

impl OutputSink for RecordingSink {
    fn write_frame(&mut self, frame: &RawFrame) -> Result<()> {
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

#[derive(Default)]
struct BrokenSink {
    attempts: usize,
}

impl OutputSink for BrokenSink {
    fn write_frame(&mut self, _frame: &RawFrame) -> Result<()> {
        self.attempts += 1;
        Err(SessionError::Sink("disk full".into()))
    }
}

#[derive(Default)]
struct CollectingDisplay {
    shown: Vec<RgbImage>,
}

impl DisplaySink for CollectingDisplay {
    fn show(&mut self, frame: &RgbImage) -> Result<()> {
        self.shown.push(frame.clone());
        Ok(())
    }
}

fn session(clock: &ManualClock) -> MotionSession<&ManualClock> {
    MotionSession::with_clock(&DetectorConfig::default(), clock)
}

fn at(seconds: i64) -> Timestamp {
    base() + Duration::seconds(seconds)
}

#[test]
fn quiet_session_has_no_intervals() {
    let clock = ManualClock::starting_at(base());
    let mut source = ScriptedSource::new(vec![quiet(); 5], &clock);
    let table = run_replay_session(&mut source, None, session(&clock), &CancellationToken::new())
        .unwrap();
    assert!(table.is_empty());
}

#[test]
fn single_burst_is_one_interval() {
    let clock = ManualClock::starting_at(base());
    let frames = vec![
        quiet(),
        quiet(),
        quiet(),
        one_object(),
        one_object(),
        quiet(),
        quiet(),
    ];
    let mut source = ScriptedSource::new(frames, &clock);
    let table = run_replay_session(&mut source, None, session(&clock), &CancellationToken::new())
        .unwrap();

    assert_eq!(table.len(), 1);
    let interval = table.intervals()[0];
    assert_eq!(interval.start, at(4));
    assert_eq!(interval.end, at(6));
}

#[test]
fn motion_until_the_end_closes_at_termination() {
    let clock = ManualClock::starting_at(base());
    let frames = vec![quiet(), one_object(), one_object(), one_object()];
    let mut source = ScriptedSource::new(frames, &clock);
    let table = run_replay_session(&mut source, None, session(&clock), &CancellationToken::new())
        .unwrap();

    assert_eq!(table.len(), 1);
    assert_eq!(table.intervals()[0].start, at(2));
    assert_eq!(table.intervals()[0].end, clock.now());
}

#[test]
fn overlapping_objects_form_one_interval() {
    let clock = ManualClock::starting_at(base());
    let frames = vec![
        quiet(),
        quiet(),
        one_object(),
        two_objects(),
        two_objects(),
        one_object(),
        quiet(),
    ];
    let mut source = ScriptedSource::new(frames, &clock);
    let table = run_replay_session(&mut source, None, session(&clock), &CancellationToken::new())
        .unwrap();

    assert_eq!(table.len(), 1);
    assert_eq!(table.intervals()[0].start, at(3));
    assert_eq!(table.intervals()[0].end, at(7));
}

#[test]
fn exact_count_policy_ignores_two_object_entry() {
    let clock = ManualClock::starting_at(base());
    let config = DetectorConfig {
        edge_policy: EdgePolicy::ExactCount,
        ..DetectorConfig::default()
    };
    let frames = vec![quiet(), quiet(), two_objects(), two_objects(), quiet()];
    let mut source = ScriptedSource::new(frames, &clock);
    let table = run_replay_session(
        &mut source,
        None,
        MotionSession::with_clock(&config, &clock),
        &CancellationToken::new(),
    )
    .unwrap();
    assert!(table.is_empty());
}

#[test]
fn malformed_frame_does_not_close_an_interval() {
    let clock = ManualClock::starting_at(base());
    let frames = vec![quiet(), one_object(), malformed(), one_object(), quiet()];
    let mut source = ScriptedSource::new(frames, &clock);
    let table = run_replay_session(&mut source, None, session(&clock), &CancellationToken::new())
        .unwrap();

    assert_eq!(table.len(), 1);
    assert_eq!(table.intervals()[0].start, at(2));
    assert_eq!(table.intervals()[0].end, at(5));
}

#[test]
fn malformed_first_frame_does_not_become_baseline() {
    let clock = ManualClock::starting_at(base());
    let frames = vec![malformed(), quiet(), quiet(), one_object()];
    let mut source = ScriptedSource::new(frames, &clock);
    let table = run_replay_session(&mut source, None, session(&clock), &CancellationToken::new())
        .unwrap();

    assert_eq!(table.len(), 1);
    assert_eq!(table.intervals()[0].start, at(4));
}

#[test]
fn live_session_mirrors_valid_raw_frames() {
    let clock = ManualClock::starting_at(base());
    let frames = vec![quiet(), one_object(), malformed(), quiet()];
    let mut source = ScriptedSource::new(frames, &clock);
    let mut sink = RecordingSink::default();

    let table = run_live_session(
        &mut source,
        Some(&mut sink),
        None,
        session(&clock),
        &CancellationToken::new(),
    )
    .unwrap();

    assert_eq!(table.len(), 1);
    assert_eq!(sink.frames, vec![quiet(), one_object(), quiet()]);
    assert!(sink.finished);
}

#[test]
fn failing_output_sink_is_detached() {
    let clock = ManualClock::starting_at(base());
    let frames = vec![quiet(), one_object(), one_object(), quiet()];
    let mut source = ScriptedSource::new(frames, &clock);
    let mut sink = BrokenSink::default();

    let table = run_live_session(
        &mut source,
        Some(&mut sink),
        None,
        session(&clock),
        &CancellationToken::new(),
    )
    .unwrap();

    assert_eq!(sink.attempts, 1);
    assert_eq!(table.len(), 1);
}

#[test]
fn display_receives_annotated_frames() {
    let clock = ManualClock::starting_at(base());
    let frames = vec![quiet(), one_object(), quiet()];
    let mut source = ScriptedSource::new(frames, &clock);
    let mut display = CollectingDisplay::default();

    run_replay_session(
        &mut source,
        Some(&mut display),
        session(&clock),
        &CancellationToken::new(),
    )
    .unwrap();

    assert_eq!(display.shown.len(), 3);
    let green = Rgb([0, 255, 0]);
    assert!(display.shown[1].pixels().any(|p| *p == green));
    assert!(!display.shown[2].pixels().any(|p| *p == green));
}

#[test]
fn cancellation_stops_after_current_frame() {
    let clock = ManualClock::starting_at(base());
    let cancel = CancellationToken::new();
    let frames = vec![quiet(), one_object(), one_object(), one_object(), quiet()];
    let mut source = ScriptedSource::new(frames, &clock);
    source.cancel_after = Some((3, cancel.clone()));

    let table = run_replay_session(&mut source, None, session(&clock), &cancel).unwrap();

    assert_eq!(source.pulled, 3);
    assert_eq!(table.len(), 1);
    assert_eq!(table.intervals()[0].start, at(2));
    assert_eq!(table.intervals()[0].end, at(3));
}

#[test]
fn empty_source_is_unavailable() {
    let clock = ManualClock::starting_at(base());
    let mut source = ScriptedSource::new(Vec::new(), &clock);
    let result = run_replay_session(&mut source, None, session(&clock), &CancellationToken::new());
    assert!(matches!(result, Err(SessionError::SourceUnavailable(_))));
}

#[test]
fn cancellation_is_honoured_during_undecodable_frames() {
    let clock = ManualClock::starting_at(base());
    let cancel = CancellationToken::new();
    let mut source = FlakySource::new(vec![quiet()], 50);
    source.cancel_at = Some((2, cancel.clone()));

    let table = run_replay_session(&mut source, None, session(&clock), &cancel).unwrap();

    assert_eq!(source.pulled, 2);
    assert!(table.is_empty());
}

#[test]
fn only_undecodable_frames_is_unavailable() {
    let clock = ManualClock::starting_at(base());
    let mut source = FlakySource::new(Vec::new(), 3);
    let result = run_replay_session(&mut source, None, session(&clock), &CancellationToken::new());

    assert!(matches!(result, Err(SessionError::SourceUnavailable(_))));
    assert_eq!(source.pulled, 4);
}

#[test]
fn only_malformed_frames_is_unavailable() {
    let clock = ManualClock::starting_at(base());
    let mut source = ScriptedSource::new(vec![malformed(); 3], &clock);
    let result = run_replay_session(&mut source, None, session(&clock), &CancellationToken::new());
    assert!(matches!(result, Err(SessionError::SourceUnavailable(_))));
}

#[test]
fn failing_first_pull_is_unavailable() {
    let clock = ManualClock::starting_at(base());
    let result = run_live_session(
        &mut FailingSource,
        None,
        None,
        session(&clock),
        &CancellationToken::new(),
    );
    assert!(matches!(result, Err(SessionError::SourceUnavailable(_))));
}

#[test]
fn replay_from_image_sequence_and_persist() {
    let frames_dir = tempfile::tempdir().unwrap();
    let mut recorder = ImageSequenceSink::create(frames_dir.path()).unwrap();
    for frame in [quiet(), quiet(), one_object(), one_object(), quiet()] {
        recorder.write_frame(&frame).unwrap();
    }

    let mut source = ImageSequenceSource::open(frames_dir.path()).unwrap();
    let table = run_replay_session(
        &mut source,
        None,
        MotionSession::new(&DetectorConfig::default()),
        &CancellationToken::new(),
    )
    .unwrap();
    assert_eq!(table.len(), 1);
    assert!(table.intervals()[0].start <= table.intervals()[0].end);

    let out_dir = tempfile::tempdir().unwrap();
    let records = out_dir.path().join("records.csv");
    table.save(&records).unwrap();
    let text = std::fs::read_to_string(&records).unwrap();
    assert!(text.starts_with("Start Time,End Time\n"));
    assert_eq!(text.lines().count(), 2);

    // A failed write leaves the computed table intact.
    assert!(table.save(out_dir.path()).is_err());
    assert_eq!(table.len(), 1);
}
