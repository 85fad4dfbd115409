#[cfg(feature = "opencv")]
mod capture;
mod logging;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use motion_interval::sources::{ImageSequenceSink, ImageSequenceSource};
use motion_interval::{
    CancellationToken, DetectorConfig, DisplaySink, IntervalTable, MotionSession,
    run_replay_session,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "interval-recorder", version)]
#[command(about = "Logs the time intervals during which motion is visible in a video stream")]
struct Cli {
    /// Detector configuration file (TOML). `MOTION_INTERVAL__*` variables override it.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Where the interval table is written.
    #[arg(short, long, global = true, default_value = "motion_intervals.csv")]
    records: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record from a camera until Ctrl-C (or Esc in the display window).
    Live {
        /// Camera device index.
        #[arg(short, long, default_value_t = 0)]
        device: i32,
        /// Also save the raw footage as an MJPG video.
        #[arg(long)]
        video: Option<PathBuf>,
        /// Playback speed of the saved video, in frames per second.
        #[arg(long, default_value_t = 20.0)]
        fps: f64,
        /// Also save the raw footage as numbered PNG files in this directory.
        #[arg(long)]
        frames_out: Option<PathBuf>,
        /// Show the annotated stream in a window.
        #[arg(long)]
        display: bool,
    },
    /// Scan an existing recording for motion.
    Replay {
        /// Directory of still frames, replayed in file name order.
        #[arg(long, conflicts_with = "video", required_unless_present = "video")]
        frames: Option<PathBuf>,
        /// Video file decoded with OpenCV.
        #[arg(long)]
        video: Option<PathBuf>,
        /// Show the annotated stream in a window.
        #[arg(long)]
        display: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init("info");
    let cli = Cli::parse();

    let config = DetectorConfig::load(cli.config.as_deref()).context("loading detector configuration")?;
    info!(?config, "detector configured");

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, finishing session");
            ctrl_c_token.cancel();
        }
    });

    let command = cli.command;
    let table = tokio::task::spawn_blocking(move || run_command(command, &config, &cancel))
        .await
        .context("session task panicked")??;

    table
        .save(&cli.records)
        .with_context(|| format!("writing {}", cli.records.display()))?;
    println!(
        "{} motion interval(s), {}s of motion in total, written to {}",
        table.len(),
        table.total_duration().num_seconds(),
        cli.records.display()
    );
    Ok(())
}

fn run_command(command: Command, config: &DetectorConfig, cancel: &CancellationToken) -> Result<IntervalTable> {
    match command {
        Command::Live {
            device,
            video,
            fps,
            frames_out,
            display,
        } => live(device, video, fps, frames_out, display, config, cancel),
        Command::Replay {
            frames,
            video,
            display,
        } => replay(frames, video, display, config, cancel),
    }
}

#[cfg(feature = "opencv")]
fn live(
    device: i32,
    video: Option<PathBuf>,
    fps: f64,
    frames_out: Option<PathBuf>,
    display: bool,
    config: &DetectorConfig,
    cancel: &CancellationToken,
) -> Result<IntervalTable> {
    use capture::{VideoFileSink, VideoSource, WindowDisplay};
    use motion_interval::{OutputSink, run_live_session};

    let mut source = VideoSource::camera(device)?;
    let mut video_sink = match video {
        Some(path) => Some(VideoFileSink::create(&path, fps, source.frame_size()?)?),
        None => None,
    };
    let mut frames_sink = match frames_out {
        Some(dir) => Some(ImageSequenceSink::create(&dir)?),
        None => None,
    };
    if video_sink.is_some() && frames_sink.is_some() {
        tracing::warn!("both --video and --frames-out given, only the video is written");
    }
    let output: Option<&mut dyn OutputSink> = match (video_sink.as_mut(), frames_sink.as_mut()) {
        (Some(sink), _) => Some(sink as &mut dyn OutputSink),
        (None, Some(sink)) => Some(sink as &mut dyn OutputSink),
        (None, None) => None,
    };

    let mut window = display.then(|| WindowDisplay::new("Motion recording (Esc to stop)", cancel.clone()));
    let display = window.as_mut().map(|w| w as &mut dyn DisplaySink);

    Ok(run_live_session(&mut source, output, display, MotionSession::new(config), cancel)?)
}

#[cfg(not(feature = "opencv"))]
fn live(
    _device: i32,
    _video: Option<PathBuf>,
    _fps: f64,
    _frames_out: Option<PathBuf>,
    _display: bool,
    _config: &DetectorConfig,
    _cancel: &CancellationToken,
) -> Result<IntervalTable> {
    bail!("live capture needs a build with the `opencv` feature enabled")
}

fn replay(
    frames: Option<PathBuf>,
    video: Option<PathBuf>,
    display: bool,
    config: &DetectorConfig,
    cancel: &CancellationToken,
) -> Result<IntervalTable> {
    let session = MotionSession::new(config);
    match (frames, video) {
        (Some(dir), _) => {
            let mut source = ImageSequenceSource::open(&dir)?;
            let mut window = display_window(display, cancel)?;
            Ok(run_replay_session(&mut source, as_display(&mut window), session, cancel)?)
        }
        (None, Some(path)) => replay_video(&path, display, session, cancel),
        (None, None) => bail!("either --frames or --video is required"),
    }
}

fn as_display(window: &mut Option<Box<dyn DisplaySink>>) -> Option<&mut dyn DisplaySink> {
    match window {
        Some(window) => Some(&mut **window),
        None => None,
    }
}

#[cfg(feature = "opencv")]
fn display_window(display: bool, cancel: &CancellationToken) -> Result<Option<Box<dyn DisplaySink>>> {
    Ok(display.then(|| {
        Box::new(capture::WindowDisplay::new("Motion replay (Esc to stop)", cancel.clone()))
            as Box<dyn DisplaySink>
    }))
}

#[cfg(not(feature = "opencv"))]
fn display_window(display: bool, _cancel: &CancellationToken) -> Result<Option<Box<dyn DisplaySink>>> {
    if display {
        bail!("--display needs a build with the `opencv` feature enabled");
    }
    Ok(None)
}

#[cfg(feature = "opencv")]
fn replay_video(
    path: &std::path::Path,
    display: bool,
    session: MotionSession,
    cancel: &CancellationToken,
) -> Result<IntervalTable> {
    let mut source = capture::VideoSource::file(path)?;
    let mut window = display_window(display, cancel)?;
    Ok(run_replay_session(&mut source, as_display(&mut window), session, cancel)?)
}

#[cfg(not(feature = "opencv"))]
fn replay_video(
    _path: &std::path::Path,
    _display: bool,
    _session: MotionSession,
    _cancel: &CancellationToken,
) -> Result<IntervalTable> {
    bail!("decoding video files needs a build with the `opencv` feature enabled")
}
