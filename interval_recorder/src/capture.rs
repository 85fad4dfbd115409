// OpenCV-backed collaborators: camera and video file input, MJPG video output and an
// on-screen window. Everything crossing into the engine is converted to packed RGB.

use motion_interval::core_modules::interval_accumulator::TIMESTAMP_FORMAT;
use motion_interval::{
    CancellationToken, Clock, DisplaySink, FrameSource, OutputSink, RawFrame, Result,
    SessionError, SystemClock,
};
use opencv::{
    core::{self, Mat, Point, Scalar},
    highgui, imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoWriter},
};
use std::path::Path;
use tracing::info;

const ESC_KEY: i32 = 27;
const STAMP_ORIGIN: (i32, i32) = (10, 30);

fn cv_error(context: &str) -> impl Fn(opencv::Error) -> SessionError + '_ {
    move |e| SessionError::Source(format!("{context}: {e}"))
}

/// Reads frames from a camera index or a video file.
pub struct VideoSource {
    cap: VideoCapture,
    frame: Mat,
}

impl VideoSource {
    pub fn camera(device: i32) -> Result<Self> {
        let cap = VideoCapture::new(device, videoio::CAP_ANY)
            .map_err(|e| SessionError::SourceUnavailable(format!("camera {device}: {e}")))?;
        Self::opened(cap, &format!("camera {device}"))
    }

    pub fn file(path: &Path) -> Result<Self> {
        let name = path.display().to_string();
        let cap = VideoCapture::from_file(&name, videoio::CAP_ANY)
            .map_err(|e| SessionError::SourceUnavailable(format!("{name}: {e}")))?;
        Self::opened(cap, &name)
    }

    fn opened(cap: VideoCapture, name: &str) -> Result<Self> {
        if !cap.is_opened().unwrap_or(false) {
            return Err(SessionError::SourceUnavailable(format!(
                "cannot open {name}; check that the device is connected and readable"
            )));
        }
        info!(source = name, "video source opened");
        Ok(Self {
            cap,
            frame: Mat::default(),
        })
    }

    /// Native frame size as reported by the backend.
    pub fn frame_size(&self) -> Result<(i32, i32)> {
        let width = self
            .cap
            .get(videoio::CAP_PROP_FRAME_WIDTH)
            .map_err(cv_error("frame width"))?;
        let height = self
            .cap
            .get(videoio::CAP_PROP_FRAME_HEIGHT)
            .map_err(cv_error("frame height"))?;
        Ok((width as i32, height as i32))
    }
}

impl FrameSource for VideoSource {
    fn next_frame(&mut self, cancel: &CancellationToken) -> Result<Option<RawFrame>> {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        let grabbed = self.cap.read(&mut self.frame).map_err(cv_error("read"))?;
        if !grabbed || self.frame.empty() {
            return Ok(None);
        }

        let mut rgb = Mat::default();
        imgproc::cvt_color(&self.frame, &mut rgb, imgproc::COLOR_BGR2RGB, 0)
            .map_err(|e| SessionError::MalformedFrame(e.to_string()))?;
        let data = rgb
            .data_bytes()
            .map_err(|e| SessionError::MalformedFrame(e.to_string()))?
            .to_vec();
        Ok(Some(RawFrame::new(rgb.cols() as u32, rgb.rows() as u32, data)))
    }
}

fn to_bgr_mat(frame_rgb: &[u8], width: u32, height: u32) -> opencv::Result<Mat> {
    let mut rgb = Mat::new_rows_cols_with_default(
        height as i32,
        width as i32,
        core::CV_8UC3,
        Scalar::all(0.0),
    )?;
    rgb.data_bytes_mut()?.copy_from_slice(frame_rgb);
    let mut bgr = Mat::default();
    imgproc::cvt_color(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR, 0)?;
    Ok(bgr)
}

/// Mirrors raw frames into an MJPG encoded video file.
pub struct VideoFileSink {
    writer: VideoWriter,
}

impl VideoFileSink {
    pub fn create(path: &Path, fps: f64, size: (i32, i32)) -> Result<Self> {
        let sink_error = |e: opencv::Error| SessionError::Sink(e.to_string());
        let fourcc = VideoWriter::fourcc('M', 'J', 'P', 'G').map_err(sink_error)?;
        let writer = VideoWriter::new(
            &path.display().to_string(),
            fourcc,
            fps,
            core::Size::new(size.0, size.1),
            true,
        )
        .map_err(sink_error)?;
        if !writer.is_opened().map_err(sink_error)? {
            return Err(SessionError::Sink(format!(
                "cannot open {} for writing",
                path.display()
            )));
        }
        info!(path = %path.display(), fps, "recording video");
        Ok(Self { writer })
    }
}

impl OutputSink for VideoFileSink {
    fn write_frame(&mut self, frame: &RawFrame) -> Result<()> {
        let bgr = to_bgr_mat(&frame.data, frame.width, frame.height)
            .map_err(|e| SessionError::Sink(e.to_string()))?;
        self.writer
            .write(&bgr)
            .map_err(|e| SessionError::Sink(e.to_string()))
    }

    fn finish(&mut self) -> Result<()> {
        self.writer
            .release()
            .map_err(|e| SessionError::Sink(e.to_string()))
    }
}

/// Burns the wall-clock time into the top-left corner of a preview frame.
fn stamp_time(frame: &mut Mat) -> opencv::Result<()> {
    let now = SystemClock.now().format(TIMESTAMP_FORMAT).to_string();
    imgproc::put_text(
        frame,
        &now,
        Point::new(STAMP_ORIGIN.0, STAMP_ORIGIN.1),
        imgproc::FONT_HERSHEY_SIMPLEX,
        1.0,
        Scalar::new(255.0, 255.0, 255.0, 0.0),
        2,
        imgproc::LINE_AA,
        false,
    )
}

/// Shows annotated, time-stamped frames in a window. Pressing Esc stops the session.
pub struct WindowDisplay {
    title: String,
    cancel: CancellationToken,
}

impl WindowDisplay {
    pub fn new(title: &str, cancel: CancellationToken) -> Self {
        Self {
            title: title.to_string(),
            cancel,
        }
    }
}

impl DisplaySink for WindowDisplay {
    fn show(&mut self, frame: &image::RgbImage) -> Result<()> {
        let display_error = |e: opencv::Error| SessionError::Sink(e.to_string());
        let mut bgr =
            to_bgr_mat(frame.as_raw(), frame.width(), frame.height()).map_err(display_error)?;
        stamp_time(&mut bgr).map_err(display_error)?;
        highgui::imshow(&self.title, &bgr).map_err(display_error)?;
        if highgui::wait_key(1).map_err(display_error)? == ESC_KEY {
            info!("escape pressed, stopping");
            self.cancel.cancel();
        }
        Ok(())
    }
}

impl Drop for WindowDisplay {
    fn drop(&mut self) {
        let _ = highgui::destroy_window(&self.title);
    }
}
