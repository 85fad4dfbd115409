// THEORY:
// The engine never talks to a camera, a decoder, a window or a video file directly.
// Those are collaborators behind three small traits, so a session can be driven by real
// devices in the binary and by in-memory frames in tests. A session's capability set is
// `{FrameSource}` for replay and `{FrameSource, OutputSink}` for live recording; a
// `DisplaySink` is optional in both.

use crate::core_modules::frame::RawFrame;
use crate::error::Result;
use image::RgbImage;
use tokio_util::sync::CancellationToken;

/// Produces frames in order. Pulling is the only blocking point of a session.
pub trait FrameSource {
    /// Returns the next frame, or `None` once the source is exhausted.
    ///
    /// Implementations that block may watch `cancel` and return `None` early. An
    /// undecodable frame should be reported as `SessionError::MalformedFrame` so the
    /// session can skip it and carry on.
    fn next_frame(&mut self, cancel: &CancellationToken) -> Result<Option<RawFrame>>;
}

/// Receives every valid raw frame of a live session, unmodified.
pub trait OutputSink {
    fn write_frame(&mut self, frame: &RawFrame) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Receives frames annotated with the regions that were counted as motion.
pub trait DisplaySink {
    fn show(&mut self, frame: &RgbImage) -> Result<()>;
}
