// Still-image collaborators: replay a directory of frames and mirror live frames to one.

use crate::collaborators::{FrameSource, OutputSink};
use crate::core_modules::frame::RawFrame;
use crate::error::{Result, SessionError};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FRAME_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

/// Replays the image files of a directory in file name order.
#[derive(Debug)]
pub struct ImageSequenceSource {
    pending: VecDeque<PathBuf>,
}

impl ImageSequenceSource {
    pub fn open(dir: &Path) -> Result<Self> {
        let entries = fs::read_dir(dir).map_err(|e| {
            SessionError::SourceUnavailable(format!("cannot read {}: {e}", dir.display()))
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| {
                    SessionError::SourceUnavailable(format!("cannot list {}: {e}", dir.display()))
                })?
                .path();
            if path.is_file() && is_frame_file(&path) {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            return Err(SessionError::SourceUnavailable(format!(
                "no image frames found in {}",
                dir.display()
            )));
        }
        paths.sort();

        info!(frames = paths.len(), dir = %dir.display(), "opened image sequence");
        Ok(Self {
            pending: paths.into(),
        })
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self, _cancel: &CancellationToken) -> Result<Option<RawFrame>> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };
        debug!(path = %path.display(), "decoding frame");
        let image = image::open(&path).map_err(|e| {
            SessionError::MalformedFrame(format!("cannot decode {}: {e}", path.display()))
        })?;
        Ok(Some(RawFrame::from_rgb_image(image.to_rgb8())))
    }
}

/// Writes each frame as `frame_NNNNNN.png` into a directory.
#[derive(Debug)]
pub struct ImageSequenceSink {
    dir: PathBuf,
    written: u64,
}

impl ImageSequenceSink {
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            written: 0,
        })
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl OutputSink for ImageSequenceSink {
    fn write_frame(&mut self, frame: &RawFrame) -> Result<()> {
        let path = self.dir.join(format!("frame_{:06}.png", self.written));
        frame.to_rgb_image()?.save(&path)?;
        self.written += 1;
        Ok(())
    }
}
