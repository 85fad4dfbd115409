// THEORY:
// `RawFrame` is the unit handed over by every frame source. It is a "dumb" container
// for one packed RGB8 image plus its dimensions, owned by exactly one loop iteration.
// Sources do not have to agree on a pixel library, so the frame stays a plain byte
// buffer and is only viewed as an `image` buffer once it has been validated.

use crate::error::{Result, SessionError};
use image::{ImageBuffer, Rgb, RgbImage};

/// Bytes per pixel of a raw frame.
pub const CHANNELS: usize = 3;

/// A borrowed, validated view over a raw frame's pixels.
pub type FrameView<'a> = ImageBuffer<Rgb<u8>, &'a [u8]>;

/// A single captured or decoded frame in packed RGB8 layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RawFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// Builds a frame of a single colour. Mostly useful for synthetic sources.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * CHANNELS)
            .collect();
        Self::new(width, height, data)
    }

    pub fn from_rgb_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(width, height, image.into_raw())
    }

    /// Checks that the frame has a non-empty area and a buffer that matches it.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(SessionError::MalformedFrame(format!(
                "frame has zero area ({}x{})",
                self.width, self.height
            )));
        }
        let expected = self.width as usize * self.height as usize * CHANNELS;
        if self.data.len() != expected {
            return Err(SessionError::MalformedFrame(format!(
                "{}x{} frame carries {} bytes, expected {}",
                self.width,
                self.height,
                self.data.len(),
                expected
            )));
        }
        Ok(())
    }

    pub fn view(&self) -> Result<FrameView<'_>> {
        self.validate()?;
        ImageBuffer::from_raw(self.width, self.height, self.data.as_slice()).ok_or_else(|| {
            SessionError::MalformedFrame("buffer does not fit frame dimensions".into())
        })
    }

    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        self.validate()?;
        RgbImage::from_raw(self.width, self.height, self.data.clone()).ok_or_else(|| {
            SessionError::MalformedFrame("buffer does not fit frame dimensions".into())
        })
    }
}
