// THEORY:
// The first stage of the pipeline. A colour frame is collapsed to luminance and then
// smoothed with a large Gaussian kernel so that sensor noise and fine texture changes
// never reach the differencing stage. The stage is a pure function of its input.
//
// The configured kernel size only fixes the standard deviation. `gaussian_blur_f32`
// chooses its own kernel extent from sigma, so the effective support is not exactly
// `kernel_size` wide; the weights that fall outside are negligible.

use crate::core_modules::frame::RawFrame;
use crate::error::Result;
use image::{GrayImage, imageops};
use imageproc::filter::gaussian_blur_f32;

/// Standard deviation used for a kernel of the given side length when none is given
/// explicitly. Same derivation as OpenCV's `getGaussianKernel` with `sigma <= 0`.
pub fn sigma_for_kernel(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Converts raw frames to the denoised grayscale form compared against the baseline.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    sigma: f32,
}

impl Preprocessor {
    pub fn new(kernel_size: u32) -> Self {
        Self {
            sigma: sigma_for_kernel(kernel_size),
        }
    }

    pub fn sigma(&self) -> f32 {
        self.sigma
    }

    pub fn process(&self, frame: &RawFrame) -> Result<GrayImage> {
        let view = frame.view()?;
        let gray = imageops::grayscale(&view);
        Ok(gaussian_blur_f32(&gray, self.sigma))
    }
}
