// THEORY:
// Tunables for the detection pipeline. Every field has a default matching the classic
// fixed-threshold detector, so an empty configuration is a complete one. Values can be
// layered from an optional TOML file and `MOTION_INTERVAL__<KEY>` environment variables.

use crate::core_modules::interval_tracker::EdgePolicy;
use crate::error::{Result, SessionError};
use serde::Deserialize;
use std::path::Path;

/// Side length of the square Gaussian kernel applied during preprocessing.
pub const BLUR_KERNEL_SIZE: u32 = 25;
/// Absolute intensity difference a pixel must exceed to count as changed.
pub const DIFF_THRESHOLD: u8 = 100;
/// Value written into the binary mask for changed pixels.
pub const MASK_VALUE: u8 = 200;
/// Number of 3x3 dilation passes applied to the binary mask.
pub const DILATE_ITERATIONS: u8 = 2;
/// Contours enclosing less than this area (in pixels of the processed frame) are ignored.
pub const MIN_MOTION_AREA: f64 = 7000.0;

const ENV_PREFIX: &str = "MOTION_INTERVAL";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub blur_kernel_size: u32,
    pub diff_threshold: u8,
    pub mask_value: u8,
    pub dilate_iterations: u8,
    pub min_motion_area: f64,
    pub edge_policy: EdgePolicy,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            blur_kernel_size: BLUR_KERNEL_SIZE,
            diff_threshold: DIFF_THRESHOLD,
            mask_value: MASK_VALUE,
            dilate_iterations: DILATE_ITERATIONS,
            min_motion_area: MIN_MOTION_AREA,
            edge_policy: EdgePolicy::default(),
        }
    }
}

impl DetectorConfig {
    /// Loads the configuration from an optional file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.blur_kernel_size == 0 || self.blur_kernel_size % 2 == 0 {
            return Err(SessionError::Config(format!(
                "blur_kernel_size must be a positive odd number, got {}",
                self.blur_kernel_size
            )));
        }
        if self.mask_value == 0 {
            return Err(SessionError::Config("mask_value must be non-zero".into()));
        }
        if !self.min_motion_area.is_finite() || self.min_motion_area < 0.0 {
            return Err(SessionError::Config(format!(
                "min_motion_area must be a finite, non-negative area, got {}",
                self.min_motion_area
            )));
        }
        Ok(())
    }
}
