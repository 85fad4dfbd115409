// THEORY:
// The Motion Classifier is the spatial analysis stage of the engine. It compares one
// preprocessed frame against the session baseline and answers a single question: how
// many distinct, large-enough regions of the scene have changed, and where are they?
//
// Algorithm steps:
// 1.  **Differencing**: absolute per-pixel difference against the baseline.
// 2.  **Binarisation**: a fixed, non-adaptive threshold turns the difference into a
//     mask of "changed" pixels.
// 3.  **Dilation**: nearby changed clusters are merged and speckle is absorbed. Two
//     passes of a 3x3 square equal one pass with an L-infinity radius of two.
// 4.  **Contours**: only top-level borders are kept; holes and anything nested inside
//     them do not count as separate regions. A top-level border is always an outer one,
//     so the parent link alone decides. The border type reported for a region touching
//     pixel (0, 0) is `Hole`, so it must not be used as the filter.
// 5.  **Area filter**: contours below the minimum area are noise. The survivors'
//     bounding boxes form the `MotionSample`.
//
// The classifier is stateless; it has no memory of previous frames.

use crate::config::DetectorConfig;
use crate::error::{Result, SessionError};
use image::GrayImage;
use imageproc::contours::{Contour, find_contours};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;
use tracing::trace;

/// An axis-aligned box around one moving region, in pixels of the processed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    fn around(contour: &Contour<i32>) -> Option<Self> {
        let first = contour.points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for point in &contour.points {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }
        Some(Self {
            x: min_x as u32,
            y: min_y as u32,
            width: (max_x - min_x + 1) as u32,
            height: (max_y - min_y + 1) as u32,
        })
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// The per-frame result of classification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotionSample {
    /// Number of regions whose area reached the minimum motion area.
    pub count: usize,
    /// One box per counted region, in contour detection order.
    pub boxes: Vec<BoundingBox>,
}

impl MotionSample {
    pub fn is_motion(&self) -> bool {
        self.count > 0
    }
}

#[derive(Debug, Clone)]
pub struct MotionClassifier {
    diff_threshold: u8,
    mask_value: u8,
    dilate_radius: u8,
    min_motion_area: f64,
}

impl MotionClassifier {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            diff_threshold: config.diff_threshold,
            mask_value: config.mask_value,
            dilate_radius: config.dilate_iterations,
            min_motion_area: config.min_motion_area,
        }
    }

    pub fn classify(&self, frame: &GrayImage, baseline: &GrayImage) -> Result<MotionSample> {
        if frame.dimensions() != baseline.dimensions() {
            return Err(SessionError::MalformedFrame(format!(
                "frame is {:?} but the baseline is {:?}",
                frame.dimensions(),
                baseline.dimensions()
            )));
        }

        // --- 1. & 2. Differencing and Binarisation ---
        let mask = self.changed_mask(frame, baseline)?;

        // --- 3. Dilation ---
        let mask = if self.dilate_radius > 0 {
            dilate(&mask, Norm::LInf, self.dilate_radius)
        } else {
            mask
        };

        // --- 4. & 5. External Contours and Area Filter ---
        let boxes: Vec<BoundingBox> = find_contours::<i32>(&mask)
            .iter()
            .filter(|contour| contour.parent.is_none())
            .filter(|contour| enclosed_area(contour) >= self.min_motion_area)
            .filter_map(BoundingBox::around)
            .collect();

        trace!(regions = boxes.len(), "classified frame");
        Ok(MotionSample {
            count: boxes.len(),
            boxes,
        })
    }

    fn changed_mask(&self, frame: &GrayImage, baseline: &GrayImage) -> Result<GrayImage> {
        let (width, height) = frame.dimensions();
        let pixels = frame
            .as_raw()
            .iter()
            .zip(baseline.as_raw())
            .map(|(&current, &reference)| {
                if current.abs_diff(reference) > self.diff_threshold {
                    self.mask_value
                } else {
                    0
                }
            })
            .collect();
        GrayImage::from_raw(width, height, pixels)
            .ok_or_else(|| SessionError::MalformedFrame("difference mask does not fit frame".into()))
    }
}

/// Area enclosed by a closed contour (shoelace formula over its border pixels).
fn enclosed_area(contour: &Contour<i32>) -> f64 {
    let points = &contour.points;
    if points.len() < 3 {
        return 0.0;
    }
    let twice_area: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    twice_area.abs() as f64 / 2.0
}
