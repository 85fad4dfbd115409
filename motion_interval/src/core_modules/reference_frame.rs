// THEORY:
// The baseline every later frame is compared against. It is captured from the first
// preprocessed frame of a session and is never refreshed, so this is deliberately not a
// background model: a slow lighting change after capture is reported as motion for the
// rest of the session.

use image::GrayImage;

/// What the holder did with an observed frame.
#[derive(Debug)]
pub enum Observation<'a> {
    /// The frame became the baseline; nothing can be classified for it.
    Captured,
    /// A baseline already exists and is returned unchanged.
    Baseline(&'a GrayImage),
}

#[derive(Debug, Default)]
pub struct ReferenceFrame {
    baseline: Option<GrayImage>,
}

impl ReferenceFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, frame: &GrayImage) -> Observation<'_> {
        match self.baseline {
            Some(ref baseline) => Observation::Baseline(baseline),
            None => {
                self.baseline = Some(frame.clone());
                Observation::Captured
            }
        }
    }

    pub fn baseline(&self) -> Option<&GrayImage> {
        self.baseline.as_ref()
    }

    pub fn is_captured(&self) -> bool {
        self.baseline.is_some()
    }
}
