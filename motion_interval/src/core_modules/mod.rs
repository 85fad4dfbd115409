pub mod clock;
pub mod frame;
pub mod interval_accumulator;
pub mod interval_tracker;
pub mod motion_classifier;
pub mod overlay;
pub mod preprocessor;
pub mod reference_frame;
