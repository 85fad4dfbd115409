// THEORY:
// A single error type for the whole engine. The variants follow the session's failure
// model: a source that never delivers is fatal up front, a bad frame is skipped by the
// driver, a broken event list is an internal defect, and everything that touches the
// filesystem after the intervals are computed propagates as-is.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    /// The capture or decode collaborator could not be opened or produced no frames.
    #[error("frame source unavailable: {0}")]
    SourceUnavailable(String),

    /// A pulled frame has zero or inconsistent dimensions.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A pull failed after the session had already started.
    #[error("frame source failed: {0}")]
    Source(String),

    /// The event list reached the accumulator in a shape the tracker must never produce.
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),

    #[error("sink rejected frame: {0}")]
    Sink(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    ConfigSource(#[from] config::ConfigError),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
