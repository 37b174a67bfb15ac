use std::path::PathBuf;
use thiserror::Error;

/// Failure taxonomy for a pipeline run.
///
/// `Source` aborts before any output exists. `Io` is fatal for the file it
/// names; slides already persisted stay on disk. `Config` is raised during
/// option validation, before the video is even opened. `Engine` wraps
/// face-detector / OCR failures, which abort the run instead of being
/// treated as a negative predicate.
#[derive(Debug, Error)]
pub enum SlideError {
    #[error("cannot open video source: {0}")]
    Source(String),

    #[error("image I/O failed at {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("content filter engine failure: {0}")]
    Engine(String),
}

impl SlideError {
    pub fn io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        SlideError::Io {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SlideError>;
