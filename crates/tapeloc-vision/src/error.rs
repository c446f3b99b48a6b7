use tapeloc_core::{CalibrationError, FrameError};

/// Errors returned by the vision pipeline.
///
/// A frame without a detectable tape is not an error: it yields an invalid
/// [`LandmarkEstimate`](crate::LandmarkEstimate).
#[derive(thiserror::Error, Debug)]
pub enum VisionError {
    #[error("invalid calibration: {0}")]
    InvalidCalibration(#[from] CalibrationError),
    #[error(transparent)]
    InvalidFrame(#[from] FrameError),
    #[error("frame size not initialized; call initialize(width, height) first")]
    NotInitialized,
    #[error("frame size already initialized to {width}x{height}")]
    AlreadyInitialized { width: usize, height: usize },
    #[error("frame is {got_width}x{got_height}, pipeline was initialized for {width}x{height}")]
    FrameSizeMismatch {
        width: usize,
        height: usize,
        got_width: usize,
        got_height: usize,
    },
}
