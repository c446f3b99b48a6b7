//! Tape landmark detection from camera frames.
//!
//! Per frame:
//! 1. [`extract_edges`]: grayscale + Sobel gradients + non-maximum suppression
//!    + two-threshold hysteresis into a binary [`EdgeMap`].
//! 2. [`ProbabilisticHough`]: lazy probabilistic line transform over the edge map.
//! 3. [`filter_segments`]: keep near-vertical segments (standing tape edges).
//! 4. [`estimate_lateral_center`]: one-pass mean bisection of segment x-endpoints
//!    into left/right tape borders and their midpoint.
//! 5. [`LandmarkAngleEstimator`]: pixel center -> bearing -> correction.
//!
//! [`TapeDetector`] wires the stages together and publishes the latest
//! [`LandmarkEstimate`] through a single-writer snapshot slot.

mod angle;
mod cluster;
mod edges;
mod error;
mod filter;
mod hough;
mod params;
mod pipeline;

pub use angle::{
    AngleCorrectionFunction, CorrectionModel, LandmarkAngleEstimator, LandmarkEstimate,
    RangeReading, Triangulation,
};
pub use cluster::{estimate_lateral_center, LateralCenter};
pub use edges::{extract_edges, EdgeMap};
pub use error::VisionError;
pub use filter::filter_segments;
pub use hough::{detect_segments, ProbabilisticHough};
pub use params::{
    AngleMode, AngleParams, CalibrationParams, EdgeParams, GeometricParams, HoughParams,
    SegmentFilterParams,
};
pub use pipeline::{
    FrameDiagnostics, FrameReport, LandmarkPipeline, StageTimings, TapeDetector,
};
