//! Core types and utilities for tape landmark localization.
//!
//! This crate is intentionally small and free of detector logic. It holds the
//! data model shared by the vision and odometry crates: camera frames, line
//! segments, 2-D poses, the calibration error taxonomy and the single-writer
//! snapshot slot used to hand estimates between the camera and control loops.

mod calibration;
mod image;
mod logger;
mod pose;
mod segment;
mod snapshot;

pub use calibration::{ensure_finite, ensure_non_negative, ensure_positive, CalibrationError};
pub use image::{FrameError, FrameView, GrayImage};
pub use pose::{angle_norm, angle_norm_delta, Pose2D};
pub use segment::LineSegment;
pub use snapshot::{snapshot_slot, SnapshotReader, SnapshotWriter};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_filter, init_with_level, LogFilter, LogFilterError};
