//! Facade crate for the `tapeloc-*` workspace.
//!
//! This crate provides:
//! - re-exports of the core, vision and odometry crates
//! - JSON configuration covering both the tape detector and the localizer
//! - the consumer-side view that pairs the latest pose with the latest
//!   landmark estimate
//! - (feature `image`) helpers that run the detector on `image` buffers
//! - (feature `cli`) the `tapeloc` binary for offline tuning
//!
//! ## Quickstart
//!
//! ```no_run
//! use tapeloc::{detect, TapelocConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TapelocConfig::load_json("tapeloc.json")?;
//! let detector = config.build_detector()?;
//! let img = image::open("frame.png")?;
//! let report = detect::detect_image(&detector, &img)?;
//! println!("valid: {}, correction: {}", report.estimate.valid, report.estimate.correction);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `tapeloc::core`: frames, segments, poses, snapshot slots, logger setup.
//! - `tapeloc::vision`: edge extraction, line transform, tape estimate, [`TapeDetector`].
//! - `tapeloc::odometry`: encoder handling, Kalman smoothing, [`TwoWheelLocalizer`].
//! - [`fusion`]: [`LocalizationState`] and the [`PoseCorrectionConsumer`] interface.
//! - [`replay`]: run the localizer over a recorded tick log.

pub use tapeloc_core as core;
pub use tapeloc_odometry as odometry;
pub use tapeloc_vision as vision;

pub use tapeloc_core::{FrameView, LineSegment, Pose2D};
pub use tapeloc_odometry::{LocalizerCalibration, TwoWheelLocalizer};
pub use tapeloc_vision::{CalibrationParams, LandmarkEstimate, LandmarkPipeline, TapeDetector};

mod config;
pub mod fusion;
pub mod replay;

#[cfg(feature = "image")]
pub mod detect;

pub use config::{ConfigError, IoError, TapelocConfig};
pub use fusion::{LocalizationSource, LocalizationState, PoseCorrectionConsumer};
