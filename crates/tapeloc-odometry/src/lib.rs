//! Dead reckoning from two passive tracking wheels plus an external heading.
//!
//! One wheel rolls along the robot's forward axis, the other across it. Wheel
//! displacements and the heading change from an independent orientation sensor
//! are solved for the robot-frame motion, which is integrated along a
//! constant-curvature arc. The reported heading is always the external
//! heading (plus the offset established by [`TwoWheelLocalizer::set_pose`]).
//!
//! ```
//! use tapeloc_odometry::{EncoderSample, LocalizerCalibration, TwoWheelLocalizer};
//!
//! let mut localizer = TwoWheelLocalizer::new(LocalizerCalibration::default())?;
//! let sample = |ticks| EncoderSample::new(ticks, 0.0).with_raw_velocity(0);
//! let pose = localizer.update(sample(0), sample(0), 0.0, Some(0.0))?;
//! assert_eq!((pose.x, pose.y), (0.0, 0.0));
//! # Ok::<(), tapeloc_odometry::OdometryError>(())
//! ```

mod calibration;
mod encoder;
mod error;
mod kalman;
mod localizer;

pub use calibration::{
    scale_multiplier, KalmanSmoothing, LocalizerCalibration, NoiseParams, VelocityMode,
    WheelMount,
};
pub use encoder::{inverse_overflow, EncoderReading, EncoderSample, EncoderTracker};
pub use error::OdometryError;
pub use kalman::ScalarKalman;
pub use localizer::{relative_odometry_update, PoseVelocity, TwoWheelLocalizer};
