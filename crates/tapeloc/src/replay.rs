//! Run the localizer over a recorded tick log.

use serde::{Deserialize, Serialize};
use tapeloc_core::Pose2D;
use tapeloc_odometry::{EncoderSample, OdometryError, PoseVelocity, TwoWheelLocalizer};

/// One recorded control tick.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OdometryTick {
    pub parallel: EncoderSample,
    pub perpendicular: EncoderSample,
    /// External heading, radians.
    pub heading: f64,
    #[serde(default)]
    pub heading_velocity: Option<f64>,
}

/// A tick log, optionally starting from a known pose.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TickLog {
    #[serde(default)]
    pub start: Option<Pose2D>,
    pub ticks: Vec<OdometryTick>,
}

/// Localizer output for one tick.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub timestamp: f64,
    pub pose: Pose2D,
    pub velocity: Option<PoseVelocity>,
}

/// Feed every tick of `log` through `localizer`.
///
/// Stops at the first error; a localizer error means the log or the
/// calibration is unusable.
pub fn replay(
    localizer: &mut TwoWheelLocalizer,
    log: &TickLog,
) -> Result<Vec<TrajectoryPoint>, OdometryError> {
    if let Some(start) = log.start {
        localizer.set_pose(start);
    }
    log.ticks
        .iter()
        .map(|tick| {
            let pose = localizer.update(
                tick.parallel,
                tick.perpendicular,
                tick.heading,
                tick.heading_velocity,
            )?;
            Ok(TrajectoryPoint {
                timestamp: tick.parallel.timestamp,
                pose,
                velocity: localizer.pose_velocity(),
            })
        })
        .collect()
}
