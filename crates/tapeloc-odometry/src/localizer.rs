use nalgebra::{Matrix3, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use tapeloc_core::{
    angle_norm, angle_norm_delta, snapshot_slot, CalibrationError, Pose2D, SnapshotReader,
    SnapshotWriter,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::calibration::{LocalizerCalibration, WheelMount};
use crate::encoder::{EncoderSample, EncoderTracker};
use crate::error::OdometryError;
use crate::kalman::ScalarKalman;

/// Robot-frame velocity: forward, left, counter-clockwise (rad/s).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseVelocity {
    pub vx: f64,
    pub vy: f64,
    pub omega: f64,
}

/// Integrate a robot-frame displacement `(dx, dy, dθ)` onto `pose` assuming
/// constant curvature over the step.
pub fn relative_odometry_update(pose: Pose2D, delta: Vector3<f64>) -> Pose2D {
    let dtheta = delta.z;
    let (sine_term, cos_term) = if dtheta.abs() < 1e-6 {
        (1.0 - dtheta * dtheta / 6.0, dtheta / 2.0)
    } else {
        (dtheta.sin() / dtheta, (1.0 - dtheta.cos()) / dtheta)
    };
    let robot = Vector2::new(
        sine_term * delta.x - cos_term * delta.y,
        cos_term * delta.x + sine_term * delta.y,
    );
    let field = pose.rotate(robot);
    Pose2D::new(
        pose.x + field.x,
        pose.y + field.y,
        angle_norm(pose.heading + dtheta),
    )
}

/// Row of the wheel kinematics: how robot motion `(dx, dy, dθ)` moves a wheel.
fn kinematics_row(mount: &WheelMount) -> [f64; 3] {
    let phi = mount.orientation_deg.to_radians();
    let (s, c) = phi.sin_cos();
    [c, s, mount.x * s - mount.y * c]
}

#[derive(Clone, Debug)]
struct Smoothers {
    parallel_position: ScalarKalman,
    perpendicular_position: ScalarKalman,
    parallel_velocity: ScalarKalman,
    perpendicular_velocity: ScalarKalman,
    heading_velocity: ScalarKalman,
}

#[derive(Clone, Copy, Debug)]
struct Baseline {
    wheels: [f64; 2],
    heading: f64,
}

/// Two tracking wheel localizer with external heading.
///
/// Single owner: `update` takes `&mut self`, and the pose is published to
/// other threads through [`TwoWheelLocalizer::poses`].
#[derive(Debug)]
pub struct TwoWheelLocalizer {
    calibration: LocalizerCalibration,
    solver: Matrix3<f64>,
    parallel: EncoderTracker,
    perpendicular: EncoderTracker,
    smoothers: Option<Smoothers>,
    pose: Pose2D,
    velocity: Option<PoseVelocity>,
    baseline: Option<Baseline>,
    heading_offset: f64,
    reanchor: bool,
    publisher: SnapshotWriter<Pose2D>,
}

impl TwoWheelLocalizer {
    pub fn new(calibration: LocalizerCalibration) -> Result<Self, OdometryError> {
        calibration.validate()?;
        let p = kinematics_row(&calibration.parallel);
        let q = kinematics_row(&calibration.perpendicular);
        let kinematics = Matrix3::new(
            p[0], p[1], p[2], //
            q[0], q[1], q[2], //
            0.0, 0.0, 1.0,
        );
        let solver = kinematics
            .try_inverse()
            .filter(|m| m.iter().all(|v| v.is_finite()))
            .ok_or(CalibrationError::DegenerateWheelGeometry)?;

        let smoothers = calibration.smoothing.as_ref().map(|s| Smoothers {
            parallel_position: ScalarKalman::from_noise(&s.wheel_position),
            perpendicular_position: ScalarKalman::from_noise(&s.wheel_position),
            parallel_velocity: ScalarKalman::from_noise(&s.wheel_velocity),
            perpendicular_velocity: ScalarKalman::from_noise(&s.wheel_velocity),
            heading_velocity: ScalarKalman::from_noise(&s.heading_velocity),
        });

        let (publisher, _) = snapshot_slot(Pose2D::default());
        Ok(Self {
            parallel: EncoderTracker::new(
                "parallel",
                calibration.parallel.reversed,
                calibration.velocity_mode,
            ),
            perpendicular: EncoderTracker::new(
                "perpendicular",
                calibration.perpendicular.reversed,
                calibration.velocity_mode,
            ),
            calibration,
            solver,
            smoothers,
            pose: Pose2D::default(),
            velocity: None,
            baseline: None,
            heading_offset: 0.0,
            reanchor: false,
            publisher,
        })
    }

    pub fn calibration(&self) -> &LocalizerCalibration {
        &self.calibration
    }

    pub fn pose(&self) -> Pose2D {
        self.pose
    }

    /// Robot-frame velocity from the last update, when wheel and heading
    /// velocities were all available.
    pub fn pose_velocity(&self) -> Option<PoseVelocity> {
        self.velocity
    }

    /// Reader handle onto the published poses.
    pub fn poses(&self) -> SnapshotReader<Pose2D> {
        self.publisher.reader()
    }

    /// Reset the pose. The next update re-anchors wheel baselines and the
    /// heading offset without integrating any motion.
    pub fn set_pose(&mut self, pose: Pose2D) {
        self.pose = Pose2D::new(pose.x, pose.y, angle_norm(pose.heading));
        self.baseline = None;
        self.reanchor = true;
        self.publisher.publish(self.pose);
        log::info!(
            "pose reset to ({:.2}, {:.2}, {:.3} rad)",
            self.pose.x,
            self.pose.y,
            self.pose.heading
        );
    }

    fn solve(&self, parallel: f64, perpendicular: f64, heading: f64) -> Vector3<f64> {
        self.solver * Vector3::new(parallel, perpendicular, heading)
    }

    /// Integrate one control tick.
    ///
    /// `heading` is the external heading in radians and becomes the pose
    /// heading (plus any offset from [`TwoWheelLocalizer::set_pose`]).
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "trace", skip(self, parallel, perpendicular))
    )]
    pub fn update(
        &mut self,
        parallel: EncoderSample,
        perpendicular: EncoderSample,
        heading: f64,
        heading_velocity: Option<f64>,
    ) -> Result<Pose2D, OdometryError> {
        if !heading.is_finite() {
            return Err(OdometryError::NonFiniteHeading { value: heading });
        }
        let par = self.parallel.update(&parallel)?;
        let perp = self.perpendicular.update(&perpendicular)?;

        let cal = &self.calibration;
        let mut wheels = [
            cal.parallel_inches(par.position as f64),
            cal.perpendicular_inches(perp.position as f64),
        ];
        let mut wheel_velocities = par
            .velocity
            .zip(perp.velocity)
            .map(|(a, b)| [cal.parallel_inches(a), cal.perpendicular_inches(b)]);
        let mut heading_velocity = heading_velocity.filter(|w| w.is_finite());

        if let Some(s) = self.smoothers.as_mut() {
            wheels = [
                s.parallel_position.filter(wheels[0]),
                s.perpendicular_position.filter(wheels[1]),
            ];
            wheel_velocities = wheel_velocities.map(|[a, b]| {
                [
                    s.parallel_velocity.filter(a),
                    s.perpendicular_velocity.filter(b),
                ]
            });
            heading_velocity = heading_velocity.map(|w| s.heading_velocity.filter(w));
        }

        if self.reanchor {
            self.heading_offset = angle_norm_delta(self.pose.heading - heading);
            self.reanchor = false;
        }

        if let Some(last) = self.baseline {
            let delta = self.solve(
                wheels[0] - last.wheels[0],
                wheels[1] - last.wheels[1],
                angle_norm_delta(heading - last.heading),
            );
            self.pose = relative_odometry_update(self.pose, delta);
        }
        self.pose.heading = angle_norm(heading + self.heading_offset);

        self.velocity = wheel_velocities.zip(heading_velocity).map(|([a, b], w)| {
            let v = self.solve(a, b, w);
            PoseVelocity {
                vx: v.x,
                vy: v.y,
                omega: v.z,
            }
        });

        self.baseline = Some(Baseline { wheels, heading });

        if !self.pose.is_finite() {
            log::warn!("localizer produced a non-finite pose: {:?}", self.pose);
        }
        self.publisher.publish(self.pose);
        Ok(self.pose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::VelocityMode;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::{FRAC_PI_2, PI, TAU};

    /// One tick per thousandth of an inch, unit multipliers.
    fn milli_inch() -> LocalizerCalibration {
        LocalizerCalibration {
            ticks_per_rev: 1000.0,
            wheel_radius: 1.0 / TAU,
            gear_ratio: 1.0,
            x_multiplier: 1.0,
            y_multiplier: 1.0,
            parallel: WheelMount {
                x: 0.0,
                y: 2.0,
                orientation_deg: 0.0,
                reversed: false,
            },
            perpendicular: WheelMount {
                x: 3.0,
                y: 0.0,
                orientation_deg: 90.0,
                reversed: false,
            },
            velocity_mode: VelocityMode::Raw,
            smoothing: None,
        }
    }

    fn ticks(inches: f64) -> i32 {
        (inches * 1000.0).round() as i32
    }

    fn sample(inches: f64) -> EncoderSample {
        EncoderSample::new(ticks(inches), 0.0)
    }

    #[test]
    fn zero_input_keeps_position_and_takes_heading() {
        let mut loc = TwoWheelLocalizer::new(milli_inch()).expect("localizer");
        let first = loc.update(sample(1.0), sample(-2.0), 1.1, None).expect("update");
        assert_eq!((first.x, first.y), (0.0, 0.0));
        assert_abs_diff_eq!(first.heading, 1.1);

        let again = loc.update(sample(1.0), sample(-2.0), 1.1, None).expect("update");
        assert_eq!((again.x, again.y), (0.0, 0.0));
        assert_abs_diff_eq!(again.heading, 1.1);
    }

    #[test]
    fn straight_drive_along_heading() {
        let mut loc = TwoWheelLocalizer::new(milli_inch()).expect("localizer");
        loc.update(sample(0.0), sample(0.0), 0.0, None).expect("update");
        let pose = loc.update(sample(10.0), sample(0.0), 0.0, None).expect("update");
        assert_abs_diff_eq!(pose.x, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(pose.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn strafe_reads_on_perpendicular_wheel() {
        let mut loc = TwoWheelLocalizer::new(milli_inch()).expect("localizer");
        loc.update(sample(0.0), sample(0.0), 0.0, None).expect("update");
        let pose = loc.update(sample(0.0), sample(4.0), 0.0, None).expect("update");
        assert_abs_diff_eq!(pose.x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(pose.y, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn turn_in_place_cancels_wheel_lever_arms() {
        let mut loc = TwoWheelLocalizer::new(milli_inch()).expect("localizer");
        loc.update(sample(0.0), sample(0.0), 0.0, None).expect("update");
        // Pure rotation by θ moves the parallel wheel by -y·θ and the
        // perpendicular wheel by x·θ.
        let theta = FRAC_PI_2;
        let pose = loc
            .update(sample(-2.0 * theta), sample(3.0 * theta), theta, None)
            .expect("update");
        assert_abs_diff_eq!(pose.x, 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(pose.y, 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(pose.heading, theta);
    }

    #[test]
    fn drive_turn_drive() {
        let mut loc = TwoWheelLocalizer::new(milli_inch()).expect("localizer");
        let theta = FRAC_PI_2;
        loc.update(sample(0.0), sample(0.0), 0.0, None).expect("update");
        loc.update(sample(10.0), sample(0.0), 0.0, None).expect("update");
        loc.update(sample(10.0 - 2.0 * theta), sample(3.0 * theta), theta, None)
            .expect("update");
        let pose = loc
            .update(sample(15.0 - 2.0 * theta), sample(3.0 * theta), theta, None)
            .expect("update");
        assert_abs_diff_eq!(pose.x, 10.0, epsilon = 1e-2);
        assert_abs_diff_eq!(pose.y, 5.0, epsilon = 1e-2);
        assert_abs_diff_eq!(pose.heading, theta);
    }

    #[test]
    fn arc_matches_constant_curvature() {
        // Forward at 1 in per step while turning 0.1 rad per step, wheels on
        // the robot's center lines so only the arc matters.
        let mut cal = milli_inch();
        cal.parallel.y = 0.0;
        cal.perpendicular.x = 0.0;
        let mut loc = TwoWheelLocalizer::new(cal).expect("localizer");
        loc.update(sample(0.0), sample(0.0), 0.0, None).expect("update");
        let steps = 10;
        let mut pose = Pose2D::default();
        for i in 1..=steps {
            pose = loc
                .update(sample(i as f64), sample(0.0), 0.1 * i as f64, None)
                .expect("update");
        }
        // Arc of length 10 with radius 10: endpoint (R sin 1, R (1 - cos 1)).
        assert_abs_diff_eq!(pose.x, 10.0 * 1.0f64.sin(), epsilon = 1e-6);
        assert_abs_diff_eq!(pose.y, 10.0 * (1.0 - 1.0f64.cos()), epsilon = 1e-6);
        assert_abs_diff_eq!(pose.heading, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn set_pose_re_anchors_heading() {
        let mut loc = TwoWheelLocalizer::new(milli_inch()).expect("localizer");
        loc.update(sample(3.0), sample(1.0), 0.3, None).expect("update");
        loc.set_pose(Pose2D::new(5.0, -5.0, PI));

        let pose = loc.update(sample(8.0), sample(1.0), 0.3, None).expect("update");
        assert_eq!((pose.x, pose.y), (5.0, -5.0));
        assert_abs_diff_eq!(pose.heading, PI, epsilon = 1e-12);

        let pose = loc.update(sample(8.0), sample(1.0), 0.4, None).expect("update");
        assert_abs_diff_eq!(pose.heading, PI + 0.1, epsilon = 1e-12);
    }

    #[test]
    fn pose_velocity_from_wheel_and_heading_rates() {
        let mut loc = TwoWheelLocalizer::new(milli_inch()).expect("localizer");
        let s = |inches: f64, rate: i32| sample(inches).with_raw_velocity(rate);
        loc.update(s(0.0, 12_000), s(0.0, -3_000), 0.0, Some(0.0))
            .expect("update");
        let v = loc.pose_velocity().expect("velocity");
        assert_abs_diff_eq!(v.vx, 12.0, epsilon = 1e-9);
        assert_abs_diff_eq!(v.vy, -3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(v.omega, 0.0);

        loc.update(s(0.0, 0), s(0.0, 0), 0.0, None).expect("update");
        assert_eq!(loc.pose_velocity(), None);
    }

    #[test]
    fn parallel_mounts_are_degenerate() {
        let mut cal = milli_inch();
        cal.perpendicular.orientation_deg = 0.0;
        cal.perpendicular.y = 2.0;
        assert!(matches!(
            TwoWheelLocalizer::new(cal),
            Err(OdometryError::InvalidCalibration(
                CalibrationError::DegenerateWheelGeometry
            ))
        ));
    }

    #[test]
    fn non_finite_heading_is_rejected() {
        let mut loc = TwoWheelLocalizer::new(milli_inch()).expect("localizer");
        assert!(matches!(
            loc.update(sample(0.0), sample(0.0), f64::NAN, None),
            Err(OdometryError::NonFiniteHeading { .. })
        ));
    }

    #[test]
    fn published_pose_tracks_updates() {
        let mut loc = TwoWheelLocalizer::new(milli_inch()).expect("localizer");
        let reader = loc.poses();
        loc.update(sample(0.0), sample(0.0), 0.0, None).expect("update");
        let pose = loc.update(sample(2.5), sample(0.0), 0.0, None).expect("update");
        assert_eq!(reader.get(), pose);
    }
}
