use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use tapeloc_core::{ensure_finite, ensure_positive, CalibrationError};

/// Turn-test readings (degrees) for a commanded 90° turn, parallel wheel.
const PARALLEL_TURN_TRIALS: [f64; 4] = [89.8694, 89.7933, 89.8603, 89.9240];
/// Turn-test readings (degrees) for a commanded 90° turn, perpendicular wheel.
const PERPENDICULAR_TURN_TRIALS: [f64; 4] = [89.87, 90.01, 89.65, 89.705];

/// Mean of `measured / commanded` over calibration trials.
///
/// `None` for no trials or a zero/non-finite command.
pub fn scale_multiplier(commanded: f64, measured: &[f64]) -> Option<f64> {
    if measured.is_empty() || commanded == 0.0 || !commanded.is_finite() {
        return None;
    }
    let sum: f64 = measured.iter().map(|m| m / commanded).sum();
    let mean = sum / measured.len() as f64;
    mean.is_finite().then_some(mean)
}

/// Where a tracking wheel sits on the robot, in the robot frame
/// (x forward, y left), and which way it rolls.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WheelMount {
    pub x: f64,
    pub y: f64,
    /// Rolling direction relative to the robot's forward axis, degrees.
    pub orientation_deg: f64,
    /// Negate the encoder's counts.
    #[serde(default)]
    pub reversed: bool,
}

/// How wheel velocities are obtained from the encoder hardware.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VelocityMode {
    /// Use the hardware velocity as reported.
    Raw,
    /// Recover velocities that overflowed the hardware's 16-bit velocity register.
    #[default]
    Corrected,
}

/// Kalman noise pair for one signal.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoiseParams {
    pub process: f64,
    pub measurement: f64,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            process: 999_999_999_999_999.0,
            measurement: 999_999_999_999_999.0,
        }
    }
}

impl NoiseParams {
    fn validate(&self, field: &'static str) -> Result<(), CalibrationError> {
        ensure_positive(field, self.process)?;
        ensure_positive(field, self.measurement)
    }
}

/// Optional smoothing of wheel positions and velocities. Heading is not filtered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanSmoothing {
    pub wheel_position: NoiseParams,
    pub wheel_velocity: NoiseParams,
    pub heading_velocity: NoiseParams,
}

/// Tracking wheel calibration. Lengths are in inches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalizerCalibration {
    pub ticks_per_rev: f64,
    pub wheel_radius: f64,
    /// Wheel speed over encoder speed.
    pub gear_ratio: f64,
    /// Scale applied to the parallel wheel distance.
    pub x_multiplier: f64,
    /// Scale applied to the perpendicular wheel distance.
    pub y_multiplier: f64,
    /// Wheel rolling along the forward axis.
    pub parallel: WheelMount,
    /// Wheel rolling across the forward axis.
    pub perpendicular: WheelMount,
    pub velocity_mode: VelocityMode,
    pub smoothing: Option<KalmanSmoothing>,
}

impl Default for LocalizerCalibration {
    fn default() -> Self {
        Self {
            ticks_per_rev: 8192.0,
            wheel_radius: 0.689,
            gear_ratio: 1.0,
            x_multiplier: scale_multiplier(90.0, &PARALLEL_TURN_TRIALS).unwrap_or(1.0),
            y_multiplier: scale_multiplier(90.0, &PERPENDICULAR_TURN_TRIALS).unwrap_or(1.0),
            parallel: WheelMount {
                x: -4.827,
                y: 2.785,
                orientation_deg: 0.0,
                reversed: true,
            },
            perpendicular: WheelMount {
                x: 4.695,
                y: 0.742,
                orientation_deg: 90.0,
                reversed: false,
            },
            velocity_mode: VelocityMode::Corrected,
            smoothing: None,
        }
    }
}

impl LocalizerCalibration {
    pub fn validate(&self) -> Result<(), CalibrationError> {
        ensure_finite("ticks_per_rev", self.ticks_per_rev)?;
        if self.ticks_per_rev == 0.0 {
            return Err(CalibrationError::ZeroTicksPerRevolution);
        }
        ensure_positive("ticks_per_rev", self.ticks_per_rev)?;
        ensure_positive("wheel_radius", self.wheel_radius)?;
        ensure_positive("gear_ratio", self.gear_ratio)?;
        ensure_positive("x_multiplier", self.x_multiplier)?;
        ensure_positive("y_multiplier", self.y_multiplier)?;
        for (field, mount) in [
            ("parallel", &self.parallel),
            ("perpendicular", &self.perpendicular),
        ] {
            ensure_finite(field, mount.x)?;
            ensure_finite(field, mount.y)?;
            ensure_finite(field, mount.orientation_deg)?;
        }
        if let Some(s) = &self.smoothing {
            s.wheel_position.validate("smoothing.wheel_position")?;
            s.wheel_velocity.validate("smoothing.wheel_velocity")?;
            s.heading_velocity.validate("smoothing.heading_velocity")?;
        }
        Ok(())
    }

    /// Encoder ticks to wheel travel: `r · 2π · gear · ticks / ticks_per_rev`.
    #[inline]
    pub fn encoder_ticks_to_inches(&self, ticks: f64) -> f64 {
        self.wheel_radius * TAU * self.gear_ratio * ticks / self.ticks_per_rev
    }

    /// Scaled travel of the parallel wheel.
    #[inline]
    pub fn parallel_inches(&self, ticks: f64) -> f64 {
        self.encoder_ticks_to_inches(ticks) * self.x_multiplier
    }

    /// Scaled travel of the perpendicular wheel.
    #[inline]
    pub fn perpendicular_inches(&self, ticks: f64) -> f64 {
        self.encoder_ticks_to_inches(ticks) * self.y_multiplier
    }
}
