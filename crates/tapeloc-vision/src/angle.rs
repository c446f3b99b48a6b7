//! Pixel center to bearing angle and correction.
//!
//! Two calibration regimes are supported, selected by [`AngleMode`]:
//!
//! - **Empirical**: the field of view is spread linearly over the frame width,
//!   `angle = fov · (center / width) − fov / 2`, and a fitted
//!   [`AngleCorrectionFunction`] maps the angle to a correction.
//! - **Geometric**: pinhole bearing `atan(2·tan(fov/2)/focal_width · (center − width/2))`,
//!   with the correction being the bearing seen from the robot's tracking
//!   origin after accounting for the camera offset (law of cosines + law of
//!   sines, see [`Triangulation`]).
//!
//! Invalid upstream centers and non-finite intermediate results both produce
//! [`LandmarkEstimate::invalid`].

use std::fmt;
use std::sync::Arc;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use tapeloc_core::{ensure_finite, CalibrationError};

use crate::params::{AngleMode, AngleParams, GeometricParams};

/// Maps a bearing in degrees to a correction value.
pub trait AngleCorrectionFunction: Send + Sync {
    fn evaluate(&self, angle_degrees: f64) -> f64;
}

impl<F> AngleCorrectionFunction for F
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    fn evaluate(&self, angle_degrees: f64) -> f64 {
        self(angle_degrees)
    }
}

/// Serializable correction function shapes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CorrectionModel {
    /// `slope · angle`.
    Linear { slope: f64 },
    /// `c0 + c1·angle + c2·angle² + ...`, ascending powers.
    Polynomial { coefficients: Vec<f64> },
}

impl CorrectionModel {
    pub fn validate(&self) -> Result<(), CalibrationError> {
        match self {
            CorrectionModel::Linear { slope } => ensure_finite("correction.slope", *slope),
            CorrectionModel::Polynomial { coefficients } => {
                if coefficients.is_empty() {
                    return Err(CalibrationError::EmptyPolynomial);
                }
                coefficients
                    .iter()
                    .try_for_each(|&c| ensure_finite("correction.coefficients", c))
            }
        }
    }
}

impl AngleCorrectionFunction for CorrectionModel {
    fn evaluate(&self, angle_degrees: f64) -> f64 {
        match self {
            CorrectionModel::Linear { slope } => slope * angle_degrees,
            CorrectionModel::Polynomial { coefficients } => coefficients
                .iter()
                .rev()
                .fold(0.0, |acc, c| acc * angle_degrees + c),
        }
    }
}

/// Per-frame landmark output. Consumers must treat the numeric fields of an
/// invalid estimate as zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkEstimate {
    pub pixel_center: f64,
    pub angle_degrees: f64,
    pub correction: f64,
    pub valid: bool,
}

impl LandmarkEstimate {
    /// No landmark: every numeric field is 0.
    pub const fn invalid() -> Self {
        Self {
            pixel_center: 0.0,
            angle_degrees: 0.0,
            correction: 0.0,
            valid: false,
        }
    }

    /// Correction to act on; 0 for an invalid estimate.
    #[inline]
    pub fn effective_correction(&self) -> f64 {
        if self.valid {
            self.correction
        } else {
            0.0
        }
    }

    fn checked(pixel_center: f64, angle_degrees: f64, correction: f64) -> Self {
        if pixel_center.is_finite() && angle_degrees.is_finite() && correction.is_finite() {
            Self {
                pixel_center,
                angle_degrees,
                correction,
                valid: true,
            }
        } else {
            log::debug!(
                "non-finite landmark estimate: center {pixel_center}, angle {angle_degrees}, correction {correction}"
            );
            Self::invalid()
        }
    }
}

/// Robot pose and distance-sensor reading used to place the landmark in the world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeReading {
    pub x: f64,
    pub y: f64,
    /// Robot heading, radians.
    pub heading: f64,
    /// Distance from the camera to the landmark.
    pub range: f64,
}

/// Camera-offset triangulation.
///
/// With the camera `camera_offset` ahead of the tracking origin, a target at
/// range `r` and bearing `θ` from the camera sits at distance
/// `h = sqrt(x² + r² + 2·x·r·cos θ)` from the origin, at bearing
/// `ψ = asin(r/h · sin θ)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangulation {
    pub camera_offset: f64,
    pub robot_size: f64,
}

impl Triangulation {
    pub fn new(params: &GeometricParams) -> Self {
        Self {
            camera_offset: params.camera_offset,
            robot_size: params.robot_size,
        }
    }

    /// `(h, ψ)` for a bearing in radians, `None` when either is non-finite.
    pub fn solve(&self, bearing: f64, range: f64) -> Option<(f64, f64)> {
        let x = self.camera_offset;
        let h = (x * x + range * range + 2.0 * x * range * bearing.cos()).sqrt();
        let psi = (range / h * bearing.sin()).asin();
        (h.is_finite() && psi.is_finite()).then_some((h, psi))
    }

    /// World position of the landmark seen in `estimate` from `reading`.
    ///
    /// The y coordinate is shifted back by half the robot size so the result
    /// is where the robot's tracking origin should be placed.
    pub fn reposition(
        &self,
        estimate: &LandmarkEstimate,
        reading: &RangeReading,
    ) -> Option<Point2<f64>> {
        if !estimate.valid {
            return None;
        }
        let (h, psi) = self.solve(estimate.angle_degrees.to_radians(), reading.range)?;
        let dir = reading.heading + psi;
        let p = Point2::new(
            h * dir.cos() + reading.x,
            h * dir.sin() + reading.y - self.robot_size / 2.0,
        );
        (p.x.is_finite() && p.y.is_finite()).then_some(p)
    }
}

/// Pixel center to [`LandmarkEstimate`].
#[derive(Clone)]
pub struct LandmarkAngleEstimator {
    params: AngleParams,
    correction: Arc<dyn AngleCorrectionFunction>,
}

impl fmt::Debug for LandmarkAngleEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LandmarkAngleEstimator")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl LandmarkAngleEstimator {
    /// Estimator using the correction model from `params`.
    pub fn new(params: AngleParams) -> Result<Self, CalibrationError> {
        params.validate()?;
        let correction: Arc<dyn AngleCorrectionFunction> = match &params.mode {
            AngleMode::Empirical { correction } => Arc::new(correction.clone()),
            AngleMode::Geometric(_) => Arc::new(|_: f64| 0.0),
        };
        Ok(Self { params, correction })
    }

    /// Estimator with a caller-supplied correction function in empirical mode.
    /// The configured model is ignored; geometric mode does not use it.
    pub fn with_correction(
        params: AngleParams,
        correction: Arc<dyn AngleCorrectionFunction>,
    ) -> Result<Self, CalibrationError> {
        params.validate()?;
        Ok(Self { params, correction })
    }

    pub fn params(&self) -> &AngleParams {
        &self.params
    }

    /// Estimate from an optional pixel center; `None` yields an invalid estimate
    /// without evaluating any formula.
    pub fn estimate(&self, pixel_center: Option<f64>, frame_width: usize) -> LandmarkEstimate {
        let Some(center) = pixel_center else {
            return LandmarkEstimate::invalid();
        };
        if !center.is_finite() || frame_width == 0 {
            return LandmarkEstimate::invalid();
        }
        let width = frame_width as f64;
        let fov = self.params.fov_degrees;

        match &self.params.mode {
            AngleMode::Empirical { .. } => {
                let angle = fov * (center / width) - fov / 2.0;
                if !angle.is_finite() {
                    return LandmarkEstimate::invalid();
                }
                LandmarkEstimate::checked(center, angle, self.correction.evaluate(angle))
            }
            AngleMode::Geometric(geometry) => {
                let focal = self.params.focal_width.unwrap_or(width);
                let fov_multiplier = 2.0 * (fov / 2.0).to_radians().tan() / focal;
                let bearing = (fov_multiplier * (center - width / 2.0)).atan();
                let triangulation = Triangulation::new(geometry);
                match triangulation.solve(bearing, geometry.nominal_range) {
                    Some((_, psi)) => {
                        LandmarkEstimate::checked(center, bearing.to_degrees(), psi.to_degrees())
                    }
                    None => LandmarkEstimate::invalid(),
                }
            }
        }
    }
}
