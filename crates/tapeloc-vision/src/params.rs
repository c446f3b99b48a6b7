use crate::angle::CorrectionModel;
use serde::{Deserialize, Serialize};
use tapeloc_core::{ensure_finite, ensure_non_negative, ensure_positive, CalibrationError};

/// Hysteresis edge detector thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeParams {
    /// Weak-edge threshold on gradient magnitude.
    pub low: f32,
    /// Strong-edge threshold on gradient magnitude.
    pub high: f32,
    /// Use `sqrt(gx² + gy²)` instead of `|gx| + |gy|`.
    pub l2_gradient: bool,
}

impl Default for EdgeParams {
    fn default() -> Self {
        Self {
            low: 22.0,
            high: 39.0,
            l2_gradient: false,
        }
    }
}

/// Probabilistic line transform parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoughParams {
    /// Offset resolution of the accumulator, pixels.
    pub rho: f32,
    /// Angle resolution of the accumulator, degrees.
    pub theta_deg: f32,
    /// Minimum accumulator votes for a line.
    pub min_votes: u32,
    /// Minimum segment extent along its dominant axis, pixels.
    pub min_length: u32,
    /// Largest gap between edge pixels bridged inside one segment, pixels.
    pub max_gap: u32,
    /// Seed for the pixel visiting order.
    pub seed: u64,
}

impl Default for HoughParams {
    fn default() -> Self {
        Self {
            rho: 1.0,
            theta_deg: 1.0,
            min_votes: 5,
            min_length: 100,
            max_gap: 100,
            seed: 0xFFFF_FFFF,
        }
    }
}

/// Orientation gate for tape edges.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentFilterParams {
    /// Segments must satisfy `|Δx| < max_x_dist`.
    pub max_x_dist: f32,
    /// Segments must satisfy `|Δy| > min_y_dist`.
    pub min_y_dist: f32,
}

impl Default for SegmentFilterParams {
    fn default() -> Self {
        Self {
            max_x_dist: 40.0,
            min_y_dist: 60.0,
        }
    }
}

/// Camera mounting used by the geometric bearing mode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometricParams {
    /// Camera offset from the center of the robot front.
    pub camera_offset: f64,
    /// Range to the landmark assumed when no distance reading is supplied.
    pub nominal_range: f64,
    /// Robot side length, same unit as the offsets.
    pub robot_size: f64,
}

impl Default for GeometricParams {
    fn default() -> Self {
        Self {
            camera_offset: 1.2,
            nominal_range: 0.3,
            robot_size: 40.0,
        }
    }
}

/// Calibration regime for turning a pixel center into a correction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AngleMode {
    /// Linear pixel-to-degree mapping followed by a fitted correction function.
    Empirical { correction: CorrectionModel },
    /// Pinhole bearing plus camera-offset triangulation.
    Geometric(GeometricParams),
}

impl AngleMode {
    /// Empirical mode with a linear correction `slope · angle`.
    pub fn linear(slope: f64) -> Self {
        AngleMode::Empirical {
            correction: CorrectionModel::Linear { slope },
        }
    }
}

impl Default for AngleMode {
    fn default() -> Self {
        AngleMode::linear(1.0)
    }
}

/// Bearing estimation parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AngleParams {
    /// Horizontal field of view, degrees, in (0, 180).
    pub fov_degrees: f64,
    /// Pixel width spanned by the field of view in geometric mode.
    /// `None` uses the frame width.
    pub focal_width: Option<f64>,
    pub mode: AngleMode,
}

impl Default for AngleParams {
    fn default() -> Self {
        Self {
            fov_degrees: 60.0,
            focal_width: None,
            mode: AngleMode::default(),
        }
    }
}

/// Full vision calibration. Immutable once handed to a detector; reconfigure
/// by building a new value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationParams {
    pub edges: EdgeParams,
    pub hough: HoughParams,
    pub filter: SegmentFilterParams,
    pub angle: AngleParams,
}

impl EdgeParams {
    pub fn validate(&self) -> Result<(), CalibrationError> {
        ensure_non_negative("edges.low", self.low as f64)?;
        ensure_non_negative("edges.high", self.high as f64)?;
        if self.low > self.high {
            return Err(CalibrationError::ThresholdOrder {
                low: self.low,
                high: self.high,
            });
        }
        Ok(())
    }
}

impl HoughParams {
    /// Finest offset resolution accepted, pixels.
    pub const MIN_RHO: f32 = 0.5;
    /// Finest angle resolution accepted, degrees.
    pub const MIN_THETA_DEG: f32 = 0.1;

    pub fn validate(&self) -> Result<(), CalibrationError> {
        ensure_positive("hough.rho", self.rho as f64)?;
        ensure_positive("hough.theta_deg", self.theta_deg as f64)?;
        if self.rho < Self::MIN_RHO {
            return Err(CalibrationError::OutOfRange {
                field: "hough.rho",
                value: self.rho as f64,
            });
        }
        if self.theta_deg < Self::MIN_THETA_DEG || self.theta_deg > 180.0 {
            return Err(CalibrationError::OutOfRange {
                field: "hough.theta_deg",
                value: self.theta_deg as f64,
            });
        }
        if self.min_votes == 0 {
            return Err(CalibrationError::NonPositive {
                field: "hough.min_votes",
            });
        }
        Ok(())
    }
}

impl SegmentFilterParams {
    pub fn validate(&self) -> Result<(), CalibrationError> {
        ensure_non_negative("filter.max_x_dist", self.max_x_dist as f64)?;
        ensure_non_negative("filter.min_y_dist", self.min_y_dist as f64)
    }
}

impl AngleParams {
    pub fn validate(&self) -> Result<(), CalibrationError> {
        ensure_finite("angle.fov_degrees", self.fov_degrees)?;
        if self.fov_degrees <= 0.0 || self.fov_degrees >= 180.0 {
            return Err(CalibrationError::FieldOfView {
                degrees: self.fov_degrees,
            });
        }
        if let Some(w) = self.focal_width {
            ensure_positive("angle.focal_width", w)?;
        }
        match &self.mode {
            AngleMode::Empirical { correction } => correction.validate(),
            AngleMode::Geometric(g) => {
                ensure_non_negative("angle.camera_offset", g.camera_offset)?;
                ensure_non_negative("angle.nominal_range", g.nominal_range)?;
                ensure_non_negative("angle.robot_size", g.robot_size)
            }
        }
    }
}

impl CalibrationParams {
    /// Check every section; the first violation is returned.
    pub fn validate(&self) -> Result<(), CalibrationError> {
        self.edges.validate()?;
        self.hough.validate()?;
        self.filter.validate()?;
        self.angle.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        CalibrationParams::default().validate().expect("defaults");
    }

    #[test]
    fn low_above_high_is_rejected() {
        let mut params = CalibrationParams::default();
        params.edges.low = 40.0;
        params.edges.high = 20.0;
        assert_eq!(
            params.validate(),
            Err(CalibrationError::ThresholdOrder {
                low: 40.0,
                high: 20.0
            })
        );
    }

    #[test]
    fn negative_threshold_is_rejected() {
        let mut params = CalibrationParams::default();
        params.filter.min_y_dist = -1.0;
        assert_eq!(
            params.validate(),
            Err(CalibrationError::Negative {
                field: "filter.min_y_dist"
            })
        );
    }

    #[test]
    fn accumulator_resolution_is_bounded() {
        for (rho, theta_deg, field) in [
            (0.01, 1.0, "hough.rho"),
            (1.0, 1e-4, "hough.theta_deg"),
            (1.0, 200.0, "hough.theta_deg"),
        ] {
            let mut params = CalibrationParams::default();
            params.hough.rho = rho;
            params.hough.theta_deg = theta_deg;
            assert!(matches!(
                params.validate(),
                Err(CalibrationError::OutOfRange { field: f, .. }) if f == field
            ));
        }
        let mut params = CalibrationParams::default();
        params.hough.rho = HoughParams::MIN_RHO;
        params.hough.theta_deg = HoughParams::MIN_THETA_DEG;
        params.validate().expect("finest accepted resolution");
    }

    #[test]
    fn field_of_view_bounds_are_exclusive() {
        for fov in [0.0, 180.0, -5.0, 270.0] {
            let mut params = CalibrationParams::default();
            params.angle.fov_degrees = fov;
            assert!(matches!(
                params.validate(),
                Err(CalibrationError::FieldOfView { .. })
            ));
        }
        let mut params = CalibrationParams::default();
        params.angle.fov_degrees = 179.9;
        params.validate().expect("just under 180");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let params: CalibrationParams = serde_json::from_str(
            r#"{
                "edges": { "low": 10, "high": 30 },
                "angle": {
                    "fov_degrees": 55,
                    "mode": { "kind": "empirical", "correction": { "kind": "polynomial", "coefficients": [0.0, 0.5, 0.01] } }
                }
            }"#,
        )
        .expect("parse");
        assert_eq!(params.edges.low, 10.0);
        assert!(!params.edges.l2_gradient);
        assert_eq!(params.hough, HoughParams::default());
        assert_eq!(params.angle.fov_degrees, 55.0);
        assert_eq!(
            params.angle.mode,
            AngleMode::Empirical {
                correction: CorrectionModel::Polynomial {
                    coefficients: vec![0.0, 0.5, 0.01]
                }
            }
        );
    }

    #[test]
    fn geometric_mode_round_trips_through_json() {
        let mut params = CalibrationParams::default();
        params.angle.mode = AngleMode::Geometric(GeometricParams::default());
        let json = serde_json::to_string(&params).expect("serialize");
        assert!(json.contains(r#""kind":"geometric""#));
        let back: CalibrationParams = serde_json::from_str(&json).expect("parse");
        assert_eq!(back, params);
    }
}
