//! Calibration validation errors shared by the vision and odometry crates.

/// Malformed calibration. Fatal at configuration-load time; values are never clamped.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("low threshold {low} exceeds high threshold {high}")]
    ThresholdOrder { low: f32, high: f32 },
    #[error("{field} must be >= 0")]
    Negative { field: &'static str },
    #[error("{field} must be > 0")]
    NonPositive { field: &'static str },
    #[error("{field} must be finite")]
    NonFinite { field: &'static str },
    #[error("{field} = {value} is out of range")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("field of view must be in (0, 180) degrees, got {degrees}")]
    FieldOfView { degrees: f64 },
    #[error("ticks per revolution must be non-zero")]
    ZeroTicksPerRevolution,
    #[error("tracking wheel geometry does not determine a pose (singular kinematics)")]
    DegenerateWheelGeometry,
    #[error("correction polynomial has no coefficients")]
    EmptyPolynomial,
}

/// Reject NaN and infinities.
pub fn ensure_finite(field: &'static str, value: f64) -> Result<(), CalibrationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(CalibrationError::NonFinite { field })
    }
}

/// Finite and `>= 0`.
pub fn ensure_non_negative(field: &'static str, value: f64) -> Result<(), CalibrationError> {
    ensure_finite(field, value)?;
    if value < 0.0 {
        return Err(CalibrationError::Negative { field });
    }
    Ok(())
}

/// Finite and `> 0`.
pub fn ensure_positive(field: &'static str, value: f64) -> Result<(), CalibrationError> {
    ensure_finite(field, value)?;
    if value <= 0.0 {
        return Err(CalibrationError::NonPositive { field });
    }
    Ok(())
}
