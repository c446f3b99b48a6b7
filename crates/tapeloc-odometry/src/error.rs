use tapeloc_core::CalibrationError;

/// Errors returned by the localizer. All of them indicate misconfiguration or
/// a broken sensor feed; a localizer that returned one should not be trusted
/// for the rest of the run.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum OdometryError {
    #[error("invalid calibration: {0}")]
    InvalidCalibration(#[from] CalibrationError),
    #[error("{wheel} encoder supplied no raw velocity but corrected velocity mode is configured")]
    MissingVelocity { wheel: &'static str },
    #[error("external heading is not finite: {value}")]
    NonFiniteHeading { value: f64 },
}
