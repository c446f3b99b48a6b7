//! JSON configuration for the detector and the localizer.

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tapeloc_odometry::{LocalizerCalibration, OdometryError, TwoWheelLocalizer};
use tapeloc_vision::{CalibrationParams, TapeDetector, VisionError};

#[derive(thiserror::Error, Debug)]
pub enum IoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Vision(#[from] VisionError),
    #[error(transparent)]
    Odometry(#[from] OdometryError),
}

/// Full configuration. Missing sections and fields take their defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TapelocConfig {
    pub vision: CalibrationParams,
    pub localizer: LocalizerCalibration,
}

impl TapelocConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Build a validated tape detector. Frame size is not latched yet.
    pub fn build_detector(&self) -> Result<TapeDetector, ConfigError> {
        Ok(TapeDetector::new(self.vision.clone())?)
    }

    /// Build a validated localizer at the origin.
    pub fn build_localizer(&self) -> Result<TwoWheelLocalizer, ConfigError> {
        Ok(TwoWheelLocalizer::new(self.localizer.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tapeloc_core::CalibrationError;

    #[test]
    fn write_then_load_preserves_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tapeloc.json");
        let mut config = TapelocConfig::default();
        config.vision.hough.min_votes = 12;
        config.localizer.wheel_radius = 0.7;
        config.write_json(&path).expect("write");
        assert_eq!(TapelocConfig::load_json(&path).expect("load"), config);
    }

    #[test]
    fn multipliers_reload_bit_exact() {
        let config = TapelocConfig::default();
        let json = serde_json::to_string_pretty(&config).expect("serialize");
        let back: TapelocConfig = serde_json::from_str(&json).expect("parse");
        assert_eq!(
            back.localizer.x_multiplier.to_bits(),
            config.localizer.x_multiplier.to_bits()
        );
        assert_eq!(
            back.localizer.y_multiplier.to_bits(),
            config.localizer.y_multiplier.to_bits()
        );
    }

    #[test]
    fn empty_object_is_the_default_config() {
        let config: TapelocConfig = serde_json::from_str("{}").expect("parse");
        assert_eq!(config, TapelocConfig::default());
        config.build_detector().expect("detector");
        config.build_localizer().expect("localizer");
    }

    #[test]
    fn invalid_sections_fail_to_build() {
        let config: TapelocConfig = serde_json::from_str(
            r#"{ "vision": { "edges": { "low": 50, "high": 10 } }, "localizer": { "ticks_per_rev": 0 } }"#,
        )
        .expect("parse");
        assert!(matches!(
            config.build_detector(),
            Err(ConfigError::Vision(VisionError::InvalidCalibration(
                CalibrationError::ThresholdOrder { .. }
            )))
        ));
        assert!(matches!(
            config.build_localizer(),
            Err(ConfigError::Odometry(OdometryError::InvalidCalibration(
                CalibrationError::ZeroTicksPerRevolution
            )))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            TapelocConfig::load_json(dir.path().join("nope.json")),
            Err(IoError::Io(_))
        ));
    }
}
