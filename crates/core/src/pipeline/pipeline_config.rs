use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::domain::coordinate_mapper::ScaleFactor;
use crate::detection::domain::region_detector::DetectorTuning;
use crate::shared::constants::DETECTION_SCALE;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid {class} tuning: {reason}")]
    Tuning { class: &'static str, reason: String },
}

/// Detection settings fixed for the lifetime of a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub detection_scale: ScaleFactor,
    pub face: DetectorTuning,
    pub eye: DetectorTuning,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detection_scale: ScaleFactor::new(DETECTION_SCALE)
                .expect("default detection scale is within (0, 1]"),
            face: DetectorTuning::FACE,
            eye: DetectorTuning::EYE,
        }
    }
}

impl PipelineConfig {
    /// Loads a JSON config; fields absent from the file keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: PipelineConfig =
            serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.face.validate().map_err(|reason| ConfigError::Tuning {
            class: "face",
            reason,
        })?;
        self.eye.validate().map_err(|reason| ConfigError::Tuning {
            class: "eye",
            reason,
        })?;
        Ok(())
    }
}
