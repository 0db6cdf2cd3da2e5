use thiserror::Error;

use crate::detection::domain::coordinate_mapper::InvalidScaleFactor;
use crate::detection::infrastructure::model_resolver::ModelResolveError;
use crate::detection::domain::region_detector::DetectorLoadError;
use crate::pipeline::pipeline_config::ConfigError;

/// Conditions that end a detection session. None of them is retried.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("frame source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("detector configuration missing: {0}")]
    ConfigurationMissing(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("presentation failed: {0}")]
    Presentation(String),
}

impl From<ConfigError> for SessionError {
    fn from(e: ConfigError) -> Self {
        SessionError::InvalidConfiguration(e.to_string())
    }
}

impl From<InvalidScaleFactor> for SessionError {
    fn from(e: InvalidScaleFactor) -> Self {
        SessionError::InvalidConfiguration(e.to_string())
    }
}

impl From<DetectorLoadError> for SessionError {
    fn from(e: DetectorLoadError) -> Self {
        SessionError::ConfigurationMissing(e.to_string())
    }
}

impl From<ModelResolveError> for SessionError {
    fn from(e: ModelResolveError) -> Self {
        SessionError::ConfigurationMissing(e.to_string())
    }
}
