use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::frame::Frame;
use crate::shared::rect::Rect;

/// Search parameters for one class of region (faces, eyes).
///
/// These are fixed for the lifetime of a session.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectorTuning {
    /// Neighbour-vote threshold: how much agreement a candidate needs.
    pub min_neighbors: u32,
    /// Smallest rectangle side searched for, in pixels of the scanned raster.
    pub min_size: u32,
    /// Multiplicative step between successive scales of the multiscale search.
    pub scale_step: f64,
}

impl DetectorTuning {
    pub const FACE: DetectorTuning = DetectorTuning {
        min_neighbors: 5,
        min_size: 30,
        scale_step: 1.1,
    };

    pub const EYE: DetectorTuning = DetectorTuning {
        min_neighbors: 3,
        min_size: 15,
        scale_step: 1.1,
    };

    pub fn validate(&self) -> Result<(), String> {
        if self.min_size == 0 {
            return Err("min_size must be positive".into());
        }
        if !(self.scale_step.is_finite() && self.scale_step > 1.0) {
            return Err(format!(
                "scale_step must be greater than 1.0, got {}",
                self.scale_step
            ));
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum DetectorLoadError {
    #[error("failed to read model {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid model {path}: {reason}")]
    Model { path: PathBuf, reason: String },
}

/// Rectangle finder over a single-channel raster.
///
/// The region class is selected by the model an implementation was built
/// with and the tuning passed per call. Results are in
/// the raster's own coordinates, within its bounds, in emission order.
/// Implementations must not mutate the raster and must be deterministic for a
/// fixed raster and tuning. `&mut self` allows reuse of internal scratch state.
pub trait RegionDetector {
    fn detect(&mut self, raster: &Frame, tuning: &DetectorTuning) -> Vec<Rect>;
}
