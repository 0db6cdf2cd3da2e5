use std::io::Cursor;
use std::path::Path;

use crate::detection::domain::region_detector::{DetectorLoadError, DetectorTuning, RegionDetector};
use crate::shared::frame::Frame;
use crate::shared::rect::Rect;

/// Smallest window the SeetaFace cascade accepts.
pub const MIN_WINDOW: u32 = 20;

/// Score added to the acceptance threshold per required neighbour vote.
pub const SCORE_PER_NEIGHBOR: f64 = 0.4;

const SLIDE_STEP: u32 = 4;

/// rustface parameters derived from a [`DetectorTuning`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineParams {
    pub min_window: u32,
    pub pyramid_factor: f32,
    pub score_thresh: f64,
}

impl EngineParams {
    /// The multiscale step becomes the pyramid's shrink factor; the vote
    /// threshold becomes a classifier score threshold (5 votes -> 2.0).
    pub fn from_tuning(tuning: &DetectorTuning) -> Self {
        Self {
            min_window: tuning.min_size.max(MIN_WINDOW),
            pyramid_factor: (1.0 / tuning.scale_step).clamp(0.01, 0.99) as f32,
            score_thresh: tuning.min_neighbors as f64 * SCORE_PER_NEIGHBOR,
        }
    }
}

/// [`RegionDetector`] backed by the `rustface` cascade engine.
///
/// One instance per model file: the face model and the eye model each get
/// their own detector.
pub struct RustfaceRegionDetector {
    engine: Box<dyn rustface::Detector>,
    applied: Option<EngineParams>,
}

impl RustfaceRegionDetector {
    pub fn from_file(path: &Path) -> Result<Self, DetectorLoadError> {
        let bytes = std::fs::read(path).map_err(|e| DetectorLoadError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_bytes(&bytes).map_err(|reason| DetectorLoadError::Model {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        let model = rustface::read_model(Cursor::new(bytes)).map_err(|e| format!("{e:?}"))?;
        let mut engine = rustface::create_detector_with_model(model);
        engine.set_slide_window_step(SLIDE_STEP, SLIDE_STEP);
        Ok(Self {
            engine,
            applied: None,
        })
    }

    fn apply(&mut self, params: EngineParams) {
        if self.applied == Some(params) {
            return;
        }
        self.engine.set_min_face_size(params.min_window);
        self.engine.set_pyramid_scale_factor(params.pyramid_factor);
        self.engine.set_score_thresh(params.score_thresh);
        self.applied = Some(params);
    }
}

impl RegionDetector for RustfaceRegionDetector {
    fn detect(&mut self, raster: &Frame, tuning: &DetectorTuning) -> Vec<Rect> {
        debug_assert!(raster.is_luminance());
        let params = EngineParams::from_tuning(tuning);
        if raster.width() < params.min_window || raster.height() < params.min_window {
            return Vec::new();
        }
        self.apply(params);

        let image = rustface::ImageData::new(raster.data(), raster.width(), raster.height());
        self.engine
            .detect(&image)
            .iter()
            .filter_map(|face| {
                let bbox = face.bbox();
                clip_box(
                    bbox.x(),
                    bbox.y(),
                    bbox.width(),
                    bbox.height(),
                    raster.width(),
                    raster.height(),
                )
            })
            .collect()
    }
}

/// Clips a signed engine box to the raster; `None` if nothing remains.
pub fn clip_box(x: i32, y: i32, width: u32, height: u32, max_w: u32, max_h: u32) -> Option<Rect> {
    let x0 = i64::from(x).clamp(0, i64::from(max_w));
    let y0 = i64::from(y).clamp(0, i64::from(max_h));
    let x1 = (i64::from(x) + i64::from(width)).clamp(0, i64::from(max_w));
    let y1 = (i64::from(y) + i64::from(height)).clamp(0, i64::from(max_h));
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(Rect::new(
        x0 as u32,
        y0 as u32,
        (x1 - x0) as u32,
        (y1 - y0) as u32,
    ))
}
