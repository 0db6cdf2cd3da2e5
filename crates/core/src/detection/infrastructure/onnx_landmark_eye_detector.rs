//! Eye search through a YOLO face-pose model, using ONNX Runtime via `ort`.
//!
//! The model emits face boxes with five landmarks each. Run on a face crop,
//! the strongest face's two eye landmarks become the eye rectangles.
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};

use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::detection::domain::region_detector::{DetectorLoadError, DetectorTuning, RegionDetector};
use crate::shared::frame::Frame;
use crate::shared::rect::Rect;

/// Fallback input resolution when the model doesn't declare one.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Minimum face confidence for a detection to carry landmarks.
pub const FACE_CONFIDENCE: f32 = 0.25;

/// Minimum keypoint confidence to treat a landmark as visible.
const KEYPOINT_CONFIDENCE: f32 = 0.5;

/// Values per detection row: box (4), confidence (1), 5 keypoints x (x, y, conf).
const ROW_LEN: usize = 5 + 5 * 3;

/// Share of the model input the crop is scaled into. The surrounding padding
/// gives a tight face crop the context the model was trained with.
const CONTENT_FILL: f64 = 0.6;

/// YOLO letterbox grey.
const PAD_VALUE: f32 = 114.0 / 255.0;

/// [`RegionDetector`] that finds eyes as landmarks of a face-pose model.
///
/// Of the tuning only `min_size` applies: eye boxes with a smaller side are
/// dropped. The vote threshold and scale step are cascade parameters with no
/// counterpart in a single-pass landmark model.
pub struct OnnxLandmarkEyeDetector {
    session: ort::session::Session,
    input_size: u32,
}

impl OnnxLandmarkEyeDetector {
    pub fn from_file(path: &Path) -> Result<Self, DetectorLoadError> {
        std::fs::metadata(path).map_err(|e| DetectorLoadError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let session = load_session(path).map_err(|e| DetectorLoadError::Model {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        // NCHW: [1, 3, H, W]
        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        Ok(Self {
            session,
            input_size,
        })
    }

    fn strongest_face(
        &mut self,
        raster: &Frame,
    ) -> Result<Option<LandmarkFace>, Box<dyn std::error::Error>> {
        let letterbox = Letterbox::fit(raster.width(), raster.height(), self.input_size);
        let input = letterbox.tensor(raster)?;

        let input_value = ort::value::Tensor::from_array(input)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("face-pose model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;

        Ok(decode_strongest(data, &shape, &letterbox)?)
    }
}

fn load_session(path: &Path) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    Ok(ort::session::Session::builder()?.commit_from_file(path)?)
}

impl RegionDetector for OnnxLandmarkEyeDetector {
    fn detect(&mut self, raster: &Frame, tuning: &DetectorTuning) -> Vec<Rect> {
        if raster.is_empty() {
            return Vec::new();
        }
        let face = match self.strongest_face(raster) {
            Ok(Some(face)) => face,
            Ok(None) => return Vec::new(),
            Err(e) => {
                log::debug!("Eye landmark inference failed: {e}");
                return Vec::new();
            }
        };

        face.landmarks
            .eye_boxes(face.width, raster.width(), raster.height())
            .into_iter()
            .filter(|eye| eye.width.min(eye.height) >= tuning.min_size)
            .collect()
    }
}

/// The best face found in one inference, in raster coordinates.
#[derive(Clone, Debug, PartialEq)]
struct LandmarkFace {
    confidence: f32,
    width: f64,
    landmarks: FaceLandmarks,
}

/// Placement of a raster inside the square model input.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Letterbox {
    size: u32,
    scale: f64,
    content_w: u32,
    content_h: u32,
    pad_x: u32,
    pad_y: u32,
}

impl Letterbox {
    fn fit(width: u32, height: u32, size: u32) -> Self {
        let target = size as f64 * CONTENT_FILL;
        let scale = (target / width.max(1) as f64).min(target / height.max(1) as f64);
        let content_w = ((width as f64 * scale).round() as u32).clamp(1, size);
        let content_h = ((height as f64 * scale).round() as u32).clamp(1, size);
        Self {
            size,
            scale,
            content_w,
            content_h,
            pad_x: (size - content_w) / 2,
            pad_y: (size - content_h) / 2,
        }
    }

    fn to_raster(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.pad_x as f64) / self.scale,
            (y - self.pad_y as f64) / self.scale,
        )
    }

    /// Resizes `raster` into the content area of a grey NCHW tensor.
    /// A luminance raster is replicated across the three channels.
    fn tensor(&self, raster: &Frame) -> Result<ndarray::Array4<f32>, String> {
        let (w, h) = (raster.width(), raster.height());
        let channels = raster.channels() as usize;
        let resized = match channels {
            1 => {
                let img = GrayImage::from_raw(w, h, raster.data().to_vec())
                    .ok_or("luminance raster does not match its dimensions")?;
                imageops::resize(&img, self.content_w, self.content_h, FilterType::Triangle)
                    .into_raw()
            }
            3 => {
                let img = RgbImage::from_raw(w, h, raster.data().to_vec())
                    .ok_or("RGB raster does not match its dimensions")?;
                imageops::resize(&img, self.content_w, self.content_h, FilterType::Triangle)
                    .into_raw()
            }
            n => return Err(format!("unsupported channel count {n}")),
        };

        let s = self.size as usize;
        let mut tensor = ndarray::Array4::<f32>::from_elem((1, 3, s, s), PAD_VALUE);
        let cw = self.content_w as usize;
        for y in 0..self.content_h as usize {
            let ty = self.pad_y as usize + y;
            for x in 0..cw {
                let tx = self.pad_x as usize + x;
                let base = (y * cw + x) * channels;
                for c in 0..3 {
                    let value = resized[base + c.min(channels - 1)];
                    tensor[[0, c, ty, tx]] = value as f32 / 255.0;
                }
            }
        }
        Ok(tensor)
    }
}

/// Picks the most confident face from a YOLO pose output and maps it back to
/// raster coordinates.
///
/// Accepts both `[1, features, detections]` and `[1, detections, features]`.
fn decode_strongest(
    data: &[f32],
    shape: &[usize],
    letterbox: &Letterbox,
) -> Result<Option<LandmarkFace>, String> {
    if shape.len() != 3 {
        return Err(format!("Unexpected face-pose output shape: {shape:?}"));
    }
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats < ROW_LEN {
        return Err(format!(
            "face-pose output has {num_feats} values per detection, need {ROW_LEN}"
        ));
    }
    if data.len() < num_dets * num_feats {
        return Err("face-pose output is shorter than its shape".into());
    }
    let value = |det: usize, feat: usize| {
        if transposed {
            data[feat * num_dets + det]
        } else {
            data[det * num_feats + feat]
        }
    };

    let best = (0..num_dets)
        .filter(|&i| value(i, 4) >= FACE_CONFIDENCE)
        .max_by(|&a, &b| value(a, 4).total_cmp(&value(b, 4)));
    let Some(i) = best else {
        return Ok(None);
    };

    let mut points = [None; 5];
    for (k, point) in points.iter_mut().enumerate() {
        let base = 5 + k * 3;
        if value(i, base + 2) >= KEYPOINT_CONFIDENCE {
            *point = Some(letterbox.to_raster(value(i, base) as f64, value(i, base + 1) as f64));
        }
    }

    Ok(Some(LandmarkFace {
        confidence: value(i, 4),
        width: value(i, 2) as f64 / letterbox.scale,
        landmarks: FaceLandmarks::new(points),
    }))
}
