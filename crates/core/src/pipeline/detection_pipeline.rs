use std::time::{Duration, Instant};

use crate::detection::domain::coordinate_mapper::{to_display_space, to_parent_space};
use crate::detection::domain::detection_frame::{DetectionFrame, FaceDetection};
use crate::detection::domain::region_detector::RegionDetector;
use crate::pipeline::pipeline_config::PipelineConfig;
use crate::pipeline::throughput_estimator::{ThroughputEstimator, ThroughputSnapshot};
use crate::shared::frame::Frame;
use crate::shared::raster;

/// Result of running one captured frame through the pipeline.
#[derive(Clone, Debug)]
pub struct FrameReport {
    pub detections: DetectionFrame,
    pub processing: Duration,
}

/// Turns captured frames into [`DetectionFrame`]s.
///
/// Faces are searched on a downsized luminance raster; eyes are searched
/// inside each face on the full-resolution luminance raster. Every result is
/// reported in display (capture) coordinates. The only state carried between
/// frames is the throughput window.
pub struct DetectionPipeline {
    face_detector: Box<dyn RegionDetector>,
    eye_detector: Box<dyn RegionDetector>,
    config: PipelineConfig,
    throughput: ThroughputEstimator,
}

impl DetectionPipeline {
    pub fn new(
        face_detector: Box<dyn RegionDetector>,
        eye_detector: Box<dyn RegionDetector>,
        config: PipelineConfig,
    ) -> Self {
        Self::with_estimator(
            face_detector,
            eye_detector,
            config,
            ThroughputEstimator::default(),
        )
    }

    pub fn with_estimator(
        face_detector: Box<dyn RegionDetector>,
        eye_detector: Box<dyn RegionDetector>,
        config: PipelineConfig,
        throughput: ThroughputEstimator,
    ) -> Self {
        Self {
            face_detector,
            eye_detector,
            config,
            throughput,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Detects, then records the elapsed time as one throughput sample.
    pub fn process(&mut self, frame: &Frame) -> FrameReport {
        let start = Instant::now();
        let detections = self.detect(frame);
        let processing = start.elapsed();
        self.throughput.record_frame(processing);
        FrameReport {
            detections,
            processing,
        }
    }

    pub fn current_fps(&self) -> f64 {
        self.throughput.current_fps()
    }

    pub fn throughput(&self) -> ThroughputSnapshot {
        self.throughput.snapshot()
    }

    /// Detection steps only; does not touch the throughput window.
    pub fn detect(&mut self, frame: &Frame) -> DetectionFrame {
        let scale = self.config.detection_scale;
        let small = raster::downsample(frame, scale);
        let small_gray = raster::to_luminance(&small);

        let faces = self.face_detector.detect(&small_gray, &self.config.face);
        if faces.is_empty() {
            return DetectionFrame::empty();
        }

        // Eye search reads the full-resolution raster, not the downsized one.
        let full_gray = raster::to_luminance(frame);
        let mut detections = Vec::with_capacity(faces.len());
        for face in faces {
            let display = to_display_space(face, scale).clamp_to(frame.width(), frame.height());
            if display.is_empty() {
                log::trace!("Dropping degenerate face region {face:?}");
                continue;
            }

            let roi = raster::crop(&full_gray, display);
            let eyes = self
                .eye_detector
                .detect(&roi, &self.config.eye)
                .into_iter()
                .map(|eye| to_parent_space(eye, display.origin()))
                .collect();

            detections.push(FaceDetection {
                face: display,
                eyes,
            });
        }

        DetectionFrame::new(detections)
    }
}
