use crate::detection::domain::detection_frame::DetectionFrame;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// User request observed between frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputSignal {
    Quit,
    CaptureStill,
}

/// Per-frame figures shown next to the overlays.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
    pub index: usize,
    pub faces: usize,
    pub eyes: usize,
    /// Rolling detection rate.
    pub fps: f64,
    pub processing_ms: f64,
}

impl FrameStats {
    pub fn new(index: usize, detections: &DetectionFrame, fps: f64, processing_ms: f64) -> Self {
        Self {
            index,
            faces: detections.face_count(),
            eyes: detections.eye_count(),
            fps,
            processing_ms,
        }
    }
}

/// Where annotated frames go, and where key presses come from.
pub trait PresentationSink {
    fn open(&mut self, metadata: &VideoMetadata) -> Result<(), Box<dyn std::error::Error>>;

    /// Draws `detections` and `stats` for one frame. Overlays are burned into
    /// `frame`, so a still captured afterwards shows them.
    fn present(
        &mut self,
        frame: &mut Frame,
        detections: &DetectionFrame,
        stats: &FrameStats,
    ) -> Result<(), Box<dyn std::error::Error>>;

    /// Non-blocking; `None` when nothing was pressed since the last call.
    fn poll_signal(&mut self) -> Option<InputSignal>;

    /// Safe to call more than once.
    fn close(&mut self);
}
