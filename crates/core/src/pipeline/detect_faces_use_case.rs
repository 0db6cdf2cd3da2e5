use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::pipeline::detection_pipeline::DetectionPipeline;
use crate::pipeline::session_error::SessionError;
use crate::pipeline::session_logger::SessionLogger;
use crate::presentation::domain::presentation_sink::{FrameStats, InputSignal, PresentationSink};
use crate::shared::frame::Frame;
use crate::video::domain::frame_source::FrameSource;
use crate::video::domain::image_writer::ImageWriter;

/// Why a session stopped without an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    Quit,
    SourceExhausted,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionSummary {
    pub frames: usize,
    pub elapsed: Duration,
    pub end: SessionEnd,
}

impl SessionSummary {
    pub fn average_fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }
}

/// Live detection session: capture → detect → present, one frame at a time.
///
/// Quit and still-capture requests are observed after each frame is
/// presented. The source and the sink are closed on every exit path.
pub struct DetectFacesUseCase {
    source: Box<dyn FrameSource>,
    pipeline: DetectionPipeline,
    sink: Box<dyn PresentationSink>,
    still_writer: Box<dyn ImageWriter>,
    still_path: PathBuf,
    logger: Box<dyn SessionLogger>,
}

impl DetectFacesUseCase {
    pub fn new(
        source: Box<dyn FrameSource>,
        pipeline: DetectionPipeline,
        sink: Box<dyn PresentationSink>,
        still_writer: Box<dyn ImageWriter>,
        still_path: PathBuf,
        logger: Box<dyn SessionLogger>,
    ) -> Self {
        Self {
            source,
            pipeline,
            sink,
            still_writer,
            still_path,
            logger,
        }
    }

    pub fn execute(&mut self) -> Result<SessionSummary, SessionError> {
        let result = self.open().and_then(|()| self.run());
        self.sink.close();
        self.source.close();
        self.logger.summary();
        result
    }

    fn open(&mut self) -> Result<(), SessionError> {
        let metadata = self
            .source
            .open()
            .map_err(|e| SessionError::SourceUnavailable(e.to_string()))?;
        self.logger.info(&format!(
            "Capturing {} at {}x{} ({:.0} fps nominal)",
            metadata.source, metadata.width, metadata.height, metadata.fps
        ));
        self.sink
            .open(&metadata)
            .map_err(|e| SessionError::Presentation(e.to_string()))
    }

    fn run(&mut self) -> Result<SessionSummary, SessionError> {
        let start = Instant::now();
        let mut frames = 0;

        let end = loop {
            let t = Instant::now();
            let Some(mut frame) = self.source.next_frame() else {
                break SessionEnd::SourceExhausted;
            };
            self.logger.timing("capture", ms(t.elapsed()));

            let report = self.pipeline.process(&frame);
            let processing_ms = ms(report.processing);
            self.logger.timing("detect", processing_ms);

            let throughput = self.pipeline.throughput();
            let stats = FrameStats::new(
                frame.index(),
                &report.detections,
                throughput.fps,
                processing_ms,
            );

            let t = Instant::now();
            self.sink
                .present(&mut frame, &report.detections, &stats)
                .map_err(|e| SessionError::Presentation(e.to_string()))?;
            self.logger.timing("present", ms(t.elapsed()));

            frames += 1;
            self.logger.frame(&stats, &throughput);

            match self.sink.poll_signal() {
                Some(InputSignal::Quit) => break SessionEnd::Quit,
                Some(InputSignal::CaptureStill) => self.capture_still(&frame),
                None => {}
            }
        };

        Ok(SessionSummary {
            frames,
            elapsed: start.elapsed(),
            end,
        })
    }

    fn capture_still(&mut self, frame: &Frame) {
        match self.still_writer.write(&self.still_path, frame) {
            Ok(()) => self
                .logger
                .info(&format!("Screenshot saved to {}", self.still_path.display())),
            Err(e) => log::warn!(
                "Failed to save screenshot to {}: {e}",
                self.still_path.display()
            ),
        }
    }

    pub fn still_path(&self) -> &Path {
        &self.still_path
    }
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection_frame::DetectionFrame;
    use crate::detection::domain::region_detector::{DetectorTuning, RegionDetector};
    use crate::pipeline::pipeline_config::PipelineConfig;
    use crate::pipeline::session_logger::NullSessionLogger;
    use crate::shared::rect::Rect;
    use crate::shared::video_metadata::VideoMetadata;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    // --- Stubs ---

    struct StubSource {
        frames: VecDeque<Frame>,
        fail_open: bool,
        closed: Arc<Mutex<usize>>,
    }

    impl StubSource {
        fn new(count: usize) -> Self {
            Self {
                frames: (0..count).map(|i| make_frame(640, 480, i)).collect(),
                fail_open: false,
                closed: Arc::new(Mutex::new(0)),
            }
        }
    }

    impl FrameSource for StubSource {
        fn open(&mut self) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
            if self.fail_open {
                return Err("No such device".into());
            }
            Ok(VideoMetadata {
                width: 640,
                height: 480,
                fps: 30.0,
                source: "stub".to_string(),
            })
        }

        fn next_frame(&mut self) -> Option<Frame> {
            self.frames.pop_front()
        }

        fn close(&mut self) {
            *self.closed.lock().unwrap() += 1;
        }
    }

    /// Reports one fixed face on every frame.
    struct FixedFaceDetector(Vec<Rect>);

    impl RegionDetector for FixedFaceDetector {
        fn detect(&mut self, _raster: &Frame, _tuning: &DetectorTuning) -> Vec<Rect> {
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct SinkLog {
        opened: bool,
        presented: Vec<(FrameStats, DetectionFrame)>,
        closed: usize,
    }

    struct RecordingSink {
        log: Arc<Mutex<SinkLog>>,
        /// Signal to report after the n-th presented frame (1-based).
        signals: Vec<(usize, InputSignal)>,
        fail_open: bool,
        fail_present_at: Option<usize>,
    }

    impl RecordingSink {
        fn new() -> (Self, Arc<Mutex<SinkLog>>) {
            let log = Arc::new(Mutex::new(SinkLog::default()));
            (
                Self {
                    log: log.clone(),
                    signals: Vec::new(),
                    fail_open: false,
                    fail_present_at: None,
                },
                log,
            )
        }
    }

    impl PresentationSink for RecordingSink {
        fn open(&mut self, _metadata: &VideoMetadata) -> Result<(), Box<dyn std::error::Error>> {
            if self.fail_open {
                return Err("no terminal".into());
            }
            self.log.lock().unwrap().opened = true;
            Ok(())
        }

        fn present(
            &mut self,
            frame: &mut Frame,
            detections: &DetectionFrame,
            stats: &FrameStats,
        ) -> Result<(), Box<dyn std::error::Error>> {
            let mut log = self.log.lock().unwrap();
            if self.fail_present_at == Some(log.presented.len() + 1) {
                return Err("draw failed".into());
            }
            // mark the frame so stills can be told apart from raw captures
            frame.data_mut()[0] = 255;
            log.presented.push((*stats, detections.clone()));
            Ok(())
        }

        fn poll_signal(&mut self) -> Option<InputSignal> {
            let n = self.log.lock().unwrap().presented.len();
            self.signals
                .iter()
                .find(|(at, _)| *at == n)
                .map(|(_, signal)| *signal)
        }

        fn close(&mut self) {
            self.log.lock().unwrap().closed += 1;
        }
    }

    struct StubWriter {
        written: Arc<Mutex<Vec<(PathBuf, Frame)>>>,
        fail: bool,
    }

    impl StubWriter {
        fn new(fail: bool) -> (Self, Arc<Mutex<Vec<(PathBuf, Frame)>>>) {
            let written = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    written: written.clone(),
                    fail,
                },
                written,
            )
        }
    }

    impl ImageWriter for StubWriter {
        fn write(&self, path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
            if self.fail {
                return Err("disk full".into());
            }
            self.written
                .lock()
                .unwrap()
                .push((path.to_path_buf(), frame.clone()));
            Ok(())
        }
    }

    // --- Helpers ---

    fn make_frame(w: u32, h: u32, index: usize) -> Frame {
        Frame::new(vec![100; (w * h * 3) as usize], w, h, 3, index)
    }

    fn pipeline(faces: Vec<Rect>) -> DetectionPipeline {
        DetectionPipeline::new(
            Box::new(FixedFaceDetector(faces)),
            Box::new(FixedFaceDetector(vec![Rect::new(20, 20, 15, 10)])),
            PipelineConfig::default(),
        )
    }

    fn use_case(
        source: StubSource,
        sink: RecordingSink,
        writer: StubWriter,
        faces: Vec<Rect>,
    ) -> DetectFacesUseCase {
        DetectFacesUseCase::new(
            Box::new(source),
            pipeline(faces),
            Box::new(sink),
            Box::new(writer),
            PathBuf::from("detection_screenshot.jpg"),
            Box::new(NullSessionLogger),
        )
    }

    // --- Tests ---

    #[test]
    fn test_runs_until_source_exhausted() {
        let source = StubSource::new(3);
        let source_closed = source.closed.clone();
        let (sink, log) = RecordingSink::new();
        let (writer, _) = StubWriter::new(false);

        let summary = use_case(source, sink, writer, vec![]).execute().unwrap();
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.end, SessionEnd::SourceExhausted);

        let log = log.lock().unwrap();
        assert!(log.opened);
        assert_eq!(log.presented.len(), 3);
        assert_eq!(log.closed, 1);
        assert_eq!(*source_closed.lock().unwrap(), 1);
    }

    #[test]
    fn test_detections_reach_sink_in_display_space() {
        let (sink, log) = RecordingSink::new();
        let (writer, _) = StubWriter::new(false);
        use_case(
            StubSource::new(1),
            sink,
            writer,
            vec![Rect::new(50, 50, 100, 100)],
        )
        .execute()
        .unwrap();

        let log = log.lock().unwrap();
        let (stats, detections) = &log.presented[0];
        assert_eq!(stats.faces, 1);
        assert_eq!(stats.eyes, 1);
        assert!(stats.fps > 0.0);
        assert_eq!(detections.faces()[0].face, Rect::new(100, 100, 200, 200));
        assert_eq!(detections.faces()[0].eyes, vec![Rect::new(120, 120, 15, 10)]);
    }

    #[test]
    fn test_quit_stops_after_current_frame() {
        let (mut sink, log) = RecordingSink::new();
        sink.signals = vec![(2, InputSignal::Quit)];
        let (writer, _) = StubWriter::new(false);

        let summary = use_case(StubSource::new(5), sink, writer, vec![])
            .execute()
            .unwrap();
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.end, SessionEnd::Quit);
        assert_eq!(log.lock().unwrap().closed, 1);
    }

    #[test]
    fn test_capture_still_writes_presented_frame() {
        let (mut sink, _) = RecordingSink::new();
        sink.signals = vec![(1, InputSignal::CaptureStill)];
        let (writer, written) = StubWriter::new(false);

        let summary = use_case(StubSource::new(2), sink, writer, vec![])
            .execute()
            .unwrap();
        assert_eq!(summary.frames, 2);

        let written = written.lock().unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].0, PathBuf::from("detection_screenshot.jpg"));
        assert_eq!(written[0].1.index(), 0);
        assert_eq!(written[0].1.data()[0], 255);
    }

    #[test]
    fn test_still_write_failure_does_not_end_session() {
        let (mut sink, _) = RecordingSink::new();
        sink.signals = vec![(1, InputSignal::CaptureStill)];
        let (writer, _) = StubWriter::new(true);

        let summary = use_case(StubSource::new(3), sink, writer, vec![])
            .execute()
            .unwrap();
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.end, SessionEnd::SourceExhausted);
    }

    #[test]
    fn test_source_open_failure_is_source_unavailable() {
        let mut source = StubSource::new(3);
        source.fail_open = true;
        let source_closed = source.closed.clone();
        let (sink, log) = RecordingSink::new();
        let (writer, _) = StubWriter::new(false);

        let err = use_case(source, sink, writer, vec![]).execute().unwrap_err();
        assert!(matches!(err, SessionError::SourceUnavailable(_)));
        let log = log.lock().unwrap();
        assert!(!log.opened);
        assert!(log.presented.is_empty());
        assert_eq!(*source_closed.lock().unwrap(), 1);
    }

    #[test]
    fn test_sink_open_failure_closes_source() {
        let source = StubSource::new(3);
        let source_closed = source.closed.clone();
        let (mut sink, _) = RecordingSink::new();
        sink.fail_open = true;
        let (writer, _) = StubWriter::new(false);

        let err = use_case(source, sink, writer, vec![]).execute().unwrap_err();
        assert!(matches!(err, SessionError::Presentation(_)));
        assert_eq!(*source_closed.lock().unwrap(), 1);
    }

    #[test]
    fn test_present_failure_is_fatal_and_releases_everything() {
        let source = StubSource::new(5);
        let source_closed = source.closed.clone();
        let (mut sink, log) = RecordingSink::new();
        sink.fail_present_at = Some(2);
        let (writer, _) = StubWriter::new(false);

        let err = use_case(source, sink, writer, vec![]).execute().unwrap_err();
        assert!(matches!(err, SessionError::Presentation(_)));
        let log = log.lock().unwrap();
        assert_eq!(log.presented.len(), 1);
        assert_eq!(log.closed, 1);
        assert_eq!(*source_closed.lock().unwrap(), 1);
    }

    #[test]
    fn test_empty_source_ends_immediately() {
        let (sink, log) = RecordingSink::new();
        let (writer, _) = StubWriter::new(false);
        let summary = use_case(StubSource::new(0), sink, writer, vec![])
            .execute()
            .unwrap();
        assert_eq!(summary.frames, 0);
        assert_eq!(summary.end, SessionEnd::SourceExhausted);
        assert_eq!(summary.average_fps(), 0.0);
        assert!(log.lock().unwrap().presented.is_empty());
    }

    #[test]
    fn test_summary_average_fps() {
        let summary = SessionSummary {
            frames: 60,
            elapsed: Duration::from_secs(2),
            end: SessionEnd::Quit,
        };
        assert_eq!(summary.average_fps(), 30.0);
    }
}
