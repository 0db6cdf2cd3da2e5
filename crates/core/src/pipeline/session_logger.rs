use std::collections::HashMap;
use std::time::Instant;

use crate::pipeline::throughput_estimator::ThroughputSnapshot;
use crate::presentation::domain::presentation_sink::FrameStats;
use crate::shared::constants::{STATS_LOG_INTERVAL, TARGET_FPS};

/// Observer for detection session events.
///
/// Keeps the frame loop free of output concerns; the CLI reports through
/// [`StdoutSessionLogger`], tests use [`NullSessionLogger`].
pub trait SessionLogger {
    /// One processed frame and the throughput window after it.
    fn frame(&mut self, stats: &FrameStats, throughput: &ThroughputSnapshot);

    /// How long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    fn info(&mut self, message: &str);

    /// End-of-session report. Default: no-op.
    fn summary(&self) {}
}

/// Discards every event.
pub struct NullSessionLogger;

impl SessionLogger for NullSessionLogger {
    fn frame(&mut self, _stats: &FrameStats, _throughput: &ThroughputSnapshot) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Logs a performance line every `interval` frames, warns when the warm
/// rolling rate drops under `target_fps`, and keeps per-stage timings for
/// the summary.
pub struct StdoutSessionLogger {
    interval: usize,
    target_fps: f64,
    timings: HashMap<String, Vec<f64>>,
    start_time: Instant,
    frames: usize,
    faces: usize,
    eyes: usize,
    below_target: bool,
}

impl StdoutSessionLogger {
    pub fn new(interval: usize) -> Self {
        Self::with_target(interval, TARGET_FPS)
    }

    pub fn with_target(interval: usize, target_fps: f64) -> Self {
        Self {
            interval: interval.max(1),
            target_fps,
            timings: HashMap::new(),
            start_time: Instant::now(),
            frames: 0,
            faces: 0,
            eyes: 0,
            below_target: false,
        }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn is_below_target(&self) -> bool {
        self.below_target
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    /// Frames per second since the logger was created.
    pub fn average_fps(&self) -> f64 {
        let secs = self.start_time.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }

    pub fn performance_line(&self, stats: &FrameStats, throughput: &ThroughputSnapshot) -> String {
        format!(
            "Performance: avg FPS {:.1} | current FPS {:.1} | {:.1} ms/frame | {} faces, {} eyes",
            self.average_fps(),
            throughput.fps,
            stats.processing_ms,
            stats.faces,
            stats.eyes
        )
    }

    /// `None` before the first frame.
    pub fn summary_string(&self) -> Option<String> {
        if self.frames == 0 {
            return None;
        }

        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Session summary ({} frames, {elapsed_s:.1}s total):",
            self.frames
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = total_ms / durations.len().max(1) as f64;
            lines.push(format!("  {stage:10}: avg {avg_ms:6.1}ms  total {total_ms:7.0}ms"));
        }

        lines.push(format!(
            "  Detections: {} faces, {} eyes",
            self.faces, self.eyes
        ));
        lines.push(format!("  Average FPS: {:.1}", self.average_fps()));
        Some(lines.join("\n"))
    }
}

impl Default for StdoutSessionLogger {
    fn default() -> Self {
        Self::new(STATS_LOG_INTERVAL)
    }
}

impl SessionLogger for StdoutSessionLogger {
    fn frame(&mut self, stats: &FrameStats, throughput: &ThroughputSnapshot) {
        self.frames += 1;
        self.faces += stats.faces;
        self.eyes += stats.eyes;

        if self.frames % self.interval == 0 {
            log::info!("{}", self.performance_line(stats, throughput));
        }

        let below = throughput.is_warm() && throughput.fps < self.target_fps;
        if below && !self.below_target {
            log::warn!(
                "Detection rate {:.1} FPS is below the {:.0} FPS target",
                throughput.fps,
                self.target_fps
            );
        }
        self.below_target = below;
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
