use std::io::{IsTerminal, Write};
use std::time::Duration;

use crossterm::cursor::MoveToColumn;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::queue;

use crate::detection::domain::detection_frame::DetectionFrame;
use crate::presentation::domain::overlay::OverlayRenderer;
use crate::presentation::domain::presentation_sink::{FrameStats, InputSignal, PresentationSink};
use crate::presentation::infrastructure::stats_panel::StatsPanel;
use crate::shared::constants::DISPLAY_FACE_CAP;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Headless presentation on the controlling terminal.
///
/// Overlays and the statistics panel are burned into each frame for stills,
/// a one-line status is rewritten in place on stderr, and key presses are
/// read in raw mode: `q`, Esc or Ctrl-C quit, `s` captures a still.
pub struct TerminalSink {
    overlay: OverlayRenderer,
    panel: StatsPanel,
    raw_mode: bool,
    status_shown: bool,
}

impl TerminalSink {
    pub fn new(overlay: OverlayRenderer, panel: StatsPanel) -> Self {
        Self {
            overlay,
            panel,
            raw_mode: false,
            status_shown: false,
        }
    }

    fn write_status(&mut self, line: &str) -> std::io::Result<()> {
        let mut err = std::io::stderr().lock();
        queue!(err, MoveToColumn(0), Print(line), Clear(ClearType::UntilNewLine))?;
        err.flush()?;
        self.status_shown = true;
        Ok(())
    }
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new(OverlayRenderer::default(), StatsPanel::default())
    }
}

impl PresentationSink for TerminalSink {
    fn open(&mut self, metadata: &VideoMetadata) -> Result<(), Box<dyn std::error::Error>> {
        if std::io::stdin().is_terminal() {
            terminal::enable_raw_mode()?;
            self.raw_mode = true;
        } else {
            log::warn!("stdin is not a terminal; keyboard controls are disabled");
        }
        log::info!(
            "Presenting {} ({}x{}); press 'q' to quit, 's' to save a screenshot",
            metadata.source,
            metadata.width,
            metadata.height
        );
        Ok(())
    }

    fn present(
        &mut self,
        frame: &mut Frame,
        detections: &DetectionFrame,
        stats: &FrameStats,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.overlay.draw(frame, detections);
        self.panel.draw(frame, stats);
        self.write_status(&status_line(stats, DISPLAY_FACE_CAP))?;
        Ok(())
    }

    fn poll_signal(&mut self) -> Option<InputSignal> {
        if !self.raw_mode {
            return None;
        }
        loop {
            match event::poll(Duration::ZERO) {
                Ok(true) => {}
                Ok(false) => return None,
                Err(e) => {
                    log::debug!("Keyboard poll failed: {e}");
                    return None;
                }
            }
            match event::read() {
                Ok(Event::Key(key)) => {
                    if let Some(signal) = signal_for(key) {
                        return Some(signal);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    log::debug!("Keyboard read failed: {e}");
                    return None;
                }
            }
        }
    }

    fn close(&mut self) {
        if self.status_shown {
            eprint!("\r\n");
            self.status_shown = false;
        }
        if self.raw_mode {
            if let Err(e) = terminal::disable_raw_mode() {
                log::error!("Failed to restore terminal mode: {e}");
            }
            self.raw_mode = false;
        }
    }
}

impl Drop for TerminalSink {
    fn drop(&mut self) {
        self.close();
    }
}

/// Maps a key press to a session signal.
pub fn signal_for(key: KeyEvent) -> Option<InputSignal> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(InputSignal::Quit)
        }
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(InputSignal::Quit),
        KeyCode::Char('s') | KeyCode::Char('S') => Some(InputSignal::CaptureStill),
        _ => None,
    }
}

/// The face count shown is capped at `face_cap`; eyes are reported as found.
pub fn status_line(stats: &FrameStats, face_cap: usize) -> String {
    format!(
        "Faces: {} | Eyes: {} | FPS: {:.1} | {:.1} ms/frame",
        stats.faces.min(face_cap),
        stats.eyes,
        stats.fps,
        stats.processing_ms
    )
}
