use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};

use crate::detection::domain::detection_frame::DetectionFrame;
use crate::presentation::domain::overlay::OverlayRenderer;
use crate::presentation::domain::presentation_sink::{FrameStats, InputSignal, PresentationSink};
use crate::presentation::infrastructure::stats_panel::StatsPanel;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// One annotated frame handed to the window.
pub struct ViewerFrame {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

/// Creates a connected sink and window link.
///
/// The sink lives on the session thread and the link goes to whatever GUI
/// runs on the main thread. Closing the sink makes the link report
/// [`SessionClosed`], and dropping every link makes the sink report
/// [`InputSignal::Quit`].
pub fn window_channel(overlay: OverlayRenderer, panel: StatsPanel) -> (WindowSink, ViewerLink) {
    let (frame_tx, frame_rx) = crossbeam_channel::bounded(1);
    let (signal_tx, signal_rx) = crossbeam_channel::unbounded();
    let sink = WindowSink {
        overlay,
        panel,
        frames: Some(frame_tx),
        signals: signal_rx,
        viewer_gone: false,
    };
    let link = ViewerLink {
        frames: frame_rx,
        signals: signal_tx,
    };
    (sink, link)
}

/// [`PresentationSink`] that shows frames in a native window.
///
/// Frames are offered without blocking: when the window has not yet drawn
/// the previous frame, the new one is dropped from display (it is still
/// annotated, so stills are unaffected).
pub struct WindowSink {
    overlay: OverlayRenderer,
    panel: StatsPanel,
    frames: Option<Sender<ViewerFrame>>,
    signals: Receiver<InputSignal>,
    viewer_gone: bool,
}

impl PresentationSink for WindowSink {
    fn open(&mut self, metadata: &VideoMetadata) -> Result<(), Box<dyn std::error::Error>> {
        if self.frames.is_none() {
            return Err("display window sink was already closed".into());
        }
        log::info!(
            "Presenting {} ({}x{}) in a window; press 'q' to quit, 's' to save a screenshot",
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

        if self.viewer_gone {
            return Ok(());
        }
        let Some(frames) = &self.frames else {
            return Err("display window sink is closed".into());
        };
        if frame.channels() != 3 {
            return Err(format!("cannot display a {}-channel frame", frame.channels()).into());
        }
        let shown = ViewerFrame {
            width: frame.width(),
            height: frame.height(),
            rgb: frame.data().to_vec(),
        };
        match frames.try_send(shown) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                log::trace!("Window busy; frame {} not shown", stats.index)
            }
            Err(TrySendError::Disconnected(_)) => {
                log::info!("Display window closed");
                self.viewer_gone = true;
            }
        }
        Ok(())
    }

    fn poll_signal(&mut self) -> Option<InputSignal> {
        if self.viewer_gone {
            return Some(InputSignal::Quit);
        }
        match self.signals.try_recv() {
            Ok(signal) => Some(signal),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.viewer_gone = true;
                Some(InputSignal::Quit)
            }
        }
    }

    fn close(&mut self) {
        self.frames = None;
    }
}

impl Drop for WindowSink {
    fn drop(&mut self) {
        self.close();
    }
}

/// The window side of [`window_channel`], handed to the GUI thread.
///
/// Cloning shares the same channels.
#[derive(Clone)]
pub struct ViewerLink {
    frames: Receiver<ViewerFrame>,
    signals: Sender<InputSignal>,
}

/// The session closed its sink; the window should exit.
#[derive(Debug, PartialEq, Eq)]
pub struct SessionClosed;

impl ViewerLink {
    /// Most recent frame waiting for display, skipping any older ones.
    pub fn latest_frame(&self) -> Result<Option<ViewerFrame>, SessionClosed> {
        let mut latest = None;
        loop {
            match self.frames.try_recv() {
                Ok(shown) => latest = Some(shown),
                Err(TryRecvError::Empty) => return Ok(latest),
                Err(TryRecvError::Disconnected) => {
                    return match latest {
                        Some(shown) => Ok(Some(shown)),
                        None => Err(SessionClosed),
                    }
                }
            }
        }
    }

    pub fn send(&self, signal: InputSignal) {
        // The session may already have ended.
        let _ = self.signals.send(signal);
    }
}

impl ViewerFrame {
    /// Pixels as RGBA with an opaque alpha channel.
    pub fn to_rgba(&self) -> Vec<u8> {
        self.rgb
            .chunks_exact(3)
            .flat_map(|px| [px[0], px[1], px[2], u8::MAX])
            .collect()
    }
}
