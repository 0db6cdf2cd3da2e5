use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;
use ndarray::s;

use crate::presentation::domain::presentation_sink::FrameStats;
use crate::shared::constants::DISPLAY_FACE_CAP;
use crate::shared::frame::Frame;
use crate::shared::rect::Rect;

/// Panel area in frame pixels, top-left corner.
pub const PANEL: Rect = Rect::new(10, 10, 290, 185);

/// Share of the underlying frame that shows through the panel background.
const SHOW_THROUGH: f32 = 0.3;

const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const FONT_SIZE: f32 = 20.0;
const LINE_HEIGHT: i32 = 25;
const TEXT_INSET: i32 = 10;

/// Fonts tried, in order, when none is given explicitly.
pub const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Burns the per-frame statistics into the top-left corner of a frame.
///
/// Without a font the darkened panel is still drawn, so the layout of a
/// saved still does not depend on the host.
pub struct StatsPanel {
    font: Option<FontVec>,
}

impl StatsPanel {
    pub fn new(font: Option<FontVec>) -> Self {
        Self { font }
    }

    pub fn from_font_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = fs::read(path)
            .map_err(|e| format!("failed to read font {}: {e}", path.display()))?;
        let font = FontVec::try_from_vec(data)
            .map_err(|e| format!("failed to parse font {}: {e}", path.display()))?;
        Ok(Self::new(Some(font)))
    }

    /// First loadable font from [`FONT_CANDIDATES`]; text-less when none is.
    pub fn discover() -> Self {
        let candidates: Vec<PathBuf> = FONT_CANDIDATES.iter().map(PathBuf::from).collect();
        for path in candidates.iter().filter(|p| p.is_file()) {
            match Self::from_font_file(path) {
                Ok(panel) => {
                    log::debug!("Statistics font: {}", path.display());
                    return panel;
                }
                Err(e) => log::debug!("{e}"),
            }
        }
        log::warn!("No font found for the statistics panel; pass --font to show text");
        Self::new(None)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Text rows of the panel; the face count is capped for display.
    pub fn lines(stats: &FrameStats) -> [String; 7] {
        [
            format!("Faces: {}", stats.faces.min(DISPLAY_FACE_CAP)),
            format!("Eyes: {}", stats.eyes),
            format!("FPS: {:.1}", stats.fps),
            format!("Processing: {:.1}ms", stats.processing_ms),
            String::new(),
            "Press 'q' to quit".to_string(),
            "Press 's' for screenshot".to_string(),
        ]
    }

    /// Returns false when the frame is not RGB or too small for any panel.
    pub fn draw(&self, frame: &mut Frame, stats: &FrameStats) -> bool {
        if frame.channels() != 3 {
            return false;
        }
        let area = PANEL.clamp_to(frame.width(), frame.height());
        if area.is_empty() {
            return false;
        }

        let mut view = frame.as_ndarray_mut();
        let mut patch = view.slice_mut(s![
            area.y as usize..area.bottom() as usize,
            area.x as usize..area.right() as usize,
            ..
        ]);
        patch.mapv_inplace(|v| (v as f32 * SHOW_THROUGH).round() as u8);

        let Some(font) = &self.font else {
            return true;
        };
        let Some(mut canvas) =
            RgbImage::from_raw(area.width, area.height, patch.iter().copied().collect())
        else {
            return true;
        };
        let scale = PxScale::from(FONT_SIZE);
        for (i, line) in Self::lines(stats).iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            let y = TEXT_INSET / 2 + i as i32 * LINE_HEIGHT;
            draw_text_mut(&mut canvas, TEXT_COLOR, TEXT_INSET, y, scale, font, line);
        }
        patch
            .iter_mut()
            .zip(canvas.as_raw())
            .for_each(|(dst, src)| *dst = *src);
        true
    }
}

impl Default for StatsPanel {
    fn default() -> Self {
        Self::discover()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(width: u32, height: u32, value: u8) -> Frame {
        Frame::new(vec![value; (width * height * 3) as usize], width, height, 3, 0)
    }

    fn stats() -> FrameStats {
        FrameStats {
            index: 0,
            faces: 8,
            eyes: 3,
            fps: 24.0,
            processing_ms: 12.34,
        }
    }

    #[test]
    fn test_lines_match_panel_layout() {
        let lines = StatsPanel::lines(&stats());
        assert_eq!(lines[0], "Faces: 5");
        assert_eq!(lines[1], "Eyes: 3");
        assert_eq!(lines[2], "FPS: 24.0");
        assert_eq!(lines[3], "Processing: 12.3ms");
        assert!(lines[4].is_empty());
        assert!(lines[5].contains("'q'"));
        assert!(lines[6].contains("'s'"));
    }

    #[test]
    fn test_panel_darkens_only_its_area() {
        let mut frame = flat(640, 480, 200);
        assert!(StatsPanel::new(None).draw(&mut frame, &stats()));

        let arr = frame.as_ndarray();
        assert_eq!(arr[[20, 20, 0]], 60);
        assert_eq!(arr[[PANEL.bottom() as usize - 1, PANEL.right() as usize - 1, 2]], 60);
        assert_eq!(arr[[5, 5, 0]], 200);
        assert_eq!(arr[[PANEL.bottom() as usize, 20, 1]], 200);
        assert_eq!(arr[[400, 600, 0]], 200);
    }

    #[test]
    fn test_small_frame_gets_clipped_panel() {
        let mut frame = flat(50, 30, 100);
        assert!(StatsPanel::new(None).draw(&mut frame, &stats()));
        assert_eq!(frame.as_ndarray()[[29, 49, 0]], 30);
    }

    #[test]
    fn test_frame_smaller_than_offset_is_untouched() {
        let mut frame = flat(8, 8, 100);
        assert!(!StatsPanel::new(None).draw(&mut frame, &stats()));
        assert!(frame.data().iter().all(|&v| v == 100));
    }

    #[test]
    fn test_luminance_frame_is_skipped() {
        let mut frame = Frame::luminance(vec![100; 400 * 300], 400, 300, 0);
        assert!(!StatsPanel::new(None).draw(&mut frame, &stats()));
    }

    #[test]
    fn test_unreadable_font_is_an_error() {
        assert!(StatsPanel::from_font_file(Path::new("/nonexistent/font.ttf")).is_err());

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.ttf");
        fs::write(&path, b"not a font").unwrap();
        assert!(StatsPanel::from_font_file(&path).is_err());
    }

    #[test]
    fn test_text_is_drawn_with_a_system_font() {
        let panel = StatsPanel::discover();
        if !panel.has_font() {
            eprintln!("no system font installed; text rendering not exercised");
            return;
        }
        let mut frame = flat(640, 480, 0);
        panel.draw(&mut frame, &stats());

        let arr = frame.as_ndarray();
        let bright = (PANEL.y as usize..PANEL.bottom() as usize)
            .flat_map(|y| (PANEL.x as usize..PANEL.right() as usize).map(move |x| (y, x)))
            .filter(|&(y, x)| arr[[y, x, 0]] > 128)
            .count();
        assert!(bright > 50, "only {bright} text pixels");
    }
}
