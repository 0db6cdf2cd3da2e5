use ndarray::{s, Axis};

use crate::detection::domain::detection_frame::DetectionFrame;
use crate::shared::frame::Frame;
use crate::shared::rect::Rect;

pub const FACE_COLOR: [u8; 3] = [0, 255, 0];
pub const EYE_COLOR: [u8; 3] = [0, 0, 255];
pub const LINE_THICKNESS: u32 = 2;

/// Burns hollow rectangles for faces and their eyes into an RGB frame.
#[derive(Clone, Debug)]
pub struct OverlayRenderer {
    face_color: [u8; 3],
    eye_color: [u8; 3],
    thickness: u32,
}

impl OverlayRenderer {
    pub fn new(face_color: [u8; 3], eye_color: [u8; 3], thickness: u32) -> Self {
        Self {
            face_color,
            eye_color,
            thickness: thickness.max(1),
        }
    }

    /// Draws every face and eye; returns false when the frame is not RGB.
    pub fn draw(&self, frame: &mut Frame, detections: &DetectionFrame) -> bool {
        if frame.channels() != 3 {
            log::debug!("Skipping overlay on {}-channel frame", frame.channels());
            return false;
        }

        for detection in detections.faces() {
            draw_rect(frame, detection.face, self.face_color, self.thickness);
            for eye in &detection.eyes {
                draw_rect(frame, *eye, self.eye_color, self.thickness);
            }
        }
        true
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(FACE_COLOR, EYE_COLOR, LINE_THICKNESS)
    }
}

/// Outline of `rect` clipped to the frame; the line grows inward.
fn draw_rect(frame: &mut Frame, rect: Rect, color: [u8; 3], thickness: u32) {
    let r = rect.clamp_to(frame.width(), frame.height());
    if r.is_empty() {
        return;
    }
    let t = thickness.min(r.width).min(r.height);
    let bands = [
        Rect::new(r.x, r.y, r.width, t),
        Rect::new(r.x, r.bottom() - t, r.width, t),
        Rect::new(r.x, r.y, t, r.height),
        Rect::new(r.right() - t, r.y, t, r.height),
    ];

    let mut view = frame.as_ndarray_mut();
    for band in bands {
        let mut patch = view.slice_mut(s![
            band.y as usize..band.bottom() as usize,
            band.x as usize..band.right() as usize,
            ..
        ]);
        for (c, value) in color.iter().enumerate() {
            patch.index_axis_mut(Axis(2), c).fill(*value);
        }
    }
}
