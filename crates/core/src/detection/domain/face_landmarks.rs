//! Five-point face landmarks and the eye rectangles derived from them.
//!
//! Point order follows the face-pose models: left eye, right eye, nose,
//! left mouth corner, right mouth corner. A landmark the model was not
//! confident about is `None`.

use crate::shared::rect::Rect;

const LEFT_EYE: usize = 0;
const RIGHT_EYE: usize = 1;

/// Eye box side as a fraction of the distance between the two eyes.
pub const EYE_BOX_RATIO: f64 = 0.5;

/// Eye box side as a fraction of the face width when only one eye is visible.
pub const SINGLE_EYE_RATIO: f64 = 0.2;

#[derive(Clone, Debug, PartialEq)]
pub struct FaceLandmarks {
    points: [Option<(f64, f64)>; 5],
}

impl FaceLandmarks {
    pub fn new(points: [Option<(f64, f64)>; 5]) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Option<(f64, f64)>; 5] {
        &self.points
    }

    pub fn left_eye(&self) -> Option<(f64, f64)> {
        self.points[LEFT_EYE]
    }

    pub fn right_eye(&self) -> Option<(f64, f64)> {
        self.points[RIGHT_EYE]
    }

    /// Distance between the eye centres, when both are visible.
    pub fn eye_span(&self) -> Option<f64> {
        let (l, r) = (self.left_eye()?, self.right_eye()?);
        Some((r.0 - l.0).hypot(r.1 - l.1))
    }

    /// Square boxes centred on each visible eye, ordered left to right and
    /// clipped to a `max_w` x `max_h` raster.
    ///
    /// The side scales with the eye span, or with `face_width` when a single
    /// eye is visible.
    pub fn eye_boxes(&self, face_width: f64, max_w: u32, max_h: u32) -> Vec<Rect> {
        let side = match self.eye_span() {
            Some(span) => span * EYE_BOX_RATIO,
            None => face_width * SINGLE_EYE_RATIO,
        };
        if !(side.is_finite() && side > 0.0) {
            return Vec::new();
        }

        let mut centres: Vec<(f64, f64)> = [self.left_eye(), self.right_eye()]
            .into_iter()
            .flatten()
            .collect();
        centres.sort_by(|a, b| a.0.total_cmp(&b.0));

        centres
            .into_iter()
            .filter_map(|(cx, cy)| centred_box(cx, cy, side, max_w, max_h))
            .collect()
    }
}

fn centred_box(cx: f64, cy: f64, side: f64, max_w: u32, max_h: u32) -> Option<Rect> {
    let half = side / 2.0;
    let x0 = (cx - half).round().clamp(0.0, max_w as f64);
    let y0 = (cy - half).round().clamp(0.0, max_h as f64);
    let x1 = (cx + half).round().clamp(0.0, max_w as f64);
    let y1 = (cy + half).round().clamp(0.0, max_h as f64);
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

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn landmarks(left: Option<(f64, f64)>, right: Option<(f64, f64)>) -> FaceLandmarks {
        FaceLandmarks::new([left, right, Some((100.0, 120.0)), None, None])
    }

    #[test]
    fn test_eye_span() {
        let lm = landmarks(Some((60.0, 80.0)), Some((140.0, 80.0)));
        assert_relative_eq!(lm.eye_span().unwrap(), 80.0);
        assert!(landmarks(Some((60.0, 80.0)), None).eye_span().is_none());
    }

    #[test]
    fn test_two_eyes_give_square_boxes_scaled_by_span() {
        let lm = landmarks(Some((60.0, 80.0)), Some((140.0, 80.0)));
        let boxes = lm.eye_boxes(200.0, 200, 200);
        assert_eq!(boxes, vec![Rect::new(40, 60, 40, 40), Rect::new(120, 60, 40, 40)]);
    }

    #[test]
    fn test_boxes_are_ordered_left_to_right() {
        let lm = landmarks(Some((140.0, 80.0)), Some((60.0, 80.0)));
        let boxes = lm.eye_boxes(200.0, 200, 200);
        assert!(boxes[0].x < boxes[1].x);
    }

    #[test]
    fn test_single_eye_uses_face_width() {
        let lm = landmarks(None, Some((100.0, 50.0)));
        assert_eq!(lm.eye_boxes(100.0, 200, 200), vec![Rect::new(90, 40, 20, 20)]);
    }

    #[test]
    fn test_no_visible_eyes_gives_nothing() {
        assert!(landmarks(None, None).eye_boxes(100.0, 200, 200).is_empty());
    }

    #[test]
    fn test_boxes_are_clipped_to_raster() {
        let lm = landmarks(Some((5.0, 5.0)), Some((95.0, 5.0)));
        let boxes = lm.eye_boxes(100.0, 100, 100);
        assert_eq!(boxes.len(), 2);
        for rect in &boxes {
            assert!(rect.fits_within(100, 100));
        }
        assert_eq!(boxes[0].x, 0);
        assert_eq!(boxes[1].right(), 100);
    }

    #[test]
    fn test_eye_outside_raster_is_dropped() {
        let lm = landmarks(Some((-50.0, 10.0)), Some((20.0, 10.0)));
        assert_eq!(lm.eye_boxes(100.0, 100, 100).len(), 1);
    }
}
