//! Conversions between capture, detection and display coordinate spaces.
//!
//! Detection runs on a downsized raster; every rectangle it reports is mapped
//! back to display space here, once per rectangle, so these functions take and
//! return plain `Copy` values and never allocate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::rect::{Point, Rect};

#[derive(Error, Debug, Clone, PartialEq)]
#[error("scale factor must be within (0, 1], got {0}")]
pub struct InvalidScaleFactor(pub f64);

/// Ratio of detection resolution to capture resolution, applied to both axes.
///
/// Always in `(0, 1]`: detection only ever downsamples.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ScaleFactor(f64);

impl ScaleFactor {
    pub const IDENTITY: ScaleFactor = ScaleFactor(1.0);

    pub fn new(value: f64) -> Result<Self, InvalidScaleFactor> {
        if value.is_finite() && value > 0.0 && value <= 1.0 {
            Ok(Self(value))
        } else {
            Err(InvalidScaleFactor(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_identity(self) -> bool {
        self.0 == 1.0
    }

    /// Size of the detection raster for a capture raster of `width` x `height`.
    /// Never collapses a non-empty axis to zero.
    pub fn detection_size(self, width: u32, height: u32) -> (u32, u32) {
        let scale = |v: u32| {
            if v == 0 {
                0
            } else {
                round_half_up(v as f64 * self.0).max(1)
            }
        };
        (scale(width), scale(height))
    }
}

impl TryFrom<f64> for ScaleFactor {
    type Error = InvalidScaleFactor;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ScaleFactor> for f64 {
    fn from(scale: ScaleFactor) -> Self {
        scale.0
    }
}

/// Maps a rectangle found in detection space to display space.
pub fn to_display_space(rect: Rect, scale: ScaleFactor) -> Rect {
    let s = scale.value();
    Rect {
        x: round_half_up(rect.x as f64 / s),
        y: round_half_up(rect.y as f64 / s),
        width: round_half_up(rect.width as f64 / s),
        height: round_half_up(rect.height as f64 / s),
    }
}

/// Maps a display-space rectangle into detection space.
pub fn to_detection_space(rect: Rect, scale: ScaleFactor) -> Rect {
    let s = scale.value();
    Rect {
        x: round_half_up(rect.x as f64 * s),
        y: round_half_up(rect.y as f64 * s),
        width: round_half_up(rect.width as f64 * s),
        height: round_half_up(rect.height as f64 * s),
    }
}

/// Translates a rectangle found inside an ROI back into the parent frame.
pub fn to_parent_space(local: Rect, roi_origin: Point) -> Rect {
    Rect {
        x: local.x + roi_origin.x,
        y: local.y + roi_origin.y,
        width: local.width,
        height: local.height,
    }
}

fn round_half_up(value: f64) -> u32 {
    // Inputs are non-negative; the saturating cast absorbs the upper end.
    (value + 0.5).floor() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn scale(v: f64) -> ScaleFactor {
        ScaleFactor::new(v).unwrap()
    }

    #[rstest]
    #[case::zero(0.0)]
    #[case::negative(-0.5)]
    #[case::upsample(1.5)]
    #[case::nan(f64::NAN)]
    #[case::infinite(f64::INFINITY)]
    fn test_scale_factor_rejects_out_of_range(#[case] value: f64) {
        assert!(ScaleFactor::new(value).is_err());
    }

    #[rstest]
    #[case(0.01)]
    #[case(0.5)]
    #[case(1.0)]
    fn test_scale_factor_accepts_range(#[case] value: f64) {
        assert_relative_eq!(scale(value).value(), value);
    }

    #[test]
    fn test_scale_factor_deserializes_with_validation() {
        let ok: ScaleFactor = serde_json::from_str("0.25").unwrap();
        assert_relative_eq!(ok.value(), 0.25);
        assert!(serde_json::from_str::<ScaleFactor>("2.0").is_err());
    }

    #[test]
    fn test_detection_size() {
        assert_eq!(scale(0.5).detection_size(640, 480), (320, 240));
        assert_eq!(ScaleFactor::IDENTITY.detection_size(640, 480), (640, 480));
        assert_eq!(scale(0.01).detection_size(10, 10), (1, 1));
    }

    #[test]
    fn test_scenario_face_to_display_space() {
        let face = Rect::new(50, 50, 100, 100);
        assert_eq!(
            to_display_space(face, scale(0.5)),
            Rect::new(100, 100, 200, 200)
        );
    }

    #[test]
    fn test_scenario_eye_to_parent_space() {
        let face = Rect::new(100, 100, 200, 200);
        let eye = Rect::new(20, 20, 15, 10);
        assert_eq!(
            to_parent_space(eye, face.origin()),
            Rect::new(120, 120, 15, 10)
        );
    }

    #[test]
    fn test_display_space_rounds_half_up() {
        // 3 / 0.4 = 7.5 -> 8, 1 / 0.4 = 2.5 -> 3
        let r = to_display_space(Rect::new(3, 1, 3, 1), scale(0.4));
        assert_eq!(r, Rect::new(8, 3, 8, 3));
    }

    #[test]
    fn test_identity_scale_is_noop() {
        let r = Rect::new(13, 7, 99, 41);
        assert_eq!(to_display_space(r, ScaleFactor::IDENTITY), r);
        assert_eq!(to_detection_space(r, ScaleFactor::IDENTITY), r);
    }

    // Downsampling loses at most half a detection pixel per component, which
    // is at most one display pixel while the scale stays at or above 0.5.
    #[rstest]
    fn test_round_trip_within_one_pixel(#[values(1.0, 0.9, 0.75, 0.6, 0.5)] s: f64) {
        let sf = scale(s);
        for x in (0..640).step_by(7) {
            for w in (1..320).step_by(11) {
                let r = Rect::new(x, x / 2, w, w + 3);
                let back = to_display_space(to_detection_space(r, sf), sf);
                for (a, b) in [
                    (r.x, back.x),
                    (r.y, back.y),
                    (r.width, back.width),
                    (r.height, back.height),
                ] {
                    assert!(a.abs_diff(b) <= 1, "s={s} {r:?} -> {back:?}");
                }
            }
        }
    }

    // Rectangles that originate from the detector are exact images of
    // detection-space rectangles and survive the round trip at any scale.
    #[rstest]
    fn test_round_trip_of_detector_output(#[values(0.5, 0.3, 0.25, 0.1, 0.05)] s: f64) {
        let sf = scale(s);
        for x in 0..64 {
            let detected = Rect::new(x, 63 - x, x + 1, 2 * x + 1);
            let display = to_display_space(detected, sf);
            let again = to_display_space(to_detection_space(display, sf), sf);
            for (a, b) in [
                (display.x, again.x),
                (display.y, again.y),
                (display.width, again.width),
                (display.height, again.height),
            ] {
                assert!(a.abs_diff(b) <= 1, "s={s} {display:?} -> {again:?}");
            }
        }
    }

    #[test]
    fn test_roi_containment() {
        let face = Rect::new(37, 81, 120, 140);
        for ex in 0..face.width {
            for ey in (0..face.height).step_by(5) {
                let w = (face.width - ex).min(15);
                let h = (face.height - ey).min(10);
                let eye = Rect::new(ex, ey, w, h);
                let mapped = to_parent_space(eye, face.origin());
                assert!(face.contains(&mapped), "{mapped:?} escapes {face:?}");
            }
        }
    }
}
