//! Raster operations the detection pipeline needs between capture and search.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, Pixel, Rgb};
use ndarray::s;

use crate::detection::domain::coordinate_mapper::ScaleFactor;
use crate::shared::frame::Frame;
use crate::shared::rect::Rect;

/// Resizes `frame` by `scale` with linear (triangle) interpolation, never
/// nearest-neighbour.
pub fn downsample(frame: &Frame, scale: ScaleFactor) -> Frame {
    if scale.is_identity() || frame.is_empty() {
        return frame.clone();
    }
    let (width, height) = scale.detection_size(frame.width(), frame.height());
    let data = match frame.channels() {
        1 => resize_as::<Luma<u8>>(frame, width, height),
        3 => resize_as::<Rgb<u8>>(frame, width, height),
        n => unreachable!("unsupported channel count {n}"),
    };
    Frame::new(data, width, height, frame.channels(), frame.index())
}

/// Reduces an RGB frame to a single luminance channel.
pub fn to_luminance(frame: &Frame) -> Frame {
    if frame.is_luminance() {
        return frame.clone();
    }
    debug_assert_eq!(frame.channels(), 3, "luminance expects an RGB frame");
    let view: ImageBuffer<Rgb<u8>, &[u8]> =
        ImageBuffer::from_raw(frame.width(), frame.height(), frame.data())
            .expect("Frame data length must match dimensions");
    let gray = imageops::grayscale(&view);
    Frame::luminance(gray.into_raw(), frame.width(), frame.height(), frame.index())
}

/// Copies the `rect` window out of `frame`.
///
/// `rect` must be non-empty and lie within the frame; callers clamp first.
pub fn crop(frame: &Frame, rect: Rect) -> Frame {
    debug_assert!(!rect.is_empty(), "crop window must be non-empty");
    debug_assert!(
        rect.fits_within(frame.width(), frame.height()),
        "crop window must lie within the frame"
    );
    let (x0, y0) = (rect.x as usize, rect.y as usize);
    let (x1, y1) = (rect.right() as usize, rect.bottom() as usize);
    let view = frame.as_ndarray();
    let data: Vec<u8> = view.slice(s![y0..y1, x0..x1, ..]).iter().copied().collect();
    Frame::new(
        data,
        rect.width,
        rect.height,
        frame.channels(),
        frame.index(),
    )
}

fn resize_as<P>(frame: &Frame, width: u32, height: u32) -> Vec<u8>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let view: ImageBuffer<P, &[u8]> =
        ImageBuffer::from_raw(frame.width(), frame.height(), frame.data())
            .expect("Frame data length must match dimensions");
    imageops::resize(&view, width, height, FilterType::Triangle).into_raw()
}
