use std::path::Path;

use crate::shared::frame::Frame;
use crate::video::domain::image_writer::ImageWriter;

/// Writes still captures with the `image` crate.
///
/// The format follows the file extension; an existing file at the same path
/// is overwritten.
pub struct ImageFileWriter;

impl ImageFileWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageFileWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageWriter for ImageFileWriter {
    fn write(&self, path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let data = frame.data().to_vec();
        match frame.channels() {
            3 => image::RgbImage::from_raw(frame.width(), frame.height(), data)
                .ok_or("Failed to create image from frame data")?
                .save(path)?,
            1 => image::GrayImage::from_raw(frame.width(), frame.height(), data)
                .ok_or("Failed to create image from frame data")?
                .save(path)?,
            n => return Err(format!("Unsupported channel count: {n}").into()),
        }
        Ok(())
    }
}
