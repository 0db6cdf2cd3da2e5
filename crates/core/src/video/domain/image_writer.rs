use std::path::Path;

use crate::shared::frame::Frame;

/// Persists a single frame as an image file, replacing any existing file.
pub trait ImageWriter {
    fn write(&self, path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;
}
