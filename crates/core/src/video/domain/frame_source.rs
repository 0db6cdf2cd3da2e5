use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Produces captured frames one at a time.
///
/// Implementations own device/codec details; the session only sees
/// [`Frame`]s. Acquiring the next frame is the only blocking step of the
/// per-frame loop.
pub trait FrameSource {
    /// Opens the underlying device or file and reports its properties.
    fn open(&mut self) -> Result<VideoMetadata, Box<dyn std::error::Error>>;

    /// Next frame, or `None` once no frame is available. `None` ends the
    /// session: the source is treated as exhausted or disconnected.
    fn next_frame(&mut self) -> Option<Frame>;

    /// Releases the device. Safe to call more than once.
    fn close(&mut self);
}
