/// Properties of an opened frame source.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    /// Nominal rate reported by the source; 0.0 when unknown.
    pub fps: f64,
    /// Device path or file the frames come from.
    pub source: String,
}
