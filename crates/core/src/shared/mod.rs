pub mod constants;
pub mod frame;
pub mod raster;
pub mod rect;
pub mod video_metadata;
