pub mod overlay;
pub mod presentation_sink;
