//! Real-time face and eye detection.
//!
//! Each bounded context splits into `domain` (types and traits) and
//! `infrastructure` (adapters over ffmpeg, rustface, onnxruntime, the
//! terminal and the filesystem). `pipeline` wires them into a session.

pub mod detection;
pub mod pipeline;
pub mod presentation;
pub mod shared;
pub mod video;
