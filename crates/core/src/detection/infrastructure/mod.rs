pub mod model_resolver;
pub mod onnx_landmark_eye_detector;
pub mod rustface_region_detector;
