pub mod detect_faces_use_case;
pub mod detection_pipeline;
pub mod pipeline_config;
pub mod session_error;
pub mod session_logger;
pub mod throughput_estimator;
