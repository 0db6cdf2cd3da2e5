pub const FACE_MODEL_NAME: &str = "seeta_fd_frontal_v1.0.bin";
pub const FACE_MODEL_URL: &str =
    "https://github.com/atomashpolskiy/rustface/raw/master/model/seeta_fd_frontal_v1.0.bin";

/// Face-pose model whose eye landmarks drive the eye search.
pub const EYE_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const EYE_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

/// Detection raster as a fraction of the capture raster (320x240 from 640x480).
pub const DETECTION_SCALE: f64 = 0.5;

/// Throughput floor the session is tuned to sustain.
pub const TARGET_FPS: f64 = 20.0;

/// Rolling window for the frame-rate estimate (~1s at target rate).
pub const FPS_WINDOW: usize = 30;

pub const CAPTURE_DEVICE: &str = "/dev/video0";
pub const CAPTURE_FORMAT: &str = "v4l2";
pub const CAPTURE_WIDTH: u32 = 640;
pub const CAPTURE_HEIGHT: u32 = 480;
pub const CAPTURE_FPS: u32 = 30;

/// Title of the display window.
pub const WINDOW_TITLE: &str = "Face & Eye Detection System";

pub const SCREENSHOT_PATH: &str = "detection_screenshot.jpg";

/// Frames between periodic performance log lines.
pub const STATS_LOG_INTERVAL: usize = 100;

/// Faces counted in the on-screen statistics; more may still be drawn.
pub const DISPLAY_FACE_CAP: usize = 5;
