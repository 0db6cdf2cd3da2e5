pub mod coordinate_mapper;
pub mod detection_frame;
pub mod face_landmarks;
pub mod region_detector;
