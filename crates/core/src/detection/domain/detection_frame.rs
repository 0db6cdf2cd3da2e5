use crate::shared::rect::Rect;

/// One face and the eyes found inside it, all in display space.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FaceDetection {
    pub face: Rect,
    pub eyes: Vec<Rect>,
}

/// Everything found in a single captured frame, in detector emission order.
///
/// Built fresh for every frame and never merged with earlier results.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DetectionFrame {
    faces: Vec<FaceDetection>,
}

impl DetectionFrame {
    pub fn new(faces: Vec<FaceDetection>) -> Self {
        Self { faces }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn faces(&self) -> &[FaceDetection] {
        &self.faces
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn eye_count(&self) -> usize {
        self.faces.iter().map(|f| f.eyes.len()).sum()
    }

    pub fn eyes(&self) -> impl Iterator<Item = &Rect> + '_ {
        self.faces.iter().flat_map(|f| f.eyes.iter())
    }
}
