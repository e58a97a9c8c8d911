use anyhow::Result;
use image::DynamicImage;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{Detection, DetectionSet};

/// Stub backend for testing. Returns the same detection set for every image.
pub struct StubBackend {
    detections: DetectionSet,
    input_size: (u32, u32),
}

impl StubBackend {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            detections: DetectionSet::new(detections),
            input_size: (640, 640),
        }
    }

    /// A backend that never detects anything.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn with_input_size(mut self, width: u32, height: u32) -> Self {
        self.input_size = (width, height);
        self
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::empty()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }

    fn detect(&self, _image: &DynamicImage) -> Result<DetectionSet> {
        Ok(self.detections.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::BoundingBox;

    #[test]
    fn stub_backend_replays_fixed_detections() {
        let det = Detection::new(1, 0.7, BoundingBox::new(0.0, 0.0, 64.0, 64.0));
        let backend = StubBackend::new(vec![det]).with_input_size(320, 320);
        let image = DynamicImage::new_rgb8(8, 8);

        let first = backend.detect(&image).unwrap();
        let second = backend.detect(&image).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.first(), Some(&det));
        assert_eq!(backend.input_size(), (320, 320));
    }

    #[test]
    fn empty_stub_detects_nothing() {
        let backend = StubBackend::empty();
        let set = backend.detect(&DynamicImage::new_rgb8(4, 4)).unwrap();
        assert!(set.is_empty());
    }
}
