use anyhow::Result;
use image::DynamicImage;

use crate::detect::result::DetectionSet;

/// Detector backend trait.
///
/// A backend is loaded once at startup and shared read-only across requests,
/// so `detect` takes `&self` and implementations must be `Send + Sync`.
/// Bounding boxes are reported in the backend's input coordinate space,
/// i.e. relative to `input_size()`, not to the uploaded image.
pub trait DetectorBackend: Send + Sync {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Declared square-ish input resolution `(width, height)` of the model.
    fn input_size(&self) -> (u32, u32);

    /// Run detection on one image.
    ///
    /// Failures propagate to the caller; there is no retry.
    fn detect(&self, image: &DynamicImage) -> Result<DetectionSet>;

    /// Optional warm-up hook.
    fn warm_up(&self) -> Result<()> {
        Ok(())
    }
}
