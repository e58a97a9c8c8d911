mod backend;
mod backends;
mod postprocess;
mod result;

pub use backend::DetectorBackend;
pub use backends::{load_backend, StubBackend};
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::{BoundingBox, Detection, DetectionSet};
