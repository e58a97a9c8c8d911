//! Tumor detection report service.
//!
//! Turns the output of a pretrained detector into an annotated image and a
//! paginated PDF diagnostic report for a single uploaded scan.
//!
//! # Pipeline
//!
//! One upload runs sequentially through:
//!
//! 1. **Detection**: a [`DetectorBackend`] loaded once at startup produces a
//!    [`DetectionSet`] in model-input coordinates.
//! 2. **Selection**: one detection is chosen for reporting (positional first
//!    by default, see [`SelectionPolicy`]).
//! 3. **Metrics**: label, size percentage against the detector's reference
//!    resolution, and priority are derived into a [`ReportRecord`].
//! 4. **Composition**: a [`ReportDocument`] is laid out and rendered to PDF.
//! 5. **Storage**: the [`ArtifactStore`] writes `{base}.jpg` and `{base}.pdf`,
//!    overwriting any earlier artifacts with the same base name.
//!
//! # Module Structure
//!
//! - `detect`: detector trait, stub and ONNX (tract) backends
//! - `report`: selection, metrics, document composition, PDF rendering
//! - `annotate`: box drawing on the uploaded image
//! - `storage`: artifact naming and persistence
//! - `pipeline`: the orchestrating [`ReportPipeline`]
//! - `web`: upload form server
//! - `config`: TOML + environment configuration

pub mod annotate;
pub mod config;
pub mod detect;
pub mod pipeline;
pub mod report;
pub mod storage;
pub mod web;

pub use config::{BackendKind, ServiceConfig, StorageSettings};
pub use detect::{load_backend, BoundingBox, Detection, DetectionSet, DetectorBackend, StubBackend};
pub use pipeline::{ReportOutcome, ReportPipeline};
pub use report::{
    Priority, ReferenceResolution, ReportDocument, ReportRecord, SelectionPolicy, TumorClass,
};
pub use storage::{ArtifactPaths, ArtifactStore};
