use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::config::{BackendKind, ServiceConfig};
use crate::detect::backend::DetectorBackend;

pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use stub::StubBackend;

#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;

/// Build the process-wide detector selected by the configuration.
///
/// Called once at startup. A missing model file is fatal here rather than a
/// per-request error.
pub fn load_backend(cfg: &ServiceConfig) -> Result<Arc<dyn DetectorBackend>> {
    let backend: Arc<dyn DetectorBackend> = match cfg.backend {
        BackendKind::Stub => Arc::new(
            StubBackend::empty()
                .with_input_size(cfg.detector.input_width, cfg.detector.input_height),
        ),
        BackendKind::Tract => {
            if !cfg.model_path.is_file() {
                return Err(anyhow!(
                    "detector model not found at {}",
                    cfg.model_path.display()
                ));
            }
            load_tract(cfg)?
        }
    };
    backend.warm_up()?;
    log::info!(
        "detector backend '{}' ready (input {}x{})",
        backend.name(),
        backend.input_size().0,
        backend.input_size().1
    );
    Ok(backend)
}

#[cfg(feature = "backend-tract")]
fn load_tract(cfg: &ServiceConfig) -> Result<Arc<dyn DetectorBackend>> {
    let backend = TractBackend::new(
        &cfg.model_path,
        cfg.detector.input_width,
        cfg.detector.input_height,
    )?
    .with_thresholds(
        cfg.detector.confidence_threshold,
        cfg.detector.iou_threshold,
    );
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn load_tract(cfg: &ServiceConfig) -> Result<Arc<dyn DetectorBackend>> {
    Err(anyhow!(
        "backend 'tract' requested for {} but this build lacks the backend-tract feature",
        cfg.model_path.display()
    ))
}
