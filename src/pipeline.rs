//! One upload, one sequential pass: detect, annotate, select, derive,
//! compose, persist.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::annotate::annotate;
use crate::detect::{DetectionSet, DetectorBackend};
use crate::report::{
    compose_report, derive_record, render_pdf, select_detection, ReferenceResolution,
    ReportDocument, ReportRecord, SelectionPolicy,
};
use crate::storage::{ArtifactPaths, ArtifactStore};

/// Everything one run produced.
#[derive(Clone, Debug)]
pub struct ReportOutcome {
    pub paths: ArtifactPaths,
    pub detections: DetectionSet,
    pub record: Option<ReportRecord>,
    pub document: ReportDocument,
}

/// Detection report pipeline bound to a shared detector and artifact store.
///
/// The detector is constructed once at startup and only borrowed here.
#[derive(Clone)]
pub struct ReportPipeline {
    detector: Arc<dyn DetectorBackend>,
    store: ArtifactStore,
    selection: SelectionPolicy,
}

impl ReportPipeline {
    pub fn new(detector: Arc<dyn DetectorBackend>, store: ArtifactStore) -> Self {
        Self {
            detector,
            store,
            selection: SelectionPolicy::default(),
        }
    }

    pub fn with_selection(mut self, selection: SelectionPolicy) -> Self {
        self.selection = selection;
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    fn reference(&self) -> ReferenceResolution {
        let (width, height) = self.detector.input_size();
        ReferenceResolution::new(width, height)
    }

    /// Produce both artifacts for `image_path` and return where they live.
    pub fn run(&self, image_path: &Path, original_filename: &str) -> Result<ArtifactPaths> {
        self.run_detailed(image_path, original_filename)
            .map(|outcome| outcome.paths)
    }

    /// Like [`run`](Self::run), also returning the intermediate results.
    ///
    /// Failures are not cleaned up: the annotated image may exist without a
    /// report if a later step fails.
    pub fn run_detailed(&self, image_path: &Path, original_filename: &str) -> Result<ReportOutcome> {
        let paths = self.store.paths_for(original_filename)?;
        let image = image::open(image_path)
            .with_context(|| format!("failed to decode image {}", image_path.display()))?;

        let detections = self
            .detector
            .detect(&image)
            .with_context(|| format!("detector '{}' failed", self.detector.name()))?;
        log::info!(
            "{}: {} detection(s) from '{}'",
            original_filename,
            detections.len(),
            self.detector.name()
        );

        let annotated = annotate(&image, &detections, self.detector.input_size());
        self.store.write_annotated(&paths, &annotated)?;

        let record = select_detection(&detections, self.selection)
            .map(|detection| derive_record(detection, self.reference()));
        match &record {
            Some(record) => log::info!(
                "{}: reporting {} ({:.1}% of image, confidence {:.2}, priority {})",
                original_filename,
                record.label,
                record.size_percent,
                record.confidence,
                record.priority
            ),
            None => log::info!("{}: no tumor detected", original_filename),
        }

        let document = compose_report(record.as_ref(), &paths.annotated_image);
        let pdf = render_pdf(&document)?;
        self.store.write_report(&paths, &pdf)?;
        log::debug!(
            "{}: wrote {} and {}",
            original_filename,
            paths.annotated_image.display(),
            paths.report_document.display()
        );

        Ok(ReportOutcome {
            paths,
            detections,
            record,
            document,
        })
    }
}
