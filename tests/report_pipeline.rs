use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use image::{DynamicImage, Rgb, RgbImage};
use tempfile::{tempdir, TempDir};

use tumor_report::report::NO_DETECTION_MESSAGE;
use tumor_report::{
    ArtifactStore, BoundingBox, Detection, DetectionSet, DetectorBackend, Priority,
    ReportPipeline, SelectionPolicy, StorageSettings, StubBackend,
};

struct FailingBackend;

impl DetectorBackend for FailingBackend {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn input_size(&self) -> (u32, u32) {
        (640, 640)
    }

    fn detect(&self, _image: &DynamicImage) -> Result<DetectionSet> {
        Err(anyhow!("inference engine crashed"))
    }
}

fn scenario_a() -> Detection {
    Detection::new(0, 0.82, BoundingBox::new(100.0, 100.0, 300.0, 400.0))
}

fn write_image(dir: &Path, name: &str, width: u32, height: u32, color: [u8; 3]) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_pixel(width, height, Rgb(color))
        .save(&path)
        .expect("write input image");
    path
}

fn pipeline(dir: &TempDir, backend: StubBackend) -> ReportPipeline {
    let store = ArtifactStore::init(StorageSettings::under(dir.path())).expect("init store");
    ReportPipeline::new(Arc::new(backend), store)
}

#[test]
fn scenario_a_reports_first_detection() {
    let dir = tempdir().unwrap();
    let input = write_image(dir.path(), "input.png", 1024, 768, [30, 30, 30]);
    let pipeline = pipeline(&dir, StubBackend::new(vec![scenario_a()]));

    let outcome = pipeline.run_detailed(&input, "patient_01.png").unwrap();

    let record = outcome.record.expect("record for detection");
    assert_eq!(record.label, "Glioma");
    assert_eq!(format!("{:.1}", record.size_percent), "14.6");
    assert_eq!(record.priority, Priority::High);

    let lines = outcome.document.text_lines();
    assert_eq!(lines[0], "AI Diagnostic Report");
    for expected in [
        "Tumor Type: Glioma",
        "Tumor Location: Unknown",
        "Tumor Size: 14.6% of image",
        "Confidence Score: 0.82",
        "Priority Level: HIGH",
        "Recommendation:",
    ] {
        assert!(lines.contains(&expected), "missing line {:?}", expected);
    }
    assert!(outcome.document.has_image());

    assert_eq!(
        outcome.paths.annotated_image,
        dir.path().join("static/predictions/patient_01.jpg")
    );
    assert_eq!(
        outcome.paths.report_document,
        dir.path().join("static/reports/patient_01.pdf")
    );
    let annotated = image::open(&outcome.paths.annotated_image).unwrap();
    assert_eq!((annotated.width(), annotated.height()), (1024, 768));
    let pdf = std::fs::read(&outcome.paths.report_document).unwrap();
    assert!(pdf.starts_with(b"%PDF"));
}

#[test]
fn scenario_b_writes_minimal_report() {
    let dir = tempdir().unwrap();
    let input = write_image(dir.path(), "input.png", 64, 64, [200, 200, 200]);
    let pipeline = pipeline(&dir, StubBackend::empty());

    let outcome = pipeline.run_detailed(&input, "clear.png").unwrap();

    assert!(outcome.record.is_none());
    assert_eq!(outcome.document.text_lines(), vec![NO_DETECTION_MESSAGE]);
    assert!(!outcome.document.has_image());
    assert!(outcome.paths.annotated_image.is_file());
    let pdf = std::fs::read(&outcome.paths.report_document).unwrap();
    assert!(pdf.starts_with(b"%PDF"));
}

#[test]
fn size_ignores_real_image_resolution() {
    let dir = tempdir().unwrap();
    let small = write_image(dir.path(), "small.png", 100, 100, [0, 0, 0]);
    let large = write_image(dir.path(), "large.png", 2000, 1500, [0, 0, 0]);
    let pipeline = pipeline(&dir, StubBackend::new(vec![scenario_a()]));

    let a = pipeline.run_detailed(&small, "small.png").unwrap();
    let b = pipeline.run_detailed(&large, "large.png").unwrap();
    assert_eq!(a.record.unwrap().size_percent, b.record.unwrap().size_percent);
}

#[test]
fn reference_resolution_follows_detector_input_size() {
    let dir = tempdir().unwrap();
    let input = write_image(dir.path(), "input.png", 64, 64, [0, 0, 0]);
    let detection = Detection::new(1, 0.4, BoundingBox::new(0.0, 0.0, 160.0, 160.0));
    let pipeline = pipeline(
        &dir,
        StubBackend::new(vec![detection]).with_input_size(320, 320),
    );

    let record = pipeline
        .run_detailed(&input, "scan.png")
        .unwrap()
        .record
        .unwrap();
    assert!((record.size_percent - 25.0).abs() < 1e-9);
    assert_eq!(record.label, "Meningioma");
    assert_eq!(record.priority, Priority::Low);
}

#[test]
fn selection_policy_changes_reported_detection() {
    let dir = tempdir().unwrap();
    let input = write_image(dir.path(), "input.png", 64, 64, [0, 0, 0]);
    let detections = vec![
        Detection::new(7, 0.3, BoundingBox::new(0.0, 0.0, 64.0, 64.0)),
        Detection::new(2, 0.9, BoundingBox::new(0.0, 0.0, 64.0, 64.0)),
    ];

    let first = pipeline(&dir, StubBackend::new(detections.clone()));
    let record = first.run_detailed(&input, "a.png").unwrap().record.unwrap();
    assert_eq!(record.label, "Class 7");
    assert_eq!(record.priority, Priority::Low);

    let best = pipeline(&dir, StubBackend::new(detections))
        .with_selection(SelectionPolicy::HighestConfidence);
    let record = best.run_detailed(&input, "b.png").unwrap().record.unwrap();
    assert_eq!(record.label, "Pituitary");
    assert_eq!(record.priority, Priority::High);
}

#[test]
fn same_base_name_overwrites_previous_artifacts() {
    let dir = tempdir().unwrap();
    let red = write_image(dir.path(), "red.png", 80, 60, [220, 0, 0]);
    let blue = write_image(dir.path(), "blue.png", 40, 30, [0, 0, 220]);

    let first = pipeline(&dir, StubBackend::new(vec![scenario_a()]))
        .run(&red, "scan.png")
        .unwrap();
    let first_pdf = std::fs::read(&first.report_document).unwrap();

    let second = pipeline(&dir, StubBackend::empty())
        .run(&blue, "scan.jpeg")
        .unwrap();
    assert_eq!(first, second);

    let annotated = image::open(&second.annotated_image).unwrap().to_rgb8();
    assert_eq!(annotated.dimensions(), (40, 30));
    let center = annotated.get_pixel(20, 15);
    assert!(center[2] > 150 && center[0] < 60, "unexpected pixel {:?}", center);

    let second_pdf = std::fs::read(&second.report_document).unwrap();
    assert_ne!(first_pdf, second_pdf);
    assert!(second_pdf.len() < first_pdf.len());

    let predictions: Vec<_> = std::fs::read_dir(dir.path().join("static/predictions"))
        .unwrap()
        .collect();
    assert_eq!(predictions.len(), 1);
}

#[test]
fn inference_failure_propagates_without_report() {
    let dir = tempdir().unwrap();
    let input = write_image(dir.path(), "input.png", 32, 32, [0, 0, 0]);
    let store = ArtifactStore::init(StorageSettings::under(dir.path())).unwrap();
    let pipeline = ReportPipeline::new(Arc::new(FailingBackend), store);

    let err = pipeline.run(&input, "scan.png").unwrap_err();
    assert!(format!("{:#}", err).contains("inference engine crashed"));
    assert!(!dir.path().join("static/reports/scan.pdf").exists());
}

#[test]
fn undecodable_upload_is_an_error() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("broken.png");
    std::fs::write(&input, b"not an image").unwrap();
    let pipeline = pipeline(&dir, StubBackend::empty());
    assert!(pipeline.run(&input, "broken.png").is_err());
}
