//! Artifact naming and persistence.
//!
//! Output names derive only from the uploaded file's base name. There is no
//! versioning: a later upload with the same base name overwrites the earlier
//! artifacts in place, and concurrent writers race with the last one winning.

use anyhow::{anyhow, Context, Result};
use image::{ImageFormat, RgbImage};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::StorageSettings;

/// Where the two artifacts for one upload live.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ArtifactPaths {
    pub annotated_image: PathBuf,
    pub report_document: PathBuf,
}

#[derive(Clone, Debug)]
pub struct ArtifactStore {
    settings: StorageSettings,
}

impl ArtifactStore {
    /// Create the intake and output roots if absent. Run once at startup.
    pub fn init(settings: StorageSettings) -> Result<Self> {
        for dir in [
            &settings.uploads_dir,
            &settings.predictions_dir,
            &settings.reports_dir,
        ] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &StorageSettings {
        &self.settings
    }

    /// Deterministic artifact paths for an uploaded file name.
    pub fn paths_for(&self, original_filename: &str) -> Result<ArtifactPaths> {
        let base = base_name(original_filename)?;
        Ok(ArtifactPaths {
            annotated_image: self.settings.predictions_dir.join(format!("{}.jpg", base)),
            report_document: self.settings.reports_dir.join(format!("{}.pdf", base)),
        })
    }

    /// Persist raw upload bytes under the intake root.
    pub fn save_upload(&self, original_filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        let name = file_name(original_filename)?;
        let path = self.settings.uploads_dir.join(name);
        std::fs::write(&path, bytes)
            .with_context(|| format!("failed to write upload {}", path.display()))?;
        Ok(path)
    }

    pub fn write_annotated(&self, paths: &ArtifactPaths, image: &RgbImage) -> Result<()> {
        image
            .save_with_format(&paths.annotated_image, ImageFormat::Jpeg)
            .with_context(|| {
                format!(
                    "failed to write annotated image {}",
                    paths.annotated_image.display()
                )
            })
    }

    pub fn write_report(&self, paths: &ArtifactPaths, pdf: &[u8]) -> Result<()> {
        std::fs::write(&paths.report_document, pdf).with_context(|| {
            format!(
                "failed to write report {}",
                paths.report_document.display()
            )
        })
    }

    /// Resolve a served prediction file by bare name.
    pub fn prediction_file(&self, name: &str) -> Option<PathBuf> {
        served_file(&self.settings.predictions_dir, name)
    }

    /// Resolve a served report file by bare name.
    pub fn report_file(&self, name: &str) -> Option<PathBuf> {
        served_file(&self.settings.reports_dir, name)
    }
}

/// Final path component of a client-supplied name. Browsers on Windows may
/// send full paths with backslashes.
fn file_name(original_filename: &str) -> Result<&str> {
    let name = original_filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        return Err(anyhow!("invalid upload file name '{}'", original_filename));
    }
    Ok(name)
}

/// File name with its extension removed.
pub fn base_name(original_filename: &str) -> Result<String> {
    let name = file_name(original_filename)?;
    Path::new(name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("invalid upload file name '{}'", original_filename))
}

/// A bare file name directly under `root`. Separators are refused, so
/// dotted names such as `scan..v2.pdf` resolve while `../x` cannot.
fn served_file(root: &Path, name: &str) -> Option<PathBuf> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return None;
    }
    let path = root.join(name);
    path.is_file().then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn base_name_strips_extension_and_directories() {
        assert_eq!(base_name("scan.png").unwrap(), "scan");
        assert_eq!(base_name("archive.tar.gz").unwrap(), "archive.tar");
        assert_eq!(base_name("../../etc/passwd.jpg").unwrap(), "passwd");
        assert_eq!(base_name("C:\\Users\\dr\\mri 01.jpeg").unwrap(), "mri 01");
        assert_eq!(base_name("noext").unwrap(), "noext");
    }

    #[test]
    fn base_name_rejects_empty_names() {
        assert!(base_name("").is_err());
        assert!(base_name("uploads/").is_err());
        assert!(base_name("..").is_err());
    }

    #[test]
    fn init_is_idempotent() {
        let dir = tempdir().unwrap();
        let settings = StorageSettings::under(dir.path());
        ArtifactStore::init(settings.clone()).unwrap();
        ArtifactStore::init(settings.clone()).unwrap();
        assert!(settings.uploads_dir.is_dir());
        assert!(settings.predictions_dir.is_dir());
        assert!(settings.reports_dir.is_dir());
    }

    #[test]
    fn paths_are_stable_for_same_name() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::init(StorageSettings::under(dir.path())).unwrap();
        let first = store.paths_for("brain.png").unwrap();
        let second = store.paths_for("brain.png").unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.annotated_image,
            dir.path().join("static/predictions/brain.jpg")
        );
        assert_eq!(
            first.report_document,
            dir.path().join("static/reports/brain.pdf")
        );
        assert_eq!(store.paths_for("brain.jpeg").unwrap(), first);
    }

    #[test]
    fn served_files_reject_traversal() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::init(StorageSettings::under(dir.path())).unwrap();
        std::fs::write(store.settings().reports_dir.join("a.pdf"), b"%PDF").unwrap();
        assert!(store.report_file("a.pdf").is_some());
        assert!(store.report_file("missing.pdf").is_none());
        assert!(store.report_file("../reports/a.pdf").is_none());
        assert!(store.report_file("..").is_none());
        assert!(store.prediction_file("a.pdf").is_none());
    }

    #[test]
    fn served_files_allow_dotted_base_names() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::init(StorageSettings::under(dir.path())).unwrap();
        let paths = store.paths_for("scan..v2.png").unwrap();
        assert_eq!(
            paths.report_document,
            dir.path().join("static/reports/scan..v2.pdf")
        );
        std::fs::write(&paths.report_document, b"%PDF").unwrap();
        assert_eq!(
            store.report_file("scan..v2.pdf"),
            Some(paths.report_document.clone())
        );
        assert!(store.report_file("..\\reports\\scan..v2.pdf").is_none());
        assert!(store.report_file(".").is_none());
    }

    #[test]
    fn save_upload_keeps_only_file_name() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::init(StorageSettings::under(dir.path())).unwrap();
        let path = store.save_upload("../../evil/scan.png", b"bytes").unwrap();
        assert_eq!(path, dir.path().join("uploads/scan.png"));
        assert_eq!(std::fs::read(path).unwrap(), b"bytes");
    }
}
