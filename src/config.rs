use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::report::SelectionPolicy;

const DEFAULT_MODEL_PATH: &str = "best.onnx";
const DEFAULT_ADDR: &str = "127.0.0.1:5000";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
const DEFAULT_UPLOADS_DIR: &str = "uploads";
const DEFAULT_PREDICTIONS_DIR: &str = "static/predictions";
const DEFAULT_REPORTS_DIR: &str = "static/reports";
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
const DEFAULT_IOU_THRESHOLD: f32 = 0.7;

#[derive(Debug, Deserialize, Default)]
struct ServiceConfigFile {
    model_path: Option<PathBuf>,
    backend: Option<String>,
    server: Option<ServerConfigFile>,
    storage: Option<StorageConfigFile>,
    detector: Option<DetectorConfigFile>,
    report: Option<ReportConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ServerConfigFile {
    addr: Option<String>,
    max_upload_bytes: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct StorageConfigFile {
    uploads_dir: Option<PathBuf>,
    predictions_dir: Option<PathBuf>,
    reports_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    input_width: Option<u32>,
    input_height: Option<u32>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct ReportConfigFile {
    selection: Option<String>,
}

/// Which inference engine adapter to construct at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Tract,
    Stub,
}

impl BackendKind {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "tract" => Ok(Self::Tract),
            "stub" => Ok(Self::Stub),
            other => Err(anyhow!("unknown detector backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub model_path: PathBuf,
    pub backend: BackendKind,
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub detector: DetectorSettings,
    pub selection: SelectionPolicy,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: String,
    pub max_upload_bytes: usize,
}

/// Filesystem roots for uploads and generated artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    pub uploads_dir: PathBuf,
    pub predictions_dir: PathBuf,
    pub reports_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from(DEFAULT_UPLOADS_DIR),
            predictions_dir: PathBuf::from(DEFAULT_PREDICTIONS_DIR),
            reports_dir: PathBuf::from(DEFAULT_REPORTS_DIR),
        }
    }
}

impl StorageSettings {
    /// All three roots below a common base directory.
    pub fn under(base: &Path) -> Self {
        Self {
            uploads_dir: base.join(DEFAULT_UPLOADS_DIR),
            predictions_dir: base.join(DEFAULT_PREDICTIONS_DIR),
            reports_dir: base.join(DEFAULT_REPORTS_DIR),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub input_width: u32,
    pub input_height: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
}

impl ServiceConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("TUMOR_REPORT_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ServiceConfigFile) -> Result<Self> {
        let model_path = file
            .model_path
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH));
        let backend = match file.backend.as_deref() {
            Some(value) => BackendKind::parse(value)?,
            None => BackendKind::Tract,
        };
        let server = ServerSettings {
            addr: file
                .server
                .as_ref()
                .and_then(|server| server.addr.clone())
                .unwrap_or_else(|| DEFAULT_ADDR.to_string()),
            max_upload_bytes: file
                .server
                .as_ref()
                .and_then(|server| server.max_upload_bytes)
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        };
        let defaults = StorageSettings::default();
        let storage = match file.storage {
            Some(storage) => StorageSettings {
                uploads_dir: storage.uploads_dir.unwrap_or(defaults.uploads_dir),
                predictions_dir: storage.predictions_dir.unwrap_or(defaults.predictions_dir),
                reports_dir: storage.reports_dir.unwrap_or(defaults.reports_dir),
            },
            None => defaults,
        };
        let detector = DetectorSettings {
            input_width: file
                .detector
                .as_ref()
                .and_then(|detector| detector.input_width)
                .unwrap_or(DEFAULT_INPUT_SIZE),
            input_height: file
                .detector
                .as_ref()
                .and_then(|detector| detector.input_height)
                .unwrap_or(DEFAULT_INPUT_SIZE),
            confidence_threshold: file
                .detector
                .as_ref()
                .and_then(|detector| detector.confidence_threshold)
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            iou_threshold: file
                .detector
                .as_ref()
                .and_then(|detector| detector.iou_threshold)
                .unwrap_or(DEFAULT_IOU_THRESHOLD),
        };
        let selection = match file.report.and_then(|report| report.selection) {
            Some(value) => SelectionPolicy::parse(&value)?,
            None => SelectionPolicy::default(),
        };
        Ok(Self {
            model_path,
            backend,
            server,
            storage,
            detector,
            selection,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("TUMOR_REPORT_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.model_path = PathBuf::from(path);
            }
        }
        if let Ok(backend) = std::env::var("TUMOR_REPORT_BACKEND") {
            if !backend.trim().is_empty() {
                self.backend = BackendKind::parse(&backend)?;
            }
        }
        if let Ok(addr) = std::env::var("TUMOR_REPORT_ADDR") {
            if !addr.trim().is_empty() {
                self.server.addr = addr;
            }
        }
        if let Ok(selection) = std::env::var("TUMOR_REPORT_SELECTION") {
            if !selection.trim().is_empty() {
                self.selection = SelectionPolicy::parse(&selection)?;
            }
        }
        if let Ok(limit) = std::env::var("TUMOR_REPORT_MAX_UPLOAD_BYTES") {
            self.server.max_upload_bytes = limit.parse().map_err(|_| {
                anyhow!("TUMOR_REPORT_MAX_UPLOAD_BYTES must be an integer number of bytes")
            })?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.detector.input_width == 0 || self.detector.input_height == 0 {
            return Err(anyhow!("detector input size must be non-zero"));
        }
        for (name, value) in [
            ("confidence_threshold", self.detector.confidence_threshold),
            ("iou_threshold", self.detector.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be within [0, 1], got {}", name, value));
            }
        }
        if self.server.max_upload_bytes == 0 {
            return Err(anyhow!("max_upload_bytes must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ServiceConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = ServiceConfig::from_file(ServiceConfigFile::default()).unwrap();
        assert_eq!(cfg.model_path, PathBuf::from("best.onnx"));
        assert_eq!(cfg.backend, BackendKind::Tract);
        assert_eq!(cfg.server.addr, "127.0.0.1:5000");
        assert_eq!(cfg.storage, StorageSettings::default());
        assert_eq!(cfg.detector.input_width, 640);
        assert_eq!(cfg.detector.input_height, 640);
        assert_eq!(cfg.selection, SelectionPolicy::First);
    }

    #[test]
    fn partial_storage_section_keeps_other_defaults() {
        let file: ServiceConfigFile = toml::from_str(
            r#"
            [storage]
            reports_dir = "out/reports"
            "#,
        )
        .unwrap();
        let cfg = ServiceConfig::from_file(file).unwrap();
        assert_eq!(cfg.storage.reports_dir, PathBuf::from("out/reports"));
        assert_eq!(cfg.storage.uploads_dir, PathBuf::from("uploads"));
        assert_eq!(
            cfg.storage.predictions_dir,
            PathBuf::from("static/predictions")
        );
    }

    #[test]
    fn rejects_unknown_backend() {
        let file = ServiceConfigFile {
            backend: Some("onnxruntime".to_string()),
            ..ServiceConfigFile::default()
        };
        assert!(ServiceConfig::from_file(file).is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_threshold() {
        let mut cfg = ServiceConfig::from_file(ServiceConfigFile::default()).unwrap();
        cfg.detector.iou_threshold = 1.5;
        assert!(cfg.validate().is_err());
    }
}
