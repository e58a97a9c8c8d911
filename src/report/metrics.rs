use std::fmt;

use serde::Serialize;

use crate::detect::Detection;

/// Confidence above which a finding is flagged `HIGH`. Exclusive.
pub const HIGH_PRIORITY_THRESHOLD: f32 = 0.5;

/// The detector does not localize anatomically.
pub const UNKNOWN_LOCATION: &str = "Unknown";

/// Tumor classes the detector was trained on, by class id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TumorClass {
    Glioma,
    Meningioma,
    Pituitary,
    /// Class id outside the trained label set.
    Unknown(u32),
}

impl TumorClass {
    pub fn from_class_id(class_id: u32) -> Self {
        match class_id {
            0 => Self::Glioma,
            1 => Self::Meningioma,
            2 => Self::Pituitary,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for TumorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Glioma => f.write_str("Glioma"),
            Self::Meningioma => f.write_str("Meningioma"),
            Self::Pituitary => f.write_str("Pituitary"),
            Self::Unknown(class_id) => write!(f, "Class {}", class_id),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    Low,
}

impl Priority {
    pub fn from_confidence(confidence: f32) -> Self {
        if confidence > HIGH_PRIORITY_THRESHOLD {
            Self::High
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Low => "LOW",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Area that bounding boxes are normalized against.
///
/// This is the detector's declared input size, not the uploaded image's
/// resolution, so the percentage is an approximation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReferenceResolution {
    pub width: u32,
    pub height: u32,
}

impl ReferenceResolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    fn area(&self) -> f64 {
        f64::from(self.width) * f64::from(self.height)
    }
}

impl Default for ReferenceResolution {
    fn default() -> Self {
        Self::new(640, 640)
    }
}

/// Clinical summary of the reported detection.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportRecord {
    pub class_id: u32,
    pub label: String,
    pub location: &'static str,
    pub size_percent: f64,
    pub confidence: f32,
    pub priority: Priority,
}

/// Percentage of the reference area covered by the detection's box.
pub fn size_percent(detection: &Detection, reference: ReferenceResolution) -> f64 {
    let reference_area = reference.area();
    if reference_area <= 0.0 {
        return 0.0;
    }
    detection.bbox.area() / reference_area * 100.0
}

pub fn derive_record(detection: &Detection, reference: ReferenceResolution) -> ReportRecord {
    ReportRecord {
        class_id: detection.class_id,
        label: TumorClass::from_class_id(detection.class_id).to_string(),
        location: UNKNOWN_LOCATION,
        size_percent: size_percent(detection, reference),
        confidence: detection.confidence,
        priority: Priority::from_confidence(detection.confidence),
    }
}
