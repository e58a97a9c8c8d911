use std::path::{Path, PathBuf};

use crate::report::metrics::ReportRecord;
use crate::report::text::{document_safe, FontStyle};

pub const REPORT_TITLE: &str = "AI Diagnostic Report";
pub const NO_DETECTION_MESSAGE: &str = "No tumor detected with high confidence.";
pub const RECOMMENDATION: [&str; 2] = [
    "Recommendation:",
    "Urgent referral to oncology. Advanced imaging required.",
];

/// Display width of the embedded annotated image.
pub const IMAGE_WIDTH_MM: f32 = 180.0;

const TITLE_SIZE_PT: f32 = 14.0;
const BODY_SIZE_PT: f32 = 12.0;
const RECOMMENDATION_SIZE_PT: f32 = 11.0;

/// One layout unit of a report, placed top to bottom.
#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    /// Centered single line.
    Title { text: String, size_pt: f32 },
    /// Left-aligned lines, each wrapped to the text width.
    Paragraph {
        style: FontStyle,
        size_pt: f32,
        lines: Vec<String>,
    },
    /// Vertical gap in millimetres.
    Spacer(f32),
    Image { path: PathBuf, width_mm: f32 },
}

/// Structured report, independent of the output format.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportDocument {
    blocks: Vec<Block>,
}

impl ReportDocument {
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Every text line in reading order.
    pub fn text_lines(&self) -> Vec<&str> {
        self.blocks
            .iter()
            .flat_map(|block| match block {
                Block::Title { text, .. } => vec![text.as_str()],
                Block::Paragraph { lines, .. } => lines.iter().map(String::as_str).collect(),
                Block::Spacer(_) | Block::Image { .. } => Vec::new(),
            })
            .collect()
    }

    pub fn has_image(&self) -> bool {
        self.blocks
            .iter()
            .any(|block| matches!(block, Block::Image { .. }))
    }
}

fn paragraph(style: FontStyle, size_pt: f32, lines: &[String]) -> Block {
    Block::Paragraph {
        style,
        size_pt,
        lines: lines.iter().map(|line| document_safe(line)).collect(),
    }
}

/// Five labelled lines describing the reported detection.
pub fn diagnostic_lines(record: &ReportRecord) -> Vec<String> {
    vec![
        format!("Tumor Type: {}", record.label),
        format!("Tumor Location: {}", record.location),
        format!("Tumor Size: {:.1}% of image", record.size_percent),
        format!("Confidence Score: {:.2}", record.confidence),
        format!("Priority Level: {}", record.priority),
    ]
}

/// Lay out the report for one image.
///
/// With no detection the body is the single fallback line and nothing else.
pub fn compose_report(record: Option<&ReportRecord>, annotated_image: &Path) -> ReportDocument {
    let record = match record {
        Some(record) => record,
        None => {
            return ReportDocument {
                blocks: vec![paragraph(
                    FontStyle::Regular,
                    BODY_SIZE_PT,
                    &[NO_DETECTION_MESSAGE.to_string()],
                )],
            }
        }
    };

    let recommendation: Vec<String> = RECOMMENDATION.iter().map(|line| line.to_string()).collect();
    ReportDocument {
        blocks: vec![
            Block::Title {
                text: REPORT_TITLE.to_string(),
                size_pt: TITLE_SIZE_PT,
            },
            Block::Spacer(5.0),
            paragraph(FontStyle::Regular, BODY_SIZE_PT, &diagnostic_lines(record)),
            Block::Spacer(10.0),
            paragraph(FontStyle::Italic, RECOMMENDATION_SIZE_PT, &recommendation),
            Block::Spacer(10.0),
            Block::Image {
                path: annotated_image.to_path_buf(),
                width_mm: IMAGE_WIDTH_MM,
            },
        ],
    }
}
