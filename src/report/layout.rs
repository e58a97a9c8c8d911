//! Flow layout of a [`ReportDocument`] onto A4 pages.
//!
//! Coordinates are millimetres measured from the top-left corner of the page.
//! The PDF writer flips them into its bottom-left origin.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::report::compose::{Block, ReportDocument};
use crate::report::text::{text_width_mm, wrap_line, FontStyle};

pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;
pub const MARGIN_MM: f32 = 10.0;
/// Content crossing this distance from the bottom edge moves to a new page.
pub const BOTTOM_MARGIN_MM: f32 = 20.0;
pub const LINE_HEIGHT_MM: f32 = 10.0;

const PT_TO_MM: f32 = 25.4 / 72.0;

#[derive(Clone, Debug, PartialEq)]
pub struct PlacedText {
    pub text: String,
    pub style: FontStyle,
    pub size_pt: f32,
    pub x_mm: f32,
    pub baseline_mm: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlacedImage {
    pub path: PathBuf,
    pub x_mm: f32,
    pub top_mm: f32,
    pub width_mm: f32,
    pub height_mm: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Placed {
    Text(PlacedText),
    Image(PlacedImage),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PageLayout {
    pub items: Vec<Placed>,
}

struct Cursor {
    pages: Vec<PageLayout>,
    y: f32,
}

impl Cursor {
    fn new() -> Self {
        Self {
            pages: vec![PageLayout::default()],
            y: MARGIN_MM,
        }
    }

    /// Start a new page if `height` does not fit above the bottom margin.
    /// Content at the top of a fresh page is placed even when oversized.
    fn reserve(&mut self, height: f32) {
        let limit = PAGE_HEIGHT_MM - BOTTOM_MARGIN_MM;
        if self.y + height > limit && self.y > MARGIN_MM {
            self.pages.push(PageLayout::default());
            self.y = MARGIN_MM;
        }
    }

    fn place(&mut self, item: Placed) {
        if let Some(page) = self.pages.last_mut() {
            page.items.push(item);
        }
    }

    fn line(&mut self, text: String, style: FontStyle, size_pt: f32, centered: bool) {
        self.reserve(LINE_HEIGHT_MM);
        let text_width = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;
        let x_mm = if centered {
            MARGIN_MM + (text_width - text_width_mm(&text, size_pt, style)).max(0.0) / 2.0
        } else {
            MARGIN_MM
        };
        // Vertically centred in the line box.
        let baseline_mm = self.y + LINE_HEIGHT_MM / 2.0 + 0.3 * size_pt * PT_TO_MM;
        self.place(Placed::Text(PlacedText {
            text,
            style,
            size_pt,
            x_mm,
            baseline_mm,
        }));
        self.y += LINE_HEIGHT_MM;
    }
}

/// Paginate `document`. `image_size` reports pixel dimensions for embedded
/// images so their display height keeps the aspect ratio.
pub fn paginate(
    document: &ReportDocument,
    image_size: &dyn Fn(&Path) -> Result<(u32, u32)>,
) -> Result<Vec<PageLayout>> {
    let text_width = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;
    let mut cursor = Cursor::new();

    for block in document.blocks() {
        match block {
            Block::Title { text, size_pt } => {
                cursor.line(text.clone(), FontStyle::Bold, *size_pt, true);
            }
            Block::Paragraph {
                style,
                size_pt,
                lines,
            } => {
                for line in lines {
                    for wrapped in wrap_line(line, text_width, *size_pt, *style) {
                        cursor.line(wrapped, *style, *size_pt, false);
                    }
                }
            }
            Block::Spacer(height) => cursor.y += height,
            Block::Image { path, width_mm } => {
                let (px_w, px_h) = image_size(path)?;
                let height_mm = if px_w == 0 {
                    0.0
                } else {
                    width_mm * px_h as f32 / px_w as f32
                };
                cursor.reserve(height_mm);
                let top_mm = cursor.y;
                cursor.place(Placed::Image(PlacedImage {
                    path: path.clone(),
                    x_mm: MARGIN_MM,
                    top_mm,
                    width_mm: *width_mm,
                    height_mm,
                }));
                cursor.y += height_mm;
            }
        }
    }

    Ok(cursor.pages)
}
