use std::path::Path;

use anyhow::{anyhow, Context, Result};
use printpdf::{
    BuiltinFont, Image as PdfImage, ImageTransform, IndirectFontRef, Mm, PdfDocument,
    PdfLayerReference,
};

use crate::report::compose::{ReportDocument, REPORT_TITLE};
use crate::report::layout::{paginate, Placed, PlacedImage, PAGE_HEIGHT_MM, PAGE_WIDTH_MM};
use crate::report::text::FontStyle;

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    italic: IndirectFontRef,
}

impl Fonts {
    fn get(&self, style: FontStyle) -> &IndirectFontRef {
        match style {
            FontStyle::Regular => &self.regular,
            FontStyle::Bold => &self.bold,
            FontStyle::Italic => &self.italic,
        }
    }
}

fn pdf_error(err: printpdf::Error) -> anyhow::Error {
    anyhow!("pdf generation failed: {:?}", err)
}

fn image_dimensions(path: &Path) -> Result<(u32, u32)> {
    image::image_dimensions(path)
        .with_context(|| format!("failed to read image size of {}", path.display()))
}

/// Render a composed report to PDF bytes.
pub fn render_pdf(document: &ReportDocument) -> Result<Vec<u8>> {
    let pages = paginate(document, &image_dimensions)?;

    let (doc, first_page, first_layer) = PdfDocument::new(
        REPORT_TITLE,
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Layer 1",
    );
    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(pdf_error)?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(pdf_error)?,
        italic: doc
            .add_builtin_font(BuiltinFont::HelveticaOblique)
            .map_err(pdf_error)?,
    };

    for (index, page) in pages.iter().enumerate() {
        let (page_index, layer_index) = if index == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(
                Mm(PAGE_WIDTH_MM),
                Mm(PAGE_HEIGHT_MM),
                format!("Page {}, Layer 1", index + 1),
            )
        };
        let layer = doc.get_page(page_index).get_layer(layer_index);

        for item in &page.items {
            match item {
                Placed::Text(text) => layer.use_text(
                    text.text.clone(),
                    text.size_pt,
                    Mm(text.x_mm),
                    Mm(PAGE_HEIGHT_MM - text.baseline_mm),
                    fonts.get(text.style),
                ),
                Placed::Image(image) => embed_image(&layer, image)?,
            }
        }
    }

    doc.save_to_bytes().map_err(pdf_error)
}

fn embed_image(layer: &PdfLayerReference, placed: &PlacedImage) -> Result<()> {
    let rgb = image::open(&placed.path)
        .with_context(|| format!("failed to open {}", placed.path.display()))?
        .to_rgb8();
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return Ok(());
    }
    let buffer = printpdf::image_crate::RgbImage::from_raw(width, height, rgb.into_raw())
        .ok_or_else(|| anyhow!("image buffer size mismatch for {}", placed.path.display()))?;
    let pdf_image =
        PdfImage::from_dynamic_image(&printpdf::image_crate::DynamicImage::ImageRgb8(buffer));

    // Pick the DPI that makes the pixel width span the requested display width.
    let dpi = width as f32 * 25.4 / placed.width_mm;
    pdf_image.add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(placed.x_mm)),
            translate_y: Some(Mm(PAGE_HEIGHT_MM - placed.top_mm - placed.height_mm)),
            dpi: Some(dpi),
            ..Default::default()
        },
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::compose::compose_report;
    use crate::report::metrics::{Priority, ReportRecord};
    use image::{Rgb, RgbImage};
    use printpdf::lopdf;
    use tempfile::tempdir;

    /// Decoded content streams of every page, concatenated.
    fn page_content(bytes: &[u8]) -> String {
        let pdf = lopdf::Document::load_mem(bytes).unwrap();
        let mut content = Vec::new();
        for page_id in pdf.get_pages().values() {
            content.extend(pdf.get_page_content(*page_id).unwrap());
        }
        String::from_utf8_lossy(&content).into_owned()
    }

    /// Builtin-font text is emitted as an upper-case hex string operand.
    fn hex_operand(text: &str) -> String {
        let hex: String = text.bytes().map(|b| format!("{:02X}", b)).collect();
        format!("<{}>", hex)
    }

    #[test]
    fn renders_no_detection_report() {
        let doc = compose_report(None, Path::new("unused.jpg"));
        let bytes = render_pdf(&doc).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn renders_report_with_embedded_image() {
        let dir = tempdir().unwrap();
        let image_path = dir.path().join("scan.jpg");
        RgbImage::from_pixel(64, 48, Rgb([40, 40, 40]))
            .save(&image_path)
            .unwrap();

        let record = ReportRecord {
            class_id: 2,
            label: "Pituitary".to_string(),
            location: "Unknown",
            size_percent: 9.0,
            confidence: 0.77,
            priority: Priority::High,
        };
        let doc = compose_report(Some(&record), &image_path);
        let bytes = render_pdf(&doc).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 1_000);
    }

    #[test]
    fn diagnostic_lines_reach_the_content_stream() {
        let dir = tempdir().unwrap();
        let image_path = dir.path().join("scan.jpg");
        RgbImage::from_pixel(32, 32, Rgb([10, 10, 10]))
            .save(&image_path)
            .unwrap();

        let record = ReportRecord {
            class_id: 0,
            label: "Glioma".to_string(),
            location: "Unknown",
            size_percent: 14.6,
            confidence: 0.82,
            priority: Priority::High,
        };
        let doc = compose_report(Some(&record), &image_path);
        let content = page_content(&render_pdf(&doc).unwrap());
        for line in [
            "Tumor Type: Glioma",
            "Tumor Size: 14.6% of image",
            "Priority Level: HIGH",
            REPORT_TITLE,
        ] {
            assert!(
                content.contains(&hex_operand(line)),
                "missing '{}' in page content",
                line
            );
        }
        assert!(!content.contains(&hex_operand(crate::report::NO_DETECTION_MESSAGE)));
    }

    #[test]
    fn no_detection_page_carries_only_the_message() {
        let doc = compose_report(None, Path::new("unused.jpg"));
        let content = page_content(&render_pdf(&doc).unwrap());
        assert!(content.contains(&hex_operand(crate::report::NO_DETECTION_MESSAGE)));
        assert!(!content.contains(&hex_operand(REPORT_TITLE)));
    }

    #[test]
    fn missing_image_fails_rendering() {
        let record = ReportRecord {
            class_id: 0,
            label: "Glioma".to_string(),
            location: "Unknown",
            size_percent: 1.0,
            confidence: 0.9,
            priority: Priority::High,
        };
        let doc = compose_report(Some(&record), Path::new("/nonexistent/scan.jpg"));
        assert!(render_pdf(&doc).is_err());
    }
}
