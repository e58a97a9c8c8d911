//! Draw labelled detection boxes onto the uploaded image.

use ab_glyph::{FontRef, PxScale};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::detect::{Detection, DetectionSet};
use crate::report::TumorClass;

const STROKE_PX: i32 = 3;
const LABEL_PAD_PX: i32 = 2;
const LABEL_TEXT: Rgb<u8> = Rgb([255, 255, 255]);
static LABEL_FONT: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");

fn class_color(class_id: u32) -> Rgb<u8> {
    match class_id {
        0 => Rgb([255, 56, 56]),
        1 => Rgb([255, 157, 151]),
        2 => Rgb([255, 112, 31]),
        _ => Rgb([128, 128, 128]),
    }
}

/// Class name and confidence shown above a box, e.g. `Glioma 0.82`.
pub fn box_label(detection: &Detection) -> String {
    format!(
        "{} {:.2}",
        TumorClass::from_class_id(detection.class_id),
        detection.confidence
    )
}

/// Copy of `image` with every detection outlined and labelled.
///
/// Boxes arrive in the detector's `input_size` space and are scaled to the
/// image's real resolution. With no detections the image passes through.
pub fn annotate(image: &DynamicImage, detections: &DetectionSet, input_size: (u32, u32)) -> RgbImage {
    let mut canvas = image.to_rgb8();
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 || input_size.0 == 0 || input_size.1 == 0 {
        return canvas;
    }
    let sx = width as f32 / input_size.0 as f32;
    let sy = height as f32 / input_size.1 as f32;
    let font = match FontRef::try_from_slice(LABEL_FONT) {
        Ok(font) => Some(font),
        Err(err) => {
            log::warn!("label font unavailable, drawing boxes only: {}", err);
            None
        }
    };
    let scale = PxScale::from((height as f32 / 40.0).max(12.0));

    for det in detections {
        let x1 = (det.bbox.x1.min(det.bbox.x2) * sx).round() as i32;
        let y1 = (det.bbox.y1.min(det.bbox.y2) * sy).round() as i32;
        let x2 = (det.bbox.x1.max(det.bbox.x2) * sx).round() as i32;
        let y2 = (det.bbox.y1.max(det.bbox.y2) * sy).round() as i32;
        let x_min = x1.clamp(0, width as i32 - 1);
        let y_min = y1.clamp(0, height as i32 - 1);
        let x_max = x2.clamp(0, width as i32 - 1);
        let y_max = y2.clamp(0, height as i32 - 1);
        let color = class_color(det.class_id);

        for t in 0..STROKE_PX {
            let rw = (x_max - x_min + 1 - 2 * t).max(1) as u32;
            let rh = (y_max - y_min + 1 - 2 * t).max(1) as u32;
            let rect = Rect::at(x_min + t, y_min + t).of_size(rw, rh);
            draw_hollow_rect_mut(&mut canvas, rect, color);
        }

        if let Some(font) = &font {
            let label = box_label(det);
            let (text_w, text_h) = text_size(scale, font, &label);
            let tag_w = text_w as i32 + 2 * LABEL_PAD_PX;
            let tag_h = text_h as i32 + 2 * LABEL_PAD_PX;
            // Above the box when there is room, otherwise inside its top edge.
            let tag_y = if y_min >= tag_h { y_min - tag_h } else { y_min };
            draw_filled_rect_mut(
                &mut canvas,
                Rect::at(x_min, tag_y).of_size(tag_w as u32, tag_h as u32),
                color,
            );
            draw_text_mut(
                &mut canvas,
                LABEL_TEXT,
                x_min + LABEL_PAD_PX,
                tag_y + LABEL_PAD_PX,
                scale,
                font,
                &label,
            );
        }
    }
    canvas
}
