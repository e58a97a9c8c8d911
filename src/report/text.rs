//! Text handling for the built-in PDF fonts.
//!
//! The report uses the standard Helvetica family, which only covers a
//! single-byte encoding. Everything written into a document goes through
//! [`document_safe`] so generation never hits an unencodable glyph.

const PT_TO_MM: f32 = 25.4 / 72.0;

/// Helvetica advance widths for ASCII 0x20..=0x7E, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0..?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P.._
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `..o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // p..~
];

/// Font faces used by the report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FontStyle {
    Regular,
    Bold,
    Italic,
}

/// Replace anything outside printable ASCII.
///
/// Common typographic punctuation maps to its ASCII look-alike; every other
/// character becomes `?`. Line breaks are the caller's concern and are
/// flattened to spaces here.
pub fn document_safe(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            ' '..='~' => out.push(ch),
            '\t' | '\n' | '\r' => out.push(' '),
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => out.push('"'),
            '\u{2010}'..='\u{2015}' | '\u{2212}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\u{00A0}' => out.push(' '),
            _ => out.push('?'),
        }
    }
    out
}

fn char_width(ch: char) -> u16 {
    let code = ch as u32;
    if (0x20..=0x7E).contains(&code) {
        HELVETICA_WIDTHS[(code - 0x20) as usize]
    } else {
        556
    }
}

/// Rendered width of `text` in millimetres.
///
/// Bold is approximated from the regular metrics; it only feeds centering
/// and wrapping, where a few percent do not matter.
pub fn text_width_mm(text: &str, size_pt: f32, style: FontStyle) -> f32 {
    let units: u32 = text.chars().map(|ch| u32::from(char_width(ch))).sum();
    let width = units as f32 / 1000.0 * size_pt * PT_TO_MM;
    match style {
        FontStyle::Bold => width * 1.06,
        FontStyle::Regular | FontStyle::Italic => width,
    }
}

/// Greedy word wrap to `max_width_mm`. Words wider than a full line are
/// broken between characters.
pub fn wrap_line(text: &str, max_width_mm: f32, size_pt: f32, style: FontStyle) -> Vec<String> {
    let fits = |candidate: &str| text_width_mm(candidate, size_pt, style) <= max_width_mm;
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split(' ').filter(|word| !word.is_empty()) {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if fits(&candidate) {
            current = candidate;
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        for ch in word.chars() {
            current.push(ch);
            if !fits(&current) && current.chars().count() > 1 {
                current.pop();
                lines.push(std::mem::take(&mut current));
                current.push(ch);
            }
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}
