//! Advance widths for the standard PDF base fonts.
//!
//! Widths are in 1/1000 em for the printable ASCII range (0x20–0x7E). The
//! layout measures with these so that the print renderer, which uses the
//! same base fonts without embedding, wraps and aligns text identically to
//! the preview.

use crate::document::FontFace;

/// Baseline position as a fraction of the font size, from the top of the line box.
pub const ASCENT: f64 = 0.8;

/// Line box height as a multiple of the font size.
pub const LINE_HEIGHT: f64 = 1.3;

#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[rustfmt::skip]
const TIMES_ROMAN: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

#[rustfmt::skip]
const TIMES_BOLD: [u16; 95] = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500,
    930, 722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944, 722, 778,
    611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667, 333, 278, 333, 581, 500,
    333, 500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833, 556, 500,
    556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444, 394, 220, 394, 520,
];

/// Advance width of `ch` in 1/1000 em.
pub fn char_width(face: FontFace, bold: bool, ch: char) -> u16 {
    let table = match (face, bold) {
        (FontFace::Courier, _) => return 600,
        (FontFace::Helvetica, false) => &HELVETICA,
        (FontFace::Helvetica, true) => &HELVETICA_BOLD,
        (FontFace::TimesRoman, false) => &TIMES_ROMAN,
        (FontFace::TimesRoman, true) => &TIMES_BOLD,
    };
    let code = ch as u32;
    if (0x20..=0x7e).contains(&code) {
        table[(code - 0x20) as usize]
    } else {
        // Digit width: covers £, € and most Latin-1 letters closely enough.
        table[('0' as u32 - 0x20) as usize]
    }
}

/// Width of `text` at `size` in the same unit as `size`.
pub fn text_width(face: FontFace, bold: bool, size: f64, text: &str) -> f64 {
    let units: u32 = text.chars().map(|c| char_width(face, bold, c) as u32).sum();
    units as f64 * size / 1000.0
}

/// Greedy word wrap. Explicit newlines always break; words longer than
/// `max_width` are split by character. Always returns at least one line.
pub fn wrap(face: FontFace, bold: bool, size: f64, text: &str, max_width: f64) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };
            if text_width(face, bold, size, &candidate) <= max_width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if text_width(face, bold, size, word) <= max_width {
                current = word.to_string();
            } else {
                for ch in word.chars() {
                    let mut next = current.clone();
                    next.push(ch);
                    if !current.is_empty() && text_width(face, bold, size, &next) > max_width {
                        lines.push(std::mem::take(&mut current));
                        current.push(ch);
                    } else {
                        current = next;
                    }
                }
            }
        }
        lines.push(current);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_widths() {
        assert_eq!(char_width(FontFace::Helvetica, false, 'W'), 944);
        assert_eq!(char_width(FontFace::Helvetica, true, 'a'), 556);
        assert_eq!(char_width(FontFace::TimesRoman, false, 'm'), 778);
        assert_eq!(char_width(FontFace::Courier, true, 'i'), 600);
        assert_eq!(char_width(FontFace::Helvetica, false, '£'), 556);
    }

    #[test]
    fn test_text_width_scales() {
        let w = text_width(FontFace::Courier, false, 10.0, "abcd");
        assert!((w - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_wrap_breaks_on_words() {
        // Courier 10: 6 units per char, so 60 fits exactly 10 chars.
        let lines = wrap(FontFace::Courier, false, 10.0, "extended warranty cover", 60.0);
        assert_eq!(lines, vec!["extended", "warranty", "cover"]);
    }

    #[test]
    fn test_wrap_keeps_newlines_and_splits_long_words() {
        let lines = wrap(FontFace::Courier, false, 10.0, "abcdefghijklmno\nxy", 60.0);
        assert_eq!(lines, vec!["abcdefghij", "klmno", "xy"]);
    }

    #[test]
    fn test_wrap_empty() {
        assert_eq!(wrap(FontFace::Helvetica, false, 12.0, "", 100.0), vec![String::new()]);
    }
}
