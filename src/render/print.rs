//! # Print Renderer
//!
//! Turns the shared layout into A4 pages of positioned drawing operations in
//! PDF points, then serializes them with `pdf-writer`.
//!
//! ## Coordinates
//!
//! ```text
//! layout (px, top-left) ──scale_to_points──► geometry (pt, top-left)
//! stored offset (px)    ──to_points────────► offset (pt, integer)
//!                                                 │
//!                            to_pdf: y' = page_height − y (bottom-left)
//! ```
//!
//! Only the stored offsets go through the rounding converter; flow geometry
//! is scaled exactly so that text measured in the layout lands on the same
//! glyph boundaries in the PDF.

use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::RgbaImage;
use log::debug;
use pdf_writer::{Content, Date, Filter, Finish, Name, Pdf, Rect as PdfRect, Ref, Str, TextStr};
use std::io::Write;

use crate::color::Rgb;
use crate::document::{FontFace, InvoiceData, InvoiceSettings, Offset};
use crate::error::InvoiceError;
use crate::layout::{self, Element, Rect};
use crate::render::logo::LoadedLogo;
use crate::units::{A4_HEIGHT_PT, A4_WIDTH_PT, scale_to_points, to_points};

/// Control-point distance for a quarter circle drawn with one cubic Bézier.
const KAPPA: f64 = 0.552_284_75;

/// A drawing operation in points, origin top-left.
#[derive(Debug, Clone, PartialEq)]
pub enum PrintOp {
    Text {
        x: f64,
        baseline: f64,
        size: f64,
        bold: bool,
        color: Rgb,
        text: String,
    },
    Fill {
        rect: Rect,
        color: Rgb,
        radius: f64,
    },
    Line {
        x1: f64,
        x2: f64,
        y: f64,
        thickness: f64,
        color: Rgb,
    },
    /// Draw `PrintDocument::images[image]` into `rect`.
    Image { rect: Rect, image: usize },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PrintPage {
    pub ops: Vec<PrintOp>,
}

impl PrintPage {
    /// Text of every text op, in drawing order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            PrintOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// A paginated, print-ready invoice.
#[derive(Debug, Clone)]
pub struct PrintDocument {
    pub title: String,
    pub font: FontFace,
    pub width: f64,
    pub height: f64,
    pub pages: Vec<PrintPage>,
    pub images: Vec<RgbaImage>,
}

impl PrintDocument {
    /// An empty A4 document.
    pub fn a4(title: impl Into<String>, font: FontFace) -> Self {
        Self {
            title: title.into(),
            font,
            width: A4_WIDTH_PT,
            height: A4_HEIGHT_PT,
            pages: Vec::new(),
            images: Vec::new(),
        }
    }

    /// Serialize to PDF bytes.
    pub fn to_pdf(&self) -> Result<Vec<u8>, InvoiceError> {
        let mut alloc = Ref::new(1);
        let catalog_id = alloc.bump();
        let page_tree_id = alloc.bump();
        let regular_id = alloc.bump();
        let bold_id = alloc.bump();
        let info_id = alloc.bump();

        let mut pdf = Pdf::new();
        pdf.catalog(catalog_id).pages(page_tree_id);

        for (id, bold) in [(regular_id, false), (bold_id, true)] {
            pdf.type1_font(id)
                .base_font(Name(self.font.pdf_base_font(bold).as_bytes()))
                .encoding_predefined(Name(b"WinAnsiEncoding"));
        }

        // Images are written once and shared by every page that draws them.
        let mut image_names = Vec::with_capacity(self.images.len());
        for (index, image) in self.images.iter().enumerate() {
            let image_id = alloc.bump();
            let (width, height) = image.dimensions();
            let (rgb, alpha) = split_alpha(image);

            let mask_id = match alpha {
                Some(alpha) => {
                    let mask_id = alloc.bump();
                    let data = deflate(&alpha)?;
                    let mut mask = pdf.image_xobject(mask_id, &data);
                    mask.filter(Filter::FlateDecode);
                    mask.width(width as i32);
                    mask.height(height as i32);
                    mask.color_space().device_gray();
                    mask.bits_per_component(8);
                    mask.finish();
                    Some(mask_id)
                }
                None => None,
            };

            let data = deflate(&rgb)?;
            let mut xobject = pdf.image_xobject(image_id, &data);
            xobject.filter(Filter::FlateDecode);
            xobject.width(width as i32);
            xobject.height(height as i32);
            xobject.color_space().device_rgb();
            xobject.bits_per_component(8);
            if let Some(mask_id) = mask_id {
                xobject.s_mask(mask_id);
            }
            xobject.finish();
            image_names.push((format!("Im{}", index + 1), image_id));
        }

        let mut page_ids = Vec::with_capacity(self.pages.len());
        for page in &self.pages {
            let page_id = alloc.bump();
            let content_id = alloc.bump();
            page_ids.push(page_id);

            let content = self.page_content(page);
            pdf.stream(content_id, &deflate(&content)?)
                .filter(Filter::FlateDecode);

            let mut pdf_page = pdf.page(page_id);
            pdf_page.media_box(PdfRect::new(0.0, 0.0, self.width as f32, self.height as f32));
            pdf_page.parent(page_tree_id);
            pdf_page.contents(content_id);
            let mut resources = pdf_page.resources();
            let mut fonts = resources.fonts();
            fonts.pair(Name(b"F1"), regular_id);
            fonts.pair(Name(b"F2"), bold_id);
            fonts.finish();
            if !image_names.is_empty() {
                let mut xobjects = resources.x_objects();
                for (name, id) in &image_names {
                    xobjects.pair(Name(name.as_bytes()), *id);
                }
                xobjects.finish();
            }
            resources.finish();
            pdf_page.finish();
        }

        let page_count = page_ids.len() as i32;
        pdf.pages(page_tree_id).kids(page_ids).count(page_count);

        let mut info = pdf.document_info(info_id);
        info.title(TextStr(&self.title));
        info.producer(TextStr(concat!("invoice-designer ", env!("CARGO_PKG_VERSION"))));
        info.creation_date(pdf_date(chrono::Utc::now()));
        info.finish();

        debug!("Wrote PDF '{}' with {} page(s)", self.title, page_count);
        Ok(pdf.finish())
    }

    fn page_content(&self, page: &PrintPage) -> Vec<u8> {
        let mut content = Content::new();
        let flip = |y: f64| (self.height - y) as f32;

        for op in &page.ops {
            match op {
                PrintOp::Fill { rect, color, radius } => {
                    let (r, g, b) = color.to_unit();
                    content.set_fill_rgb(r, g, b);
                    if *radius > 0.0 {
                        rounded_rect(&mut content, rect, *radius, self.height);
                    } else {
                        content.rect(
                            rect.x as f32,
                            flip(rect.bottom()),
                            rect.width as f32,
                            rect.height as f32,
                        );
                    }
                    content.fill_nonzero();
                }
                PrintOp::Line { x1, x2, y, thickness, color } => {
                    let (r, g, b) = color.to_unit();
                    content.set_stroke_rgb(r, g, b);
                    content.set_line_width(*thickness as f32);
                    content.move_to(*x1 as f32, flip(*y));
                    content.line_to(*x2 as f32, flip(*y));
                    content.stroke();
                }
                PrintOp::Text { x, baseline, size, bold, color, text } => {
                    let (r, g, b) = color.to_unit();
                    let font = if *bold { Name(b"F2") } else { Name(b"F1") };
                    let encoded = win_ansi(text);
                    content.set_fill_rgb(r, g, b);
                    content.begin_text();
                    content.set_font(font, *size as f32);
                    content.next_line(*x as f32, flip(*baseline));
                    content.show(Str(&encoded));
                    content.end_text();
                }
                PrintOp::Image { rect, image } => {
                    let name = format!("Im{}", image + 1);
                    content.save_state();
                    content.transform([
                        rect.width as f32,
                        0.0,
                        0.0,
                        rect.height as f32,
                        rect.x as f32,
                        flip(rect.bottom()),
                    ]);
                    content.x_object(Name(name.as_bytes()));
                    content.restore_state();
                }
            }
        }
        content.finish()
    }
}

/// Builds [`PrintDocument`]s from settings and invoice data.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrintRenderer;

impl PrintRenderer {
    /// Lay out and convert to points. A `None` logo renders without one.
    pub fn render(
        &self,
        settings: &InvoiceSettings,
        data: &InvoiceData,
        logo: Option<&LoadedLogo>,
    ) -> PrintDocument {
        let layout = layout::layout(settings, data, logo.map(LoadedLogo::size));
        let face = layout.font;

        let mut doc = PrintDocument::a4(format!("Invoice {}", data.invoice_number), face);
        if let Some(logo) = logo {
            doc.images.push(logo.image.clone());
        }

        for page in &layout.pages {
            let mut out = PrintPage::default();
            for block in &page.blocks {
                let offset = block.key().map(|k| settings.offset(k)).unwrap_or(Offset::ZERO);
                let dx = to_points(offset.x);
                let dy = to_points(offset.y);
                let at = |x: f64, y: f64| {
                    (
                        scale_to_points(block.rect.x + x) + dx,
                        scale_to_points(block.rect.y + y) + dy,
                    )
                };

                for element in &block.elements {
                    match element {
                        Element::Text(run) => {
                            let (x, baseline) = at(run.text_left(face), run.baseline());
                            out.ops.push(PrintOp::Text {
                                x,
                                baseline,
                                size: scale_to_points(run.size),
                                bold: run.bold,
                                color: run.color,
                                text: run.text.clone(),
                            });
                        }
                        Element::Fill { rect, color, radius } => {
                            let (x, y) = at(rect.x, rect.y);
                            out.ops.push(PrintOp::Fill {
                                rect: Rect::new(
                                    x,
                                    y,
                                    scale_to_points(rect.width),
                                    scale_to_points(rect.height),
                                ),
                                color: *color,
                                radius: scale_to_points(*radius),
                            });
                        }
                        Element::Rule { x1, x2, y, color, thickness } => {
                            let (start, y) = at(*x1, *y);
                            let (end, _) = at(*x2, 0.0);
                            out.ops.push(PrintOp::Line {
                                x1: start,
                                x2: end,
                                y,
                                thickness: scale_to_points(*thickness),
                                color: *color,
                            });
                        }
                        Element::Logo { rect } => {
                            if doc.images.is_empty() {
                                continue;
                            }
                            let (x, y) = at(rect.x, rect.y);
                            out.ops.push(PrintOp::Image {
                                rect: Rect::new(
                                    x,
                                    y,
                                    scale_to_points(rect.width),
                                    scale_to_points(rect.height),
                                ),
                                image: 0,
                            });
                        }
                    }
                }
            }
            doc.pages.push(out);
        }

        debug!(
            "Print layout for {}: {} page(s)",
            data.invoice_number,
            doc.pages.len()
        );
        doc
    }
}

fn rounded_rect(content: &mut Content, rect: &Rect, radius: f64, page_height: f64) {
    let r = radius.min(rect.width / 2.0).min(rect.height / 2.0);
    let k = r * KAPPA;
    let left = rect.x;
    let right = rect.right();
    let top = page_height - rect.y;
    let bottom = page_height - rect.bottom();
    let p = |v: f64| v as f32;

    content.move_to(p(left + r), p(bottom));
    content.line_to(p(right - r), p(bottom));
    content.cubic_to(p(right - r + k), p(bottom), p(right), p(bottom + r - k), p(right), p(bottom + r));
    content.line_to(p(right), p(top - r));
    content.cubic_to(p(right), p(top - r + k), p(right - r + k), p(top), p(right - r), p(top));
    content.line_to(p(left + r), p(top));
    content.cubic_to(p(left + r - k), p(top), p(left), p(top - r + k), p(left), p(top - r));
    content.line_to(p(left), p(bottom + r));
    content.cubic_to(p(left), p(bottom + r - k), p(left + r - k), p(bottom), p(left + r), p(bottom));
    content.close_path();
}

/// Split RGBA into packed RGB and, when any pixel is translucent, an alpha plane.
fn split_alpha(image: &RgbaImage) -> (Vec<u8>, Option<Vec<u8>>) {
    let mut rgb = Vec::with_capacity(image.as_raw().len() / 4 * 3);
    let mut alpha = Vec::with_capacity(image.as_raw().len() / 4);
    for p in image.pixels() {
        rgb.extend_from_slice(&p.0[..3]);
        alpha.push(p.0[3]);
    }
    let translucent = alpha.iter().any(|&a| a < 255);
    (rgb, translucent.then_some(alpha))
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, InvoiceError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn pdf_date(now: chrono::DateTime<chrono::Utc>) -> Date {
    use chrono::{Datelike, Timelike};
    Date::new(now.year().clamp(0, 9999) as u16)
        .month(now.month() as u8)
        .day(now.day() as u8)
        .hour(now.hour() as u8)
        .minute(now.minute() as u8)
        .second(now.second() as u8)
        .utc_offset_hour(0)
}

/// Encode text for the standard fonts' WinAnsiEncoding. Characters outside
/// it become `?`.
pub fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c as u8,
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '€' => 0x80,
            '‚' => 0x82,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            _ => b'?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BillTo, BlockKey, InvoiceVariant, LineItem};
    use image::Rgba;

    fn data() -> InvoiceData {
        InvoiceData::new("INV-9", "1 May 2025", BillTo { name: "Sam".into(), ..Default::default() })
            .item(LineItem::new("Warranty Package", 1, 499.0))
    }

    fn text_op<'a>(page: &'a PrintPage, needle: &str) -> (f64, f64) {
        page.ops
            .iter()
            .find_map(|op| match op {
                PrintOp::Text { x, baseline, text, .. } if text == needle => Some((*x, *baseline)),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_offsets_go_through_to_points() {
        let settings = InvoiceSettings::default();
        let base = PrintRenderer.render(&settings, &data(), None);

        let mut moved = settings.clone();
        moved.layout.set(BlockKey::BillTo, Offset::new(15.0, -21.0));
        let shifted = PrintRenderer.render(&moved, &data(), None);

        let (x0, y0) = text_op(&base.pages[0], "Sam");
        let (x1, y1) = text_op(&shifted.pages[0], "Sam");
        assert!((x1 - x0 - 11.0).abs() < 1e-9);
        assert!((y1 - y0 + 16.0).abs() < 1e-9);

        // Unkeyed blocks never move.
        let (tx0, _) = text_op(&base.pages[0], "Description");
        let (tx1, _) = text_op(&shifted.pages[0], "Description");
        assert_eq!(tx0, tx1);
    }

    #[test]
    fn test_a4_and_settlement_amounts() {
        let data = InvoiceData::new("S-2", "today", BillTo::default())
            .item(LineItem::new("Gold cover", 1, 500.0).with_cost(350.0))
            .item(LineItem::new("Tyre add-on", 1, 60.0))
            .variant(InvoiceVariant::Settlement);
        let doc = PrintRenderer.render(&InvoiceSettings::default(), &data, None);
        assert_eq!(doc.width, A4_WIDTH_PT);
        assert_eq!(doc.height, A4_HEIGHT_PT);

        let texts: Vec<&str> = doc.pages[0].texts().collect();
        assert!(texts.contains(&"£350.00"));
        assert!(texts.contains(&"£60.00"));
        assert!(texts.contains(&"Customer price: £500.00, margin: £150.00"));
        assert_eq!(texts.iter().filter(|t| t.starts_with("Customer price")).count(), 1);
    }

    #[test]
    fn test_footer_on_every_page() {
        let mut data = data();
        for i in 0..80 {
            data = data.item(LineItem::new(format!("Line {}", i), 1, 1.0));
        }
        let settings = InvoiceSettings::default();
        let doc = PrintRenderer.render(&settings, &data, None);
        assert!(doc.pages.len() > 1);
        for page in &doc.pages {
            assert!(page.texts().any(|t| t == settings.footer_text));
        }
        let last = doc.pages.last().unwrap();
        assert!(last.texts().any(|t| t == settings.notes_body));
        assert!(!doc.pages[0].texts().any(|t| t == settings.notes_body));
    }

    #[test]
    fn test_logo_becomes_image_op() {
        let logo = LoadedLogo {
            image: RgbaImage::from_pixel(4, 2, Rgba([255, 0, 0, 128])),
        };
        let doc = PrintRenderer.render(&InvoiceSettings::default(), &data(), Some(&logo));
        assert_eq!(doc.images.len(), 1);
        assert!(doc.pages[0]
            .ops
            .iter()
            .any(|op| matches!(op, PrintOp::Image { image: 0, .. })));

        let without = PrintRenderer.render(&InvoiceSettings::default(), &data(), None);
        assert!(without.images.is_empty());
    }

    #[test]
    fn test_pdf_bytes() {
        let logo = LoadedLogo {
            image: RgbaImage::from_pixel(4, 2, Rgba([255, 0, 0, 128])),
        };
        let doc = PrintRenderer.render(&InvoiceSettings::default(), &data(), Some(&logo));
        let pdf = doc.to_pdf().unwrap();
        assert!(pdf.starts_with(b"%PDF-"));
        let text = String::from_utf8_lossy(&pdf);
        assert!(text.contains("/Helvetica-Bold"));
        assert!(text.contains("/WinAnsiEncoding"));
        assert!(text.contains("/SMask"));
        assert!(text.contains("/Count 1"));
    }

    #[test]
    fn test_win_ansi() {
        assert_eq!(win_ansi("£5 €"), vec![0xA3, b'5', b' ', 0x80]);
        assert_eq!(win_ansi("日"), vec![b'?']);
    }

    #[test]
    fn test_split_alpha_skips_opaque_mask() {
        let opaque = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255]));
        let (rgb, alpha) = split_alpha(&opaque);
        assert_eq!(rgb.len(), 12);
        assert!(alpha.is_none());
    }
}
