//! Bitmap rendering of the screen layout.
//!
//! Backs the raster export strategy and the PNG preview. Text uses the
//! Spleen 12×24 bitmap font stretched into the advance widths of the layout
//! metrics, so lines break and align exactly where the other renderers put
//! them even though the glyph shapes differ.

use image::imageops::{self, FilterType};
use image::{ImageEncoder, Rgba, RgbaImage};
use log::warn;
use spleen_font::{FONT_12X24, PSF2Font};
use std::collections::HashMap;

use crate::color::Rgb;
use crate::document::{FontFace, InvoiceSettings, Offset};
use crate::error::InvoiceError;
use crate::layout::metrics::{self, LINE_HEIGHT};
use crate::layout::{DocumentLayout, Element, Rect, TextRun};
use crate::render::logo::LoadedLogo;

/// Minimum (and default) device pixels per layout pixel.
pub const MIN_SCALE: u32 = 2;

const GLYPH_WIDTH: usize = 12;
const GLYPH_HEIGHT: usize = 24;

/// Renders layout pages to RGBA bitmaps on a white background.
#[derive(Debug, Clone, Copy)]
pub struct RasterRenderer {
    scale: u32,
}

impl Default for RasterRenderer {
    fn default() -> Self {
        Self { scale: MIN_SCALE }
    }
}

impl RasterRenderer {
    /// Scales below [`MIN_SCALE`] are raised to it.
    pub fn new(scale: u32) -> Self {
        Self {
            scale: scale.max(MIN_SCALE),
        }
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// One bitmap per page.
    pub fn render(
        &self,
        settings: &InvoiceSettings,
        layout: &DocumentLayout,
        logo: Option<&LoadedLogo>,
    ) -> Vec<RgbaImage> {
        let mut glyphs = GlyphCache::new();
        (0..layout.pages.len())
            .map(|i| self.render_page(settings, layout, i, logo, &mut glyphs))
            .collect()
    }

    /// All pages stacked top to bottom in one bitmap.
    pub fn render_stacked(
        &self,
        settings: &InvoiceSettings,
        layout: &DocumentLayout,
        logo: Option<&LoadedLogo>,
    ) -> RgbaImage {
        let pages = self.render(settings, layout, logo);
        let width = pages.first().map_or(0, |p| p.width());
        let height: u32 = pages.iter().map(|p| p.height()).sum();
        let mut out = RgbaImage::from_pixel(width.max(1), height.max(1), Rgba([255, 255, 255, 255]));
        let mut y = 0i64;
        for page in &pages {
            imageops::replace(&mut out, page, 0, y);
            y += page.height() as i64;
        }
        out
    }

    fn render_page(
        &self,
        settings: &InvoiceSettings,
        layout: &DocumentLayout,
        index: usize,
        logo: Option<&LoadedLogo>,
        glyphs: &mut GlyphCache,
    ) -> RgbaImage {
        let s = self.scale as f64;
        let width = (layout.page_width * s).round() as u32;
        let height = (layout.page_height * s).round() as u32;
        let mut canvas = Canvas {
            image: RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])),
        };

        let Some(page) = layout.pages.get(index) else {
            return canvas.image;
        };
        for block in &page.blocks {
            let offset = block.key().map(|k| settings.offset(k)).unwrap_or(Offset::ZERO);
            let ox = block.rect.x + offset.x;
            let oy = block.rect.y + offset.y;
            for element in &block.elements {
                match element {
                    Element::Fill { rect, color, radius } => {
                        canvas.fill(rect.translate(ox, oy).scale(s), *color, radius * s);
                    }
                    Element::Rule { x1, x2, y, color, thickness } => {
                        let rect = Rect::new(ox + x1, oy + y, x2 - x1, thickness.max(1.0 / s));
                        canvas.fill(rect.scale(s), *color, 0.0);
                    }
                    Element::Text(run) => {
                        canvas.text(run, layout.font, ox, oy, s, glyphs);
                    }
                    Element::Logo { rect } => {
                        if let Some(logo) = logo {
                            canvas.image(&logo.image, rect.translate(ox, oy).scale(s));
                        }
                    }
                }
            }
        }
        canvas.image
    }
}

/// PNG-encode a bitmap.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, InvoiceError> {
    let mut png = Vec::new();
    image::codecs::png::PngEncoder::new(&mut png)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| InvoiceError::Render(format!("PNG encoding failed: {}", e)))?;
    Ok(png)
}

struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    fn blend(&mut self, x: i64, y: i64, color: Rgb, alpha: u8) {
        if x < 0 || y < 0 || x >= self.image.width() as i64 || y >= self.image.height() as i64 {
            return;
        }
        let px = self.image.get_pixel_mut(x as u32, y as u32);
        let a = alpha as u32;
        let mix = |dst: u8, src: u8| ((src as u32 * a + dst as u32 * (255 - a) + 127) / 255) as u8;
        px.0 = [mix(px.0[0], color.r), mix(px.0[1], color.g), mix(px.0[2], color.b), 255];
    }

    fn fill(&mut self, rect: Rect, color: Rgb, radius: f64) {
        let x0 = rect.x.round() as i64;
        let y0 = rect.y.round() as i64;
        let x1 = rect.right().round() as i64;
        let y1 = rect.bottom().round() as i64;
        let r = radius.min(rect.width / 2.0).min(rect.height / 2.0);
        for y in y0..y1.max(y0 + 1) {
            for x in x0..x1 {
                if r > 0.0 && !inside_rounded(&rect, r, x as f64 + 0.5, y as f64 + 0.5) {
                    continue;
                }
                self.blend(x, y, color, 255);
            }
        }
    }

    fn text(&mut self, run: &TextRun, face: FontFace, ox: f64, oy: f64, s: f64, glyphs: &mut GlyphCache) {
        let cell_height = run.size * LINE_HEIGHT * s;
        let top = (oy + run.y) * s;
        let mut pen = (ox + run.text_left(face)) * s;

        for ch in run.text.chars() {
            let advance = metrics::char_width(face, run.bold, ch) as f64 * run.size / 1000.0 * s;
            if !ch.is_whitespace()
                && let Some(bitmap) = glyphs.get(ch)
            {
                let w = advance.round().max(1.0) as usize;
                let h = cell_height.round().max(1.0) as usize;
                for gy in 0..h {
                    let sy = gy * GLYPH_HEIGHT / h;
                    for gx in 0..w {
                        let sx = gx * GLYPH_WIDTH / w;
                        if bitmap[sy * GLYPH_WIDTH + sx] {
                            let x = pen.round() as i64 + gx as i64;
                            let y = top.round() as i64 + gy as i64;
                            self.blend(x, y, run.color, 255);
                            if run.bold {
                                self.blend(x + 1, y, run.color, 255);
                            }
                        }
                    }
                }
            }
            pen += advance;
        }
    }

    fn image(&mut self, source: &RgbaImage, rect: Rect) {
        let w = rect.width.round().max(1.0) as u32;
        let h = rect.height.round().max(1.0) as u32;
        let scaled = imageops::resize(source, w, h, FilterType::Triangle);
        let x0 = rect.x.round() as i64;
        let y0 = rect.y.round() as i64;
        for (x, y, p) in scaled.enumerate_pixels() {
            let color = Rgb::new(p.0[0], p.0[1], p.0[2]);
            self.blend(x0 + x as i64, y0 + y as i64, color, p.0[3]);
        }
    }
}

fn inside_rounded(rect: &Rect, r: f64, x: f64, y: f64) -> bool {
    let cx = x.clamp(rect.x + r, rect.right() - r);
    let cy = y.clamp(rect.y + r, rect.bottom() - r);
    let (dx, dy) = (x - cx, y - cy);
    dx * dx + dy * dy <= r * r
}

/// Decoded Spleen glyphs, `GLYPH_WIDTH × GLYPH_HEIGHT` booleans each.
/// Characters the font lacks are cached as `None` and drawn as blanks.
struct GlyphCache {
    glyphs: HashMap<char, Option<Vec<bool>>>,
}

impl GlyphCache {
    fn new() -> Self {
        Self {
            glyphs: HashMap::new(),
        }
    }

    fn get(&mut self, ch: char) -> Option<&Vec<bool>> {
        self.glyphs.entry(ch).or_insert_with(|| decode_glyph(ch)).as_ref()
    }
}

fn decode_glyph(ch: char) -> Option<Vec<bool>> {
    let mut font = match PSF2Font::new(FONT_12X24) {
        Ok(font) => font,
        Err(e) => {
            warn!("Bitmap font unavailable: {:?}", e);
            return None;
        }
    };
    let mut utf8 = [0u8; 4];
    let rows = font.glyph_for_utf8(ch.encode_utf8(&mut utf8).as_bytes())?;
    let mut bitmap = vec![false; GLYPH_WIDTH * GLYPH_HEIGHT];
    for (y, row) in rows.enumerate().take(GLYPH_HEIGHT) {
        for (x, on) in row.enumerate().take(GLYPH_WIDTH) {
            bitmap[y * GLYPH_WIDTH + x] = on;
        }
    }
    Some(bitmap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BillTo, BlockKey, InvoiceData, LineItem};
    use crate::layout;

    fn fixture() -> (InvoiceSettings, DocumentLayout) {
        let settings = InvoiceSettings::default();
        let data = InvoiceData::new("R-1", "today", BillTo { name: "Kim".into(), ..Default::default() })
            .item(LineItem::new("Cover", 1, 99.0));
        let layout = layout::layout(&settings, &data, Some((10, 10)));
        (settings, layout)
    }

    #[test]
    fn test_scale_floor_and_size() {
        let (settings, layout) = fixture();
        let renderer = RasterRenderer::new(1);
        assert_eq!(renderer.scale(), 2);
        let pages = renderer.render(&settings, &layout, None);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].dimensions(), (1588, 2246));
    }

    #[test]
    fn test_white_background_and_header_fill() {
        let (settings, layout) = fixture();
        let page = &RasterRenderer::default().render(&settings, &layout, None)[0];
        assert_eq!(page.get_pixel(2, 2).0, [255, 255, 255, 255]);

        // Middle of the table header row carries the primary color.
        let (_, table) = layout
            .blocks()
            .find(|(_, b)| b.kind == layout::BlockKind::ItemTable)
            .unwrap();
        let x = ((table.rect.x + 250.0) * 2.0) as u32;
        let y = ((table.rect.y + 3.0) * 2.0) as u32;
        let primary = settings.primary();
        assert_eq!(page.get_pixel(x, y).0, [primary.r, primary.g, primary.b, 255]);
    }

    #[test]
    fn test_offsets_move_blocks() {
        let (mut settings, layout) = fixture();
        let logo = LoadedLogo {
            image: RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])),
        };
        let rect = layout.find(BlockKey::Logo).unwrap().1.rect;
        let sample = (((rect.x + 5.0) * 2.0) as u32, ((rect.y + 5.0) * 2.0) as u32);

        let page = &RasterRenderer::default().render(&settings, &layout, Some(&logo))[0];
        assert_eq!(page.get_pixel(sample.0, sample.1).0, [255, 0, 0, 255]);

        settings.layout.set(BlockKey::Logo, Offset::new(0.0, 200.0));
        let page = &RasterRenderer::default().render(&settings, &layout, Some(&logo))[0];
        assert_eq!(page.get_pixel(sample.0, sample.1).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_stacked_and_png() {
        let (settings, layout) = fixture();
        let stacked = RasterRenderer::default().render_stacked(&settings, &layout, None);
        assert_eq!(stacked.height(), 2246);
        let png = encode_png(&stacked).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
