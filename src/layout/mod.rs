//! # Shared Flow Layout
//!
//! Computes the base (document-flow) position of every block on every page,
//! in screen pixels, before any user offset is applied.
//!
//! ```text
//! InvoiceSettings + InvoiceData ──► layout() ──► DocumentLayout
//!                                                    │
//!                     ┌──────────────────────────────┼───────────────────┐
//!                     ▼                              ▼                   ▼
//!              render::screen                 render::print        render::raster
//!         (px + offset, HTML markup)   (pt + to_points(offset))   (px × scale + offset)
//! ```
//!
//! Every renderer draws the same blocks in the same order from the same
//! base rectangles, so the preview and the printed page only differ by the
//! unit each one works in.

mod flow;
pub mod metrics;

pub use flow::layout;

use crate::color::Rgb;
use crate::document::{BlockKey, FontFace};

/// Preview sheet width in CSS pixels (A4 at 96 DPI).
pub const PAGE_WIDTH: f64 = 794.0;

/// Preview sheet height in CSS pixels (A4 at 96 DPI).
pub const PAGE_HEIGHT: f64 = 1123.0;

/// Page margin on every side.
pub const MARGIN: f64 = 48.0;

/// Width between the left and right margins.
pub const CONTENT_WIDTH: f64 = PAGE_WIDTH - 2.0 * MARGIN;

/// An axis-aligned rectangle, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub fn scale(&self, factor: f64) -> Self {
        Self::new(
            self.x * factor,
            self.y * factor,
            self.width * factor,
            self.height * factor,
        )
    }
}

/// Horizontal placement of text inside its box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

impl Align {
    /// Fraction of the free space placed before the text.
    pub fn factor(self) -> f64 {
        match self {
            Align::Left => 0.0,
            Align::Center => 0.5,
            Align::Right => 1.0,
        }
    }

    pub fn css(self) -> &'static str {
        match self {
            Align::Left => "left",
            Align::Center => "center",
            Align::Right => "right",
        }
    }
}

/// One line of text. `y` is the top of the line box; the text sits inside
/// `[x, x + box_width]` according to `align`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub x: f64,
    pub y: f64,
    pub box_width: f64,
    pub text: String,
    pub size: f64,
    pub bold: bool,
    pub color: Rgb,
    pub align: Align,
}

impl TextRun {
    /// Left edge of the glyphs, measured with `face`.
    pub fn text_left(&self, face: FontFace) -> f64 {
        let width = metrics::text_width(face, self.bold, self.size, &self.text);
        self.x + (self.box_width - width).max(0.0) * self.align.factor()
    }

    /// Baseline y.
    pub fn baseline(&self) -> f64 {
        self.y + self.size * metrics::ASCENT
    }
}

/// A drawing primitive, positioned relative to its block's origin.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Text(TextRun),
    Fill { rect: Rect, color: Rgb, radius: f64 },
    Rule { x1: f64, x2: f64, y: f64, color: Rgb, thickness: f64 },
    /// The tenant logo, scaled to `rect`.
    Logo { rect: Rect },
}

/// What a block is. Only [`BlockKind::Positioned`] blocks carry user offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Positioned(BlockKey),
    Vehicle,
    ItemTable,
    Totals,
}

/// A group of elements drawn together at one base position.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    /// Base rectangle in page coordinates.
    pub rect: Rect,
    pub elements: Vec<Element>,
}

impl Block {
    pub fn key(&self) -> Option<BlockKey> {
        match self.kind {
            BlockKind::Positioned(key) => Some(key),
            _ => None,
        }
    }

    pub fn texts(&self) -> impl Iterator<Item = &TextRun> {
        self.elements.iter().filter_map(|e| match e {
            Element::Text(t) => Some(t),
            _ => None,
        })
    }
}

/// One sheet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub blocks: Vec<Block>,
}

impl Page {
    pub fn block(&self, key: BlockKey) -> Option<&Block> {
        self.blocks.iter().find(|b| b.key() == Some(key))
    }
}

/// The laid-out invoice, in pixels, without offsets applied.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLayout {
    pub font: FontFace,
    pub page_width: f64,
    pub page_height: f64,
    pub pages: Vec<Page>,
}

impl DocumentLayout {
    /// Every block in drawing order, with its page index.
    pub fn blocks(&self) -> impl Iterator<Item = (usize, &Block)> {
        self.pages
            .iter()
            .enumerate()
            .flat_map(|(i, p)| p.blocks.iter().map(move |b| (i, b)))
    }

    /// First occurrence of a positionable block.
    pub fn find(&self, key: BlockKey) -> Option<(usize, &Block)> {
        self.blocks().find(|(_, b)| b.key() == Some(key))
    }
}
