//! Screen preview: styled HTML markup and the interactive drag session.
//!
//! Each page becomes one fixed-size sheet. Every block sits at its flow
//! position and is moved by its stored offset with a CSS `translate`, so a
//! zero offset leaves the block exactly where the print renderer puts it.

use std::fmt::Write;

use crate::designer::drag::{DragBounds, DragController, Frame, LayoutChange, SNAP};
use crate::document::{BlockKey, InvoiceSettings, LayoutOffsets, Offset};
use crate::layout::{Block, DocumentLayout, Element, TextRun, metrics::LINE_HEIGHT};

const STYLESHEET: &str = "\
.invoice-sheet{position:relative;overflow:hidden;background:#ffffff;margin:0 auto 24px;box-shadow:0 1px 4px rgba(15,23,42,.15)}\
.invoice-sheet .block{position:absolute}\
.invoice-sheet .block>*{position:absolute;margin:0;white-space:pre}\
.invoice-sheet.editing .block[data-block]{cursor:move;outline:1px dashed rgba(37,99,235,.5);user-select:none}";

/// Preview mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Static markup.
    #[default]
    View,
    /// Keyed blocks carry the attributes the drag layer reads.
    Edit,
}

/// Renders a [`DocumentLayout`] to an HTML fragment.
#[derive(Debug, Clone, Default)]
pub struct ScreenRenderer {
    mode: RenderMode,
    logo_src: Option<String>,
}

impl ScreenRenderer {
    pub fn new(mode: RenderMode) -> Self {
        Self {
            mode,
            logo_src: None,
        }
    }

    /// Use `src` for the logo `<img>` instead of the settings' logo URL (for
    /// example a served URL for a local `blob:` preview).
    pub fn with_logo_src(mut self, src: impl Into<String>) -> Self {
        self.logo_src = Some(src.into());
        self
    }

    pub fn render_html(&self, settings: &InvoiceSettings, layout: &DocumentLayout) -> String {
        let logo_src = self
            .logo_src
            .as_deref()
            .or_else(|| settings.logo())
            .unwrap_or_default();
        let editing = self.mode == RenderMode::Edit;

        let mut html = String::new();
        let _ = write!(html, "<style>{}</style>", STYLESHEET);
        let _ = write!(
            html,
            "<div class=\"invoice-preview\" style=\"font-family:{}\">",
            layout.font.css_stack()
        );
        for (index, page) in layout.pages.iter().enumerate() {
            let _ = write!(
                html,
                "<div class=\"invoice-sheet{}\" data-page=\"{}\" style=\"width:{}px;height:{}px\">",
                if editing { " editing" } else { "" },
                index + 1,
                num(layout.page_width),
                num(layout.page_height)
            );
            for block in &page.blocks {
                self.write_block(&mut html, settings, block, logo_src);
            }
            html.push_str("</div>");
        }
        html.push_str("</div>");
        html
    }

    fn write_block(&self, html: &mut String, settings: &InvoiceSettings, block: &Block, logo_src: &str) {
        let offset = block.key().map(|k| settings.offset(k)).unwrap_or(Offset::ZERO);
        html.push_str("<div class=\"block\"");
        if let Some(key) = block.key() {
            let _ = write!(html, " id=\"block-{}\"", key);
            if self.mode == RenderMode::Edit {
                let _ = write!(
                    html,
                    " data-block=\"{}\" data-offset-x=\"{}\" data-offset-y=\"{}\" data-snap=\"{}\"",
                    key,
                    num(offset.x),
                    num(offset.y),
                    num(SNAP)
                );
            }
        }
        let _ = write!(
            html,
            " style=\"left:{}px;top:{}px;width:{}px;height:{}px",
            num(block.rect.x),
            num(block.rect.y),
            num(block.rect.width),
            num(block.rect.height)
        );
        if !offset.is_zero() {
            let _ = write!(
                html,
                ";transform:translate({}px,{}px)",
                num(offset.x),
                num(offset.y)
            );
        }
        html.push_str("\">");

        for element in &block.elements {
            match element {
                Element::Text(run) => write_text(html, run),
                Element::Fill { rect, color, radius } => {
                    let _ = write!(
                        html,
                        "<div class=\"fill\" style=\"left:{}px;top:{}px;width:{}px;height:{}px;background:{};border-radius:{}px\"></div>",
                        num(rect.x),
                        num(rect.y),
                        num(rect.width),
                        num(rect.height),
                        color,
                        num(*radius)
                    );
                }
                Element::Rule { x1, x2, y, color, thickness } => {
                    let _ = write!(
                        html,
                        "<div class=\"rule\" style=\"left:{}px;top:{}px;width:{}px;height:{}px;background:{}\"></div>",
                        num(*x1),
                        num(*y),
                        num(x2 - x1),
                        num(*thickness),
                        color
                    );
                }
                Element::Logo { rect } => {
                    let _ = write!(
                        html,
                        "<img class=\"logo\" src=\"{}\" alt=\"{}\" draggable=\"false\" style=\"left:{}px;top:{}px;width:{}px;height:{}px\">",
                        escape_html(logo_src),
                        escape_html(&settings.company_name),
                        num(rect.x),
                        num(rect.y),
                        num(rect.width),
                        num(rect.height)
                    );
                }
            }
        }
        html.push_str("</div>");
    }
}

fn write_text(html: &mut String, run: &TextRun) {
    let _ = write!(
        html,
        "<div class=\"text\" style=\"left:{}px;top:{}px;width:{}px;font-size:{}px;line-height:{}px;font-weight:{};color:{};text-align:{}\">{}</div>",
        num(run.x),
        num(run.y),
        num(run.box_width),
        num(run.size),
        num(run.size * LINE_HEIGHT),
        if run.bold { 700 } else { 400 },
        run.color,
        run.align.css(),
        escape_html(&run.text)
    );
}

/// CSS number: at most two decimals, no trailing zeros.
fn num(v: f64) -> String {
    let s = format!("{:.2}", v + 0.0);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

/// Escape text for HTML content and double-quoted attributes.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ============================================================================
// INTERACTIVE PREVIEW
// ============================================================================

/// An edit-mode preview with a live drag session.
///
/// Offsets shown while dragging are local to the preview. Only pointer-up
/// reports back, through `on_layout_change`, once per axis that moved.
pub struct InteractivePreview<F>
where
    F: FnMut(BlockKey, LayoutChange),
{
    layout: DocumentLayout,
    offsets: LayoutOffsets,
    drag: DragController,
    on_layout_change: F,
}

impl<F> InteractivePreview<F>
where
    F: FnMut(BlockKey, LayoutChange),
{
    pub fn new(layout: DocumentLayout, offsets: LayoutOffsets, on_layout_change: F) -> Self {
        Self {
            layout,
            offsets,
            drag: DragController::new(),
            on_layout_change,
        }
    }

    pub fn offset(&self, key: BlockKey) -> Offset {
        self.offsets.get(key)
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    /// Start dragging `key`, measuring it against its sheet. Returns false
    /// when the block is not on the page or a drag is already running.
    pub fn pointer_down(&mut self, key: BlockKey, pointer: (f64, f64)) -> bool {
        let Some((_, block)) = self.layout.find(key) else {
            return false;
        };
        let bounds = DragBounds::new(block.rect, self.layout.page_width, self.layout.page_height);
        self.drag
            .pointer_down(key, pointer, self.offsets.get(key), bounds)
    }

    pub fn pointer_move(&mut self, pointer: (f64, f64)) -> bool {
        self.drag.pointer_move(pointer).is_some()
    }

    /// Apply the pending visual update, if any.
    pub fn animation_frame(&mut self) -> Option<Frame> {
        let frame = self.drag.animation_frame()?;
        self.offsets.set(frame.key, frame.offset);
        Some(frame)
    }

    /// Commit the drag and release the pointer.
    pub fn pointer_up(&mut self, pointer: (f64, f64)) {
        let Some(commit) = self.drag.pointer_up(pointer) else {
            return;
        };
        self.offsets.set(commit.key, commit.offset);
        for change in commit.changes {
            (self.on_layout_change)(commit.key, change);
        }
    }

    /// Edit-mode markup reflecting the local offsets.
    pub fn markup(&self, settings: &InvoiceSettings) -> String {
        let mut local = settings.clone();
        local.layout = self.offsets.clone();
        ScreenRenderer::new(RenderMode::Edit).render_html(&local, &self.layout)
    }
}
