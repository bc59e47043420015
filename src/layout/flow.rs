//! Document-flow placement of the invoice blocks.
//!
//! ## Page structure
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ [logo]                           INVOICE     │
//! │ Company name                  Invoice #: … │
//! │ Address                            Date: … │
//! │                                              │
//! │ BILL TO                   ( Coverage: … )  │
//! │ Customer                                     │
//! │ ┌ Vehicle ─────────────────────────────────┐ │
//! │ └──────────────────────────────────────────┘ │
//! │ ███ Description ██████ Qty ████ Amount ████ │
//! │ row …                                      │
//! │                              Subtotal   …  │
//! │                              Total      …  │
//! │                                              │
//! │ Notes                Terms                   │  ◄─ anchored to the
//! │ ──────────────────────────────────────────── │     bottom margin
//! │                 footer text                  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Item rows that would run into the footer region continue on a new page
//! with the table header repeated. The footer text is on every page; notes
//! and terms only on the last.

use super::metrics::{self, LINE_HEIGHT};
use super::{
    Align, Block, BlockKind, CONTENT_WIDTH, DocumentLayout, Element, MARGIN, PAGE_HEIGHT,
    PAGE_WIDTH, Page, Rect, TextRun,
};
use crate::color::Rgb;
use crate::document::{
    BlockKey, FontFace, InvoiceData, InvoiceSettings, InvoiceVariant, LineItem, format_money,
};

const TEXT: Rgb = Rgb::new(0x1f, 0x29, 0x37);
const MUTED: Rgb = Rgb::new(0x47, 0x55, 0x69);
const SUBTLE: Rgb = Rgb::new(0x64, 0x74, 0x8b);
const RULE: Rgb = Rgb::new(0xe2, 0xe8, 0xf0);
const PANEL: Rgb = Rgb::new(0xf1, 0xf5, 0xf9);

const LOGO_MAX_WIDTH: f64 = 180.0;
const LOGO_MAX_HEIGHT: f64 = 72.0;
const LEFT_COLUMN: f64 = 340.0;
const INFO_WIDTH: f64 = 280.0;
const TOTALS_WIDTH: f64 = 260.0;
const COLUMN_GAP: f64 = 32.0;
const SECTION_GAP: f64 = 24.0;

const HEADER_ROW_HEIGHT: f64 = 28.0;
const CELL_PAD_X: f64 = 10.0;
const CELL_PAD_Y: f64 = 10.0;
const DESC_WIDTH: f64 = 400.0;
const QTY_X: f64 = 420.0;
const QTY_WIDTH: f64 = 70.0;
const AMOUNT_WIDTH: f64 = 170.0;

const BODY_SIZE: f64 = 12.0;
const SMALL_SIZE: f64 = 11.0;
const NOTE_SIZE: f64 = 10.0;

/// Lay out `data` with `settings`. `logo_size` is the decoded logo's pixel
/// size; `None` leaves the logo block out.
pub fn layout(
    settings: &InvoiceSettings,
    data: &InvoiceData,
    logo_size: Option<(u32, u32)>,
) -> DocumentLayout {
    let face = settings.font;
    let primary = settings.primary();
    let accent = settings.accent();

    let mut first = Page::default();

    // Header: logo and company block on the left, invoice info on the right.
    let mut company_top = MARGIN;
    if let Some((w, h)) = logo_size.filter(|&(w, h)| w > 0 && h > 0) {
        let scale = (LOGO_MAX_WIDTH / w as f64).min(LOGO_MAX_HEIGHT / h as f64);
        let (lw, lh) = (w as f64 * scale, h as f64 * scale);
        first.blocks.push(Block {
            kind: BlockKind::Positioned(BlockKey::Logo),
            rect: Rect::new(MARGIN, MARGIN, lw, lh),
            elements: vec![Element::Logo {
                rect: Rect::new(0.0, 0.0, lw, lh),
            }],
        });
        company_top += lh + 12.0;
    }

    let mut company = Stack::new(face, LEFT_COLUMN);
    company.wrapped(&settings.company_name, 18.0, true, primary, Align::Left);
    company.gap(4.0);
    company.wrapped(&settings.company_address, SMALL_SIZE, false, MUTED, Align::Left);
    let company = company.into_block(
        BlockKind::Positioned(BlockKey::CompanyInfo),
        MARGIN,
        company_top,
    );

    let mut info = Stack::new(face, INFO_WIDTH);
    info.wrapped(&settings.header_text, 28.0, true, primary, Align::Right);
    info.gap(6.0);
    info.line(
        &format!("Invoice #: {}", data.invoice_number),
        SMALL_SIZE,
        false,
        MUTED,
        Align::Right,
    );
    info.line(&format!("Date: {}", data.issue_date), SMALL_SIZE, false, MUTED, Align::Right);
    if let Some(due) = &data.due_date {
        info.line(&format!("Due: {}", due), SMALL_SIZE, false, MUTED, Align::Right);
    }
    let info = info.into_block(
        BlockKind::Positioned(BlockKey::InvoiceInfo),
        PAGE_WIDTH - MARGIN - INFO_WIDTH,
        MARGIN,
    );

    let header_bottom = company.rect.bottom().max(info.rect.bottom()) + 28.0;
    first.blocks.push(company);
    first.blocks.push(info);

    // Bill-to and coverage badge.
    let mut bill = Stack::new(face, LEFT_COLUMN);
    bill.line(&settings.bill_to_title, SMALL_SIZE, true, accent, Align::Left);
    bill.gap(2.0);
    bill.wrapped(&data.bill_to.name, 13.0, true, TEXT, Align::Left);
    if let Some(address) = &data.bill_to.address {
        bill.wrapped(address, SMALL_SIZE, false, MUTED, Align::Left);
    }
    if let Some(email) = &data.bill_to.email {
        bill.line(email, SMALL_SIZE, false, MUTED, Align::Left);
    }
    let bill = bill.into_block(
        BlockKind::Positioned(BlockKey::BillTo),
        MARGIN,
        header_bottom,
    );
    let mut y = bill.rect.bottom();
    first.blocks.push(bill);

    if let Some(label) = &data.coverage_duration {
        let badge = coverage_badge(face, label, accent, header_bottom);
        y = y.max(badge.rect.bottom());
        first.blocks.push(badge);
    }
    y += SECTION_GAP;

    if let Some(vehicle) = &data.vehicle {
        let mut panel = Stack::inset(face, CONTENT_WIDTH, 12.0);
        panel.line("Vehicle", NOTE_SIZE, true, accent, Align::Left);
        panel.gap(2.0);
        panel.line(&vehicle.title(), BODY_SIZE, true, TEXT, Align::Left);
        let details: Vec<String> = [
            vehicle.vin.as_ref().map(|v| format!("VIN: {}", v)),
            vehicle
                .registration
                .as_ref()
                .map(|r| format!("Registration: {}", r)),
        ]
        .into_iter()
        .flatten()
        .collect();
        if !details.is_empty() {
            panel.line(&details.join("    "), SMALL_SIZE, false, MUTED, Align::Left);
        }
        let block = panel.into_panel(BlockKind::Vehicle, MARGIN, y, PANEL);
        y = block.rect.bottom() + SECTION_GAP;
        first.blocks.push(block);
    }

    // Bottom-anchored region, measured up front so the table knows its limit.
    let footer = footer_block(face, &settings.footer_text);
    let mut notes = Stack::new(face, (CONTENT_WIDTH - COLUMN_GAP) / 2.0);
    notes.line(&settings.notes_heading, SMALL_SIZE, true, primary, Align::Left);
    notes.gap(2.0);
    notes.wrapped(&settings.notes_body, NOTE_SIZE, false, MUTED, Align::Left);
    let terms = (!settings.terms_body.trim().is_empty()).then(|| {
        let mut terms = Stack::new(face, (CONTENT_WIDTH - COLUMN_GAP) / 2.0);
        terms.line(&settings.terms_heading, SMALL_SIZE, true, primary, Align::Left);
        terms.gap(2.0);
        terms.wrapped(&settings.terms_body, NOTE_SIZE, false, MUTED, Align::Left);
        terms
    });
    let region_height = notes
        .height()
        .max(terms.as_ref().map_or(0.0, Stack::height));
    let region_top = footer.rect.y - 20.0 - region_height;
    let limit = region_top - 20.0;

    let notes = notes.into_block(BlockKind::Positioned(BlockKey::Notes), MARGIN, region_top);
    let terms = terms.map(|t| {
        t.into_block(
            BlockKind::Positioned(BlockKey::Terms),
            MARGIN + (CONTENT_WIDTH + COLUMN_GAP) / 2.0,
            region_top,
        )
    });

    // Item table, paginated.
    let mut pages = vec![first];
    let mut table = TableBuilder::start(data.variant, primary, y);
    for item in &data.items {
        let row = item_row(face, data.variant, item);
        if table.rows > 0 && table.bottom() + row.height > limit {
            push_block(&mut pages, table.finish());
            pages.push(Page::default());
            table = TableBuilder::start(data.variant, primary, MARGIN);
        }
        table.push(row);
    }
    y = table.bottom() + 16.0;
    push_block(&mut pages, table.finish());

    // Totals.
    let mut totals = Stack::new(face, TOTALS_WIDTH);
    totals.pair("Subtotal", &format_money(data.subtotal()), BODY_SIZE, false, MUTED);
    totals.gap(6.0);
    totals.rule(RULE);
    totals.gap(6.0);
    totals.pair("Total", &format_money(data.total()), 14.0, true, primary);
    if y + totals.height() > limit {
        pages.push(Page::default());
        y = MARGIN;
    }
    push_block(
        &mut pages,
        totals.into_block(BlockKind::Totals, PAGE_WIDTH - MARGIN - TOTALS_WIDTH, y),
    );

    push_block(&mut pages, notes);
    if let Some(terms) = terms {
        push_block(&mut pages, terms);
    }
    for page in &mut pages {
        page.blocks.push(footer.clone());
    }

    DocumentLayout {
        font: face,
        page_width: PAGE_WIDTH,
        page_height: PAGE_HEIGHT,
        pages,
    }
}

fn push_block(pages: &mut [Page], block: Block) {
    if let Some(page) = pages.last_mut() {
        page.blocks.push(block);
    }
}

fn coverage_badge(face: FontFace, label: &str, accent: Rgb, top: f64) -> Block {
    let text = format!("Coverage: {}", label);
    let text_width = metrics::text_width(face, true, SMALL_SIZE, &text);
    let width = text_width + 28.0;
    let height = SMALL_SIZE * LINE_HEIGHT + 14.0;
    Block {
        kind: BlockKind::Positioned(BlockKey::DurationBadge),
        rect: Rect::new(PAGE_WIDTH - MARGIN - width, top, width, height),
        elements: vec![
            Element::Fill {
                rect: Rect::new(0.0, 0.0, width, height),
                color: accent,
                radius: height / 2.0,
            },
            Element::Text(TextRun {
                x: 14.0,
                y: 7.0,
                box_width: text_width,
                text,
                size: SMALL_SIZE,
                bold: true,
                color: Rgb::WHITE,
                align: Align::Left,
            }),
        ],
    }
}

fn footer_block(face: FontFace, text: &str) -> Block {
    let mut stack = Stack::new(face, CONTENT_WIDTH);
    stack.rule(RULE);
    stack.gap(10.0);
    stack.wrapped(text, NOTE_SIZE, false, SUBTLE, Align::Center);
    let top = PAGE_HEIGHT - MARGIN - stack.height();
    stack.into_block(BlockKind::Positioned(BlockKey::Footer), MARGIN, top)
}

// ============================================================================
// ITEM TABLE
// ============================================================================

struct Row {
    elements: Vec<Element>,
    height: f64,
}

fn item_row(face: FontFace, variant: InvoiceVariant, item: &LineItem) -> Row {
    let (displayed, annotation) = match variant {
        InvoiceVariant::Customer => (item.amount, None),
        InvoiceVariant::Settlement => match item.cost {
            Some(cost) => (
                cost,
                Some(format!(
                    "Customer price: {}, margin: {}",
                    format_money(item.amount),
                    format_money(item.amount - cost)
                )),
            ),
            None => (item.amount, None),
        },
    };

    let mut desc = Stack::new(face, DESC_WIDTH);
    desc.wrapped(&item.description, BODY_SIZE, false, TEXT, Align::Left);
    if let Some(note) = &annotation {
        desc.gap(2.0);
        desc.wrapped(note, NOTE_SIZE, false, SUBTLE, Align::Left);
    }
    let height = desc.height() + 2.0 * CELL_PAD_Y;

    let mut elements: Vec<Element> = desc
        .elements
        .into_iter()
        .map(|e| shift(e, CELL_PAD_X, CELL_PAD_Y))
        .collect();
    elements.push(cell(&item.quantity.to_string(), QTY_X, QTY_WIDTH, Align::Center));
    elements.push(cell(
        &format_money(displayed),
        CONTENT_WIDTH - CELL_PAD_X - AMOUNT_WIDTH,
        AMOUNT_WIDTH,
        Align::Right,
    ));
    elements.push(Element::Rule {
        x1: 0.0,
        x2: CONTENT_WIDTH,
        y: height,
        color: RULE,
        thickness: 1.0,
    });

    Row { elements, height }
}

fn cell(text: &str, x: f64, width: f64, align: Align) -> Element {
    Element::Text(TextRun {
        x,
        y: CELL_PAD_Y,
        box_width: width,
        text: text.to_string(),
        size: BODY_SIZE,
        bold: false,
        color: TEXT,
        align,
    })
}

fn shift(element: Element, dx: f64, dy: f64) -> Element {
    match element {
        Element::Text(mut t) => {
            t.x += dx;
            t.y += dy;
            Element::Text(t)
        }
        Element::Fill { rect, color, radius } => Element::Fill {
            rect: rect.translate(dx, dy),
            color,
            radius,
        },
        Element::Rule { x1, x2, y, color, thickness } => Element::Rule {
            x1: x1 + dx,
            x2: x2 + dx,
            y: y + dy,
            color,
            thickness,
        },
        Element::Logo { rect } => Element::Logo {
            rect: rect.translate(dx, dy),
        },
    }
}

/// Accumulates the header row and item rows of one page's table.
struct TableBuilder {
    top: f64,
    height: f64,
    rows: usize,
    elements: Vec<Element>,
}

impl TableBuilder {
    fn start(variant: InvoiceVariant, primary: Rgb, top: f64) -> Self {
        let amount_label = match variant {
            InvoiceVariant::Customer => "Amount",
            InvoiceVariant::Settlement => "Dealer Cost",
        };
        let y = (HEADER_ROW_HEIGHT - SMALL_SIZE * LINE_HEIGHT) / 2.0;
        let header = |text: &str, x: f64, width: f64, align: Align| {
            Element::Text(TextRun {
                x,
                y,
                box_width: width,
                text: text.to_string(),
                size: SMALL_SIZE,
                bold: true,
                color: Rgb::WHITE,
                align,
            })
        };
        let elements = vec![
            Element::Fill {
                rect: Rect::new(0.0, 0.0, CONTENT_WIDTH, HEADER_ROW_HEIGHT),
                color: primary,
                radius: 0.0,
            },
            header("Description", CELL_PAD_X, DESC_WIDTH, Align::Left),
            header("Qty", QTY_X, QTY_WIDTH, Align::Center),
            header(
                amount_label,
                CONTENT_WIDTH - CELL_PAD_X - AMOUNT_WIDTH,
                AMOUNT_WIDTH,
                Align::Right,
            ),
        ];
        Self {
            top,
            height: HEADER_ROW_HEIGHT,
            rows: 0,
            elements,
        }
    }

    fn push(&mut self, row: Row) {
        let offset = self.height;
        self.elements
            .extend(row.elements.into_iter().map(|e| shift(e, 0.0, offset)));
        self.height += row.height;
        self.rows += 1;
    }

    fn bottom(&self) -> f64 {
        self.top + self.height
    }

    fn finish(self) -> Block {
        Block {
            kind: BlockKind::ItemTable,
            rect: Rect::new(MARGIN, self.top, CONTENT_WIDTH, self.height),
            elements: self.elements,
        }
    }
}

// ============================================================================
// TEXT STACKS
// ============================================================================

/// Vertical stack of lines inside a fixed-width column.
struct Stack {
    face: FontFace,
    width: f64,
    inset: f64,
    y: f64,
    elements: Vec<Element>,
}

impl Stack {
    fn new(face: FontFace, width: f64) -> Self {
        Self::inset(face, width, 0.0)
    }

    fn inset(face: FontFace, width: f64, inset: f64) -> Self {
        Self {
            face,
            width,
            inset,
            y: inset,
            elements: Vec::new(),
        }
    }

    fn inner_width(&self) -> f64 {
        self.width - 2.0 * self.inset
    }

    fn run(&self, text: &str, size: f64, bold: bool, color: Rgb, align: Align) -> TextRun {
        TextRun {
            x: self.inset,
            y: self.y,
            box_width: self.inner_width(),
            text: text.to_string(),
            size,
            bold,
            color,
            align,
        }
    }

    fn line(&mut self, text: &str, size: f64, bold: bool, color: Rgb, align: Align) {
        let run = self.run(text, size, bold, color, align);
        self.elements.push(Element::Text(run));
        self.y += size * LINE_HEIGHT;
    }

    fn wrapped(&mut self, text: &str, size: f64, bold: bool, color: Rgb, align: Align) {
        for line in metrics::wrap(self.face, bold, size, text, self.inner_width()) {
            self.line(&line, size, bold, color, align);
        }
    }

    /// Label on the left, value on the right, same line.
    fn pair(&mut self, label: &str, value: &str, size: f64, bold: bool, color: Rgb) {
        let label = self.run(label, size, bold, color, Align::Left);
        let value = self.run(value, size, bold, color, Align::Right);
        self.elements.push(Element::Text(label));
        self.elements.push(Element::Text(value));
        self.y += size * LINE_HEIGHT;
    }

    fn rule(&mut self, color: Rgb) {
        self.elements.push(Element::Rule {
            x1: self.inset,
            x2: self.width - self.inset,
            y: self.y,
            color,
            thickness: 1.0,
        });
        self.y += 1.0;
    }

    fn gap(&mut self, height: f64) {
        self.y += height;
    }

    fn height(&self) -> f64 {
        self.y + self.inset
    }

    fn into_block(self, kind: BlockKind, x: f64, y: f64) -> Block {
        let height = self.height();
        Block {
            kind,
            rect: Rect::new(x, y, self.width, height),
            elements: self.elements,
        }
    }

    /// Like [`Stack::into_block`] with a rounded background fill behind the lines.
    fn into_panel(self, kind: BlockKind, x: f64, y: f64, fill: Rgb) -> Block {
        let width = self.width;
        let mut block = self.into_block(kind, x, y);
        block.elements.insert(
            0,
            Element::Fill {
                rect: Rect::new(0.0, 0.0, width, block.rect.height),
                color: fill,
                radius: 6.0,
            },
        );
        block
    }
}
