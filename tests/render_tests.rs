//! # Rendering Tests
//!
//! End-to-end checks across the layout, the three renderers and export:
//! the same invoice must read the same in the preview, the bitmap and the PDF.

use invoice_designer::document::{
    BillTo, BlockKey, InvoiceData, InvoiceSettings, InvoiceVariant, LineItem, Offset, Vehicle,
};
use invoice_designer::export::{self, ExportStrategy};
use invoice_designer::layout::{self, BlockKind, DocumentLayout, Element};
use invoice_designer::render::print::{PrintOp, PrintRenderer};
use invoice_designer::render::raster::RasterRenderer;
use invoice_designer::render::screen::{RenderMode, ScreenRenderer};
use invoice_designer::units;
use pretty_assertions::assert_eq;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn warranty_invoice() -> InvoiceData {
    InvoiceData::new(
        "INV-2025-0042",
        "1 March 2025",
        BillTo {
            name: "Jane Doe".into(),
            address: Some("12 High Street, Leeds".into()),
            email: Some("jane@example.com".into()),
        },
    )
    .due("31 March 2025")
    .item(LineItem::new("Warranty cover, 12 months", 1, 499.0))
    .vehicle(Vehicle {
        make: "Ford".into(),
        model: "Focus".into(),
        year: 2019,
        vin: Some("WF0XXXGCDX1234567".into()),
        registration: Some("AB19 CDE".into()),
    })
    .coverage("12 months")
}

fn settlement_invoice() -> InvoiceData {
    InvoiceData::new("SET-7", "1 March 2025", BillTo { name: "Dealer Ltd".into(), ..Default::default() })
        .item(LineItem::new("Gold cover", 1, 500.0).with_cost(350.0))
        .variant(InvoiceVariant::Settlement)
}

fn all_texts(layout: &DocumentLayout) -> Vec<String> {
    layout
        .blocks()
        .flat_map(|(_, b)| b.texts().map(|t| t.text.clone()))
        .collect()
}

/// The value printed on the same line as `label` inside the totals block.
fn totals_value(layout: &DocumentLayout, label: &str) -> Option<String> {
    let (_, totals) = layout.blocks().find(|(_, b)| b.kind == BlockKind::Totals)?;
    let row = totals.texts().find(|t| t.text == label)?;
    totals
        .texts()
        .find(|t| t.y == row.y && t.text != label)
        .map(|t| t.text.clone())
}

// ============================================================================
// LAYOUT
// ============================================================================

#[test]
fn test_warranty_invoice_reads_correctly() {
    let layout = layout::layout(&InvoiceSettings::default(), &warranty_invoice(), None);
    let texts = all_texts(&layout);

    assert!(texts.iter().any(|t| t == "INVOICE"));
    assert!(texts.iter().any(|t| t == "Invoice #: INV-2025-0042"));
    assert_eq!(texts.iter().filter(|t| *t == "Total").count(), 1);
    assert_eq!(totals_value(&layout, "Total").as_deref(), Some("£499.00"));
    assert_eq!(totals_value(&layout, "Subtotal").as_deref(), Some("£499.00"));
    assert!(texts.iter().any(|t| t == "Coverage: 12 months"));
    assert!(texts.iter().any(|t| t.contains("Ford Focus")));
    assert_eq!(layout.pages.len(), 1);
}

#[test]
fn test_settlement_shows_dealer_cost_and_margin() {
    let layout = layout::layout(&InvoiceSettings::default(), &settlement_invoice(), None);
    let (_, table) = layout
        .blocks()
        .find(|(_, b)| b.kind == BlockKind::ItemTable)
        .expect("item table");
    let texts: Vec<&str> = table.texts().map(|t| t.text.as_str()).collect();

    assert!(texts.contains(&"Dealer Cost"));
    assert!(texts.contains(&"£350.00"));
    assert!(texts.contains(&"Customer price: £500.00, margin: £150.00"));
}

#[test]
fn test_layout_ignores_offsets() {
    let mut moved = InvoiceSettings::default();
    moved.layout.set(BlockKey::BillTo, Offset::new(40.0, -15.0));
    let data = warranty_invoice();
    assert_eq!(
        layout::layout(&moved, &data, None),
        layout::layout(&InvoiceSettings::default(), &data, None)
    );
}

// ============================================================================
// RENDERERS
// ============================================================================

#[test]
fn test_screen_and_print_agree_on_offsets() {
    let mut settings = InvoiceSettings::default();
    settings.layout.set(BlockKey::CompanyInfo, Offset::new(20.0, 10.0));
    let data = warranty_invoice();

    let layout = layout::layout(&settings, &data, None);
    let html = ScreenRenderer::new(RenderMode::View).render_html(&settings, &layout);
    assert!(html.contains("transform:translate(20px,10px)"));

    let print = PrintRenderer.render(&settings, &data, None);
    let moved = print.pages[0]
        .ops
        .iter()
        .find_map(|op| match op {
            PrintOp::Text { x, baseline, text, .. } if *text == settings.company_name => {
                Some((*x, *baseline))
            }
            _ => None,
        })
        .expect("company name in print output");

    let base = PrintRenderer
        .render(&InvoiceSettings::default(), &data, None)
        .pages[0]
        .ops
        .iter()
        .find_map(|op| match op {
            PrintOp::Text { x, baseline, text, .. } if *text == settings.company_name => {
                Some((*x, *baseline))
            }
            _ => None,
        })
        .expect("company name in print output");

    assert!((moved.0 - base.0 - units::to_points(20.0)).abs() < 1e-6);
    assert!((moved.1 - base.1 - units::to_points(10.0)).abs() < 1e-6);
}

#[test]
fn test_printed_warranty_invoice_reads_correctly() {
    let mut data = warranty_invoice();
    data.subtotal = Some(499.0);
    data.total = Some(499.0);
    let doc = PrintRenderer.render(&InvoiceSettings::default(), &data, None);
    assert_eq!(doc.pages.len(), 1);

    let texts: Vec<(f64, &str)> = doc.pages[0]
        .ops
        .iter()
        .filter_map(|op| match op {
            PrintOp::Text { baseline, text, .. } => Some((*baseline, text.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(texts.iter().filter(|(_, t)| *t == "INVOICE").count(), 1);

    let totals: Vec<f64> = texts
        .iter()
        .filter(|(_, t)| *t == "Total")
        .map(|(baseline, _)| *baseline)
        .collect();
    assert_eq!(totals.len(), 1);
    let on_total_row: Vec<&str> = texts
        .iter()
        .filter(|(baseline, t)| (*baseline - totals[0]).abs() < 1e-6 && *t != "Total")
        .map(|(_, t)| *t)
        .collect();
    assert!(on_total_row.contains(&"£499.00"), "{:?}", on_total_row);
}

#[test]
fn test_print_settlement_totals() {
    let doc = PrintRenderer.render(&InvoiceSettings::default(), &settlement_invoice(), None);
    let texts: Vec<&str> = doc.pages.iter().flat_map(|p| p.texts()).collect();
    assert!(texts.contains(&"£350.00"));
    assert!(texts.contains(&"Total"));
    assert!(texts.contains(&"£500.00"));
}

#[test]
fn test_raster_is_at_least_double_resolution() {
    let settings = InvoiceSettings::default();
    let layout = layout::layout(&settings, &warranty_invoice(), None);
    let renderer = RasterRenderer::new(1);
    assert_eq!(renderer.scale(), 2);
    let pages = renderer.render(&settings, &layout, None);
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].width(), layout.page_width as u32 * 2);
}

#[test]
fn test_every_block_is_on_a_page() {
    let data = (0..80).fold(warranty_invoice(), |d, i| {
        d.item(LineItem::new(format!("Service item {}", i), 1, 10.0))
    });
    let layout = layout::layout(&InvoiceSettings::default(), &data, None);
    assert!(layout.pages.len() > 1);
    for page in &layout.pages {
        assert!(page.block(BlockKey::Footer).is_some());
        for block in &page.blocks {
            assert!(block.rect.bottom() <= layout.page_height);
            assert!(block.rect.y >= 0.0);
        }
    }
    let item_rows = layout
        .blocks()
        .filter(|(_, b)| b.kind == BlockKind::ItemTable)
        .flat_map(|(_, b)| b.elements.iter())
        .filter(|e| matches!(e, Element::Text(t) if t.text.starts_with("Service item")))
        .count();
    assert_eq!(item_rows, 80);
}

// ============================================================================
// EXPORT
// ============================================================================

#[test]
fn test_both_strategies_produce_pdf() {
    for strategy in [ExportStrategy::Vector, ExportStrategy::Raster] {
        let bytes = export::render_pdf(
            strategy,
            &InvoiceSettings::default(),
            &warranty_invoice(),
            None,
        )
        .unwrap();
        assert!(bytes.starts_with(b"%PDF"), "{:?}", strategy);
    }
}

#[tokio::test]
async fn test_export_file_named_after_invoice() {
    let dir = std::env::temp_dir().join(format!("render-tests-{}", uuid::Uuid::new_v4()));
    let path = export::export_to_dir(
        ExportStrategy::Vector,
        InvoiceSettings::default(),
        warranty_invoice(),
        None,
        &dir,
    )
    .await
    .unwrap();
    assert_eq!(path, dir.join("INV-2025-0042.pdf"));
    let _ = std::fs::remove_dir_all(&dir);
}
