//! # Export Pipeline
//!
//! Produces `{invoiceNumber}.pdf` with one of two strategies:
//!
//! | Strategy | Pipeline |
//! |----------|----------|
//! | [`ExportStrategy::Vector`] | print renderer → paginated PDF with real text |
//! | [`ExportStrategy::Raster`] | screen layout → bitmap at ≥2× → one A4 page |
//!
//! Rendering is CPU-bound and runs on the blocking pool. Files are written
//! to a hidden temporary name in the target directory and renamed into
//! place, so a failed export never leaves a partial `.pdf` behind.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::document::{InvoiceData, InvoiceSettings};
use crate::error::InvoiceError;
use crate::layout::{self, Rect};
use crate::render::logo::LoadedLogo;
use crate::render::print::{PrintDocument, PrintOp, PrintPage, PrintRenderer};
use crate::render::raster::RasterRenderer;

/// How the PDF is produced.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ExportStrategy {
    /// Selectable text, paginated.
    #[default]
    Vector,
    /// Pixel-identical to the preview, single page.
    Raster,
}

impl ExportStrategy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vector" | "print" => Some(ExportStrategy::Vector),
            "raster" | "screen" | "image" => Some(ExportStrategy::Raster),
            _ => None,
        }
    }
}

/// A finished export held in memory.
#[derive(Debug, Clone)]
pub struct ExportedPdf {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// `{invoiceNumber}.pdf`, with path separators and control characters
/// replaced by `_`.
pub fn export_file_name(invoice_number: &str) -> String {
    let stem: String = invoice_number
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let stem = stem.trim_start_matches('.');
    if stem.is_empty() {
        "invoice.pdf".to_string()
    } else {
        format!("{}.pdf", stem)
    }
}

/// Render PDF bytes synchronously.
pub fn render_pdf(
    strategy: ExportStrategy,
    settings: &InvoiceSettings,
    data: &InvoiceData,
    logo: Option<&LoadedLogo>,
) -> Result<Vec<u8>, InvoiceError> {
    let document = match strategy {
        ExportStrategy::Vector => PrintRenderer.render(settings, data, logo),
        ExportStrategy::Raster => raster_document(settings, data, logo),
    };
    document.to_pdf()
}

/// The whole screen layout as one bitmap, fitted and centered on A4.
fn raster_document(
    settings: &InvoiceSettings,
    data: &InvoiceData,
    logo: Option<&LoadedLogo>,
) -> PrintDocument {
    let layout = layout::layout(settings, data, logo.map(LoadedLogo::size));
    let bitmap = RasterRenderer::default().render_stacked(settings, &layout, logo);

    let mut doc = PrintDocument::a4(format!("Invoice {}", data.invoice_number), layout.font);
    let (w, h) = (bitmap.width() as f64, bitmap.height() as f64);
    let scale = (doc.width / w).min(doc.height / h);
    let (fit_w, fit_h) = (w * scale, h * scale);
    let rect = Rect::new(
        (doc.width - fit_w) / 2.0,
        (doc.height - fit_h) / 2.0,
        fit_w,
        fit_h,
    );
    doc.images.push(bitmap);
    doc.pages.push(PrintPage {
        ops: vec![PrintOp::Image { rect, image: 0 }],
    });
    doc
}

/// Render on the blocking pool.
pub async fn export_bytes(
    strategy: ExportStrategy,
    settings: InvoiceSettings,
    data: InvoiceData,
    logo: Option<LoadedLogo>,
) -> Result<ExportedPdf, InvoiceError> {
    let file_name = export_file_name(&data.invoice_number);
    let bytes = tokio::task::spawn_blocking(move || {
        render_pdf(strategy, &settings, &data, logo.as_ref())
    })
    .await
    .map_err(|e| InvoiceError::Export(format!("rendering task failed: {}", e)))?
    .map_err(|e| match e {
        InvoiceError::Export(msg) => InvoiceError::Export(msg),
        other => InvoiceError::Export(other.to_string()),
    })?;

    info!("Exported {} ({:?}, {} bytes)", file_name, strategy, bytes.len());
    Ok(ExportedPdf { file_name, bytes })
}

/// Render and write `{invoiceNumber}.pdf` into `dir`. Returns the final path.
pub async fn export_to_dir(
    strategy: ExportStrategy,
    settings: InvoiceSettings,
    data: InvoiceData,
    logo: Option<LoadedLogo>,
    dir: &Path,
) -> Result<PathBuf, InvoiceError> {
    let pdf = export_bytes(strategy, settings, data, logo).await?;
    write_atomic(dir, &pdf.file_name, &pdf.bytes).await
}

/// Write through a hidden temp file and rename. The temp file is removed on
/// any failure.
pub async fn write_atomic(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf, InvoiceError> {
    let target = dir.join(file_name);
    let temp = dir.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    let result = async {
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&temp, bytes).await?;
        tokio::fs::rename(&temp, &target).await?;
        Ok::<_, std::io::Error>(())
    }
    .await;

    if let Err(e) = result {
        if let Err(cleanup) = tokio::fs::remove_file(&temp).await
            && cleanup.kind() != std::io::ErrorKind::NotFound
        {
            warn!("Could not remove {}: {}", temp.display(), cleanup);
        }
        return Err(InvoiceError::Export(format!(
            "could not write {}: {}",
            target.display(),
            e
        )));
    }
    Ok(target)
}
