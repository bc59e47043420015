//! # Invoice Designer - Invoice Layout and PDF Export Engine
//!
//! Invoice Designer renders a tenant's invoice template against per-invoice
//! data, lets the template be edited visually, and exports PDFs. It provides:
//!
//! - **Document model**: tenant settings with per-block layout offsets
//! - **Layout**: one flow shared by every renderer, paginated on A4
//! - **Rendering**: HTML preview, bitmap preview and vector print output
//! - **Export**: `{invoiceNumber}.pdf`, vector or rasterized
//! - **Designer**: editing session with logo selection, drag commits and save
//!
//! ## Quick Start
//!
//! ```no_run
//! use invoice_designer::{
//!     document::{BillTo, InvoiceData, InvoiceSettings, LineItem},
//!     export::{self, ExportStrategy},
//! };
//!
//! # async fn example() -> Result<(), invoice_designer::InvoiceError> {
//! let settings = InvoiceSettings::default();
//! let data = InvoiceData::new("INV-001", "1 March 2025", BillTo {
//!     name: "Jane Doe".into(),
//!     ..Default::default()
//! })
//! .item(LineItem::new("Warranty cover, 12 months", 1, 499.0));
//!
//! let path = export::export_to_dir(
//!     ExportStrategy::Vector,
//!     settings,
//!     data,
//!     None,
//!     std::path::Path::new("out"),
//! )
//! .await?;
//! println!("wrote {}", path.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`units`] | CSS pixel ↔ PDF point conversion |
//! | [`palette`] | Logo color extraction and theme suggestions |
//! | [`document`] | Settings, invoice data and edit validation |
//! | [`layout`] | Block layout and pagination |
//! | [`render`] | Screen, raster and print renderers |
//! | [`export`] | PDF export pipeline |
//! | [`designer`] | Editing session, drag controller and persistence seams |
//! | [`server`] | HTTP surface |
//! | [`error`] | Error types |

pub mod color;
pub mod designer;
pub mod document;
pub mod error;
pub mod export;
pub mod layout;
pub mod palette;
pub mod render;
pub mod server;
pub mod units;

// Re-exports for convenience
pub use designer::{Designer, DesignerServices};
pub use document::{InvoiceData, InvoiceSettings};
pub use error::InvoiceError;
pub use export::ExportStrategy;
