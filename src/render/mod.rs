//! # Rendering Module
//!
//! Turns a [`DocumentLayout`](crate::layout::DocumentLayout) into something a
//! person can look at.
//!
//! ## Modules
//!
//! - [`screen`]: HTML preview, with draggable blocks in edit mode
//! - [`raster`]: bitmap of the screen layout at 2× or more
//! - [`print`]: paginated A4 document in points, written out as a PDF
//! - [`logo`]: logo reference resolution and tolerant loading
//!
//! ## Usage Example
//!
//! ```
//! use invoice_designer::document::{BillTo, InvoiceData, InvoiceSettings, LineItem};
//! use invoice_designer::render::print::PrintRenderer;
//!
//! let settings = InvoiceSettings::default();
//! let data = InvoiceData::new("INV-001", "1 March 2025", BillTo::default())
//!     .item(LineItem::new("Warranty cover", 1, 499.0));
//!
//! let document = PrintRenderer.render(&settings, &data, None);
//! let pdf = document.to_pdf()?;
//! assert!(pdf.starts_with(b"%PDF-"));
//! # Ok::<(), invoice_designer::InvoiceError>(())
//! ```

pub mod logo;
pub mod print;
pub mod raster;
pub mod screen;
