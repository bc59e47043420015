//! # Invoice Document Model
//!
//! Two serializable halves make up every rendered invoice:
//!
//! - [`InvoiceSettings`]: the tenant template (branding, colors, font, fixed
//!   text and one pixel offset per positionable block).
//! - [`InvoiceData`]: the immutable per-invoice content.
//!
//! ```
//! use invoice_designer::document::*;
//!
//! let settings: InvoiceSettings =
//!     serde_json::from_str(r##"{"primaryColor": "#0f172a", "headerText": "INVOICE"}"##).unwrap();
//! let data = InvoiceData::new("INV-001", "1 March 2025", BillTo { name: "Jane".into(), ..Default::default() })
//!     .item(LineItem::new("Warranty Package", 1, 499.0));
//!
//! assert_eq!(settings.header_text, "INVOICE");
//! assert_eq!(data.total(), 499.0);
//! ```
//!
//! Validation happens when settings are edited ([`SettingsEdit::apply`]),
//! never inside the renderers.

mod data;
pub mod money;
mod settings;
mod validate;

pub use data::{BillTo, InvoiceData, InvoiceVariant, LineItem, Vehicle};
pub use money::format_money;
pub use settings::{
    BlockKey, DEFAULT_ACCENT, DEFAULT_PRIMARY, FontFace, InvoiceSettings, LayoutOffsets, Offset,
    merge_layout_overrides,
};
pub use validate::{SettingsEdit, ValidationError, validate_settings};
