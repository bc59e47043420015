//! Tenant-level invoice template: branding, layout offsets, appearance and
//! the fixed text content.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::color::{self, Rgb};

/// The fixed set of independently offsettable layout blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockKey {
    Logo,
    CompanyInfo,
    InvoiceInfo,
    BillTo,
    DurationBadge,
    Notes,
    Terms,
    Footer,
}

impl BlockKey {
    pub const ALL: [BlockKey; 8] = [
        BlockKey::Logo,
        BlockKey::CompanyInfo,
        BlockKey::InvoiceInfo,
        BlockKey::BillTo,
        BlockKey::DurationBadge,
        BlockKey::Notes,
        BlockKey::Terms,
        BlockKey::Footer,
    ];

    /// The camelCase key used in JSON and markup attributes.
    pub fn as_str(self) -> &'static str {
        match self {
            BlockKey::Logo => "logo",
            BlockKey::CompanyInfo => "companyInfo",
            BlockKey::InvoiceInfo => "invoiceInfo",
            BlockKey::BillTo => "billTo",
            BlockKey::DurationBadge => "durationBadge",
            BlockKey::Notes => "notes",
            BlockKey::Terms => "terms",
            BlockKey::Footer => "footer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A (dx, dy) displacement in screen pixels. Unconstrained: may be negative
/// or push a block off the page.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Offset {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

impl Offset {
    pub const ZERO: Offset = Offset { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

/// One offset per positionable block. Missing entries deserialize as zero.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutOffsets {
    pub logo: Offset,
    pub company_info: Offset,
    pub invoice_info: Offset,
    pub bill_to: Offset,
    pub duration_badge: Offset,
    pub notes: Offset,
    pub terms: Offset,
    pub footer: Offset,
}

impl LayoutOffsets {
    pub fn get(&self, key: BlockKey) -> Offset {
        match key {
            BlockKey::Logo => self.logo,
            BlockKey::CompanyInfo => self.company_info,
            BlockKey::InvoiceInfo => self.invoice_info,
            BlockKey::BillTo => self.bill_to,
            BlockKey::DurationBadge => self.duration_badge,
            BlockKey::Notes => self.notes,
            BlockKey::Terms => self.terms,
            BlockKey::Footer => self.footer,
        }
    }

    pub fn get_mut(&mut self, key: BlockKey) -> &mut Offset {
        match key {
            BlockKey::Logo => &mut self.logo,
            BlockKey::CompanyInfo => &mut self.company_info,
            BlockKey::InvoiceInfo => &mut self.invoice_info,
            BlockKey::BillTo => &mut self.bill_to,
            BlockKey::DurationBadge => &mut self.duration_badge,
            BlockKey::Notes => &mut self.notes,
            BlockKey::Terms => &mut self.terms,
            BlockKey::Footer => &mut self.footer,
        }
    }

    pub fn set(&mut self, key: BlockKey, offset: Offset) {
        *self.get_mut(key) = offset;
    }

    pub fn is_zero(&self) -> bool {
        BlockKey::ALL.iter().all(|&k| self.get(k).is_zero())
    }
}

/// Named font faces the renderers know metrics for.
///
/// Serialized by display name. Unknown names deserialize to the default face
/// so an old or hand-edited settings file still renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FontFace {
    #[default]
    Helvetica,
    TimesRoman,
    Courier,
}

impl FontFace {
    pub const ALL: [FontFace; 3] = [FontFace::Helvetica, FontFace::TimesRoman, FontFace::Courier];

    pub fn name(self) -> &'static str {
        match self {
            FontFace::Helvetica => "Helvetica",
            FontFace::TimesRoman => "Times-Roman",
            FontFace::Courier => "Courier",
        }
    }

    /// Case-insensitive lookup; accepts a few common aliases.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "helvetica" | "arial" | "sans-serif" => Some(FontFace::Helvetica),
            "times-roman" | "times" | "times new roman" | "serif" => Some(FontFace::TimesRoman),
            "courier" | "courier new" | "monospace" => Some(FontFace::Courier),
            _ => None,
        }
    }

    /// CSS `font-family` stack for the screen renderer.
    pub fn css_stack(self) -> &'static str {
        match self {
            FontFace::Helvetica => "Helvetica, Arial, sans-serif",
            FontFace::TimesRoman => "'Times New Roman', Times, serif",
            FontFace::Courier => "'Courier New', Courier, monospace",
        }
    }

    /// Standard 14 PDF base font name.
    pub fn pdf_base_font(self, bold: bool) -> &'static str {
        match (self, bold) {
            (FontFace::Helvetica, false) => "Helvetica",
            (FontFace::Helvetica, true) => "Helvetica-Bold",
            (FontFace::TimesRoman, false) => "Times-Roman",
            (FontFace::TimesRoman, true) => "Times-Bold",
            (FontFace::Courier, false) => "Courier",
            (FontFace::Courier, true) => "Courier-Bold",
        }
    }
}

impl Serialize for FontFace {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for FontFace {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(FontFace::parse(&name).unwrap_or_default())
    }
}

/// Default primary color (slate 900).
pub const DEFAULT_PRIMARY: &str = "#0f172a";

/// Default accent color (blue 600).
pub const DEFAULT_ACCENT: &str = "#2563eb";

/// Tenant invoice template.
///
/// Created with [`Default`] on first use, mutated through the designer, and
/// persisted on explicit save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvoiceSettings {
    pub company_name: String,
    pub company_address: String,
    /// URL, relative path, or `blob:` preview reference.
    pub logo_url: Option<String>,
    pub layout: LayoutOffsets,
    pub primary_color: String,
    pub accent_color: String,
    pub font: FontFace,
    pub header_text: String,
    pub bill_to_title: String,
    pub notes_heading: String,
    pub notes_body: String,
    pub terms_heading: String,
    /// May be empty; the terms block is then left out.
    pub terms_body: String,
    pub footer_text: String,
}

impl Default for InvoiceSettings {
    fn default() -> Self {
        Self {
            company_name: "Your Company".into(),
            company_address: "123 Business Street\nCity, Postcode".into(),
            logo_url: None,
            layout: LayoutOffsets::default(),
            primary_color: DEFAULT_PRIMARY.into(),
            accent_color: DEFAULT_ACCENT.into(),
            font: FontFace::default(),
            header_text: "INVOICE".into(),
            bill_to_title: "Bill To".into(),
            notes_heading: "Notes".into(),
            notes_body: "Thank you for your business.".into(),
            terms_heading: "Terms & Conditions".into(),
            terms_body: "Payment is due within 30 days of the invoice date.".into(),
            footer_text: "Thank you for choosing our warranty cover.".into(),
        }
    }
}

impl InvoiceSettings {
    pub fn primary(&self) -> Rgb {
        color::parse_or(&self.primary_color, Rgb::new(0x0f, 0x17, 0x2a))
    }

    pub fn accent(&self) -> Rgb {
        color::parse_or(&self.accent_color, Rgb::new(0x25, 0x63, 0xeb))
    }

    pub fn offset(&self, key: BlockKey) -> Offset {
        self.layout.get(key)
    }

    /// Logo reference, ignoring blank strings.
    pub fn logo(&self) -> Option<&str> {
        self.logo_url.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Two-tier settings read: the persisted value, patched by the client-local
/// layout cache.
///
/// The cache only ever wins for the layout-offset subset; every other field
/// comes from `persisted`.
pub fn merge_layout_overrides(
    persisted: InvoiceSettings,
    cached_layout: Option<LayoutOffsets>,
) -> InvoiceSettings {
    match cached_layout {
        Some(layout) => InvoiceSettings { layout, ..persisted },
        None => persisted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_key_round_trip() {
        for key in BlockKey::ALL {
            assert_eq!(BlockKey::parse(key.as_str()), Some(key));
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(json, format!("\"{}\"", key.as_str()));
        }
        assert_eq!(BlockKey::parse("header"), None);
    }

    #[test]
    fn test_unknown_font_falls_back() {
        let s: InvoiceSettings = serde_json::from_str(r#"{"font": "Comic Sans"}"#).unwrap();
        assert_eq!(s.font, FontFace::Helvetica);
        let s: InvoiceSettings = serde_json::from_str(r#"{"font": "Courier"}"#).unwrap();
        assert_eq!(s.font, FontFace::Courier);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let s: InvoiceSettings = serde_json::from_str(
            r#"{"companyName": "Acme", "layout": {"billTo": {"x": 15}}}"#,
        )
        .unwrap();
        assert_eq!(s.company_name, "Acme");
        assert_eq!(s.header_text, "INVOICE");
        assert_eq!(s.layout.bill_to, Offset::new(15.0, 0.0));
        assert!(s.layout.logo.is_zero());
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(InvoiceSettings::default()).unwrap();
        assert_eq!(json["primaryColor"], "#0f172a");
        assert_eq!(json["font"], "Helvetica");
        assert_eq!(json["layout"]["durationBadge"]["x"], 0.0);
    }

    #[test]
    fn test_merge_prefers_cache_for_layout_only() {
        let mut persisted = InvoiceSettings::default();
        persisted.company_name = "Server Name".into();
        persisted.layout.logo = Offset::new(5.0, 5.0);

        let mut cached = LayoutOffsets::default();
        cached.logo = Offset::new(40.0, -10.0);

        let merged = merge_layout_overrides(persisted.clone(), Some(cached.clone()));
        assert_eq!(merged.company_name, "Server Name");
        assert_eq!(merged.layout, cached);

        let untouched = merge_layout_overrides(persisted.clone(), None);
        assert_eq!(untouched, persisted);
    }

    #[test]
    fn test_blank_logo_is_none() {
        let mut s = InvoiceSettings::default();
        s.logo_url = Some("   ".into());
        assert_eq!(s.logo(), None);
        s.logo_url = Some("/logos/a.png".into());
        assert_eq!(s.logo(), Some("/logos/a.png"));
    }
}
