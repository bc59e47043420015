//! Settings validation at the edit boundary.
//!
//! Renderers never see invalid input from here: an edit is checked before it
//! touches the settings, and a rejected edit leaves them exactly as they were.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::settings::{FontFace, InvoiceSettings};
use crate::color::is_hex_color;

/// A field-level rejection, shown next to the offending input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// camelCase settings field name.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// One user edit to the settings.
///
/// JSON form: `{"field": "primaryColor", "value": "#0f172a"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum SettingsEdit {
    CompanyName(String),
    CompanyAddress(String),
    PrimaryColor(String),
    AccentColor(String),
    Font(String),
    HeaderText(String),
    BillToTitle(String),
    NotesHeading(String),
    NotesBody(String),
    TermsHeading(String),
    TermsBody(String),
    FooterText(String),
}

impl SettingsEdit {
    pub fn field(&self) -> &'static str {
        match self {
            SettingsEdit::CompanyName(_) => "companyName",
            SettingsEdit::CompanyAddress(_) => "companyAddress",
            SettingsEdit::PrimaryColor(_) => "primaryColor",
            SettingsEdit::AccentColor(_) => "accentColor",
            SettingsEdit::Font(_) => "font",
            SettingsEdit::HeaderText(_) => "headerText",
            SettingsEdit::BillToTitle(_) => "billToTitle",
            SettingsEdit::NotesHeading(_) => "notesHeading",
            SettingsEdit::NotesBody(_) => "notesBody",
            SettingsEdit::TermsHeading(_) => "termsHeading",
            SettingsEdit::TermsBody(_) => "termsBody",
            SettingsEdit::FooterText(_) => "footerText",
        }
    }

    /// Validate and apply. On error `settings` is unchanged.
    pub fn apply(self, settings: &mut InvoiceSettings) -> Result<(), ValidationError> {
        let field = self.field();
        match self {
            SettingsEdit::PrimaryColor(v) => {
                check_color(field, "Primary color", &v)?;
                settings.primary_color = v;
            }
            SettingsEdit::AccentColor(v) => {
                check_color(field, "Accent color", &v)?;
                settings.accent_color = v;
            }
            SettingsEdit::Font(v) => {
                settings.font = FontFace::parse(&v).ok_or_else(|| {
                    ValidationError::new(
                        field,
                        format!(
                            "Font must be one of {}",
                            FontFace::ALL.map(FontFace::name).join(", ")
                        ),
                    )
                })?;
            }
            SettingsEdit::TermsBody(v) => settings.terms_body = v,
            SettingsEdit::CompanyName(v) => {
                settings.company_name = required(field, "Company name", v)?;
            }
            SettingsEdit::CompanyAddress(v) => {
                settings.company_address = required(field, "Company address", v)?;
            }
            SettingsEdit::HeaderText(v) => {
                settings.header_text = required(field, "Header text", v)?;
            }
            SettingsEdit::BillToTitle(v) => {
                settings.bill_to_title = required(field, "Bill-to title", v)?;
            }
            SettingsEdit::NotesHeading(v) => {
                settings.notes_heading = required(field, "Notes heading", v)?;
            }
            SettingsEdit::NotesBody(v) => {
                settings.notes_body = required(field, "Notes", v)?;
            }
            SettingsEdit::TermsHeading(v) => {
                settings.terms_heading = required(field, "Terms heading", v)?;
            }
            SettingsEdit::FooterText(v) => {
                settings.footer_text = required(field, "Footer text", v)?;
            }
        }
        Ok(())
    }
}

fn check_color(field: &str, label: &str, value: &str) -> Result<(), ValidationError> {
    if is_hex_color(value) {
        Ok(())
    } else {
        Err(ValidationError::new(
            field,
            format!("{} must be a hex color like #1a2b3c or #abc", label),
        ))
    }
}

fn required(field: &str, label: &str, value: String) -> Result<String, ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new(field, format!("{} cannot be empty", label)))
    } else {
        Ok(value)
    }
}

/// Check a whole settings object, e.g. before persisting one that arrived as
/// JSON. Returns every problem, not just the first.
pub fn validate_settings(settings: &InvoiceSettings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (field, label, value) in [
        ("primaryColor", "Primary color", &settings.primary_color),
        ("accentColor", "Accent color", &settings.accent_color),
    ] {
        if let Err(e) = check_color(field, label, value) {
            errors.push(e);
        }
    }

    for (field, label, value) in [
        ("companyName", "Company name", &settings.company_name),
        ("companyAddress", "Company address", &settings.company_address),
        ("headerText", "Header text", &settings.header_text),
        ("billToTitle", "Bill-to title", &settings.bill_to_title),
        ("notesHeading", "Notes heading", &settings.notes_heading),
        ("notesBody", "Notes", &settings.notes_body),
        ("termsHeading", "Terms heading", &settings.terms_heading),
        ("footerText", "Footer text", &settings.footer_text),
    ] {
        if value.trim().is_empty() {
            errors.push(ValidationError::new(field, format!("{} cannot be empty", label)));
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_named_color() {
        let mut settings = InvoiceSettings::default();
        let before = settings.clone();
        let err = SettingsEdit::PrimaryColor("blue".into())
            .apply(&mut settings)
            .unwrap_err();
        assert_eq!(err.field, "primaryColor");
        assert!(err.message.contains("hex color"));
        assert_eq!(settings, before);
    }

    #[test]
    fn test_accepts_short_and_long_hex() {
        let mut settings = InvoiceSettings::default();
        SettingsEdit::AccentColor("#abc".into()).apply(&mut settings).unwrap();
        assert_eq!(settings.accent_color, "#abc");
        SettingsEdit::PrimaryColor("#A1B2C3".into()).apply(&mut settings).unwrap();
        assert_eq!(settings.primary_color, "#A1B2C3");
    }

    #[test]
    fn test_required_fields_trimmed() {
        let mut settings = InvoiceSettings::default();
        let err = SettingsEdit::CompanyName("   ".into())
            .apply(&mut settings)
            .unwrap_err();
        assert_eq!(err.field, "companyName");
        assert_eq!(settings.company_name, "Your Company");
    }

    #[test]
    fn test_terms_body_may_be_empty() {
        let mut settings = InvoiceSettings::default();
        SettingsEdit::TermsBody(String::new()).apply(&mut settings).unwrap();
        assert!(settings.terms_body.is_empty());
    }

    #[test]
    fn test_font_edit() {
        let mut settings = InvoiceSettings::default();
        SettingsEdit::Font("times".into()).apply(&mut settings).unwrap();
        assert_eq!(settings.font, FontFace::TimesRoman);
        let err = SettingsEdit::Font("Papyrus".into()).apply(&mut settings).unwrap_err();
        assert_eq!(err.field, "font");
        assert_eq!(settings.font, FontFace::TimesRoman);
    }

    #[test]
    fn test_edit_json_shape() {
        let edit: SettingsEdit =
            serde_json::from_str(r##"{"field": "headerText", "value": "RECEIPT"}"##).unwrap();
        assert_eq!(edit, SettingsEdit::HeaderText("RECEIPT".into()));
    }

    #[test]
    fn test_validate_settings_collects_all() {
        let mut settings = InvoiceSettings::default();
        settings.primary_color = "red".into();
        settings.footer_text = String::new();
        let errors = validate_settings(&settings).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["primaryColor", "footerText"]);
        assert!(validate_settings(&InvoiceSettings::default()).is_ok());
    }
}
