//! # Error Types
//!
//! This module defines error types used throughout the invoice designer.
//!
//! Every variant renders to a sentence a person can read; nothing here
//! carries a backtrace or an internal code into the UI.

use thiserror::Error;

use crate::document::ValidationError;

/// Main error type for invoice designer operations
#[derive(Debug, Error)]
pub enum InvoiceError {
    /// A settings edit was rejected at the edit boundary
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Logo could not be loaded or decoded
    #[error("Image error: {0}")]
    Image(String),

    /// Layout or document generation failed
    #[error("Render error: {0}")]
    Render(String),

    /// PDF export failed; no file was written
    #[error("Export failed: {0}")]
    Export(String),

    /// Settings or layout cache persistence failed
    #[error("Could not save settings: {0}")]
    Storage(String),

    /// Logo upload failed
    #[error("Logo upload failed: {0}")]
    Upload(String),

    /// A save or export is already running
    #[error("{0} is already in progress")]
    Busy(&'static str),

    /// HTTP server could not start or stopped unexpectedly
    #[error("Server error: {0}")]
    Server(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl InvoiceError {
    /// Message suitable for an inline notification.
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// Field name for validation errors, so callers can place the message inline.
    pub fn field(&self) -> Option<&str> {
        match self {
            InvoiceError::Validation(e) => Some(e.field.as_str()),
            _ => None,
        }
    }
}
