//! HTTP handlers for the server.

pub mod invoice;
pub mod logo;
pub mod settings;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::document::ValidationError;
use crate::error::InvoiceError;

/// Error body: `{"success": false, "error": "...", "field"?: "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    field: Option<String>,
    errors: Vec<ValidationError>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            field: None,
            errors: Vec::new(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Several rejected edits at once; the first one leads the message.
    pub fn rejected(errors: Vec<ValidationError>) -> Self {
        let first = errors.first().cloned();
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: first
                .as_ref()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "Invalid settings".to_string()),
            field: first.map(|e| e.field),
            errors,
        }
    }
}

impl From<InvoiceError> for ApiError {
    fn from(e: InvoiceError) -> Self {
        let status = match &e {
            InvoiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            InvoiceError::Image(_) => StatusCode::BAD_REQUEST,
            InvoiceError::Busy(_) => StatusCode::CONFLICT,
            InvoiceError::Upload(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            field: e.field().map(str::to_string),
            message: e.user_message(),
            errors: Vec::new(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({"success": false, "error": self.message});
        if let Some(field) = self.field {
            body["field"] = json!(field);
        }
        if !self.errors.is_empty() {
            body["errors"] = json!(self.errors);
        }
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
