//! Preview and export handlers. All of them render the tenant's current
//! settings, saved or not, against the invoice in the request body.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::header,
    response::{Html, IntoResponse},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::document::InvoiceData;
use crate::error::InvoiceError;
use crate::export::ExportStrategy;
use crate::render::screen::RenderMode;

use super::super::state::AppState;
use super::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    #[serde(default)]
    pub mode: Option<String>,
}

/// POST /api/tenants/:tenant/preview?mode=edit - HTML preview.
pub async fn preview_html(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<String>,
    Query(query): Query<PreviewQuery>,
    Json(data): Json<InvoiceData>,
) -> ApiResult<Html<String>> {
    let mode = match query.mode.as_deref() {
        Some("edit") => RenderMode::Edit,
        None | Some("view") => RenderMode::View,
        Some(other) => {
            return Err(ApiError::bad_request(format!(
                "Unknown preview mode '{}': use view or edit",
                other
            )));
        }
    };
    data.check().map_err(InvoiceError::from)?;

    let session = state.session(&tenant).await?;
    let mut designer = session.designer.lock().await;
    Ok(Html(designer.preview_html(&data, mode).await))
}

/// POST /api/tenants/:tenant/preview.png - raster preview of every page.
pub async fn preview_png(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<String>,
    Json(data): Json<InvoiceData>,
) -> ApiResult<impl IntoResponse> {
    data.check().map_err(InvoiceError::from)?;
    let session = state.session(&tenant).await?;
    let designer = session.designer.lock().await;
    let png = designer.preview_png(data).await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub strategy: Option<String>,
}

/// POST /api/tenants/:tenant/export?strategy=vector|raster - PDF download.
///
/// A save or export already running for the tenant gets a 409.
pub async fn export(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<String>,
    Query(query): Query<ExportQuery>,
    Json(data): Json<InvoiceData>,
) -> ApiResult<impl IntoResponse> {
    let strategy = match query.strategy.as_deref() {
        None => ExportStrategy::default(),
        Some(s) => ExportStrategy::parse(s).ok_or_else(|| {
            ApiError::bad_request(format!("Unknown export strategy '{}': use vector or raster", s))
        })?,
    };

    let session = state.session(&tenant).await?;
    let _busy = session
        .busy
        .try_lock()
        .map_err(|_| InvoiceError::Busy("A save or export"))?;
    let designer = session.designer.lock().await;
    let pdf = designer.export(strategy, data).await?;

    let disposition = format!("attachment; filename=\"{}\"", pdf.file_name.replace('"', "_"));
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf.bytes,
    ))
}
