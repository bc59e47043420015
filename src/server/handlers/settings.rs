//! Settings, layout and theme handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use log::debug;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::document::{BlockKey, InvoiceSettings, SettingsEdit};
use crate::error::InvoiceError;
use crate::palette::{self, ThemeChoice};

use super::super::state::AppState;
use super::{ApiError, ApiResult};

/// GET /api/tenants/:tenant/settings - persisted settings with cached layout.
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<String>,
) -> ApiResult<Json<InvoiceSettings>> {
    let session = state.session(&tenant).await?;
    let designer = session.designer.lock().await;
    Ok(Json(designer.settings().clone()))
}

/// PATCH /api/tenants/:tenant/settings - apply a list of edits.
///
/// Valid edits land even when others are rejected; the response lists the
/// rejections with a 422.
pub async fn patch(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<String>,
    Json(edits): Json<Vec<SettingsEdit>>,
) -> ApiResult<Json<InvoiceSettings>> {
    let session = state.session(&tenant).await?;
    let mut designer = session.designer.lock().await;
    designer.apply_edits(edits).map_err(ApiError::rejected)?;
    Ok(Json(designer.settings().clone()))
}

/// Body for a committed drag: where the block was dropped. Only the axes
/// that moved are present.
#[derive(Debug, Deserialize)]
pub struct LayoutCommit {
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
}

/// PUT /api/tenants/:tenant/layout/:block - commit a drag offset.
///
/// The stored offset is snapped to the grid and clamped so the block stays
/// on its page; the response carries what was stored.
pub async fn commit_layout(
    State(state): State<Arc<AppState>>,
    Path((tenant, block)): Path<(String, String)>,
    Json(commit): Json<LayoutCommit>,
) -> ApiResult<Json<Value>> {
    let key = BlockKey::parse(&block)
        .ok_or_else(|| ApiError::bad_request(format!("Unknown block '{}'", block)))?;
    if commit.x.is_none() && commit.y.is_none() {
        return Err(ApiError::bad_request("Nothing to commit: send x and/or y"));
    }
    if commit.x.iter().chain(commit.y.iter()).any(|v| !v.is_finite()) {
        return Err(ApiError::bad_request("Offsets must be finite numbers"));
    }

    let session = state.session(&tenant).await?;
    let mut designer = session.designer.lock().await;
    let offset = designer.commit_drag(key, commit.x, commit.y).await?;
    debug!(
        "{}: commit {} ({:?}, {:?}) -> ({}, {})",
        tenant, key, commit.x, commit.y, offset.x, offset.y
    );
    Ok(Json(json!({
        "success": true,
        "block": key,
        "offset": offset,
    })))
}

/// POST /api/tenants/:tenant/layout/reset - every offset back to zero.
pub async fn reset_layout(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<String>,
) -> ApiResult<Json<InvoiceSettings>> {
    let session = state.session(&tenant).await?;
    let mut designer = session.designer.lock().await;
    designer.reset_positions();
    Ok(Json(designer.settings().clone()))
}

#[derive(Debug, Deserialize)]
pub struct PaletteQuery {
    #[serde(default)]
    pub index: usize,
}

/// GET /api/tenants/:tenant/palette?index=n - logo palette and the theme at `n`.
pub async fn theme_suggestions(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<String>,
    Query(query): Query<PaletteQuery>,
) -> ApiResult<Json<Value>> {
    let session = state.session(&tenant).await?;
    let mut designer = session.designer.lock().await;
    let colors = palette::to_hex_list(designer.palette().await);
    let theme = designer.theme_at(query.index).await;
    Ok(Json(json!({
        "palette": colors,
        "theme": theme,
        "nextIndex": query.index + 1,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ThemeRequest {
    pub primary: String,
    pub accent: String,
    #[serde(default)]
    pub secondary: Option<String>,
}

/// POST /api/tenants/:tenant/theme - apply primary and accent colors.
pub async fn apply_theme(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<String>,
    Json(req): Json<ThemeRequest>,
) -> ApiResult<Json<InvoiceSettings>> {
    let theme = ThemeChoice {
        secondary: req.secondary.unwrap_or_else(|| req.primary.clone()),
        primary: req.primary,
        accent: req.accent,
    };
    let session = state.session(&tenant).await?;
    let mut designer = session.designer.lock().await;
    designer.apply_theme(&theme)?;
    Ok(Json(designer.settings().clone()))
}

/// POST /api/tenants/:tenant/save - upload, persist and cache.
///
/// A save already running for the tenant gets a 409.
pub async fn save(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<String>,
) -> ApiResult<Json<Value>> {
    let session = state.session(&tenant).await?;
    let _busy = session
        .busy
        .try_lock()
        .map_err(|_| InvoiceError::Busy("A save or export"))?;

    let mut designer = session.designer.lock().await;
    let report = designer.save().await?;
    Ok(Json(json!({
        "success": true,
        "complete": report.is_complete(),
        "message": report.message(),
        "report": report,
        "settings": designer.settings(),
    })))
}
