//! Logo selection and local preview handlers.

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use std::sync::Arc;

use crate::designer::LogoSelection;

use super::super::state::AppState;
use super::{ApiError, ApiResult};

/// Upload size limit for logo files.
pub const MAX_LOGO_BYTES: usize = 10 * 1024 * 1024;

/// POST /api/tenants/:tenant/logo - select a logo file (multipart field `logo`).
///
/// The file is kept in memory for preview and uploaded on the next save.
pub async fn select(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<Json<LogoSelection>> {
    let mut upload: Option<(Vec<u8>, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some("logo") {
            continue;
        }
        let content_type = field
            .content_type()
            .map(str::to_string)
            .or_else(|| {
                field
                    .file_name()
                    .and_then(|name| mime_guess::from_path(name).first())
                    .map(|mime| mime.to_string())
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read logo: {}", e)))?;
        upload = Some((bytes.to_vec(), content_type));
        break;
    }

    let (bytes, content_type) =
        upload.ok_or_else(|| ApiError::bad_request("No logo field found"))?;

    let session = state.session(&tenant).await?;
    let mut designer = session.designer.lock().await;
    let selection = designer.select_logo(bytes, &content_type).await?;
    Ok(Json(selection))
}

/// GET /api/blobs/:id - serve a logo that has not been uploaded yet.
pub async fn blob(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let blob = state
        .services
        .blobs
        .get(&id)
        .await
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Preview not found"))?;
    Ok((
        [
            (header::CONTENT_TYPE, blob.content_type),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        blob.bytes,
    ))
}
