//! # Server Tests
//!
//! Drives the router in-process with `tower::ServiceExt::oneshot`, backed by
//! in-memory stores so every test starts from a clean tenant.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use invoice_designer::designer::{
    DesignerServices, MemoryLayoutCache, MemoryStore, MemoryUploader, SettingsStore,
};
use invoice_designer::render::logo::{BlobStore, ExecutionContext, LogoResolver};
use invoice_designer::server::{self, AppState, SESSION_EXPIRATION_SECS, ServerConfig};
use serde_json::{Value, json};
use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceExt;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

struct Harness {
    app: Router,
    state: Arc<AppState>,
    store: Arc<MemoryStore>,
    uploader: Arc<MemoryUploader>,
}

fn harness() -> Harness {
    let data_dir = std::env::temp_dir().join(format!("server-tests-{}", uuid::Uuid::new_v4()));
    let store = Arc::new(MemoryStore::new());
    let uploader = Arc::new(MemoryUploader::new());
    let blobs = BlobStore::new();
    let services = DesignerServices {
        store: store.clone(),
        uploader: uploader.clone(),
        cache: Arc::new(MemoryLayoutCache::new()),
        resolver: LogoResolver::new(
            ExecutionContext::Server {
                asset_root: data_dir.clone(),
            },
            blobs.clone(),
        ),
        blobs,
    };
    let config = ServerConfig {
        listen_addr: "127.0.0.1:0".into(),
        data_dir,
        public_origin: None,
    };
    let state = Arc::new(AppState::with_services(config, services));
    Harness {
        app: server::router(state.clone()),
        state,
        store,
        uploader,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>, Option<String>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec(), content_type)
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        })
        .unwrap();
    let (status, bytes, _) = send(app, request).await;
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn invoice() -> Value {
    json!({
        "invoiceNumber": "INV-9",
        "issueDate": "1 March 2025",
        "billTo": {"name": "Jane Doe"},
        "items": [{"description": "Warranty cover", "quantity": 1, "amount": 499.0}]
    })
}

fn logo_png() -> Vec<u8> {
    let img = RgbaImage::from_pixel(16, 8, Rgba([10, 120, 60, 255]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

fn multipart_logo(bytes: &[u8]) -> (String, Vec<u8>) {
    let boundary = "invoice-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"logo\"; filename=\"logo.png\"\r\n",
    );
    body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    (format!("multipart/form-data; boundary={}", boundary), body)
}

// ============================================================================
// SETTINGS
// ============================================================================

#[tokio::test]
async fn test_new_tenant_gets_defaults() {
    let h = harness();
    let (status, body) = send_json(&h.app, "GET", "/api/tenants/acme/settings", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["companyName"], "Your Company");
    assert_eq!(body["headerText"], "INVOICE");
    assert_eq!(body["layout"]["logo"]["x"], 0.0);
}

#[tokio::test]
async fn test_invalid_edit_is_rejected_with_field() {
    let h = harness();
    let (status, body) = send_json(
        &h.app,
        "PATCH",
        "/api/tenants/acme/settings",
        Some(json!([
            {"field": "companyName", "value": "Acme Motors"},
            {"field": "primaryColor", "value": "blue"}
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["field"], "primaryColor");

    // The valid edit still landed; the invalid one changed nothing.
    let (_, settings) = send_json(&h.app, "GET", "/api/tenants/acme/settings", None).await;
    assert_eq!(settings["companyName"], "Acme Motors");
    assert_eq!(settings["primaryColor"], "#0f172a");
}

#[tokio::test]
async fn test_invalid_tenant() {
    let h = harness();
    let (status, body) = send_json(&h.app, "GET", "/api/tenants/bad%20id/settings", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "tenant");
}

// ============================================================================
// LAYOUT
// ============================================================================

#[tokio::test]
async fn test_commit_and_reset_layout() {
    let h = harness();
    let (status, body) = send_json(
        &h.app,
        "PUT",
        "/api/tenants/acme/layout/billTo",
        Some(json!({"x": 30.0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["offset"]["x"], 30.0);
    assert_eq!(body["offset"]["y"], 0.0);

    let (status, body) = send_json(&h.app, "POST", "/api/tenants/acme/layout/reset", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["layout"]["billTo"]["x"], 0.0);
}

#[tokio::test]
async fn test_commit_is_snapped_and_kept_on_page() {
    let h = harness();
    let (status, _) = send_json(
        &h.app,
        "POST",
        "/api/tenants/acme/preview?mode=edit",
        Some(invoice()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send_json(
        &h.app,
        "PUT",
        "/api/tenants/acme/layout/billTo",
        Some(json!({"x": 7.3, "y": 50000})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let x = body["offset"]["x"].as_f64().unwrap();
    let y = body["offset"]["y"].as_f64().unwrap();
    assert_eq!(x, 5.0);
    assert_eq!(y % 5.0, 0.0);
    assert!(y > 0.0 && y < 1123.0, "y = {}", y);

    let (_, settings) = send_json(&h.app, "GET", "/api/tenants/acme/settings", None).await;
    assert_eq!(settings["layout"]["billTo"]["x"], x);
    assert_eq!(settings["layout"]["billTo"]["y"], y);

    let (status, body) = send_json(
        &h.app,
        "PUT",
        "/api/tenants/acme/layout/billTo",
        Some(json!({"x": -10000})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["offset"]["x"], -45.0);
    assert_eq!(body["offset"]["y"], y);
}

#[tokio::test]
async fn test_commit_for_missing_block_is_rejected() {
    let h = harness();
    // No logo selected, so the invoice has no logo block to drag.
    let (status, body) = send_json(
        &h.app,
        "PUT",
        "/api/tenants/acme/layout/logo",
        Some(json!({"x": 10.0})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "layout");
    let (_, settings) = send_json(&h.app, "GET", "/api/tenants/acme/settings", None).await;
    assert_eq!(settings["layout"]["logo"]["x"], 0.0);
}

#[tokio::test]
async fn test_unknown_block_and_empty_commit() {
    let h = harness();
    let (status, _) = send_json(
        &h.app,
        "PUT",
        "/api/tenants/acme/layout/header",
        Some(json!({"x": 5.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) =
        send_json(&h.app, "PUT", "/api/tenants/acme/layout/logo", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// LOGO AND SAVE
// ============================================================================

#[tokio::test]
async fn test_logo_preview_then_save() {
    let h = harness();
    let (content_type, body) = multipart_logo(&logo_png());
    let request = Request::builder()
        .method("POST")
        .uri("/api/tenants/acme/logo")
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap();
    let (status, bytes, _) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
    let selection: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(selection["reference"].as_str().unwrap().starts_with("blob:"));
    assert_eq!(selection["palette"][0], "#0a783c");

    let preview_url = selection["previewUrl"].as_str().unwrap().to_string();
    let request = Request::builder().uri(&preview_url).body(Body::empty()).unwrap();
    let (status, _, content_type) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/png"));

    let (status, body) = send_json(&h.app, "POST", "/api/tenants/acme/save", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["complete"], true);
    assert_eq!(h.uploader.count().await, 1);
    let saved = h.store.load("acme").await.unwrap().unwrap();
    assert!(saved.logo_url.unwrap().starts_with("/logos/"));

    // The local preview is gone once uploaded.
    let request = Request::builder().uri(&preview_url).body(Body::empty()).unwrap();
    let (status, _, _) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failed_upload_is_reported_not_fatal() {
    let h = harness();
    let (content_type, body) = multipart_logo(&logo_png());
    let request = Request::builder()
        .method("POST")
        .uri("/api/tenants/acme/logo")
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap();
    send(&h.app, request).await;
    h.uploader.set_failing(true);

    let (status, body) = send_json(&h.app, "POST", "/api/tenants/acme/save", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["complete"], false);
    assert!(body["message"].as_str().unwrap().contains("logo upload"));
    let saved = h.store.load("acme").await.unwrap().unwrap();
    assert_eq!(saved.logo_url, None);
}

#[tokio::test]
async fn test_idle_sessions_are_evicted_with_their_preview() {
    let h = harness();
    let (content_type, body) = multipart_logo(&logo_png());
    let request = Request::builder()
        .method("POST")
        .uri("/api/tenants/acme/logo")
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap();
    let (status, bytes, _) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
    let selection: Value = serde_json::from_slice(&bytes).unwrap();
    let preview_url = selection["previewUrl"].as_str().unwrap().to_string();

    let busy = h.state.session("busy-co").await.unwrap();
    let _guard = busy.busy.lock().await;
    assert_eq!(h.state.session_count().await, 2);

    // Nothing has been idle long enough yet.
    let expiration = Duration::from_secs(SESSION_EXPIRATION_SECS);
    assert_eq!(h.state.evict_idle(Instant::now(), expiration).await, 0);

    assert_eq!(h.state.evict_idle(Instant::now(), Duration::ZERO).await, 1);
    assert_eq!(h.state.session_count().await, 1);

    let request = Request::builder().uri(&preview_url).body(Body::empty()).unwrap();
    let (status, _, _) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // A later request starts from the persisted settings.
    let (status, settings) = send_json(&h.app, "GET", "/api/tenants/acme/settings", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settings["logoUrl"], Value::Null);
}

#[tokio::test]
async fn test_save_while_busy_conflicts() {
    let h = harness();
    let session = h.state.session("acme").await.unwrap();
    let _busy = session.busy.lock().await;

    let (status, body) = send_json(&h.app, "POST", "/api/tenants/acme/save", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "A save or export is already in progress");

    let (status, _) = send_json(
        &h.app,
        "POST",
        "/api/tenants/acme/export",
        Some(invoice()),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

// ============================================================================
// RENDERING
// ============================================================================

#[tokio::test]
async fn test_export_pdf_download() {
    let h = harness();
    let request = Request::builder()
        .method("POST")
        .uri("/api/tenants/acme/export?strategy=raster")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(invoice().to_string()))
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"INV-9.pdf\""
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(body.starts_with(b"%PDF"));
}

#[tokio::test]
async fn test_unknown_strategy() {
    let h = harness();
    let (status, body) = send_json(
        &h.app,
        "POST",
        "/api/tenants/acme/export?strategy=svg",
        Some(invoice()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_edit_preview_html() {
    let h = harness();
    let request = Request::builder()
        .method("POST")
        .uri("/api/tenants/acme/preview?mode=edit")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(invoice().to_string()))
        .unwrap();
    let (status, body, content_type) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/html"));
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("data-block=\"footer\""));
    assert!(html.contains("INV-9"));
}

#[tokio::test]
async fn test_png_preview() {
    let h = harness();
    let request = Request::builder()
        .method("POST")
        .uri("/api/tenants/acme/preview.png")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(invoice().to_string()))
        .unwrap();
    let (status, body, content_type) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/png"));
    assert!(body.starts_with(b"\x89PNG"));
}
