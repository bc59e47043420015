//! # HTTP Server for the Invoice Designer
//!
//! Exposes the designer session per tenant: edits, drag commits, logo
//! selection, theme suggestions, save, previews and PDF export.
//!
//! ## Usage
//!
//! ```bash
//! invoice-designer serve --listen 0.0.0.0:8080 --data-dir ./data
//! ```
//!
//! Uploaded logos are served back from `/logos/...`; logos selected but not
//! yet saved are served from `/api/blobs/:id`.

mod handlers;
mod state;

pub use state::{AppState, SESSION_EXPIRATION_SECS, ServerConfig, TenantSession};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};
use log::info;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::services::ServeDir;

use crate::error::InvoiceError;
use handlers::logo::MAX_LOGO_BYTES;

/// Build the router for `state`. Split from [`serve`] so tests can drive it
/// without a socket.
pub fn router(state: Arc<AppState>) -> Router {
    let logos = ServeDir::new(state.config.logos_dir());

    Router::new()
        // Settings
        .route(
            "/api/tenants/:tenant/settings",
            get(handlers::settings::get).patch(handlers::settings::patch),
        )
        .route(
            "/api/tenants/:tenant/layout/reset",
            post(handlers::settings::reset_layout),
        )
        .route(
            "/api/tenants/:tenant/layout/:block",
            put(handlers::settings::commit_layout),
        )
        .route("/api/tenants/:tenant/palette", get(handlers::settings::theme_suggestions))
        .route("/api/tenants/:tenant/theme", post(handlers::settings::apply_theme))
        .route("/api/tenants/:tenant/save", post(handlers::settings::save))
        // Logo
        .route(
            "/api/tenants/:tenant/logo",
            post(handlers::logo::select).layer(DefaultBodyLimit::max(MAX_LOGO_BYTES)),
        )
        .route("/api/blobs/:id", get(handlers::logo::blob))
        // Rendering
        .route(
            "/api/tenants/:tenant/preview",
            post(handlers::invoice::preview_html),
        )
        .route(
            "/api/tenants/:tenant/preview.png",
            post(handlers::invoice::preview_png),
        )
        .route("/api/tenants/:tenant/export", post(handlers::invoice::export))
        .nest_service("/logos", logos)
        .with_state(state)
}

/// Start the HTTP server.
///
/// ## Example
///
/// ```no_run
/// use invoice_designer::server::{serve, ServerConfig};
///
/// # async fn example() -> Result<(), invoice_designer::InvoiceError> {
/// let config = ServerConfig {
///     listen_addr: "0.0.0.0:8080".to_string(),
///     data_dir: "./data".into(),
///     public_origin: None,
/// };
///
/// serve(config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn serve(config: ServerConfig) -> Result<(), InvoiceError> {
    tokio::fs::create_dir_all(config.logos_dir()).await?;
    tokio::fs::create_dir_all(config.settings_dir()).await?;

    let app_state = Arc::new(AppState::new(config.clone()));
    tokio::spawn(cleanup_sessions(app_state.clone()));
    let app = router(app_state);

    info!("Invoice designer HTTP server starting");
    info!("Listening on: {}", config.listen_addr);
    info!("Data directory: {}", config.data_dir.display());
    if let Some(origin) = &config.public_origin {
        info!("Resolving relative logo paths against {}", origin);
    }

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| {
            InvoiceError::Server(format!("Failed to bind to {}: {}", config.listen_addr, e))
        })?;

    axum::serve(listener, app)
        .await
        .map_err(|e| InvoiceError::Server(e.to_string()))?;

    Ok(())
}

/// Background task dropping idle tenant sessions.
async fn cleanup_sessions(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    let expiration = Duration::from_secs(SESSION_EXPIRATION_SECS);

    loop {
        interval.tick().await;
        let removed = state.evict_idle(Instant::now(), expiration).await;
        if removed > 0 {
            info!(
                "Cleaned up {} idle tenant sessions ({} remaining)",
                removed,
                state.session_count().await
            );
        }
    }
}
