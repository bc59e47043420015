//! Logo resolution and tolerant loading.
//!
//! A logo reference is one of:
//!
//! - `blob:<id>`: a local preview held in the [`BlobStore`] until save
//! - `http://…` / `https://…`: fetched over HTTP
//! - anything else: a path relative to the deployment, resolved against the
//!   [`ExecutionContext`] (asset directory on a server, origin in a browser)
//!
//! Loading never fails the render. A logo that cannot be found, fetched or
//! decoded is logged and the invoice renders without it.

use image::{DynamicImage, RgbaImage};
use log::{debug, warn};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Prefix of local preview references.
pub const BLOB_PREFIX: &str = "blob:";

/// Where relative logo paths are resolved from.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionContext {
    /// Relative paths are files under `asset_root` (e.g. `/logos/a.png` →
    /// `{asset_root}/logos/a.png`).
    Server { asset_root: PathBuf },
    /// Relative paths are URLs under `origin`.
    Browser { origin: String },
}

/// A reference after resolution, before anything is loaded.
#[derive(Debug, Clone, PartialEq)]
pub enum LogoSource {
    Blob(String),
    Remote(String),
    File(PathBuf),
}

/// A raw upload waiting in memory.
#[derive(Debug, Clone)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// In-memory store for not-yet-uploaded logo files.
#[derive(Debug, Clone, Default)]
pub struct BlobStore {
    blobs: Arc<RwLock<HashMap<String, Blob>>>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `bytes` and return a `blob:` reference to them.
    pub async fn insert(&self, bytes: Vec<u8>, content_type: impl Into<String>) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let blob = Blob {
            bytes,
            content_type: content_type.into(),
        };
        self.blobs.write().await.insert(id.clone(), blob);
        format!("{}{}", BLOB_PREFIX, id)
    }

    /// Look up by id or full `blob:` reference.
    pub async fn get(&self, reference: &str) -> Option<Blob> {
        let id = reference.strip_prefix(BLOB_PREFIX).unwrap_or(reference);
        self.blobs.read().await.get(id).cloned()
    }

    pub async fn remove(&self, reference: &str) {
        let id = reference.strip_prefix(BLOB_PREFIX).unwrap_or(reference);
        self.blobs.write().await.remove(id);
    }
}

/// A decoded logo, ready for any renderer.
#[derive(Debug, Clone)]
pub struct LoadedLogo {
    pub image: RgbaImage,
}

impl LoadedLogo {
    pub fn from_image(image: DynamicImage) -> Self {
        Self {
            image: image.to_rgba8(),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// True when any pixel is not fully opaque.
    pub fn has_alpha(&self) -> bool {
        self.image.pixels().any(|p| p.0[3] < 255)
    }
}

/// Resolves and loads logo references for one execution context.
#[derive(Debug, Clone)]
pub struct LogoResolver {
    context: ExecutionContext,
    blobs: BlobStore,
    http_client: reqwest::Client,
}

impl LogoResolver {
    pub fn new(context: ExecutionContext, blobs: BlobStore) -> Self {
        Self {
            context,
            blobs,
            http_client: reqwest::Client::new(),
        }
    }

    pub fn with_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = http_client;
        self
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Turn a stored reference into something loadable. Returns `None` for
    /// blank references and paths escaping the asset directory.
    pub fn resolve(&self, reference: &str) -> Option<LogoSource> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }
        if let Some(id) = reference.strip_prefix(BLOB_PREFIX) {
            return Some(LogoSource::Blob(id.to_string()));
        }
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return Some(LogoSource::Remote(reference.to_string()));
        }

        let relative = reference.trim_start_matches('/');
        match &self.context {
            ExecutionContext::Server { asset_root } => {
                let path = Path::new(relative);
                if path.components().any(|c| !matches!(c, Component::Normal(_))) {
                    warn!("Rejected logo path outside asset directory: {}", reference);
                    return None;
                }
                Some(LogoSource::File(asset_root.join(path)))
            }
            ExecutionContext::Browser { origin } => Some(LogoSource::Remote(format!(
                "{}/{}",
                origin.trim_end_matches('/'),
                relative
            ))),
        }
    }

    /// Resolve and decode. Any failure yields `None` with a warning.
    pub async fn load(&self, reference: &str) -> Option<LoadedLogo> {
        let source = self.resolve(reference)?;
        let bytes = match self.fetch(&source).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Logo unavailable, rendering without it: {}", e);
                return None;
            }
        };
        match image::load_from_memory(&bytes) {
            Ok(image) => {
                debug!("Loaded logo {} ({}x{})", reference, image.width(), image.height());
                Some(LoadedLogo::from_image(image))
            }
            Err(e) => {
                warn!("Logo {} could not be decoded, rendering without it: {}", reference, e);
                None
            }
        }
    }

    /// Raw bytes of a reference, for palette extraction.
    pub async fn load_bytes(&self, reference: &str) -> Option<Vec<u8>> {
        let source = self.resolve(reference)?;
        match self.fetch(&source).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Logo unavailable: {}", e);
                None
            }
        }
    }

    async fn fetch(&self, source: &LogoSource) -> Result<Vec<u8>, String> {
        match source {
            LogoSource::Blob(id) => self
                .blobs
                .get(id)
                .await
                .map(|b| b.bytes)
                .ok_or_else(|| format!("no local preview {}{}", BLOB_PREFIX, id)),
            LogoSource::File(path) => tokio::fs::read(path)
                .await
                .map_err(|e| format!("{}: {}", path.display(), e)),
            LogoSource::Remote(url) => {
                let response = self
                    .http_client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| format!("failed to download {}: {}", url, e))?;
                if !response.status().is_success() {
                    return Err(format!("failed to download {}: HTTP {}", url, response.status()));
                }
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| format!("failed to read {}: {}", url, e))?;
                Ok(bytes.to_vec())
            }
        }
    }
}
