//! Persistence seams for the designer: settings, logo uploads and the
//! layout-offset cache.
//!
//! Each seam is an async trait with a directory-backed implementation used
//! by the server and an in-memory one used by tests and the CLI.

use async_trait::async_trait;
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};

use crate::document::{InvoiceSettings, LayoutOffsets, ValidationError};
use crate::error::InvoiceError;

/// Key the layout subset is cached under, per tenant.
pub const LAYOUT_CACHE_KEY: &str = "invoiceLayoutSettings";

/// URL prefix uploaded logos are served from.
pub const LOGO_URL_PREFIX: &str = "/logos";

static TENANT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("tenant pattern is valid"));

/// Tenant ids end up in file names, so only a safe alphabet is accepted.
pub fn validate_tenant(tenant: &str) -> Result<(), InvoiceError> {
    if TENANT_ID.is_match(tenant) {
        Ok(())
    } else {
        Err(ValidationError::new(
            "tenant",
            "Tenant ids may only contain letters, digits, '-' and '_'",
        )
        .into())
    }
}

// ============================================================================
// SETTINGS
// ============================================================================

#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// `Ok(None)` when the tenant has never saved.
    async fn load(&self, tenant: &str) -> Result<Option<InvoiceSettings>, InvoiceError>;
    async fn save(&self, tenant: &str, settings: &InvoiceSettings) -> Result<(), InvoiceError>;
}

/// One JSON file per tenant under `dir`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, tenant: &str) -> Result<PathBuf, InvoiceError> {
        validate_tenant(tenant)?;
        Ok(self.dir.join(format!("{}.json", tenant)))
    }
}

#[async_trait]
impl SettingsStore for JsonFileStore {
    async fn load(&self, tenant: &str) -> Result<Option<InvoiceSettings>, InvoiceError> {
        let path = self.path(tenant)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, tenant: &str, settings: &InvoiceSettings) -> Result<(), InvoiceError> {
        let path = self.path(tenant)?;
        let json = serde_json::to_vec_pretty(settings)?;
        write_replace(&path, &json)
            .await
            .map_err(|e| InvoiceError::Storage(e.to_string()))
    }
}

/// Settings held in memory. `fail_saves` simulates an unavailable backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    settings: RwLock<HashMap<String, InvoiceSettings>>,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_saves.store(failing, Ordering::SeqCst);
    }

    pub async fn get(&self, tenant: &str) -> Option<InvoiceSettings> {
        self.settings.read().await.get(tenant).cloned()
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn load(&self, tenant: &str) -> Result<Option<InvoiceSettings>, InvoiceError> {
        Ok(self.get(tenant).await)
    }

    async fn save(&self, tenant: &str, settings: &InvoiceSettings) -> Result<(), InvoiceError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(InvoiceError::Storage("settings backend unavailable".into()));
        }
        self.settings
            .write()
            .await
            .insert(tenant.to_string(), settings.clone());
        Ok(())
    }
}

// ============================================================================
// LOGO UPLOADS
// ============================================================================

/// Where an uploaded logo can be fetched from afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedLogo {
    pub url: String,
}

#[async_trait]
pub trait LogoUploader: Send + Sync {
    async fn upload(
        &self,
        tenant: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<UploadedLogo, InvoiceError>;
}

fn image_extension(content_type: &str) -> Result<&'static str, InvoiceError> {
    if !content_type.starts_with("image/") {
        return Err(InvoiceError::Upload(format!(
            "'{}' is not an image type",
            content_type
        )));
    }
    match content_type {
        "image/png" => Ok("png"),
        "image/jpeg" => Ok("jpg"),
        "image/svg+xml" => Ok("svg"),
        other => mime_guess::get_mime_extensions_str(other)
            .and_then(|exts| exts.first().copied())
            .ok_or_else(|| InvoiceError::Upload(format!("unsupported image type '{}'", other))),
    }
}

/// Writes `{uuid}.{ext}` under `dir`; the file is served at
/// `{LOGO_URL_PREFIX}/{uuid}.{ext}`.
#[derive(Debug, Clone)]
pub struct DirectoryUploader {
    dir: PathBuf,
}

impl DirectoryUploader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl LogoUploader for DirectoryUploader {
    async fn upload(
        &self,
        tenant: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<UploadedLogo, InvoiceError> {
        validate_tenant(tenant)?;
        let ext = image_extension(content_type)?;
        let name = format!("{}.{}", uuid::Uuid::new_v4(), ext);
        write_replace(&self.dir.join(&name), bytes)
            .await
            .map_err(|e| InvoiceError::Upload(e.to_string()))?;
        debug!("Stored logo for {} as {}", tenant, name);
        Ok(UploadedLogo {
            url: format!("{}/{}", LOGO_URL_PREFIX, name),
        })
    }
}

/// Keeps uploads in memory. `set_failing(true)` makes every upload fail.
#[derive(Debug, Default)]
pub struct MemoryUploader {
    uploads: RwLock<HashMap<String, Vec<u8>>>,
    failing: AtomicBool,
}

impl MemoryUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn count(&self) -> usize {
        self.uploads.read().await.len()
    }
}

#[async_trait]
impl LogoUploader for MemoryUploader {
    async fn upload(
        &self,
        _tenant: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<UploadedLogo, InvoiceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(InvoiceError::Upload("upload service unavailable".into()));
        }
        let ext = image_extension(content_type)?;
        let url = format!("{}/{}.{}", LOGO_URL_PREFIX, uuid::Uuid::new_v4(), ext);
        self.uploads.write().await.insert(url.clone(), bytes.to_vec());
        Ok(UploadedLogo { url })
    }
}

// ============================================================================
// LAYOUT CACHE
// ============================================================================

#[async_trait]
pub trait LayoutCache: Send + Sync {
    /// Cached offsets, or `None` when absent or unreadable.
    async fn get(&self, tenant: &str) -> Option<LayoutOffsets>;
    async fn put(&self, tenant: &str, layout: &LayoutOffsets) -> Result<(), InvoiceError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheEntry {
    #[serde(rename = "invoiceLayoutSettings", default)]
    layout: Option<LayoutOffsets>,
}

/// All tenants in one JSON file: `{tenant: {"invoiceLayoutSettings": …}}`.
#[derive(Debug)]
pub struct FileLayoutCache {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileLayoutCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<BTreeMap<String, CacheEntry>, InvoiceError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl LayoutCache for FileLayoutCache {
    async fn get(&self, tenant: &str) -> Option<LayoutOffsets> {
        let _guard = self.lock.lock().await;
        match self.read_all().await {
            Ok(mut all) => all.remove(tenant).and_then(|e| e.layout),
            Err(e) => {
                warn!("Ignoring unreadable layout cache {}: {}", self.path.display(), e);
                None
            }
        }
    }

    async fn put(&self, tenant: &str, layout: &LayoutOffsets) -> Result<(), InvoiceError> {
        let _guard = self.lock.lock().await;
        // A corrupt cache is replaced rather than blocking saves.
        let mut all = self.read_all().await.unwrap_or_default();
        all.insert(
            tenant.to_string(),
            CacheEntry {
                layout: Some(layout.clone()),
            },
        );
        let json = serde_json::to_vec_pretty(&all)?;
        write_replace(&self.path, &json)
            .await
            .map_err(|e| InvoiceError::Storage(e.to_string()))
    }
}

#[derive(Debug, Default)]
pub struct MemoryLayoutCache {
    entries: RwLock<HashMap<String, LayoutOffsets>>,
}

impl MemoryLayoutCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LayoutCache for MemoryLayoutCache {
    async fn get(&self, tenant: &str) -> Option<LayoutOffsets> {
        self.entries.read().await.get(tenant).cloned()
    }

    async fn put(&self, tenant: &str, layout: &LayoutOffsets) -> Result<(), InvoiceError> {
        self.entries
            .write()
            .await
            .insert(tenant.to_string(), layout.clone());
        Ok(())
    }
}

/// Replace `path` through a sibling temp file.
async fn write_replace(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4()));
    if let Err(e) = tokio::fs::write(&temp, bytes).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e);
    }
    if let Err(e) = tokio::fs::rename(&temp, path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e);
    }
    Ok(())
}
