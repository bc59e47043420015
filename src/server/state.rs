//! Server state and configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

use crate::designer::{
    Designer, DesignerServices, DirectoryUploader, FileLayoutCache, JsonFileStore,
    store::validate_tenant,
};
use crate::error::InvoiceError;
use crate::render::logo::{BlobStore, ExecutionContext, LogoResolver};

/// Idle time after which a tenant session and its unsaved logo are dropped.
pub const SESSION_EXPIRATION_SECS: u64 = 30 * 60;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:8080")
    pub listen_addr: String,
    /// Root for settings, uploaded logos and the layout cache
    pub data_dir: PathBuf,
    /// When set, relative logo paths are fetched from this origin instead of
    /// read from `data_dir`
    pub public_origin: Option<String>,
}

impl ServerConfig {
    pub fn settings_dir(&self) -> PathBuf {
        self.data_dir.join("settings")
    }

    pub fn logos_dir(&self) -> PathBuf {
        self.data_dir.join("logos")
    }

    pub fn layout_cache_path(&self) -> PathBuf {
        self.data_dir.join("layout-cache.json")
    }

    /// File-backed services rooted at `data_dir`.
    pub fn services(&self) -> DesignerServices {
        let blobs = BlobStore::new();
        let context = match &self.public_origin {
            Some(origin) => ExecutionContext::Browser {
                origin: origin.clone(),
            },
            None => ExecutionContext::Server {
                asset_root: self.data_dir.clone(),
            },
        };
        DesignerServices {
            store: Arc::new(JsonFileStore::new(self.settings_dir())),
            uploader: Arc::new(DirectoryUploader::new(self.logos_dir())),
            cache: Arc::new(FileLayoutCache::new(self.layout_cache_path())),
            resolver: LogoResolver::new(context, blobs.clone()),
            blobs,
        }
    }
}

/// One tenant's editing session.
///
/// `busy` is held for the duration of a save or export so a second one is
/// refused instead of queued.
pub struct TenantSession {
    pub designer: Mutex<Designer>,
    pub busy: Mutex<()>,
    last_accessed: Mutex<Instant>,
}

/// Application state shared across handlers.
pub struct AppState {
    pub config: ServerConfig,
    pub services: DesignerServices,
    sessions: RwLock<HashMap<String, Arc<TenantSession>>>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let services = config.services();
        Self::with_services(config, services)
    }

    pub fn with_services(config: ServerConfig, services: DesignerServices) -> Self {
        Self {
            config,
            services,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// The tenant's session, loading its settings on first use.
    pub async fn session(&self, tenant: &str) -> Result<Arc<TenantSession>, InvoiceError> {
        validate_tenant(tenant)?;
        let cached = self.sessions.read().await.get(tenant).cloned();
        if let Some(session) = cached {
            *session.last_accessed.lock().await = Instant::now();
            return Ok(session);
        }

        let mut sessions = self.sessions.write().await;
        // Another request may have loaded it while we waited for the lock.
        if let Some(session) = sessions.get(tenant) {
            *session.last_accessed.lock().await = Instant::now();
            return Ok(session.clone());
        }
        let designer = Designer::load(tenant, self.services.clone()).await?;
        let session = Arc::new(TenantSession {
            designer: Mutex::new(designer),
            busy: Mutex::new(()),
            last_accessed: Mutex::new(Instant::now()),
        });
        sessions.insert(tenant.to_string(), session.clone());
        Ok(session)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions idle for at least `expiration` as of `now`, along with
    /// their unsaved logo previews. Sessions in the middle of a save or export
    /// are kept. Returns how many were dropped.
    pub async fn evict_idle(&self, now: Instant, expiration: Duration) -> usize {
        let expired: Vec<Arc<TenantSession>> = {
            let mut sessions = self.sessions.write().await;
            let mut idle = Vec::new();
            for (tenant, session) in sessions.iter() {
                let last = *session.last_accessed.lock().await;
                if now.saturating_duration_since(last) >= expiration
                    && session.busy.try_lock().is_ok()
                {
                    idle.push(tenant.clone());
                }
            }
            idle.iter().filter_map(|tenant| sessions.remove(tenant)).collect()
        };

        for session in &expired {
            session.designer.lock().await.discard_pending().await;
        }
        expired.len()
    }
}
