//! # Designer Shell
//!
//! Owns one tenant's [`InvoiceSettings`] while it is being edited and
//! coordinates everything around it:
//!
//! ```text
//!   load ──► merge_layout_overrides(store, cache)
//!              │
//!   apply_edit / select_logo / commit_drag / reset_positions / apply_theme
//!              │                                  (in memory, immediate)
//!   save ──► upload pending logo ─► persist settings ─► cache layout subset
//!   export ─► render on the blocking pool ─► {invoiceNumber}.pdf
//! ```
//!
//! A selected logo is previewed straight away from the in-memory blob store;
//! the upload happens on save. If only the upload fails, the rest of the
//! settings are still saved with the previous logo and the report says so.
//! An uploaded URL stays with the pending logo until the settings are
//! stored, so retrying a save never uploads the same file twice.

pub mod drag;
pub mod store;

use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;

use crate::color::Rgb;
use crate::document::{
    BillTo, BlockKey, InvoiceData, InvoiceSettings, LayoutOffsets, LineItem, Offset, SettingsEdit,
    ValidationError, merge_layout_overrides,
};
use crate::error::InvoiceError;
use crate::export::{self, ExportStrategy, ExportedPdf};
use crate::layout::{self, DocumentLayout};
use crate::palette::{self, ThemeChoice};
use crate::render::logo::{BLOB_PREFIX, BlobStore, LoadedLogo, LogoResolver};
use crate::render::raster::{self, RasterRenderer};
use crate::render::screen::{InteractivePreview, RenderMode, ScreenRenderer};

pub use drag::{DragBounds, DragController, LayoutChange, SNAP};
pub use store::{
    DirectoryUploader, FileLayoutCache, JsonFileStore, LayoutCache, LogoUploader,
    MemoryLayoutCache, MemoryStore, MemoryUploader, SettingsStore, UploadedLogo,
};

/// URL path local previews are served from by the HTTP surface.
pub const BLOB_URL_PREFIX: &str = "/api/blobs";

/// The collaborators a [`Designer`] talks to. Cheap to clone.
#[derive(Clone)]
pub struct DesignerServices {
    pub store: Arc<dyn SettingsStore>,
    pub uploader: Arc<dyn LogoUploader>,
    pub cache: Arc<dyn LayoutCache>,
    pub blobs: BlobStore,
    pub resolver: LogoResolver,
}

#[derive(Debug, Clone)]
struct PendingLogo {
    reference: String,
    bytes: Vec<u8>,
    content_type: String,
    /// Set once the upload went through, cleared with the pending logo.
    uploaded_url: Option<String>,
}

/// What [`Designer::select_logo`] hands back to the UI.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoSelection {
    /// `blob:` reference now stored in the settings.
    pub reference: String,
    /// URL the browser can load the preview from.
    pub preview_url: String,
    pub palette: Vec<String>,
}

/// One piece of a save that did not go through.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveFailure {
    pub part: &'static str,
    pub message: String,
}

/// Outcome of [`Designer::save`].
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReport {
    /// New logo URL when a pending logo was uploaded.
    pub uploaded_logo: Option<String>,
    pub failures: Vec<SaveFailure>,
}

impl SaveReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// One sentence for a toast.
    pub fn message(&self) -> String {
        if self.failures.is_empty() {
            return "Invoice settings saved".to_string();
        }
        let parts: Vec<String> = self
            .failures
            .iter()
            .map(|f| format!("{} ({})", f.part, f.message))
            .collect();
        format!("Invoice settings saved, but these failed: {}", parts.join("; "))
    }
}

/// Editing session for one tenant.
pub struct Designer {
    tenant: String,
    settings: InvoiceSettings,
    /// Logo reference last persisted; kept when an upload fails.
    saved_logo: Option<String>,
    pending_logo: Option<PendingLogo>,
    palette: Vec<Rgb>,
    theme_index: usize,
    /// Invoice last drawn in edit mode; drags are measured against it.
    edit_data: Option<InvoiceData>,
    services: DesignerServices,
}

impl Designer {
    /// Load the tenant's settings, defaults on first use, with the cached
    /// layout subset merged over the persisted one.
    pub async fn load(tenant: &str, services: DesignerServices) -> Result<Self, InvoiceError> {
        store::validate_tenant(tenant)?;
        let persisted = services.store.load(tenant).await?.unwrap_or_default();
        let cached = services.cache.get(tenant).await;
        let settings = merge_layout_overrides(persisted, cached);
        info!("Loaded invoice settings for {}", tenant);

        Ok(Self {
            tenant: tenant.to_string(),
            saved_logo: settings.logo_url.clone(),
            settings,
            pending_logo: None,
            palette: Vec::new(),
            theme_index: 0,
            edit_data: None,
            services,
        })
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn settings(&self) -> &InvoiceSettings {
        &self.settings
    }

    pub fn has_pending_logo(&self) -> bool {
        self.pending_logo.is_some()
    }

    /// Apply one validated edit. A rejected edit changes nothing.
    pub fn apply_edit(&mut self, edit: SettingsEdit) -> Result<(), InvoiceError> {
        edit.apply(&mut self.settings)?;
        Ok(())
    }

    /// Apply several edits; valid ones land even if others are rejected.
    pub fn apply_edits(&mut self, edits: Vec<SettingsEdit>) -> Result<(), Vec<ValidationError>> {
        let errors: Vec<ValidationError> = edits
            .into_iter()
            .filter_map(|edit| edit.apply(&mut self.settings).err())
            .collect();
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Preview a new logo immediately from memory; upload waits for save.
    pub async fn select_logo(
        &mut self,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<LogoSelection, InvoiceError> {
        if !content_type.starts_with("image/") {
            return Err(InvoiceError::Image(format!(
                "'{}' is not an image; choose a PNG, JPEG or similar file",
                content_type
            )));
        }
        if let Err(e) = image::load_from_memory(&bytes) {
            return Err(InvoiceError::Image(format!("the file could not be read as an image ({})", e)));
        }

        let reference = self.services.blobs.insert(bytes.clone(), content_type).await;
        let palette_bytes = bytes.clone();
        let extracted = tokio::task::spawn_blocking(move || {
            palette::extract_palette_from_bytes(&palette_bytes)
        })
        .await;
        let colors = match extracted {
            Ok(colors) => colors,
            Err(e) => {
                self.services.blobs.remove(&reference).await;
                return Err(InvoiceError::Image(format!("palette extraction failed: {}", e)));
            }
        };

        // The previous selection stays live until the new one is complete.
        if let Some(previous) = self.pending_logo.take() {
            self.services.blobs.remove(&previous.reference).await;
        }
        self.palette = colors;
        self.theme_index = 0;
        self.settings.logo_url = Some(reference.clone());
        self.pending_logo = Some(PendingLogo {
            reference: reference.clone(),
            bytes,
            content_type: content_type.to_string(),
            uploaded_url: None,
        });

        Ok(LogoSelection {
            preview_url: blob_url(&reference),
            reference,
            palette: palette::to_hex_list(&self.palette),
        })
    }

    /// Merge one committed drag axis into the layout.
    pub fn commit_offset(&mut self, key: BlockKey, change: LayoutChange) {
        let offset = self.settings.layout.get_mut(key);
        match change {
            LayoutChange::X(x) => offset.x = x,
            LayoutChange::Y(y) => offset.y = y,
        }
    }

    /// Commit a drag that left `key` at `x`/`y`. An axis left out starts
    /// where it is.
    ///
    /// The drag is replayed against the block's measured rectangle on the
    /// invoice last previewed in edit mode, so what lands in the settings is
    /// snapped to the grid and keeps the block on its page. Returns the
    /// block's offset afterwards.
    pub async fn commit_drag(
        &mut self,
        key: BlockKey,
        x: Option<f64>,
        y: Option<f64>,
    ) -> Result<Offset, InvoiceError> {
        let data = self.edit_data.clone().unwrap_or_else(measuring_invoice);
        let (layout, _) = self.layout(&data).await;
        let origin = self.settings.offset(key);
        let pointer = (
            x.map_or(0.0, |x| x - origin.x),
            y.map_or(0.0, |y| y - origin.y),
        );

        let mut changes = Vec::with_capacity(2);
        let placed = {
            let mut preview =
                InteractivePreview::new(layout, self.settings.layout.clone(), |_, change| {
                    changes.push(change)
                });
            let placed = preview.pointer_down(key, (0.0, 0.0));
            preview.pointer_up(pointer);
            placed
        };
        if !placed {
            return Err(ValidationError::new(
                "layout",
                format!("The {} block is not on the invoice being edited", key),
            )
            .into());
        }

        for change in changes {
            self.commit_offset(key, change);
        }
        Ok(self.settings.offset(key))
    }

    /// Every offset back to zero in one assignment.
    pub fn reset_positions(&mut self) {
        self.settings.layout = LayoutOffsets::default();
    }

    /// Palette of the current logo, extracted once and then reused.
    pub async fn palette(&mut self) -> &[Rgb] {
        if self.palette.is_empty()
            && let Some(reference) = self.settings.logo().map(str::to_string)
            && let Some(bytes) = self.services.resolver.load_bytes(&reference).await
        {
            match tokio::task::spawn_blocking(move || palette::extract_palette_from_bytes(&bytes)).await {
                Ok(colors) => self.palette = colors,
                Err(e) => warn!("Palette extraction task failed: {}", e),
            }
        }
        &self.palette
    }

    /// Next theme suggestion from the cached palette.
    pub async fn next_theme(&mut self) -> Option<ThemeChoice> {
        let index = self.theme_index;
        let choice = ThemeChoice::cycle(self.palette().await, index);
        if choice.is_some() {
            self.theme_index = index + 1;
        }
        choice
    }

    /// Theme suggestion at `index` without advancing the cycle.
    pub async fn theme_at(&mut self, index: usize) -> Option<ThemeChoice> {
        ThemeChoice::cycle(self.palette().await, index)
    }

    /// Apply a theme's primary and accent colors as validated edits.
    pub fn apply_theme(&mut self, theme: &ThemeChoice) -> Result<(), InvoiceError> {
        let mut next = self.settings.clone();
        SettingsEdit::PrimaryColor(theme.primary.clone()).apply(&mut next)?;
        SettingsEdit::AccentColor(theme.accent.clone()).apply(&mut next)?;
        self.settings = next;
        Ok(())
    }

    /// Upload the pending logo, persist the settings, then cache the layout.
    ///
    /// Returns `Err` only when the settings themselves could not be stored.
    pub async fn save(&mut self) -> Result<SaveReport, InvoiceError> {
        let mut report = SaveReport::default();
        let mut to_persist = self.settings.clone();

        if let Some(pending) = self.pending_logo.as_mut() {
            let uploaded = match pending.uploaded_url.clone() {
                Some(url) => Ok(url),
                None => self
                    .services
                    .uploader
                    .upload(&self.tenant, &pending.bytes, &pending.content_type)
                    .await
                    .map(|uploaded| uploaded.url),
            };
            match uploaded {
                Ok(url) => {
                    pending.uploaded_url = Some(url.clone());
                    to_persist.logo_url = Some(url.clone());
                    report.uploaded_logo = Some(url);
                }
                Err(e) => {
                    warn!("Logo upload for {} failed: {}", self.tenant, e);
                    to_persist.logo_url = self.saved_logo.clone();
                    report.failures.push(SaveFailure {
                        part: "logo upload",
                        message: e.to_string(),
                    });
                }
            }
        }

        self.services.store.save(&self.tenant, &to_persist).await?;
        self.saved_logo = to_persist.logo_url.clone();

        if report.uploaded_logo.is_some()
            && let Some(pending) = self.pending_logo.take()
        {
            self.services.blobs.remove(&pending.reference).await;
            self.settings.logo_url = to_persist.logo_url.clone();
        }

        if let Err(e) = self
            .services
            .cache
            .put(&self.tenant, &self.settings.layout)
            .await
        {
            warn!("Layout cache update for {} failed: {}", self.tenant, e);
            report.failures.push(SaveFailure {
                part: "layout cache",
                message: e.to_string(),
            });
        }

        info!("Saved invoice settings for {}: {}", self.tenant, report.message());
        Ok(report)
    }

    /// Layout of `data` with the current settings and logo.
    pub async fn layout(&self, data: &InvoiceData) -> (DocumentLayout, Option<LoadedLogo>) {
        let logo = self.load_logo().await;
        let layout = layout::layout(&self.settings, data, logo.as_ref().map(LoadedLogo::size));
        (layout, logo)
    }

    /// HTML preview. Local `blob:` logos are pointed at the blob route.
    ///
    /// An edit-mode preview also becomes the invoice later drags are
    /// measured against.
    pub async fn preview_html(&mut self, data: &InvoiceData, mode: RenderMode) -> String {
        if mode == RenderMode::Edit {
            self.edit_data = Some(data.clone());
        }
        let (layout, _) = self.layout(data).await;
        let mut renderer = ScreenRenderer::new(mode);
        if let Some(reference) = self.settings.logo()
            && reference.starts_with(BLOB_PREFIX)
        {
            renderer = renderer.with_logo_src(blob_url(reference));
        }
        renderer.render_html(&self.settings, &layout)
    }

    /// PNG preview of every page stacked.
    pub async fn preview_png(&self, data: InvoiceData) -> Result<Vec<u8>, InvoiceError> {
        let (layout, logo) = self.layout(&data).await;
        let settings = self.settings.clone();
        tokio::task::spawn_blocking(move || {
            let bitmap = RasterRenderer::default().render_stacked(&settings, &layout, logo.as_ref());
            raster::encode_png(&bitmap)
        })
        .await
        .map_err(|e| InvoiceError::Render(format!("preview task failed: {}", e)))?
    }

    /// Export with the current (possibly unsaved) settings.
    pub async fn export(
        &self,
        strategy: ExportStrategy,
        data: InvoiceData,
    ) -> Result<ExportedPdf, InvoiceError> {
        data.check()?;
        let logo = self.load_logo().await;
        export::export_bytes(strategy, self.settings.clone(), data, logo).await
    }

    /// Drop the unsaved logo preview, if any, from the blob store.
    pub async fn discard_pending(&mut self) {
        if let Some(pending) = self.pending_logo.take() {
            self.services.blobs.remove(&pending.reference).await;
            self.settings.logo_url = self.saved_logo.clone();
        }
    }

    async fn load_logo(&self) -> Option<LoadedLogo> {
        let reference = self.settings.logo()?;
        self.services.resolver.load(reference).await
    }
}

/// Stand-in for drags committed before any edit preview was drawn.
fn measuring_invoice() -> InvoiceData {
    InvoiceData::new(
        "INV-0001",
        "",
        BillTo {
            name: "Customer".into(),
            ..Default::default()
        },
    )
    .item(LineItem::new("Item", 1, 0.0))
    .coverage("12 months")
}

/// Browser URL for a `blob:` reference.
pub fn blob_url(reference: &str) -> String {
    let id = reference.strip_prefix(BLOB_PREFIX).unwrap_or(reference);
    format!("{}/{}", BLOB_URL_PREFIX, id)
}
