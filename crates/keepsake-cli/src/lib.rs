//! Helpers shared by the `keepsake` binary.

use anyhow::Context;
use bytes::Bytes;
use keepsake_core::{Config, MediaKind, SelectedFile};
use keepsake_db::{create_upload_repository, UploadRepository};
use keepsake_processing::{classify, UploadOrchestrator, ValidationError};
use keepsake_services::GalleryReconciler;
use keepsake_storage::{create_storage, Storage};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Initialize tracing. `RUST_LOG` wins over `verbose`.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "keepsake=debug" } else { "keepsake=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Content type reported for a local file, by extension. Unknown extensions
/// get an empty type and are classified by name alone.
pub fn content_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        Some("heif") => "image/heif",
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        _ => "",
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Read files from disk into a selection, preserving order.
///
/// Video sizes are checked from file metadata first, so an oversized video
/// fails the selection without being loaded.
pub async fn read_selection(
    paths: &[PathBuf],
    max_video_size_bytes: u64,
) -> anyhow::Result<Vec<SelectedFile>> {
    let mut oversized = Vec::new();
    for path in paths {
        let name = display_name(path);
        if classify(&name, content_type_for_path(path)) != Some(MediaKind::Video) {
            continue;
        }
        let size = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?
            .len();
        if size > max_video_size_bytes {
            oversized.push((name, size));
        }
    }
    if !oversized.is_empty() {
        return Err(ValidationError::OversizedVideos {
            files: oversized,
            max_bytes: max_video_size_bytes,
        }
        .into());
    }

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        files.push(SelectedFile::new(
            display_name(path),
            content_type_for_path(path),
            Bytes::from(data),
        ));
    }
    Ok(files)
}

/// Storage and metadata collaborators built from configuration.
pub struct Services {
    pub config: Config,
    pub storage: Arc<dyn Storage>,
    pub repository: Arc<dyn UploadRepository>,
}

impl Services {
    pub async fn connect(config: Config) -> anyhow::Result<Self> {
        let storage = create_storage(&config)
            .await
            .context("Failed to initialize storage")?;
        let repository = create_upload_repository(&config)
            .await
            .context("Failed to initialize metadata store")?;
        tracing::debug!(
            storage = ?config.storage_backend,
            metadata = ?config.metadata_backend,
            "Services connected"
        );
        Ok(Self {
            config,
            storage,
            repository,
        })
    }

    pub fn orchestrator(&self) -> UploadOrchestrator {
        UploadOrchestrator::from_config(
            &self.config,
            self.storage.clone(),
            self.repository.clone(),
        )
    }

    pub fn reconciler(&self) -> anyhow::Result<GalleryReconciler> {
        GalleryReconciler::from_config(
            &self.config,
            self.repository.clone(),
            self.storage.clone(),
        )
        .context("Failed to create existence probe")
    }
}
