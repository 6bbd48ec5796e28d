//! Render-ready gallery entries.

use chrono::{DateTime, Utc};
use keepsake_core::constants::{LIGHTBOX_SIZE, THUMBNAIL_SIZE};
use keepsake_core::models::extension_of;
use keepsake_core::UploadRecord;
use keepsake_storage::{ImageTransform, Storage, StorageResult};
use regex::Regex;
use std::sync::LazyLock;

static VIDEO_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(mp4|mov|mkv|webm)$").expect("video name pattern is valid"));

pub fn is_video_name(file_name: &str) -> bool {
    VIDEO_NAME.is_match(file_name)
}

pub fn is_heic_name(file_name: &str) -> bool {
    extension_of(file_name).as_deref() == Some("heic")
}

/// `1 memory`, `3 memories`.
pub fn memories_label(count: usize) -> String {
    if count == 1 {
        format!("{} memory", count)
    } else {
        format!("{} memories", count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryEntry {
    pub id: i64,
    pub file_name: String,
    pub uploader_name: Option<String>,
    pub storage_key: String,
    pub created_at: DateTime<Utc>,
    pub is_video: bool,
    pub full_url: String,
    /// Videos use the full URL; images a 300x300 cover crop.
    pub thumbnail_url: String,
    /// HEIC files use a 600x600 cover rendition, since viewers rarely display HEIC.
    pub lightbox_url: String,
}

impl GalleryEntry {
    /// Derive URLs for a record. The record must carry a storage key.
    pub fn from_record(record: UploadRecord, storage: &dyn Storage) -> StorageResult<Self> {
        let is_video = is_video_name(&record.file_name);
        let full_url = storage.public_url(&record.file_path)?;

        let thumbnail_url = if is_video {
            full_url.clone()
        } else {
            storage.transformed_url(
                &record.file_path,
                &ImageTransform::square_cover(THUMBNAIL_SIZE),
            )?
        };

        let lightbox_url = if is_heic_name(&record.file_name) {
            storage.transformed_url(
                &record.file_path,
                &ImageTransform::square_cover(LIGHTBOX_SIZE),
            )?
        } else {
            full_url.clone()
        };

        Ok(Self {
            id: record.id,
            file_name: record.file_name,
            uploader_name: record.uploader_name,
            storage_key: record.file_path,
            created_at: record.created_at,
            is_video,
            full_url,
            thumbnail_url,
            lightbox_url,
        })
    }
}
