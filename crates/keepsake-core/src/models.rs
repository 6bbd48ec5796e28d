//! Domain models
//!
//! `SelectedFile` and `MediaItem` are transient, client-local values that live
//! from file selection until the upload settles. `UploadRecord` mirrors a row of
//! the remote metadata table, and `SessionRecord` is the locally cached login.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// How a selected file is handled by the upload pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaKind {
    Image,
    HeicImage,
    /// Uploaded untouched so animation survives.
    Gif,
    Video,
}

impl MediaKind {
    /// Image or HEIC image. GIFs are deliberately excluded.
    pub fn is_image_family(self) -> bool {
        matches!(self, MediaKind::Image | MediaKind::HeicImage)
    }

    /// Whether files of this kind go through the image transcoder.
    pub fn needs_transcode(self) -> bool {
        self.is_image_family()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::HeicImage => "heic-image",
            MediaKind::Gif => "gif",
            MediaKind::Video => "video",
        }
    }
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// A file picked by the guest: raw bytes plus the declared name and MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }

    /// Lowercased extension of the declared name, if any.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.name)
    }
}

/// Lowercased extension of a file name (`"IMG_01.HEIC"` -> `"heic"`).
pub fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if ext.is_empty() || ext.contains(['/', '\\']) || stem.ends_with(['/', '\\']) {
        return None;
    }
    Some(ext.to_lowercase())
}

/// A selected file together with its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub file: SelectedFile,
    pub kind: MediaKind,
}

impl MediaItem {
    pub fn new(file: SelectedFile, kind: MediaKind) -> Self {
        Self { file, kind }
    }

    pub fn size_bytes(&self) -> u64 {
        self.file.size_bytes()
    }

    pub fn name(&self) -> &str {
        &self.file.name
    }
}

/// A row of the metadata table.
///
/// Every record with a non-empty `file_path` is expected to reference a live
/// stored object; rows with an empty path predate key tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub id: i64,
    pub file_path: String,
    pub file_name: String,
    pub uploader_name: Option<String>,
    pub file_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UploadRecord {
    pub fn has_storage_key(&self) -> bool {
        !self.file_path.trim().is_empty()
    }
}

/// Values inserted for a new upload; id and timestamp are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUploadRecord {
    pub file_name: String,
    pub file_path: String,
    pub uploader_name: Option<String>,
    pub file_url: String,
}

/// Locally cached login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub name: String,
    pub secret: String,
    pub saved_at_millis: i64,
    pub expires_at_millis: i64,
}

impl SessionRecord {
    pub fn is_expired(&self, now_millis: i64) -> bool {
        now_millis > self.expires_at_millis
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            name: self.name.clone(),
            secret: self.secret.clone(),
        }
    }
}

/// Name and shared secret recovered from the session cache.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub name: String,
    pub secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Credentials")
            .field("name", &self.name)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(extension_of("IMG_0001.HEIC"), Some("heic".to_string()));
        assert_eq!(extension_of("clip.final.MP4"), Some("mp4".to_string()));
    }

    #[test]
    fn missing_extension() {
        assert_eq!(extension_of("README"), None);
        assert_eq!(extension_of("photo."), None);
        assert_eq!(extension_of("dir.d/photo"), None);
    }

    #[test]
    fn image_family_excludes_gif_and_video() {
        assert!(MediaKind::Image.is_image_family());
        assert!(MediaKind::HeicImage.is_image_family());
        assert!(!MediaKind::Gif.is_image_family());
        assert!(!MediaKind::Video.needs_transcode());
    }

    #[test]
    fn legacy_rows_have_no_storage_key() {
        let record = UploadRecord {
            id: 1,
            file_path: "  ".to_string(),
            file_name: "old.jpg".to_string(),
            uploader_name: None,
            file_url: None,
            created_at: Utc::now(),
        };
        assert!(!record.has_storage_key());
    }

    #[test]
    fn session_expiry_is_strict() {
        let record = SessionRecord {
            name: "Amy".to_string(),
            secret: "secret123".to_string(),
            saved_at_millis: 0,
            expires_at_millis: 1_000,
        };
        assert!(!record.is_expired(1_000));
        assert!(record.is_expired(1_001));
    }

    #[test]
    fn credentials_debug_redacts_secret() {
        let creds = Credentials {
            name: "Amy".to_string(),
            secret: "secret123".to_string(),
        };
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("Amy"));
        assert!(!rendered.contains("secret123"));
    }
}
