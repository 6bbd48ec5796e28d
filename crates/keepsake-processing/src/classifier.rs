//! Media classification from the declared name and MIME type.
//!
//! Precedence: GIF first (by extension or MIME), then the image family
//! (`image/*` or a `.heic`/`.heif` extension), then `video/*`.

use keepsake_core::models::extension_of;
use keepsake_core::{MediaItem, MediaKind, SelectedFile};

const HEIC_EXTENSIONS: &[&str] = &["heic", "heif"];
const HEIC_MIME_TYPES: &[&str] = &[
    "image/heic",
    "image/heif",
    "image/heic-sequence",
    "image/heif-sequence",
];

/// Essence of a MIME type: lowercased, parameters dropped.
fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

/// Classify a file, or `None` when it is neither an image nor a video.
pub fn classify(file_name: &str, content_type: &str) -> Option<MediaKind> {
    let extension = extension_of(file_name);
    let ext = extension.as_deref().unwrap_or_default();
    let mime = mime_essence(content_type);

    if ext == "gif" || mime == "image/gif" {
        return Some(MediaKind::Gif);
    }

    let heic_extension = HEIC_EXTENSIONS.contains(&ext);
    if mime.starts_with("image/") || heic_extension {
        if heic_extension || HEIC_MIME_TYPES.contains(&mime.as_str()) {
            return Some(MediaKind::HeicImage);
        }
        return Some(MediaKind::Image);
    }

    if mime.starts_with("video/") {
        return Some(MediaKind::Video);
    }

    None
}

/// Classify a selected file, pairing it with its kind.
pub fn classify_file(file: SelectedFile) -> Result<MediaItem, SelectedFile> {
    match classify(&file.name, &file.content_type) {
        Some(kind) => Ok(MediaItem::new(file, kind)),
        None => Err(file),
    }
}
