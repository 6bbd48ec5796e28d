//! Deployment constants and configuration defaults.

/// Bucket holding the uploaded media.
pub const DEFAULT_STORAGE_BUCKET: &str = "guest-media";

/// Collection prefix every storage key starts with.
pub const DEFAULT_STORAGE_PREFIX: &str = "public";

/// Metadata table with one row per upload.
pub const DEFAULT_METADATA_TABLE: &str = "uploads";

/// 200 MiB, roughly five minutes of HD video.
pub const MAX_VIDEO_SIZE_BYTES: u64 = 200 * 1024 * 1024;

/// JPEG quality as a 0-1 fraction.
pub const DEFAULT_JPEG_QUALITY: f32 = 0.8;

pub const MAX_UPLOADER_NAME_CHARS: usize = 100;

/// Longest sanitized file name kept in a storage key.
pub const MAX_FILENAME_CHARS: usize = 200;

pub const FALLBACK_FILENAME: &str = "file";

/// Existence probes issued concurrently per reconciliation batch.
pub const VERIFY_BATCH_SIZE: usize = 5;

pub const VERIFY_BATCH_PAUSE_MS: u64 = 100;

/// Delay between gallery activation and the start of the sweep.
pub const VERIFY_SETTLE_DELAY_MS: u64 = 500;

pub const EMPTY_GALLERY_REDIRECT_MS: u64 = 1500;

pub const PROBE_TIMEOUT_SECS: u64 = 10;

pub const SESSION_TTL_HOURS: i64 = 24;

pub const THUMBNAIL_SIZE: u32 = 300;

pub const LIGHTBOX_SIZE: u32 = 600;

/// Placeholder marker left in unedited `.env` templates.
pub const UNCONFIGURED_MARKER: &str = "YOUR_";
