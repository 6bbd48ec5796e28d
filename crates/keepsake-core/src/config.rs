//! Configuration module
//!
//! Configuration is read once from the environment (after loading an optional
//! `.env` file) and validated at construction, so the storage and metadata
//! collaborators built from it never see a half-configured backend.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    DEFAULT_JPEG_QUALITY, DEFAULT_METADATA_TABLE, DEFAULT_STORAGE_BUCKET, DEFAULT_STORAGE_PREFIX,
    EMPTY_GALLERY_REDIRECT_MS, MAX_VIDEO_SIZE_BYTES, PROBE_TIMEOUT_SECS, SESSION_TTL_HOURS,
    UNCONFIGURED_MARKER, VERIFY_BATCH_PAUSE_MS, VERIFY_BATCH_SIZE, VERIFY_SETTLE_DELAY_MS,
};
use crate::error::AppError;
use crate::storage_types::{MetadataBackend, StorageBackend};

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    // Collaborator selection
    pub storage_backend: StorageBackend,
    pub metadata_backend: MetadataBackend,
    // Supabase-compatible backend
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub storage_bucket: String,
    pub storage_prefix: String,
    pub metadata_table: String,
    // Local backends
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub database_url: Option<String>,
    // Event gate and session cache
    pub event_password: Option<String>,
    pub session_ttl_hours: i64,
    pub session_path: PathBuf,
    // Upload pipeline
    pub max_video_size_bytes: u64,
    pub jpeg_quality: f32,
    // Gallery reconciliation
    pub verify_batch_size: usize,
    pub verify_batch_pause_ms: u64,
    pub verify_settle_delay_ms: u64,
    pub empty_gallery_redirect_ms: u64,
    pub probe_timeout_secs: u64,
}

/// Read a variable, treating empty strings as unset.
fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    non_empty(value)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn default_session_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("keepsake")
        .join("session.json")
}

fn session_path_from_lookup<F>(get: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(get("SESSION_PATH"))
        .map(PathBuf::from)
        .unwrap_or_else(default_session_path)
}

/// `SESSION_PATH` alone, without validating the backend settings.
pub fn session_path_from_env() -> PathBuf {
    dotenvy::dotenv().ok();
    session_path_from_lookup(|key| env::var(key).ok())
}

pub fn session_path_from_map(vars: &HashMap<String, String>) -> PathBuf {
    session_path_from_lookup(|key| vars.get(key).cloned())
}

/// True when an endpoint/key value is present and not a template placeholder.
pub fn is_configured_value(value: Option<&str>) -> bool {
    matches!(value, Some(v) if !v.trim().is_empty() && !v.contains(UNCONFIGURED_MARKER))
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// A `.env` file in the working directory is loaded first when present.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an explicit map (used by tests and embedders).
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, AppError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup<F>(get: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage_backend = match non_empty(get("STORAGE_BACKEND")) {
            Some(s) => s
                .parse()
                .map_err(|e: anyhow::Error| AppError::Configuration(e.to_string()))?,
            None => StorageBackend::Supabase,
        };
        let metadata_backend = match non_empty(get("METADATA_BACKEND")) {
            Some(s) => s
                .parse()
                .map_err(|e: anyhow::Error| AppError::Configuration(e.to_string()))?,
            None => MetadataBackend::Postgrest,
        };

        let config = Config {
            environment: non_empty(get("KEEPSAKE_ENV")).unwrap_or_else(|| "development".to_string()),
            storage_backend,
            metadata_backend,
            supabase_url: non_empty(get("SUPABASE_URL"))
                .map(|url| url.trim_end_matches('/').to_string()),
            supabase_anon_key: non_empty(get("SUPABASE_ANON_KEY")),
            storage_bucket: non_empty(get("STORAGE_BUCKET"))
                .unwrap_or_else(|| DEFAULT_STORAGE_BUCKET.to_string()),
            storage_prefix: non_empty(get("STORAGE_PREFIX"))
                .map(|p| p.trim_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_STORAGE_PREFIX.to_string()),
            metadata_table: non_empty(get("METADATA_TABLE"))
                .unwrap_or_else(|| DEFAULT_METADATA_TABLE.to_string()),
            local_storage_path: non_empty(get("LOCAL_STORAGE_PATH")),
            local_storage_base_url: non_empty(get("LOCAL_STORAGE_BASE_URL")),
            database_url: non_empty(get("DATABASE_URL")),
            event_password: get("EVENT_PASSWORD").filter(|s| !s.is_empty()),
            session_ttl_hours: parse_or(get("SESSION_TTL_HOURS"), SESSION_TTL_HOURS),
            session_path: session_path_from_lookup(&get),
            max_video_size_bytes: parse_or(get("MAX_VIDEO_SIZE_BYTES"), MAX_VIDEO_SIZE_BYTES),
            jpeg_quality: parse_or(get("JPEG_QUALITY"), DEFAULT_JPEG_QUALITY),
            verify_batch_size: parse_or(get("VERIFY_BATCH_SIZE"), VERIFY_BATCH_SIZE),
            verify_batch_pause_ms: parse_or(get("VERIFY_BATCH_PAUSE_MS"), VERIFY_BATCH_PAUSE_MS),
            verify_settle_delay_ms: parse_or(
                get("VERIFY_SETTLE_DELAY_MS"),
                VERIFY_SETTLE_DELAY_MS,
            ),
            empty_gallery_redirect_ms: parse_or(
                get("EMPTY_GALLERY_REDIRECT_MS"),
                EMPTY_GALLERY_REDIRECT_MS,
            ),
            probe_timeout_secs: parse_or(get("PROBE_TIMEOUT_SECS"), PROBE_TIMEOUT_SECS),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    /// Whether the Supabase endpoint and key are present and not placeholders.
    pub fn is_supabase_configured(&self) -> bool {
        is_configured_value(self.supabase_url.as_deref())
            && is_configured_value(self.supabase_anon_key.as_deref())
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.jpeg_quality > 0.0 && self.jpeg_quality <= 1.0) {
            return Err(AppError::Configuration(format!(
                "JPEG_QUALITY must be within (0, 1], got {}",
                self.jpeg_quality
            )));
        }

        if self.verify_batch_size == 0 {
            return Err(AppError::Configuration(
                "VERIFY_BATCH_SIZE must be at least 1".to_string(),
            ));
        }

        if self.session_ttl_hours <= 0 {
            return Err(AppError::Configuration(
                "SESSION_TTL_HOURS must be positive".to_string(),
            ));
        }

        if self.max_video_size_bytes == 0 {
            return Err(AppError::Configuration(
                "MAX_VIDEO_SIZE_BYTES must be positive".to_string(),
            ));
        }

        if self.storage_prefix.is_empty() || self.storage_prefix.contains("..") {
            return Err(AppError::Configuration(
                "STORAGE_PREFIX must be a non-empty path without '..'".to_string(),
            ));
        }

        match self.storage_backend {
            StorageBackend::Supabase => {
                if !self.is_supabase_configured() {
                    return Err(AppError::Configuration(
                        "SUPABASE_URL and SUPABASE_ANON_KEY must be set when using the supabase storage backend".to_string(),
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(AppError::Configuration(
                        "LOCAL_STORAGE_PATH must be set when using the local storage backend"
                            .to_string(),
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(AppError::Configuration(
                        "LOCAL_STORAGE_BASE_URL must be set when using the local storage backend"
                            .to_string(),
                    ));
                }
            }
        }

        match self.metadata_backend {
            MetadataBackend::Postgrest => {
                if !self.is_supabase_configured() {
                    return Err(AppError::Configuration(
                        "SUPABASE_URL and SUPABASE_ANON_KEY must be set when using the postgrest metadata backend".to_string(),
                    ));
                }
            }
            MetadataBackend::Sqlite => match self.database_url.as_deref() {
                Some(url) if url.starts_with("sqlite:") => {}
                _ => {
                    return Err(AppError::Configuration(
                        "DATABASE_URL must be a sqlite: connection string when using the sqlite metadata backend".to_string(),
                    ));
                }
            },
        }

        Ok(())
    }

    pub fn verify_batch_pause(&self) -> Duration {
        Duration::from_millis(self.verify_batch_pause_ms)
    }

    pub fn verify_settle_delay(&self) -> Duration {
        Duration::from_millis(self.verify_settle_delay_ms)
    }

    pub fn empty_gallery_redirect(&self) -> Duration {
        Duration::from_millis(self.empty_gallery_redirect_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}
