//! Shared key generation for storage backends.
//!
//! Key format: `<prefix>/<millisecond-timestamp>-<random-suffix>-<filename>`.
//! The filename must already be sanitized. Collisions are not retried.

use crate::traits::{StorageError, StorageResult};
use rand::distr::Alphanumeric;
use rand::Rng;

const SUFFIX_LEN: usize = 8;

/// Generate a storage key for a sanitized file name, stamped with the current time.
pub fn generate_storage_key(prefix: &str, sanitized_filename: &str) -> String {
    let now_millis = chrono::Utc::now().timestamp_millis();
    storage_key_at(prefix, sanitized_filename, now_millis, &random_suffix())
}

/// Deterministic variant of [`generate_storage_key`].
pub fn storage_key_at(prefix: &str, sanitized_filename: &str, millis: i64, suffix: &str) -> String {
    format!(
        "{}/{}-{}-{}",
        prefix.trim_matches('/'),
        millis,
        suffix,
        sanitized_filename
    )
}

/// Lowercase alphanumeric suffix that separates uploads in the same millisecond.
pub fn random_suffix() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

/// Reject keys that could escape the bucket or the storage directory.
pub fn validate_storage_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if storage_key.contains("..") || storage_key.starts_with('/') || storage_key.contains('\\') {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains invalid characters: {}",
            storage_key
        )));
    }
    Ok(())
}
