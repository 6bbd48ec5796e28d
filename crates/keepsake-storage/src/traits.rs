//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use keepsake_core::AppError;
use std::fmt::{Display, Formatter, Result as FmtResult};
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConfigError(msg) => AppError::Configuration(msg),
            StorageError::NotFound(key) => AppError::NotFound(key),
            StorageError::InvalidKey(msg) => AppError::Validation(msg),
            other => AppError::Network(other.to_string()),
        }
    }
}

/// How a transformed image is fitted into the requested box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeMode {
    Cover,
    Contain,
    Fill,
}

impl Display for ResizeMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ResizeMode::Cover => write!(f, "cover"),
            ResizeMode::Contain => write!(f, "contain"),
            ResizeMode::Fill => write!(f, "fill"),
        }
    }
}

/// Server-side resize requested through a derived URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageTransform {
    pub width: u32,
    pub height: u32,
    pub resize: ResizeMode,
}

impl ImageTransform {
    /// Square `cover` crop, as used for gallery thumbnails.
    pub fn square_cover(size: u32) -> Self {
        Self {
            width: size,
            height: size,
            resize: ResizeMode::Cover,
        }
    }
}

/// Storage abstraction trait
///
/// The upload pipeline only ever writes objects and derives URLs for them;
/// the gallery additionally asks whether an object still exists. Object bytes
/// are never read back.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `data` under `storage_key`. Existing objects are not overwritten.
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Durable public URL for a key.
    fn public_url(&self, storage_key: &str) -> StorageResult<String>;

    /// URL of a resized rendition. Backends without a transform service return
    /// the public URL.
    fn transformed_url(
        &self,
        storage_key: &str,
        transform: &ImageTransform,
    ) -> StorageResult<String>;

    /// Check if an object exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
