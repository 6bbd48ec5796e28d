//! Keepsake Core Library
//!
//! This crate provides the domain models, error type, configuration and input
//! sanitizers shared by every Keepsake component.

pub mod config;
pub mod constants;
pub mod error;
pub mod format;
pub mod models;
pub mod sanitize;
pub mod storage_types;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use format::format_file_size;
pub use models::{
    Credentials, MediaItem, MediaKind, NewUploadRecord, SelectedFile, SessionRecord, UploadRecord,
};
pub use sanitize::{sanitize_filename, sanitize_uploader_name};
pub use storage_types::{MetadataBackend, StorageBackend};
