//! Keepsake Storage Library
//!
//! This crate provides the storage collaborator abstraction and its backends:
//! a Supabase-compatible REST backend and a local filesystem backend.
//!
//! # Storage key format
//!
//! Every uploaded object lives under
//! `<collection-prefix>/<millisecond-timestamp>-<random-suffix>-<sanitized-filename>`.
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in the
//! `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(any(test, feature = "test-helpers"))]
pub mod memory;
#[cfg(feature = "storage-supabase")]
pub mod supabase;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::{generate_storage_key, validate_storage_key};
pub use keepsake_core::StorageBackend;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(any(test, feature = "test-helpers"))]
pub use memory::MemoryStorage;
#[cfg(feature = "storage-supabase")]
pub use supabase::SupabaseStorage;
pub use traits::{ImageTransform, ResizeMode, Storage, StorageError, StorageResult};
