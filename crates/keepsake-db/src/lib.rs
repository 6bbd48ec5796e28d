//! Keepsake metadata store
//!
//! One row per upload, holding the sanitized file name, the storage key, the
//! optional uploader name and the derived public URL. The upload pipeline
//! inserts rows. The gallery lists them newest-first and deletes rows whose
//! backing object has disappeared.

pub mod factory;
#[cfg(any(test, feature = "test-helpers"))]
pub mod memory;
#[cfg(feature = "metadata-postgrest")]
pub mod postgrest;
#[cfg(feature = "metadata-sqlite")]
pub mod sqlite;
pub mod traits;

pub use factory::create_upload_repository;
#[cfg(any(test, feature = "test-helpers"))]
pub use memory::MemoryUploadRepository;
#[cfg(feature = "metadata-postgrest")]
pub use postgrest::PostgrestUploadRepository;
#[cfg(feature = "metadata-sqlite")]
pub use sqlite::SqliteUploadRepository;
pub use traits::{validate_table_name, RepositoryError, RepositoryResult, UploadRepository};
