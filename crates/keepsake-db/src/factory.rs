#[cfg(feature = "metadata-postgrest")]
use crate::PostgrestUploadRepository;
#[cfg(feature = "metadata-sqlite")]
use crate::SqliteUploadRepository;
use crate::{RepositoryError, RepositoryResult, UploadRepository};
use keepsake_core::{Config, MetadataBackend};
use std::sync::Arc;

/// Create the metadata collaborator selected by configuration
pub async fn create_upload_repository(
    config: &Config,
) -> RepositoryResult<Arc<dyn UploadRepository>> {
    match config.metadata_backend {
        #[cfg(feature = "metadata-postgrest")]
        MetadataBackend::Postgrest => {
            let base_url = config.supabase_url.as_deref().ok_or_else(|| {
                RepositoryError::ConfigError("SUPABASE_URL not configured".to_string())
            })?;
            let api_key = config.supabase_anon_key.as_deref().ok_or_else(|| {
                RepositoryError::ConfigError("SUPABASE_ANON_KEY not configured".to_string())
            })?;

            tracing::info!(table = %config.metadata_table, "Initializing PostgREST metadata store");
            let repo = PostgrestUploadRepository::new(base_url, api_key, &config.metadata_table)?;
            Ok(Arc::new(repo))
        }

        #[cfg(not(feature = "metadata-postgrest"))]
        MetadataBackend::Postgrest => Err(RepositoryError::ConfigError(
            "PostgREST metadata backend not available (metadata-postgrest feature not enabled)"
                .to_string(),
        )),

        #[cfg(feature = "metadata-sqlite")]
        MetadataBackend::Sqlite => {
            let database_url = config.database_url.as_deref().ok_or_else(|| {
                RepositoryError::ConfigError("DATABASE_URL not configured".to_string())
            })?;

            tracing::info!(table = %config.metadata_table, "Initializing SQLite metadata store");
            let repo = SqliteUploadRepository::connect(database_url, &config.metadata_table).await?;
            Ok(Arc::new(repo))
        }

        #[cfg(not(feature = "metadata-sqlite"))]
        MetadataBackend::Sqlite => Err(RepositoryError::ConfigError(
            "SQLite metadata backend not available (metadata-sqlite feature not enabled)"
                .to_string(),
        )),
    }
}
