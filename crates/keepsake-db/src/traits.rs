use async_trait::async_trait;
use keepsake_core::{AppError, NewUploadRecord, UploadRecord};
use thiserror::Error;

/// Metadata store errors
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[cfg(feature = "metadata-sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Metadata request failed: {0}")]
    Request(String),

    #[error("Unexpected metadata response: {0}")]
    UnexpectedResponse(String),

    #[error("Record not found: {0}")]
    NotFound(i64),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::ConfigError(msg) => AppError::Configuration(msg),
            RepositoryError::NotFound(id) => AppError::NotFound(format!("upload {}", id)),
            #[cfg(feature = "metadata-sqlite")]
            RepositoryError::Database(e) => AppError::Internal(e.to_string()),
            other => AppError::Network(other.to_string()),
        }
    }
}

/// Metadata collaborator.
///
/// Ids and creation timestamps are assigned by the store.
#[async_trait]
pub trait UploadRepository: Send + Sync {
    /// Insert a row for a stored object and return it as persisted.
    async fn insert(&self, record: NewUploadRecord) -> RepositoryResult<UploadRecord>;

    /// Every row, newest first.
    async fn list_newest_first(&self) -> RepositoryResult<Vec<UploadRecord>>;

    /// Remove a row. Deleting an id that does not exist is not an error.
    async fn delete_by_id(&self, id: i64) -> RepositoryResult<()>;
}

/// Table names are interpolated into SQL and URLs, so only `[A-Za-z0-9_]` is allowed.
pub fn validate_table_name(table: &str) -> RepositoryResult<()> {
    let valid = !table.is_empty()
        && !table.starts_with(|c: char| c.is_ascii_digit())
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(RepositoryError::ConfigError(format!(
            "Invalid metadata table name: {:?}",
            table
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names() {
        assert!(validate_table_name("uploads").is_ok());
        assert!(validate_table_name("guest_uploads_2024").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("1uploads").is_err());
        assert!(validate_table_name("uploads; DROP TABLE x").is_err());
    }

    #[test]
    fn errors_map_to_taxonomy() {
        let app: AppError = RepositoryError::ConfigError("missing".into()).into();
        assert!(matches!(app, AppError::Configuration(_)));

        let app: AppError = RepositoryError::Request("timeout".into()).into();
        assert!(matches!(app, AppError::Network(_)));
    }
}
