//! SQLite-backed metadata store
//!
//! The table is created on connect. `created_at` is stored as Unix
//! milliseconds so ordering is a plain integer comparison.

use crate::traits::{validate_table_name, RepositoryError, RepositoryResult, UploadRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keepsake_core::{NewUploadRecord, UploadRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;

pub struct SqliteUploadRepository {
    pool: SqlitePool,
    table: String,
}

impl SqliteUploadRepository {
    /// Connect to `database_url` (e.g. `sqlite://keepsake.db`), creating the
    /// database file and table when missing.
    pub async fn connect(database_url: &str, table: &str) -> RepositoryResult<Self> {
        validate_table_name(table)?;

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every connection to `sqlite::memory:` opens its own database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Self::from_pool(pool, table).await
    }

    /// Wrap an existing pool, creating the table if needed.
    pub async fn from_pool(pool: SqlitePool, table: &str) -> RepositoryResult<Self> {
        validate_table_name(table)?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_name TEXT NOT NULL,
                file_path TEXT NOT NULL DEFAULT '',
                uploader_name TEXT,
                file_url TEXT,
                created_at INTEGER NOT NULL
            )
            "#
        ))
        .execute(&pool)
        .await?;

        tracing::debug!(table = %table, "Initialized SQLite metadata store");

        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    fn map_row(row: &SqliteRow) -> RepositoryResult<UploadRecord> {
        let created_millis: i64 = row.try_get("created_at")?;
        let created_at = DateTime::<Utc>::from_timestamp_millis(created_millis).ok_or_else(|| {
            RepositoryError::UnexpectedResponse(format!(
                "created_at out of range: {}",
                created_millis
            ))
        })?;

        Ok(UploadRecord {
            id: row.try_get("id")?,
            file_path: row.try_get("file_path")?,
            file_name: row.try_get("file_name")?,
            uploader_name: row.try_get("uploader_name")?,
            file_url: row.try_get("file_url")?,
            created_at,
        })
    }
}

#[async_trait]
impl UploadRepository for SqliteUploadRepository {
    #[tracing::instrument(skip(self, record), fields(db.table = %self.table, db.operation = "insert"))]
    async fn insert(&self, record: NewUploadRecord) -> RepositoryResult<UploadRecord> {
        let now = Utc::now();
        let created_millis = now.timestamp_millis();

        let result = sqlx::query(&format!(
            "INSERT INTO {} (file_name, file_path, uploader_name, file_url, created_at) VALUES (?, ?, ?, ?, ?)",
            self.table
        ))
        .bind(&record.file_name)
        .bind(&record.file_path)
        .bind(&record.uploader_name)
        .bind(&record.file_url)
        .bind(created_millis)
        .execute(&self.pool)
        .await?;

        Ok(UploadRecord {
            id: result.last_insert_rowid(),
            file_path: record.file_path,
            file_name: record.file_name,
            uploader_name: record.uploader_name,
            file_url: Some(record.file_url),
            created_at: DateTime::<Utc>::from_timestamp_millis(created_millis).unwrap_or(now),
        })
    }

    #[tracing::instrument(skip(self), fields(db.table = %self.table, db.operation = "select"))]
    async fn list_newest_first(&self) -> RepositoryResult<Vec<UploadRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT id, file_path, file_name, uploader_name, file_url, created_at FROM {} ORDER BY created_at DESC, id DESC",
            self.table
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::map_row).collect()
    }

    #[tracing::instrument(skip(self), fields(db.table = %self.table, db.operation = "delete", db.record_id = id))]
    async fn delete_by_id(&self, id: i64) -> RepositoryResult<()> {
        sqlx::query(&format!("DELETE FROM {} WHERE id = ?", self.table))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn repo() -> SqliteUploadRepository {
        SqliteUploadRepository::connect("sqlite::memory:", "uploads")
            .await
            .unwrap()
    }

    fn new_record(name: &str) -> NewUploadRecord {
        NewUploadRecord {
            file_name: name.to_string(),
            file_path: format!("public/1-abc-{}", name),
            uploader_name: Some("Amy".to_string()),
            file_url: format!("https://cdn.test/public/1-abc-{}", name),
        }
    }

    #[tokio::test]
    async fn insert_assigns_ids() {
        let repo = repo().await;
        let first = repo.insert(new_record("a.jpg")).await.unwrap();
        let second = repo.insert(new_record("b.jpg")).await.unwrap();

        assert!(second.id > first.id);
        assert_eq!(first.file_path, "public/1-abc-a.jpg");
        assert_eq!(first.uploader_name.as_deref(), Some("Amy"));
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let repo = repo().await;
        repo.insert(new_record("a.jpg")).await.unwrap();
        repo.insert(new_record("b.jpg")).await.unwrap();
        repo.insert(new_record("c.jpg")).await.unwrap();

        let names: Vec<String> = repo
            .list_newest_first()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.file_name)
            .collect();
        assert_eq!(names, vec!["c.jpg", "b.jpg", "a.jpg"]);
    }

    #[tokio::test]
    async fn delete_removes_only_target_row() {
        let repo = repo().await;
        let keep = repo.insert(new_record("keep.jpg")).await.unwrap();
        let gone = repo.insert(new_record("gone.jpg")).await.unwrap();

        repo.delete_by_id(gone.id).await.unwrap();
        repo.delete_by_id(9_999).await.unwrap();

        let rows = repo.list_newest_first().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, keep.id);
    }

    #[tokio::test]
    async fn rejects_unsafe_table_name() {
        let result = SqliteUploadRepository::connect("sqlite::memory:", "uploads; --").await;
        assert!(matches!(result, Err(RepositoryError::ConfigError(_))));
    }
}
