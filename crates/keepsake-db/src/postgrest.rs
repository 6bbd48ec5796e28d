//! PostgREST metadata store (the `rest/v1` API of a Supabase project).

use crate::traits::{validate_table_name, RepositoryError, RepositoryResult, UploadRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keepsake_core::config::is_configured_value;
use keepsake_core::{NewUploadRecord, UploadRecord};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::time::Duration;

const SELECT_COLUMNS: &str = "id,file_path,file_name,uploader_name,file_url,created_at";

/// Row as returned by PostgREST. Legacy rows may lack a path or name.
#[derive(Debug, Deserialize)]
struct UploadRow {
    id: i64,
    file_path: Option<String>,
    file_name: Option<String>,
    uploader_name: Option<String>,
    file_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<UploadRow> for UploadRecord {
    fn from(row: UploadRow) -> Self {
        UploadRecord {
            id: row.id,
            file_path: row.file_path.unwrap_or_default(),
            file_name: row.file_name.unwrap_or_default(),
            uploader_name: row.uploader_name,
            file_url: row.file_url,
            created_at: row.created_at,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PostgrestUploadRepository {
    client: Client,
    table_url: String,
    api_key: String,
}

impl PostgrestUploadRepository {
    pub fn new(base_url: &str, api_key: &str, table: &str) -> RepositoryResult<Self> {
        if !is_configured_value(Some(base_url)) || !is_configured_value(Some(api_key)) {
            return Err(RepositoryError::ConfigError(
                "Supabase is not configured. Set SUPABASE_URL and SUPABASE_ANON_KEY.".to_string(),
            ));
        }
        validate_table_name(table)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                RepositoryError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            table_url: format!("{}/rest/v1/{}", base_url.trim_end_matches('/'), table),
            api_key: api_key.to_string(),
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
    }

    async fn send(&self, builder: RequestBuilder) -> RepositoryResult<Response> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|e| RepositoryError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(RepositoryError::Request(format!(
            "status {}: {}",
            status, body
        )))
    }
}

#[async_trait]
impl UploadRepository for PostgrestUploadRepository {
    #[tracing::instrument(skip(self, record), fields(db.operation = "insert"))]
    async fn insert(&self, record: NewUploadRecord) -> RepositoryResult<UploadRecord> {
        let response = self
            .send(
                self.client
                    .post(&self.table_url)
                    .header("Prefer", "return=representation")
                    .json(&[&record]),
            )
            .await?;

        let rows: Vec<UploadRow> = response
            .json()
            .await
            .map_err(|e| RepositoryError::UnexpectedResponse(e.to_string()))?;

        rows.into_iter()
            .next()
            .map(UploadRecord::from)
            .ok_or_else(|| {
                RepositoryError::UnexpectedResponse("insert returned no rows".to_string())
            })
    }

    #[tracing::instrument(skip(self), fields(db.operation = "select"))]
    async fn list_newest_first(&self) -> RepositoryResult<Vec<UploadRecord>> {
        let response = self
            .send(
                self.client
                    .get(&self.table_url)
                    .query(&[("select", SELECT_COLUMNS), ("order", "created_at.desc")]),
            )
            .await?;

        let rows: Vec<UploadRow> = response
            .json()
            .await
            .map_err(|e| RepositoryError::UnexpectedResponse(e.to_string()))?;

        Ok(rows.into_iter().map(UploadRecord::from).collect())
    }

    #[tracing::instrument(skip(self), fields(db.operation = "delete", db.record_id = id))]
    async fn delete_by_id(&self, id: i64) -> RepositoryResult<()> {
        self.send(
            self.client
                .delete(&self.table_url)
                .query(&[("id", format!("eq.{}", id))]),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn repo(server: &mockito::Server) -> PostgrestUploadRepository {
        PostgrestUploadRepository::new(&server.url(), "anon", "uploads").unwrap()
    }

    #[test]
    fn placeholder_configuration_is_rejected() {
        let result =
            PostgrestUploadRepository::new("https://p.supabase.co", "YOUR_ANON_KEY", "uploads");
        assert!(matches!(result, Err(RepositoryError::ConfigError(_))));
    }

    #[tokio::test]
    async fn insert_returns_representation() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/uploads")
            .match_header("prefer", "return=representation")
            .match_header("apikey", "anon")
            .match_body(Matcher::Regex(
                r#"^\[\{.*"file_path":"public/1-abc-a\.jpg".*\}\]$"#.into(),
            ))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"id":7,"file_path":"public/1-abc-a.jpg","file_name":"a.jpg","uploader_name":"Amy","file_url":"https://cdn.test/a.jpg","created_at":"2024-06-01T12:00:00.123456+00:00"}]"#,
            )
            .create_async()
            .await;

        let record = repo(&server)
            .insert(NewUploadRecord {
                file_name: "a.jpg".to_string(),
                file_path: "public/1-abc-a.jpg".to_string(),
                uploader_name: Some("Amy".to_string()),
                file_url: "https://cdn.test/a.jpg".to_string(),
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(record.id, 7);
        assert_eq!(record.file_url.as_deref(), Some("https://cdn.test/a.jpg"));
    }

    #[tokio::test]
    async fn list_orders_newest_first_and_tolerates_null_paths() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/rest/v1/uploads")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("select".into(), SELECT_COLUMNS.into()),
                Matcher::UrlEncoded("order".into(), "created_at.desc".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"id":2,"file_path":"public/2-x-b.jpg","file_name":"b.jpg","uploader_name":null,"file_url":null,"created_at":"2024-06-02T00:00:00+00:00"},
                    {"id":1,"file_path":null,"file_name":"legacy.jpg","uploader_name":"Bo","file_url":null,"created_at":"2024-06-01T00:00:00+00:00"}
                ]"#,
            )
            .create_async()
            .await;

        let rows = repo(&server).list_newest_first().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, 2);
        assert!(rows[0].has_storage_key());
        assert!(!rows[1].has_storage_key());
    }

    #[tokio::test]
    async fn delete_targets_single_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/rest/v1/uploads")
            .match_query(Matcher::UrlEncoded("id".into(), "eq.42".into()))
            .with_status(204)
            .create_async()
            .await;

        repo(&server).delete_by_id(42).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_error_is_a_request_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/rest/v1/uploads")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let err = repo(&server).list_newest_first().await.unwrap_err();
        match err {
            RepositoryError::Request(message) => assert!(message.contains("boom")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
