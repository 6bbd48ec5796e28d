//! Supabase-compatible storage backend.
//!
//! Talks to the `storage/v1` REST API: objects are written with
//! `POST /object/{bucket}/{key}`, served from `/object/public/{bucket}/{key}`
//! and resized through `/render/image/public/{bucket}/{key}`.

use crate::keys::validate_storage_key;
use crate::traits::{ImageTransform, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use keepsake_core::config::is_configured_value;
use reqwest::Client;
use std::time::Duration;

/// Storage backend for a Supabase project bucket
#[derive(Clone, Debug)]
pub struct SupabaseStorage {
    client: Client,
    base_url: String,
    api_key: String,
    bucket: String,
}

impl SupabaseStorage {
    pub fn new(base_url: &str, api_key: &str, bucket: &str) -> StorageResult<Self> {
        if !is_configured_value(Some(base_url)) || !is_configured_value(Some(api_key)) {
            return Err(StorageError::ConfigError(
                "Supabase is not configured. Set SUPABASE_URL and SUPABASE_ANON_KEY.".to_string(),
            ));
        }
        if bucket.trim().is_empty() {
            return Err(StorageError::ConfigError(
                "STORAGE_BUCKET must not be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| StorageError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            bucket: bucket.to_string(),
        })
    }

    fn encoded_path(storage_key: &str) -> String {
        storage_key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn object_url(&self, storage_key: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.bucket,
            Self::encoded_path(storage_key)
        )
    }
}

#[async_trait]
impl Storage for SupabaseStorage {
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<()> {
        validate_storage_key(storage_key)?;
        let size = data.len();
        let start = std::time::Instant::now();

        let response = self
            .client
            .post(self.object_url(storage_key))
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .header("cache-control", "max-age=3600")
            .body(data)
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StorageError::UploadFailed(format!(
                "status {}: {}",
                status, error_text
            )));
        }

        tracing::info!(
            key = %storage_key,
            bucket = %self.bucket,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Supabase storage upload successful"
        );

        Ok(())
    }

    fn public_url(&self, storage_key: &str) -> StorageResult<String> {
        validate_storage_key(storage_key)?;
        Ok(format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            self.bucket,
            Self::encoded_path(storage_key)
        ))
    }

    fn transformed_url(
        &self,
        storage_key: &str,
        transform: &ImageTransform,
    ) -> StorageResult<String> {
        validate_storage_key(storage_key)?;
        Ok(format!(
            "{}/storage/v1/render/image/public/{}/{}?width={}&height={}&resize={}",
            self.base_url,
            self.bucket,
            Self::encoded_path(storage_key),
            transform.width,
            transform.height,
            transform.resize
        ))
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let url = self.public_url(storage_key)?;
        let response = self
            .client
            .head(&url)
            .header("Cache-Control", "no-cache")
            .send()
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;
        Ok(response.status().is_success())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Supabase
    }
}
