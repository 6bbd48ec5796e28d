//! Existence probes used by the reconciliation sweep.
//!
//! A probe never reads object bytes. Callers treat an error exactly like a
//! missing object.

use async_trait::async_trait;
use keepsake_core::AppError;
use keepsake_storage::{Storage, StorageError};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Probe request failed: {0}")]
    Request(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<ProbeError> for AppError {
    fn from(err: ProbeError) -> Self {
        match err {
            ProbeError::ConfigError(msg) => AppError::Configuration(msg),
            other => AppError::Network(other.to_string()),
        }
    }
}

/// What a probe checks: the storage key and the public URL derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub key: String,
    pub url: String,
}

#[async_trait]
pub trait ExistenceProbe: Send + Sync {
    /// `Ok(true)` only when the object is confirmed present.
    async fn exists(&self, target: &ProbeTarget) -> Result<bool, ProbeError>;
}

/// HEAD request against the public URL with caches bypassed.
#[derive(Clone, Debug)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ExistenceProbe for HttpProbe {
    async fn exists(&self, target: &ProbeTarget) -> Result<bool, ProbeError> {
        let response = self
            .client
            .head(&target.url)
            .header("Cache-Control", "no-cache, no-store")
            .header("Pragma", "no-cache")
            .send()
            .await
            .map_err(|e| ProbeError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(key = %target.key, status = status.as_u16(), "Probe returned non-success status");
        }
        Ok(status.is_success())
    }
}

/// Asks the storage collaborator directly, by key.
#[derive(Clone)]
pub struct StorageProbe {
    storage: Arc<dyn Storage>,
}

impl StorageProbe {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl ExistenceProbe for StorageProbe {
    async fn exists(&self, target: &ProbeTarget) -> Result<bool, ProbeError> {
        Ok(self.storage.exists(&target.key).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use keepsake_storage::MemoryStorage;

    fn target(server: &mockito::Server, path: &str) -> ProbeTarget {
        ProbeTarget {
            key: path.trim_start_matches('/').to_string(),
            url: format!("{}{}", server.url(), path),
        }
    }

    #[tokio::test]
    async fn http_probe_bypasses_cache() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("HEAD", "/media/public/a.jpg")
            .match_header("cache-control", "no-cache, no-store")
            .match_header("pragma", "no-cache")
            .with_status(200)
            .create_async()
            .await;

        let probe = HttpProbe::new(Duration::from_secs(5)).unwrap();
        assert!(probe
            .exists(&target(&server, "/media/public/a.jpg"))
            .await
            .unwrap());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn http_probe_non_success_is_missing() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("HEAD", "/media/public/gone.jpg")
            .with_status(400)
            .create_async()
            .await;

        let probe = HttpProbe::new(Duration::from_secs(5)).unwrap();
        assert!(!probe
            .exists(&target(&server, "/media/public/gone.jpg"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn http_probe_unreachable_host_is_an_error() {
        let probe = HttpProbe::new(Duration::from_secs(2)).unwrap();
        let result = probe
            .exists(&ProbeTarget {
                key: "public/a.jpg".to_string(),
                url: "http://127.0.0.1:9/public/a.jpg".to_string(),
            })
            .await;
        assert!(matches!(result, Err(ProbeError::Request(_))));
    }

    #[tokio::test]
    async fn storage_probe_checks_key() {
        let storage = MemoryStorage::new();
        storage.insert("public/a.jpg", Bytes::from_static(b"a"), "image/jpeg");
        let probe = StorageProbe::new(Arc::new(storage));

        let present = ProbeTarget {
            key: "public/a.jpg".to_string(),
            url: String::new(),
        };
        let absent = ProbeTarget {
            key: "public/b.jpg".to_string(),
            url: String::new(),
        };
        assert!(probe.exists(&present).await.unwrap());
        assert!(!probe.exists(&absent).await.unwrap());
    }
}
