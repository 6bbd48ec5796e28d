//! In-memory storage backend for tests.

use crate::keys::validate_storage_key;
use crate::traits::{ImageTransform, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const MEMORY_BASE_URL: &str = "https://cdn.test/media";

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
}

/// Mock storage keeping objects in a map
#[derive(Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<Mutex<HashMap<String, StoredObject>>>,
    fail_keys_containing: Arc<Mutex<Vec<String>>>,
    upload_calls: Arc<AtomicUsize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every upload whose key contains `fragment` fail.
    pub fn fail_uploads_containing(&self, fragment: &str) {
        self.fail_keys_containing
            .lock()
            .unwrap()
            .push(fragment.to_string());
    }

    pub fn insert(&self, key: &str, data: Bytes, content_type: &str) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
    }

    /// Simulate an object removed out-of-band.
    pub fn remove(&self, key: &str) {
        self.objects.lock().unwrap().remove(key);
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<()> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        validate_storage_key(storage_key)?;

        let should_fail = self
            .fail_keys_containing
            .lock()
            .unwrap()
            .iter()
            .any(|fragment| storage_key.contains(fragment.as_str()));
        if should_fail {
            return Err(StorageError::UploadFailed(
                "simulated storage outage".to_string(),
            ));
        }

        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(storage_key) {
            return Err(StorageError::UploadFailed(
                "The resource already exists".to_string(),
            ));
        }
        objects.insert(
            storage_key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn public_url(&self, storage_key: &str) -> StorageResult<String> {
        validate_storage_key(storage_key)?;
        Ok(format!("{}/{}", MEMORY_BASE_URL, storage_key))
    }

    fn transformed_url(
        &self,
        storage_key: &str,
        transform: &ImageTransform,
    ) -> StorageResult<String> {
        validate_storage_key(storage_key)?;
        Ok(format!(
            "{}/render/{}?width={}&height={}&resize={}",
            MEMORY_BASE_URL, storage_key, transform.width, transform.height, transform.resize
        ))
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        Ok(self.objects.lock().unwrap().contains_key(storage_key))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
