//! In-memory metadata store for tests.

use crate::traits::{RepositoryError, RepositoryResult, UploadRepository};
use async_trait::async_trait;
use chrono::Utc;
use keepsake_core::{NewUploadRecord, UploadRecord};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct MemoryUploadRepository {
    rows: Arc<Mutex<Vec<UploadRecord>>>,
    next_id: Arc<Mutex<i64>>,
    deleted: Arc<Mutex<Vec<i64>>>,
    fail_inserts_named: Arc<Mutex<Vec<String>>>,
    fail_deletes: Arc<Mutex<bool>>,
}

impl MemoryUploadRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a row as if it had been inserted earlier.
    pub fn seed(&self, record: UploadRecord) {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id = (*next_id).max(record.id);
        self.rows.lock().unwrap().push(record);
    }

    /// Make inserts for this file name fail.
    pub fn fail_inserts_named(&self, file_name: &str) {
        self.fail_inserts_named
            .lock()
            .unwrap()
            .push(file_name.to_string());
    }

    pub fn fail_deletes(&self, fail: bool) {
        *self.fail_deletes.lock().unwrap() = fail;
    }

    pub fn rows(&self) -> Vec<UploadRecord> {
        self.rows.lock().unwrap().clone()
    }

    /// Ids passed to `delete_by_id`, in call order, including failed attempts.
    pub fn deleted_ids(&self) -> Vec<i64> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl UploadRepository for MemoryUploadRepository {
    async fn insert(&self, record: NewUploadRecord) -> RepositoryResult<UploadRecord> {
        if self
            .fail_inserts_named
            .lock()
            .unwrap()
            .contains(&record.file_name)
        {
            return Err(RepositoryError::Request(
                "status 503 Service Unavailable: simulated outage".to_string(),
            ));
        }

        let id = {
            let mut next_id = self.next_id.lock().unwrap();
            *next_id += 1;
            *next_id
        };
        let row = UploadRecord {
            id,
            file_path: record.file_path,
            file_name: record.file_name,
            uploader_name: record.uploader_name,
            file_url: Some(record.file_url),
            created_at: Utc::now(),
        };
        self.rows.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn list_newest_first(&self) -> RepositoryResult<Vec<UploadRecord>> {
        let mut rows = self.rows();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn delete_by_id(&self, id: i64) -> RepositoryResult<()> {
        self.deleted.lock().unwrap().push(id);
        if *self.fail_deletes.lock().unwrap() {
            return Err(RepositoryError::Request(
                "status 401 Unauthorized: simulated rejection".to_string(),
            ));
        }
        self.rows.lock().unwrap().retain(|row| row.id != id);
        Ok(())
    }
}
