//! Upload pipeline: validate, transcode, store and record each file.
//!
//! The whole batch is validated first so an empty selection, an unsupported
//! file or an oversized video fails before any network call. Each accepted
//! file then runs its own sequence concurrently with the others. A failure
//! aborts only that file, and the batch settles once every sequence has.

use futures::future::join_all;
use keepsake_core::{
    sanitize_filename, sanitize_uploader_name, AppError, Config, MediaItem, NewUploadRecord,
    SelectedFile,
};
use keepsake_db::{RepositoryError, UploadRepository};
use keepsake_storage::{generate_storage_key, Storage, StorageError};
use std::sync::Arc;
use thiserror::Error;

use super::types::{BatchReport, FileOutcome, UploadedFile};
use crate::transcoder::{ImageTranscoder, TranscodeError};
use crate::validator::{BatchValidator, ValidationError};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    #[error("Upload failed for {key}: {source}")]
    Storage {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Could not get file URL for {key}: {source}")]
    PublicUrl {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Database logging failed for {file_name}: {source}")]
    Metadata {
        file_name: String,
        #[source]
        source: RepositoryError,
    },
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Validation(e) => e.into(),
            UploadError::Transcode(e) => e.into(),
            UploadError::Storage {
                source: StorageError::ConfigError(msg),
                ..
            }
            | UploadError::PublicUrl {
                source: StorageError::ConfigError(msg),
                ..
            }
            | UploadError::Metadata {
                source: RepositoryError::ConfigError(msg),
                ..
            } => AppError::Configuration(msg),
            other => AppError::Network(other.to_string()),
        }
    }
}

/// Drives a selection of files into storage and the metadata store.
pub struct UploadOrchestrator {
    storage: Arc<dyn Storage>,
    repository: Arc<dyn UploadRepository>,
    transcoder: ImageTranscoder,
    validator: BatchValidator,
    storage_prefix: String,
}

impl UploadOrchestrator {
    pub fn new(
        storage: Arc<dyn Storage>,
        repository: Arc<dyn UploadRepository>,
        transcoder: ImageTranscoder,
        validator: BatchValidator,
        storage_prefix: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            repository,
            transcoder,
            validator,
            storage_prefix: storage_prefix.into(),
        }
    }

    /// Build from validated configuration and already constructed collaborators.
    pub fn from_config(
        config: &Config,
        storage: Arc<dyn Storage>,
        repository: Arc<dyn UploadRepository>,
    ) -> Self {
        Self::new(
            storage,
            repository,
            ImageTranscoder::new(config.jpeg_quality),
            BatchValidator::new(config.max_video_size_bytes),
            config.storage_prefix.clone(),
        )
    }

    pub fn with_transcoder(mut self, transcoder: ImageTranscoder) -> Self {
        self.transcoder = transcoder;
        self
    }

    /// Upload a batch. Batch-level validation failures are returned as `Err`;
    /// otherwise the report holds one outcome per file in input order.
    #[tracing::instrument(skip(self, files, uploader_name), fields(file_count = files.len()))]
    pub async fn upload_batch(
        &self,
        files: Vec<SelectedFile>,
        uploader_name: Option<&str>,
    ) -> Result<BatchReport, UploadError> {
        let items = self.validator.validate(files)?;
        let uploader = sanitize_uploader_name(uploader_name);
        let start = std::time::Instant::now();

        let outcomes = join_all(items.into_iter().map(|item| {
            let uploader = uploader.clone();
            async move {
                let original_name = item.name().to_string();
                let result = self.upload_one(item, uploader).await;
                if let Err(e) = &result {
                    tracing::warn!(file_name = %original_name, error = %e, "File upload failed");
                }
                FileOutcome {
                    original_name,
                    result,
                }
            }
        }))
        .await;

        let report = BatchReport::new(outcomes);
        tracing::info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            status = ?report.status(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Upload batch settled"
        );
        Ok(report)
    }

    async fn upload_one(
        &self,
        item: MediaItem,
        uploader_name: Option<String>,
    ) -> Result<UploadedFile, UploadError> {
        let original_name = item.name().to_string();
        let item = if item.kind.needs_transcode() {
            self.transcoder.transcode_blocking(item).await?
        } else {
            item
        };

        let file_name = sanitize_filename(item.name());
        let storage_key = generate_storage_key(&self.storage_prefix, &file_name);
        let content_type = if item.file.content_type.trim().is_empty() {
            FALLBACK_CONTENT_TYPE.to_string()
        } else {
            item.file.content_type.clone()
        };
        let size_bytes = item.size_bytes();

        self.storage
            .upload_with_key(&storage_key, item.file.data.clone(), &content_type)
            .await
            .map_err(|source| UploadError::Storage {
                key: storage_key.clone(),
                source,
            })?;

        let public_url =
            self.storage
                .public_url(&storage_key)
                .map_err(|source| UploadError::PublicUrl {
                    key: storage_key.clone(),
                    source,
                })?;

        let record = self
            .repository
            .insert(NewUploadRecord {
                file_name: file_name.clone(),
                file_path: storage_key.clone(),
                uploader_name,
                file_url: public_url.clone(),
            })
            .await
            .map_err(|source| UploadError::Metadata {
                file_name: file_name.clone(),
                source,
            })?;

        tracing::debug!(
            key = %storage_key,
            record_id = record.id,
            size_bytes,
            kind = %item.kind,
            "File uploaded and recorded"
        );

        Ok(UploadedFile {
            original_name,
            file_name,
            kind: item.kind,
            content_type,
            size_bytes,
            storage_key,
            public_url,
            record_id: record.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::BatchStatus;
    use bytes::Bytes;
    use image::{ImageFormat, Rgb, RgbImage};
    use keepsake_core::constants::MAX_VIDEO_SIZE_BYTES;
    use keepsake_core::MediaKind;
    use keepsake_db::MemoryUploadRepository;
    use keepsake_storage::MemoryStorage;
    use std::io::Cursor;

    fn orchestrator(
        storage: &MemoryStorage,
        repository: &MemoryUploadRepository,
    ) -> UploadOrchestrator {
        UploadOrchestrator::new(
            Arc::new(storage.clone()),
            Arc::new(repository.clone()),
            ImageTranscoder::default(),
            BatchValidator::default(),
            "public",
        )
    }

    fn png(name: &str) -> SelectedFile {
        let mut buffer = Vec::new();
        RgbImage::from_pixel(16, 16, Rgb([10, 120, 200]))
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        SelectedFile::new(name, "image/png", Bytes::from(buffer))
    }

    #[tokio::test]
    async fn oversized_video_rejects_batch_before_upload() {
        let storage = MemoryStorage::new();
        let repository = MemoryUploadRepository::new();
        let huge = SelectedFile::new(
            "speech.mp4",
            "video/mp4",
            Bytes::from(vec![0u8; 201 * 1024 * 1024]),
        );

        let err = orchestrator(&storage, &repository)
            .upload_batch(vec![png("a.png"), huge], Some("Amy"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            UploadError::Validation(ValidationError::OversizedVideos { .. })
        ));
        assert!(err.to_string().contains("speech.mp4 (201 MB)"));
        assert_eq!(storage.upload_calls(), 0);
        assert!(repository.rows().is_empty());
    }

    #[tokio::test]
    async fn videos_at_the_ceiling_proceed() {
        let storage = MemoryStorage::new();
        let repository = MemoryUploadRepository::new();
        let video = SelectedFile::new(
            "first dance.mov",
            "video/quicktime",
            Bytes::from(vec![0u8; MAX_VIDEO_SIZE_BYTES as usize]),
        );

        let report = orchestrator(&storage, &repository)
            .upload_batch(vec![video], None)
            .await
            .unwrap();

        assert_eq!(report.status(), BatchStatus::Complete);
        let uploaded = report.uploaded().next().unwrap();
        assert_eq!(uploaded.content_type, "video/quicktime");
        assert_eq!(uploaded.size_bytes, MAX_VIDEO_SIZE_BYTES);
    }

    #[tokio::test]
    async fn empty_selection_is_a_validation_error() {
        let storage = MemoryStorage::new();
        let repository = MemoryUploadRepository::new();
        let err = orchestrator(&storage, &repository)
            .upload_batch(Vec::new(), None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Please select at least one file to upload.");
    }

    #[tokio::test]
    async fn mixed_batch_is_transcoded_stored_and_recorded() {
        let storage = MemoryStorage::new();
        let repository = MemoryUploadRepository::new();
        let gif = SelectedFile::new("loop.gif", "image/gif", Bytes::from_static(b"GIF89a..."));
        let heic = SelectedFile::new(
            "IMG_0001.HEIC",
            "image/heic",
            Bytes::from_static(b"\x00\x00\x00\x18ftypheic"),
        );

        let report = orchestrator(&storage, &repository)
            .upload_batch(
                vec![png("../../beach.png"), gif, heic],
                Some("<b>Amy</b> \"Pond\""),
            )
            .await
            .unwrap();

        assert_eq!(report.status(), BatchStatus::Complete);
        assert_eq!(report.success_message(), "Successfully uploaded 3 file(s)! Thank you!");

        let uploaded: Vec<&UploadedFile> = report.uploaded().collect();
        assert_eq!(uploaded[0].file_name, "beach.jpg");
        assert_eq!(uploaded[0].content_type, "image/jpeg");
        assert!(uploaded[0].storage_key.starts_with("public/"));
        assert!(uploaded[0].storage_key.ends_with("-beach.jpg"));

        // GIF bytes reach storage untouched.
        assert_eq!(uploaded[1].kind, MediaKind::Gif);
        let stored_gif = storage.get(&uploaded[1].storage_key).unwrap();
        assert_eq!(stored_gif.data, Bytes::from_static(b"GIF89a..."));

        // Undecodable HEIC ships as the original.
        assert_eq!(uploaded[2].file_name, "IMG_0001.HEIC");
        assert_eq!(uploaded[2].content_type, "image/heic");

        let rows = repository.rows();
        assert_eq!(rows.len(), 3);
        assert!(rows
            .iter()
            .all(|r| r.uploader_name.as_deref() == Some("Amy Pond")));
        assert!(rows.iter().all(|r| r.file_url.is_some()));
    }

    #[tokio::test]
    async fn failures_are_file_scoped() {
        let storage = MemoryStorage::new();
        let repository = MemoryUploadRepository::new();
        storage.fail_uploads_containing("-offline.jpg");
        repository.fail_inserts_named("unlogged.jpg");

        let broken = SelectedFile::new("broken.png", "image/png", Bytes::from_static(b"nope"));
        let report = orchestrator(&storage, &repository)
            .upload_batch(
                vec![
                    png("ok.png"),
                    broken,
                    png("offline.png"),
                    png("unlogged.png"),
                ],
                None,
            )
            .await
            .unwrap();

        assert_eq!(report.status(), BatchStatus::Partial);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 3);

        let failures: Vec<(&str, &UploadError)> = report.failures().collect();
        assert_eq!(failures[0].0, "broken.png");
        assert!(matches!(failures[0].1, UploadError::Transcode(_)));
        assert!(matches!(failures[1].1, UploadError::Storage { .. }));
        assert!(matches!(failures[2].1, UploadError::Metadata { .. }));

        // Stored but unrecorded: the object exists without a row.
        assert_eq!(storage.keys().len(), 2);
        assert_eq!(repository.rows().len(), 1);

        let err = report.into_result().unwrap_err();
        assert!(err.to_string().starts_with("Failed to load image: broken.png"));
    }

    #[tokio::test]
    async fn all_failed_batch() {
        let storage = MemoryStorage::new();
        let repository = MemoryUploadRepository::new();
        storage.fail_uploads_containing("public/");

        let report = orchestrator(&storage, &repository)
            .upload_batch(vec![png("a.png"), png("b.png")], None)
            .await
            .unwrap();

        assert_eq!(report.status(), BatchStatus::Failed);
        let app: AppError = report.into_result().unwrap_err().into();
        assert!(matches!(app, AppError::Network(_)));
    }
}
