use crate::classifier::classify_file;
use keepsake_core::constants::MAX_VIDEO_SIZE_BYTES;
use keepsake_core::{format_file_size, AppError, MediaItem, MediaKind, SelectedFile};

/// Batch-level validation errors. Raised before any network call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please select at least one file to upload.")]
    NoFiles,

    #[error("Only photos and videos can be uploaded. Unsupported: {}", .names.join(", "))]
    UnsupportedFiles { names: Vec<String> },

    #[error("{}", oversized_message(.files, .max_bytes))]
    OversizedVideos {
        files: Vec<(String, u64)>,
        max_bytes: u64,
    },
}

fn oversized_message(files: &[(String, u64)], max_bytes: &u64) -> String {
    let listed = files
        .iter()
        .map(|(name, size)| format!("{} ({})", name, format_file_size(*size)))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Videos must be {} or smaller (about 5 minutes of HD video). Too large: {}",
        format_file_size(*max_bytes),
        listed
    )
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Classifies a selection and enforces the batch rules.
#[derive(Debug, Clone)]
pub struct BatchValidator {
    max_video_size_bytes: u64,
}

impl Default for BatchValidator {
    fn default() -> Self {
        Self::new(MAX_VIDEO_SIZE_BYTES)
    }
}

impl BatchValidator {
    pub fn new(max_video_size_bytes: u64) -> Self {
        Self {
            max_video_size_bytes,
        }
    }

    pub fn max_video_size_bytes(&self) -> u64 {
        self.max_video_size_bytes
    }

    /// Classify every file, failing the whole batch if the selection is empty,
    /// contains unsupported files, or contains any oversized video.
    pub fn validate(&self, files: Vec<SelectedFile>) -> Result<Vec<MediaItem>, ValidationError> {
        if files.is_empty() {
            return Err(ValidationError::NoFiles);
        }

        let mut items = Vec::with_capacity(files.len());
        let mut unsupported = Vec::new();
        for file in files {
            match classify_file(file) {
                Ok(item) => items.push(item),
                Err(rejected) => unsupported.push(rejected.name),
            }
        }
        if !unsupported.is_empty() {
            return Err(ValidationError::UnsupportedFiles { names: unsupported });
        }

        let oversized: Vec<(String, u64)> = items
            .iter()
            .filter(|item| {
                item.kind == MediaKind::Video && item.size_bytes() > self.max_video_size_bytes
            })
            .map(|item| (item.name().to_string(), item.size_bytes()))
            .collect();
        if !oversized.is_empty() {
            return Err(ValidationError::OversizedVideos {
                files: oversized,
                max_bytes: self.max_video_size_bytes,
            });
        }

        Ok(items)
    }
}
