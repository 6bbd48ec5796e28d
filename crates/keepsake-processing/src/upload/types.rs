//! Types for the upload pipeline.

use super::pipeline::UploadError;
use keepsake_core::MediaKind;

/// A file that was stored and recorded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedFile {
    pub original_name: String,
    /// Sanitized name persisted to the metadata store.
    pub file_name: String,
    pub kind: MediaKind,
    pub content_type: String,
    pub size_bytes: u64,
    pub storage_key: String,
    pub public_url: String,
    pub record_id: i64,
}

/// Result for one input file, in input order.
#[derive(Debug)]
pub struct FileOutcome {
    pub original_name: String,
    pub result: Result<UploadedFile, UploadError>,
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Every file was stored and recorded.
    Complete,
    /// Some files failed.
    Partial,
    /// No file succeeded.
    Failed,
}

/// Per-file results of one batch.
#[derive(Debug)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    pub fn new(outcomes: Vec<FileOutcome>) -> Self {
        Self { outcomes }
    }

    pub fn status(&self) -> BatchStatus {
        let succeeded = self.succeeded();
        if succeeded == self.outcomes.len() {
            BatchStatus::Complete
        } else if succeeded == 0 {
            BatchStatus::Failed
        } else {
            BatchStatus::Partial
        }
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn uploaded(&self) -> impl Iterator<Item = &UploadedFile> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    /// `(original name, error)` for every failed file.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &UploadError)> {
        self.outcomes.iter().filter_map(|o| match &o.result {
            Ok(_) => None,
            Err(e) => Some((o.original_name.as_str(), e)),
        })
    }

    /// First failure in input order.
    pub fn first_error(&self) -> Option<&UploadError> {
        self.failures().next().map(|(_, e)| e)
    }

    pub fn success_message(&self) -> String {
        format!(
            "Successfully uploaded {} file(s)! Thank you!",
            self.succeeded()
        )
    }

    /// Collapse to the succeeded count, or the first failure in input order.
    pub fn into_result(self) -> Result<usize, UploadError> {
        let succeeded = self.succeeded();
        match self.outcomes.into_iter().find_map(|o| o.result.err()) {
            Some(err) => Err(err),
            None => Ok(succeeded),
        }
    }
}
