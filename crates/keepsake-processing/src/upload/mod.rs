//! Upload orchestration: validate, transcode, store, record.

pub mod pipeline;
pub mod types;

pub use pipeline::{UploadError, UploadOrchestrator};
pub use types::{BatchReport, BatchStatus, FileOutcome, UploadedFile};
