//! Keepsake media processing
//!
//! Classification, JPEG transcoding, batch validation and the upload
//! orchestrator that ties them to the storage and metadata collaborators.

pub mod classifier;
pub mod transcoder;
pub mod upload;
pub mod validator;

pub use classifier::{classify, classify_file};
pub use transcoder::{HeicDecoder, ImageTranscoder, RasterFallbackDecoder, TranscodeError};
pub use upload::{BatchReport, BatchStatus, FileOutcome, UploadError, UploadOrchestrator, UploadedFile};
pub use validator::{BatchValidator, ValidationError};
