//! Error types module
//!
//! All crate-level errors convert into [`AppError`], whose variants follow the
//! failure taxonomy of the application: configuration, validation, transcode,
//! network, not-found and internal failures. Every variant renders as a short
//! one-line message suitable for showing inline to the guest.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like a failed network call
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Describes how an error should be presented and logged.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "CONFIGURATION_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether resubmitting the same action can succeed
    fn is_recoverable(&self) -> bool;

    /// Message shown to the guest
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Rendered verbatim: validation messages are written for the guest.
    #[error("{0}")]
    Validation(String),

    #[error("Transcode error: {0}")]
    Transcode(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ErrorMetadata for AppError {
    fn error_code(&self) -> &'static str {
        match self {
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Transcode(_) => "TRANSCODE_ERROR",
            AppError::Network(_) => "NETWORK_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "INTERNAL_ERROR",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Validation(_) | AppError::Network(_) | AppError::Transcode(_)
        )
    }

    fn client_message(&self) -> String {
        match self {
            AppError::InternalWithSource { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            AppError::Validation(_) | AppError::NotFound(_) => LogLevel::Debug,
            AppError::Network(_) | AppError::Transcode(_) => LogLevel::Warn,
            AppError::Configuration(_)
            | AppError::Internal(_)
            | AppError::InternalWithSource { .. } => LogLevel::Error,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalWithSource {
            message: format!("I/O failure: {}", err),
            source: err.into(),
        }
    }
}
