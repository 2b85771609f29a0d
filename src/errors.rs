//! Error types shared by every pipeline stage

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("Connection problem while downloading {file_name}: {message}")]
    Connectivity { file_name: String, message: String },

    #[error("Unexpected HTTP status {status} while downloading {file_name}")]
    Transfer { status: u16, file_name: String },

    #[error("Failed to decompress {file_name}: {source}")]
    Decode {
        file_name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to transform {file_name}: {message}")]
    Transform { file_name: String, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ReportError {
    pub fn validation(message: impl Into<String>) -> Self {
        ReportError::Validation(message.into())
    }

    pub fn transform(file_name: impl Into<String>, message: impl Into<String>) -> Self {
        ReportError::Transform {
            file_name: file_name.into(),
            message: message.into(),
        }
    }

    /// Only connectivity problems are worth retrying the whole run for.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReportError::Connectivity { .. })
    }
}

pub type Result<T, E = ReportError> = std::result::Result<T, E>;
