use crate::types::ErrorResponse;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Decision service error ({}): {}", .0.status_code, .0.error_message)]
    DecisionService(ErrorResponse),

    #[error("Decision request failed: {0}")]
    DecisionRequestFailed(String),

    #[error("No hint marker for label: {0}")]
    HintNotFound(String),

    #[error("Cannot type into rich text target: {0}")]
    UnsupportedRichText(String),

    #[error("Decision response is improperly formatted: {0}")]
    MalformedResponse(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Page node not found")]
    NodeNotFound,

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Host bridge error: {0}")]
    HostError(String),

    #[error("Screenshot failed: {0}")]
    ScreenshotFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Anyhow error: {0}")]
    AnyhowError(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;

// Convert anyhow::Error to AgentError
impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::AnyhowError(err.to_string())
    }
}
