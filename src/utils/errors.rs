//! Error types used throughout the application

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for aide
#[derive(Error, Debug)]
pub enum AideError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM provider error: {0}")]
    Llm(#[from] crate::llm::LlmError),

    #[error("File selection error: {0}")]
    Selection(#[from] crate::context::selection::SelectionError),

    #[error("UI error: {message}")]
    Ui { message: String },

    #[error("Validation error: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
///
/// These carry the user-facing message shown when a session cannot be
/// configured, so their `Display` output is kept short and actionable.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("an API key must be provided")]
    MissingApiKey,

    #[error("project directory is not set")]
    RootNotSet,

    #[error("project directory does not exist: {path}")]
    RootNotFound { path: PathBuf },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to read configuration: {source}")]
    ReadError {
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write configuration: {source}")]
    WriteError {
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {source}")]
    ParseError {
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize configuration: {source}")]
    SerializeError {
        #[source]
        source: toml::ser::Error,
    },
}

impl AideError {
    /// Create a new UI error
    pub fn ui<S: Into<String>>(message: S) -> Self {
        Self::Ui {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S1: Into<String>, S2: Into<String>>(field: S1, message: S2) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new not found error
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Whether this error comes from session configuration rather than a
    /// failed turn. Configuration errors are shown to the user verbatim.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Validation { .. })
    }

    /// Message suitable for printing in the chat transcript
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(inner) => format!("Error: {}", inner),
            Self::Validation { field, message } => format!("Error: {} ({})", message, field),
            other => format!("Request failed: {}", other),
        }
    }
}

impl From<inquire::InquireError> for AideError {
    fn from(error: inquire::InquireError) -> Self {
        AideError::ui(format!("User input error: {}", error))
    }
}
