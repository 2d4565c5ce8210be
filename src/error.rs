// src/error.rs

//! Unified error handling for the tracker.

use std::fmt;

use thiserror::Error;

/// Result type alias for tracker operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration value out of range
    #[error("Validation error: {0}")]
    Validation(String),

    /// Search API answered with a failure status
    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// Search API answered with a payload we cannot decode
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Hashtag or key that is not a project identifier
    #[error("Invalid project id: {0}")]
    InvalidProjectId(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an upstream error from an HTTP status and body excerpt.
    pub fn upstream(status: u16, message: impl fmt::Display) -> Self {
        Self::Upstream {
            status,
            message: message.to_string(),
        }
    }

    /// Create a malformed-response error.
    pub fn malformed(message: impl fmt::Display) -> Self {
        Self::MalformedResponse(message.to_string())
    }

    /// Whether the error came from talking to the search API.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Upstream { .. } | Self::MalformedResponse(_)
        )
    }
}
