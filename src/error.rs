// src/error.rs

//! Unified error handling for the harvester application.

use std::fmt;

use thiserror::Error;

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed after retries (transient class)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Target host cannot be reached at all; aborts the run
    #[error("Unreachable: {0}")]
    Unreachable(String),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Harvest error with context
    #[error("Harvest error for {context}: {message}")]
    Harvest { context: String, message: String },
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

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create a harvest error with context.
    pub fn harvest(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Harvest {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// True for errors that must abort the whole run rather than degrade
    /// to "this page/shard returned nothing".
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Config(_))
    }
}
