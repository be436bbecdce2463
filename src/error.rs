//! Error handling module for plan generation
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Every failure here is fatal: a partially assembled plan is never emitted.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for plan assembly and rendering
#[derive(Error, Debug)]
pub enum PlanError {
    /// A required source file is missing or unreadable
    #[error("Input unavailable: {name} ({}): {source}", path.display())]
    InputUnavailable {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unrecognized architecture tag
    #[error("Unsupported architecture '{0}' (expected amd64 or arm64)")]
    ArchitectureUnresolved(String),

    /// A heredoc payload contains a line equal to every usable marker
    #[error("Heredoc marker '{marker}' collides with a payload line in {destination}")]
    DelimiterCollision { destination: String, marker: String },

    /// Storage layout references an undefined or later node
    #[error("Invalid storage layout: {0}")]
    InvalidLayout(String),

    /// Configuration errors (loading, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors (output writing)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON configuration parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for plan operations
pub type Result<T> = std::result::Result<T, PlanError>;

// Convenient error constructors
impl PlanError {
    /// Create an input-unavailable error for a named source
    pub fn input_unavailable(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::InputUnavailable {
            name: name.into(),
            path: path.into(),
            source,
        }
    }

    /// Create an invalid-layout error
    pub fn invalid_layout(msg: impl Into<String>) -> Self {
        Self::InvalidLayout(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
