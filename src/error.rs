//! Error types for the Torro lineage engine.
//!
//! This module provides a unified error type [`TorroError`] for all lineage
//! operations, along with a convenient [`Result`] type alias.
//!
//! # Error Categories
//!
//! - **Validation**: malformed payloads or missing required fields
//! - **Auth/Forbidden**: missing authentication or failed role/signature checks
//! - **NotFound**: assets, proposals, or artifacts that do not exist
//! - **Upstream**: external metadata sources unavailable or malformed
//! - **Storage/Serialization**: collaborator store and encoding failures
//!
//! # Example
//!
//! ```rust
//! use torro::error::{Result, TorroError};
//!
//! fn parse_limit(raw: &str) -> Result<usize> {
//!     raw.parse()
//!         .map_err(|_| TorroError::Validation(format!("invalid limit: {}", raw)))
//! }
//! ```

use axum::http::StatusCode;
use thiserror::Error;

/// Main error type for Torro operations.
#[derive(Error, Debug)]
pub enum TorroError {
    // Request boundary errors
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication required: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // External collaborator errors
    #[error("Upstream source error: {0}")]
    Upstream(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // Encoding errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Configuration errors
    #[error("Configuration error: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    // Catch-all for internal invariant failures
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TorroError {
    /// Map to the HTTP status code used at the API boundary.
    pub fn status_code(&self) -> StatusCode {
        match self {
            TorroError::Validation(_) => StatusCode::BAD_REQUEST,
            TorroError::Auth(_) => StatusCode::UNAUTHORIZED,
            TorroError::Forbidden(_) => StatusCode::FORBIDDEN,
            TorroError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TorroError::Upstream(_) | TorroError::Storage(_))
    }
}

impl From<serde_json::Error> for TorroError {
    fn from(e: serde_json::Error) -> Self {
        TorroError::Serialization(e.to_string())
    }
}

/// Result type alias for Torro operations.
pub type Result<T> = std::result::Result<T, TorroError>;
