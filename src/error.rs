//! Error types for the BrainQuiz client

use std::io;

use thiserror::Error;

/// Result type alias for the BrainQuiz client
pub type Result<T> = std::result::Result<T, Error>;

/// Generic message surfaced when the backend answers with something that is not JSON.
pub const GENERIC_SERVER_ERROR: &str = "Terjadi kesalahan pada server";

/// BrainQuiz client errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network-level failure (connection refused, DNS, timeout)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Backend answered with a non-OK HTTP status
    #[error("{message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Server-provided message, or a fallback
        message: String,
    },

    /// Backend answered OK but reported `success: false`
    #[error("{0}")]
    Rejected(String),

    /// Response body was not JSON
    #[error("{}", GENERIC_SERVER_ERROR)]
    InvalidResponse,

    /// Request payload failed local validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV export error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a server error from a status code and message
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// `true` for failures that happened before any response arrived
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// `true` for failures reported by the backend itself
    #[must_use]
    pub fn is_server(&self) -> bool {
        matches!(self, Self::Server { .. } | Self::Rejected(_))
    }

    /// HTTP status associated with this error, if any
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}
