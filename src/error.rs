#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use thiserror::Error;

use crate::llm::LlmError;
use crate::storage::StorageError;

/// Error code constants for type-safe error handling
pub mod code {
    pub const NOTFOUND: &str = "NOTFOUND";
    pub const INVALID: &str = "INVALID";
    pub const CONFLICT: &str = "CONFLICT";
    pub const DEPENDENCY: &str = "DEPENDENCY";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const INTERNAL: &str = "INTERNAL";
}

#[derive(Error, Debug)]
pub enum LucidError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Provider error: {0}")]
    Provider(#[from] LlmError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LucidError {
    /// Returns the protocol error code for this error
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => code::NOTFOUND,
            Self::Validation(_) | Self::ConfigError(_) | Self::SerializationError(_) => {
                code::INVALID
            }
            Self::Conflict(_) => code::CONFLICT,
            Self::Provider(LlmError::Timeout { .. }) => code::TIMEOUT,
            Self::Provider(_) | Self::Storage(_) | Self::IoError(_) => code::DEPENDENCY,
            Self::DatabaseError(_)
            | Self::SqlxError(_)
            | Self::MigrateError(_)
            | Self::Internal(_) => code::INTERNAL,
        }
    }

    /// Returns the exit code for this error
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::ConfigError(_) => 2,
            Self::DatabaseError(_) | Self::SqlxError(_) | Self::MigrateError(_) => 3,
            Self::NotFound(_) => 4,
            Self::Validation(_) => 5,
            Self::Conflict(_) => 6,
            Self::Provider(_) => 7,
            Self::Storage(_) | Self::IoError(_) => 8,
            Self::SerializationError(_) => 9,
            Self::Internal(_) => 10,
        }
    }

    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::Validation(_) | Self::Conflict(_)
        )
    }
}

/// Protocol error codes with description and remediation hint
pub const ERROR_CODES: &[(&str, &str, &str)] = &[
    (
        code::NOTFOUND,
        "Resource was not found",
        "List resources and verify identifier",
    ),
    (
        code::INVALID,
        "Invalid request payload",
        "Validate JSON syntax and ensure all required fields are present",
    ),
    (
        code::CONFLICT,
        "Conflicting state transition",
        "Fetch the node or branch to inspect its current status",
    ),
    (
        code::DEPENDENCY,
        "External dependency failed",
        "Check provider credentials and object store reachability",
    ),
    (
        code::TIMEOUT,
        "Operation timed out",
        "Increase LUCID_LLM_TIMEOUT_SECS and retry",
    ),
    (
        code::INTERNAL,
        "Unexpected internal failure",
        "Inspect logs and retry",
    ),
];

/// Get error code details (description and fix) for a given error code
#[must_use]
pub fn get_error_info(error_code: &str) -> Option<(&'static str, &'static str)> {
    ERROR_CODES
        .iter()
        .find(|(code, _, _)| *code == error_code)
        .map(|(_, desc, fix)| (*desc, *fix))
}

pub type Result<T> = std::result::Result<T, LucidError>;
