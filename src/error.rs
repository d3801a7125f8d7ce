//! Error types for trk
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, uninitialized directory, unknown task)
//! - 4: Operation failed (I/O, corrupt log, lock contention, cache failure)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the trk CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for trk operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Tracker not initialized at {0} (run `trk init`)")]
    NotInitialized(PathBuf),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Ambiguous task id {input}: matches {matches:?}")]
    AmbiguousId { input: String, matches: Vec<String> },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Referential violation: {0}")]
    ReferentialViolation(String),

    // Operation failures (exit code 4)
    #[error("Corrupt log at line {line}: {source}")]
    CorruptLog {
        line: usize,
        source: serde_json::Error,
    },

    #[error("Lock acquisition timed out: {0}")]
    LockTimeout(PathBuf),

    #[error("Cache rebuild failed: {0}")]
    CacheRebuildFailure(String),

    #[error("Cache query failed: {0}")]
    QueryFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Cache error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::NotInitialized(_)
            | Error::TaskNotFound(_)
            | Error::AmbiguousId { .. }
            | Error::InvalidArgument(_)
            | Error::InvalidConfig(_)
            | Error::ReferentialViolation(_) => exit_codes::USER_ERROR,

            Error::CorruptLog { .. }
            | Error::LockTimeout(_)
            | Error::CacheRebuildFailure(_)
            | Error::QueryFailed(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::Sqlite(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Stable machine-readable kind for the JSON error envelope
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotInitialized(_) => "not_initialized",
            Error::TaskNotFound(_) => "task_not_found",
            Error::AmbiguousId { .. } => "ambiguous_id",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::InvalidConfig(_) => "invalid_config",
            Error::ReferentialViolation(_) => "referential_violation",
            Error::CorruptLog { .. } => "corrupt_log",
            Error::LockTimeout(_) => "lock_timeout",
            Error::CacheRebuildFailure(_) => "cache_rebuild_failure",
            Error::QueryFailed(_) => "query_failed",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::TomlParse(_) => "toml_parse",
            Error::Sqlite(_) => "cache",
        }
    }
}

/// Result type alias for trk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub kind: &'static str,
    pub code: i32,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            kind: err.kind(),
            code: err.exit_code(),
        }
    }
}
