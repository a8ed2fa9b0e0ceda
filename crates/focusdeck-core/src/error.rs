//! Core error types for focusdeck-core.
//!
//! This module defines the error hierarchy shared by the timer engine,
//! its collaborators and the storage layer.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for focusdeck-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Session persistence gateway errors
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Completion dispatch errors
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Stored row could not be decoded
    #[error("Corrupt row in '{table}': {message}")]
    CorruptRow { table: String, message: String },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Unknown timer mode name
    #[error("Unknown mode '{0}' (expected work, break or long_break)")]
    UnknownMode(String),
}

/// Failures reported by a session persistence gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Backend is unreachable
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Synchronous failures while handing a finished session to persistence.
///
/// Any of these aborts the completion pipeline without advancing the mode.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The background writer is gone
    #[error("Persistence writer is closed")]
    WriterClosed,

    /// No user is attached to the engine
    #[error("No user configured for session persistence")]
    MissingUser,
}

/// Failures from the completion cue player.
#[derive(Error, Debug)]
pub enum CueError {
    #[error("Cue playback failed: {0}")]
    Playback(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_error_wraps_database_error() {
        let err: GatewayError = DatabaseError::Locked.into();
        assert!(matches!(err, GatewayError::Database(DatabaseError::Locked)));
        assert_eq!(
            GatewayError::Unavailable("offline".into()).to_string(),
            "Backend unavailable: offline"
        );
    }

    #[test]
    fn database_error_wraps_into_core() {
        let err: CoreError = DatabaseError::Locked.into();
        assert!(matches!(err, CoreError::Database(DatabaseError::Locked)));
    }
}
