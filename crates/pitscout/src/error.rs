//! Error types for pitscout.
//!
//! Every failure in the core is recoverable: the worst outcome is a lost
//! edit attempt or a failed export attempt, both of which leave the store
//! in its last-good state.

use std::path::PathBuf;
use thiserror::Error;

use crate::schema::Rejection;

/// The main error type for pitscout operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Validation Errors ===
    /// A field value was rejected by its constraint and not applied.
    #[error(transparent)]
    Validation(#[from] Rejection),

    /// A field path did not name any known field.
    #[error("unknown field path: {path}")]
    UnknownField {
        /// The path as it was given.
        path: String,
    },

    /// An index was past the end of a sequence.
    #[error("index {index} is out of range (length {len})")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Length of the sequence.
        len: usize,
    },

    // === Persistence Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// A value was larger than the storage quota allows.
    #[error("storage quota exceeded: value needs {needed} bytes, quota is {quota}")]
    QuotaExceeded {
        /// Serialized size of the value that was refused.
        needed: usize,
        /// Configured per-value quota.
        quota: usize,
    },

    // === Export Errors ===
    /// An export was requested with nothing selected.
    #[error("nothing selected to export")]
    EmptySelection,

    /// The selection does not fit the visual-code channel.
    #[error("selection is {size} bytes, visual code limit is {ceiling} bytes")]
    CapacityExceeded {
        /// Serialized size of the selection.
        size: usize,
        /// The channel ceiling.
        ceiling: usize,
    },

    /// The accepted payload could not be rendered as a visual code.
    #[error("visual code rendering failed: {0}")]
    VisualCode(String),

    /// Writing to the system clipboard failed.
    #[error("clipboard error: {0}")]
    Clipboard(String),

    // === Remote Errors ===
    /// The remote spreadsheet append failed. The record is already stored locally.
    #[error("remote append failed: {0}")]
    Remote(String),

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for pitscout operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a new remote append error.
    #[must_use]
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote(message.into())
    }

    /// Create a new clipboard error.
    #[must_use]
    pub fn clipboard(message: impl Into<String>) -> Self {
        Self::Clipboard(message.into())
    }

    /// Error for a poisoned lock around shared state.
    #[must_use]
    pub(crate) fn poisoned(what: &str) -> Self {
        Self::Internal(format!("{what} lock poisoned"))
    }

    /// Check if this error is a rejected field value.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::UnknownField { .. })
    }

    /// Check if this error came from the persistence layer.
    #[must_use]
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            Self::DatabaseOpen { .. }
                | Self::DatabaseQuery(_)
                | Self::DatabaseMigration { .. }
                | Self::QuotaExceeded { .. }
        )
    }

    /// Check if the caller can retry or adjust and carry on.
    ///
    /// Only internal errors and broken configuration are not recoverable.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::Internal(_) | Self::ConfigLoad(_) | Self::ConfigValidation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::EmptySelection;
        assert_eq!(err.to_string(), "nothing selected to export");

        let err = Error::remote("sheet not found");
        assert_eq!(err.to_string(), "remote append failed: sheet not found");
    }

    #[test]
    fn test_capacity_error_names_size_and_ceiling() {
        let err = Error::CapacityExceeded {
            size: 2401,
            ceiling: 2400,
        };
        let msg = err.to_string();
        assert!(msg.contains("2401"));
        assert!(msg.contains("2400"));
    }

    #[test]
    fn test_quota_error_display() {
        let err = Error::QuotaExceeded {
            needed: 10,
            quota: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("10 bytes"));
        assert!(msg.contains("quota is 4"));
    }

    #[test]
    fn test_validation_error_is_transparent() {
        let err: Error = Rejection::new("Alliance", "must be one of: Red, Blue").into();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Alliance: must be one of: Red, Blue");
    }

    #[test]
    fn test_is_persistence() {
        assert!(Error::QuotaExceeded {
            needed: 1,
            quota: 0
        }
        .is_persistence());
        assert!(!Error::EmptySelection.is_persistence());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::EmptySelection.is_recoverable());
        assert!(Error::remote("offline").is_recoverable());
        assert!(!Error::internal("bug").is_recoverable());
    }

    #[test]
    fn test_index_out_of_range_display() {
        let err = Error::IndexOutOfRange { index: 7, len: 3 };
        assert_eq!(err.to_string(), "index 7 is out of range (length 3)");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
            assert!(err.is_persistence());
        }
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }
}
