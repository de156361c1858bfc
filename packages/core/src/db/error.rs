//! Database Error Types
//!
//! This module defines error types for database operations, providing
//! clear error handling for connection, initialization, and query failures.
//!
//! SQLite reports constraint failures through the generic error channel, so
//! [`DatabaseError::from_sql`] classifies `UNIQUE` and `FOREIGN KEY`
//! violations into their own variants - the service layer maps those to the
//! business `Conflict`/`NotFound` outcomes instead of a generic store error.

use std::path::PathBuf;
use thiserror::Error;

/// Database operation errors
///
/// Covers connection, initialization, and statement execution failures.
/// Business-rule errors are handled by the service-layer error type.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to establish database connection
    #[error("Failed to connect to database at {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        source: libsql::Error,
    },

    /// Permission denied when accessing database
    #[error("Permission denied for database path: {path}")]
    PermissionDenied { path: PathBuf },

    /// Failed to create parent directory
    #[error("Failed to create parent directory for database: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    /// libsql operation error
    #[error("Database operation failed: {0}")]
    LibsqlError(#[from] libsql::Error),

    /// SQL execution error with context
    #[error("SQL execution failed: {context}")]
    SqlExecutionError { context: String },

    /// A UNIQUE constraint rejected the statement
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// A FOREIGN KEY constraint rejected the statement
    #[error("Foreign key constraint violated: {context}")]
    ForeignKeyViolation { context: String },
}

impl DatabaseError {
    /// Create a connection failed error
    pub fn connection_failed(path: PathBuf, source: libsql::Error) -> Self {
        Self::ConnectionFailed { path, source }
    }

    /// Create a permission denied error
    pub fn permission_denied(path: PathBuf) -> Self {
        Self::PermissionDenied { path }
    }

    /// Create a SQL execution error with context
    pub fn sql_execution(context: impl Into<String>) -> Self {
        Self::SqlExecutionError {
            context: context.into(),
        }
    }

    /// Classify a statement failure, separating constraint violations from
    /// other execution errors.
    ///
    /// SQLite phrases violations as `UNIQUE constraint failed: table.column`
    /// and `FOREIGN KEY constraint failed`; everything else keeps the
    /// caller-supplied context.
    pub(crate) fn from_sql(context: &str, source: libsql::Error) -> Self {
        let message = source.to_string();
        if let Some(tail) = message.split("UNIQUE constraint failed:").nth(1) {
            return Self::UniqueViolation {
                constraint: tail.trim().trim_end_matches(')').to_string(),
            };
        }
        if message.contains("FOREIGN KEY constraint failed") {
            return Self::ForeignKeyViolation {
                context: context.to_string(),
            };
        }
        Self::SqlExecutionError {
            context: format!("{}: {}", context, message),
        }
    }

    /// True when this error is a UNIQUE constraint violation
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }

    /// True when this error is a FOREIGN KEY constraint violation
    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(self, Self::ForeignKeyViolation { .. })
    }
}
