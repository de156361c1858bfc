//! Service Layer Error Types
//!
//! The business error taxonomy shared by all catalog services. Every
//! failure a caller can observe maps to exactly one variant:
//!
//! - [`CatalogError::NotFound`] - a referenced id or label does not exist
//! - [`CatalogError::Conflict`] - a uniqueness rule rejected the input
//!   (title, address, or activity path)
//! - [`CatalogError::Validation`] - caller-supplied data malformed beyond
//!   primitive type checks
//! - [`CatalogError::Store`] - connection/transaction failure unrelated to
//!   business rules; safe to retry for idempotent operations (deletes,
//!   chain creation) but not for create-by-unique-title operations, where
//!   a retry of a half-observed success would surface as `Conflict`
//! - [`CatalogError::Invariant`] - internal inconsistency; always a defect

use crate::db::DatabaseError;
use crate::models::ValidationError;
use thiserror::Error;

/// Result alias used across the service layer.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Catalog operation errors
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Referenced entity does not exist
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Uniqueness violation on title/address/path
    #[error("Conflict: {context}")]
    Conflict { context: String },

    /// Caller-supplied data malformed
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Transient store failure, unrelated to business rules
    #[error("Store operation failed: {0}")]
    Store(#[from] DatabaseError),

    /// Internal invariant violated - always a defect
    #[error("Invariant violated: {context}")]
    Invariant { context: String },
}

impl CatalogError {
    /// Create a not found error
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(context: impl Into<String>) -> Self {
        Self::Conflict {
            context: context.into(),
        }
    }

    /// Create an invariant violation error
    pub fn invariant(context: impl Into<String>) -> Self {
        Self::Invariant {
            context: context.into(),
        }
    }

    /// True when the error is the not-found outcome
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True when the error is a uniqueness conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
