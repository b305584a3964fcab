//! Error types for the StringSync domain layer.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`DomainError`] - Business logic errors
//! - [`StorageError`] - Database/repository errors
//! - [`MailError`] - Outbound mail errors
//!
//! [`crate::ports::PagingError`] lives with the pagination engine and
//! converts into [`StorageError::InvalidPageRequest`]. Error conversion is
//! automatic via `From` implementations, allowing `?` to work across
//! error boundaries.

use thiserror::Error;

use crate::ports::PagingError;

// =============================================================================
// Storage Errors
// =============================================================================

/// Database and repository errors.
///
/// These errors originate from storage operations like queries,
/// transactions, and data serialization.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to establish database connection.
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// SQL query execution failed.
    #[error("Query execution error: {0}")]
    QueryError(String),

    /// Requested record was not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Database constraint was violated (unique, foreign key, etc.).
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Database migration failed.
    #[error("Migration error: {0}")]
    MigrationError(String),

    /// Transaction commit/rollback failed.
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// Data serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Paging arguments were invalid (caller bug, not retried).
    #[error("Invalid page request: {0}")]
    InvalidPageRequest(#[from] PagingError),
}

// =============================================================================
// Mail Errors
// =============================================================================

/// Outbound mail delivery errors.
#[derive(Debug, Error)]
pub enum MailError {
    /// The mail transport failed to deliver the message.
    #[error("Mail send error: {0}")]
    SendError(String),
}

// =============================================================================
// Domain Errors
// =============================================================================

/// Business logic and domain rule violations.
///
/// This is the main error type returned by the service layer. It wraps
/// storage and mail errors and adds domain-specific variants.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Requested entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Input failed domain validation rules.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Request was well-formed but cannot be honored (stale token, etc.).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Caller is not allowed to perform the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Mail delivery failed.
    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PagingError> for DomainError {
    fn from(err: PagingError) -> Self {
        DomainError::Storage(StorageError::from(err))
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type for mail operations.
pub type MailResult<T> = Result<T, MailError>;

#[cfg(test)]
mod tests {
    use super::*;

    // Test critique: la chaîne de conversion d'erreurs fonctionne
    // Permet d'utiliser ? à travers les couches
    #[test]
    fn test_error_conversion_chain() {
        // Storage -> Domain
        let storage_err = StorageError::QueryError("db failed".into());
        let domain_err: DomainError = storage_err.into();
        assert!(domain_err.to_string().contains("db failed"));

        // Mail -> Domain
        let mail_err = MailError::SendError("smtp failed".into());
        let domain_err: DomainError = mail_err.into();
        assert!(domain_err.to_string().contains("smtp failed"));
    }

    // Paging -> Storage -> Domain, le message original est préservé
    #[test]
    fn test_paging_error_conversion_chain() {
        let paging_err = PagingError::NonPositiveLimit(-3);
        let storage_err: StorageError = paging_err.into();
        assert!(storage_err.to_string().contains("-3"));

        let domain_err: DomainError = PagingError::ConflictingDirections.into();
        assert!(domain_err.to_string().contains("forward"));
    }
}
