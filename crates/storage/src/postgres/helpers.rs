//! Shared helper functions for PostgreSQL row conversion and error mapping.

use stringsync_core::error::{StorageError, StorageResult};
use stringsync_core::models::UserRole;

/// Parse a stored role name into [`UserRole`].
///
/// Returns an error for unknown values; an unrecognized role in the
/// database means the row was written by incompatible code.
pub fn role_from_str(value: &str) -> StorageResult<UserRole> {
    UserRole::parse(value).ok_or_else(|| {
        StorageError::SerializationError(format!("unknown user role '{value}'"))
    })
}

/// Map a sqlx error from a plain query.
pub fn query_err(e: sqlx::Error) -> StorageError {
    StorageError::QueryError(e.to_string())
}

/// Map a sqlx error from an insert, surfacing unique and foreign-key
/// violations as [`StorageError::ConstraintViolation`].
pub fn insert_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() || db.is_foreign_key_violation() => {
            StorageError::ConstraintViolation(db.message().to_string())
        }
        _ => StorageError::QueryError(e.to_string()),
    }
}
