//! Ledger Store Errors
//!
//! Error types for ledger store operations.

/// Unique key a write collided with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateKey {
    AccountNumber,
    Email,
}

impl std::fmt::Display for DuplicateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DuplicateKey::AccountNumber => write!(f, "account number"),
            DuplicateKey::Email => write!(f, "email"),
        }
    }
}

/// Errors that can occur in the ledger store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Unique constraint violated
    #[error("Duplicate {0}")]
    Duplicate(DuplicateKey),

    /// A write would break a stored invariant (e.g. negative balance)
    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),

    /// Write against a row this transaction has not locked
    #[error("Row not locked by this transaction: {0}")]
    NotLocked(String),

    /// Store unreachable or transaction aborted
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Stored data could not be decoded
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    /// Check if retrying the whole unit may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Database(_))
    }
}

/// Postgres SQLSTATE codes
const UNIQUE_VIOLATION: &str = "23505";
const CHECK_VIOLATION: &str = "23514";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some(UNIQUE_VIOLATION) => match db.constraint() {
                    Some("users_email_key") => StoreError::Duplicate(DuplicateKey::Email),
                    _ => StoreError::Duplicate(DuplicateKey::AccountNumber),
                },
                Some(CHECK_VIOLATION) => StoreError::ConstraintViolation(db.message().to_string()),
                Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => {
                    StoreError::Unavailable(db.message().to_string())
                }
                _ => StoreError::Database(err),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Database(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_unavailable() {
        let err: StoreError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_duplicate_is_not_retryable() {
        let err = StoreError::Duplicate(DuplicateKey::Email);
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Duplicate email");
    }
}
