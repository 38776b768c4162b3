//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::ledger_store::StoreError;

/// Ledger errors surfaced to callers of the core operations.
///
/// Every variant has a stable machine-readable [`kind`](DomainError::kind)
/// alongside its human-readable message.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Source account of a transfer does not exist
    #[error("Sender account not found: {0}")]
    SenderAccountNotFound(String),

    /// Destination account of a transfer does not exist
    #[error("Recipient account not found: {0}")]
    RecipientAccountNotFound(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Caller does not own the source account
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Invalid amount (non-numeric, zero, negative, fractional or too large)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },

    #[error("Account limit exceeded: a user may own at most {limit} accounts")]
    AccountLimitExceeded { limit: usize },

    /// Every drawn account number was already taken
    #[error("Could not allocate a unique account number after {attempts} attempts")]
    AccountNumberCollision { attempts: u32 },

    #[error("Cannot transfer to the same account")]
    SameAccountTransfer,

    #[error("User with this email already exists")]
    EmailAlreadyRegistered,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Store unreachable, transaction aborted or timed out. Safe to retry.
    #[error("Storage failure: {0}")]
    StorageFailure(String),
}

impl DomainError {
    pub fn insufficient_funds(required: Decimal, available: Decimal) -> Self {
        Self::InsufficientFunds { required, available }
    }

    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SenderAccountNotFound(_) => "sender_account_not_found",
            Self::RecipientAccountNotFound(_) => "recipient_account_not_found",
            Self::AccountNotFound(_) => "account_not_found",
            Self::UserNotFound(_) => "user_not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::AccountLimitExceeded { .. } => "account_limit_exceeded",
            Self::AccountNumberCollision { .. } => "account_number_collision",
            Self::SameAccountTransfer => "same_account_transfer",
            Self::EmailAlreadyRegistered => "email_already_registered",
            Self::InvalidCredentials => "invalid_credentials",
            Self::InvalidRequest(_) => "invalid_request",
            Self::StorageFailure(_) => "storage_failure",
        }
    }

    /// Check if this is a not-found error of any flavour
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::SenderAccountNotFound(_)
                | Self::RecipientAccountNotFound(_)
                | Self::AccountNotFound(_)
                | Self::UserNotFound(_)
        )
    }

    /// Only storage failures may be retried; business-rule errors are
    /// deterministic given the input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageFailure(_))
    }
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        Self::StorageFailure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_funds_error() {
        let err = DomainError::insufficient_funds(Decimal::new(6000, 0), Decimal::new(5000, 0));

        assert_eq!(err.kind(), "insufficient_funds");
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("6000"));
        assert!(err.to_string().contains("5000"));
    }

    #[test]
    fn test_not_found_distinguishes_sender_and_recipient() {
        let sender = DomainError::SenderAccountNotFound("1111111111".to_string());
        let recipient = DomainError::RecipientAccountNotFound("2222222222".to_string());

        assert!(sender.is_not_found());
        assert!(recipient.is_not_found());
        assert_ne!(sender.kind(), recipient.kind());
        assert!(sender.to_string().starts_with("Sender"));
    }

    #[test]
    fn test_only_storage_failure_is_retryable() {
        assert!(DomainError::StorageFailure("connection reset".to_string()).is_retryable());
        assert!(!DomainError::Unauthorized("nope".to_string()).is_retryable());
        assert!(!DomainError::AccountLimitExceeded { limit: 4 }.is_retryable());
    }

    #[test]
    fn test_store_error_becomes_storage_failure() {
        let err: DomainError = StoreError::Unavailable("pool closed".to_string()).into();
        assert_eq!(err.kind(), "storage_failure");
    }
}
