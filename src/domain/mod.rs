//! Domain module
//!
//! Core domain types and business rules.

pub mod account;
pub mod account_number;
pub mod amount;
pub mod context;
pub mod error;
pub mod password;
pub mod transaction;
pub mod user;

pub use account::{Account, NewAccount};
pub use account_number::{AccountNumber, AccountNumberError, ACCOUNT_NUMBER_LEN};
pub use amount::{Amount, AmountError, OPENING_BALANCE};
pub use context::OperationContext;
pub use error::DomainError;
pub use transaction::{sort_newest_first, NewTransactionRecord, TransactionRecord, TransactionType};
pub use user::{NewUser, User, MAX_ACCOUNTS_PER_USER};
