//! Ledger Store module
//!
//! Durable storage for users, accounts and the append-only transaction log.
//!
//! All writes go through a [`LedgerTx`]: a scoped transaction that is
//! either committed as a whole or rolled back when dropped. Account rows
//! are locked exclusively (in ascending account-number order) before they
//! are read for a balance check, so concurrent read-modify-write sequences
//! on the same account serialize while disjoint accounts proceed in
//! parallel.

mod error;
mod memory;
mod postgres;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{
    Account, AccountNumber, NewAccount, NewTransactionRecord, NewUser, TransactionRecord, User,
};

pub use error::{DuplicateKey, StoreError};
pub use memory::{MemoryLedgerStore, MemoryLedgerTx};
pub use postgres::{PgLedgerStore, PgLedgerTx};

/// Read access and transaction factory for the ledger.
///
/// Reads outside a transaction are read-committed snapshots: they never see
/// uncommitted writes but may lag concurrent commits.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a scoped transaction
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError>;

    async fn find_account(&self, number: &AccountNumber) -> Result<Option<Account>, StoreError>;

    /// Accounts owned by `owner_id`, sorted by account number ascending
    async fn accounts_by_owner(&self, owner_id: Uuid) -> Result<Vec<Account>, StoreError>;

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Every record sending from or to any of `numbers`, each at most once,
    /// newest first
    async fn records_for_accounts(
        &self,
        numbers: &[AccountNumber],
    ) -> Result<Vec<TransactionRecord>, StoreError>;
}

/// A single atomic unit of writes.
///
/// Nothing written through a `LedgerTx` is visible to other callers until
/// [`commit`](LedgerTx::commit) succeeds. Dropping the transaction, or a
/// failed commit, discards every write.
#[async_trait]
pub trait LedgerTx: Send {
    /// Lock the given accounts and return their current state.
    ///
    /// Locks are taken in ascending account-number order. Callers lock every
    /// account they need in one call. Missing accounts are absent from the
    /// result.
    async fn lock_accounts(&mut self, numbers: &[AccountNumber]) -> Result<Vec<Account>, StoreError>;

    /// Lock a user row and return its current state
    async fn lock_user(&mut self, user_id: Uuid) -> Result<Option<User>, StoreError>;

    /// Add `delta` to the balance of an account locked by this transaction
    async fn adjust_balance(&mut self, number: &AccountNumber, delta: Decimal) -> Result<(), StoreError>;

    /// Append a ledger entry, assigning its sequence id and timestamp
    async fn append_record(&mut self, record: NewTransactionRecord) -> Result<TransactionRecord, StoreError>;

    async fn insert_user(&mut self, user: NewUser) -> Result<User, StoreError>;

    async fn insert_account(&mut self, account: NewAccount) -> Result<Account, StoreError>;

    /// Append `number` to the owner's account list
    async fn attach_account(&mut self, user_id: Uuid, number: &AccountNumber) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
