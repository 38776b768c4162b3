//! History Service
//!
//! Ledger entries by account or by owner, newest first. Reads take no
//! locks and may lag transfers that are committing concurrently.

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{sort_newest_first, AccountNumber, DomainError, TransactionRecord};
use crate::ledger_store::LedgerStore;

/// Service for ledger history queries
#[derive(Clone)]
pub struct HistoryService {
    store: Arc<dyn LedgerStore>,
}

impl HistoryService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Records sent from or to `account_number`, newest first
    pub async fn history_for_account(
        &self,
        account_number: &AccountNumber,
    ) -> Result<Vec<TransactionRecord>, DomainError> {
        let mut records = self
            .store
            .records_for_accounts(std::slice::from_ref(account_number))
            .await?;
        sort_newest_first(&mut records);
        Ok(records)
    }

    /// Records touching any account owned by `owner_id`, newest first.
    ///
    /// A transfer between two of the owner's own accounts appears once.
    pub async fn history_for_owner(&self, owner_id: Uuid) -> Result<Vec<TransactionRecord>, DomainError> {
        let numbers: Vec<AccountNumber> = self
            .store
            .accounts_by_owner(owner_id)
            .await?
            .into_iter()
            .map(|account| account.account_number)
            .collect();

        if numbers.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let mut records: Vec<TransactionRecord> = self
            .store
            .records_for_accounts(&numbers)
            .await?
            .into_iter()
            .filter(|record| seen.insert(record.id))
            .collect();
        sort_newest_first(&mut records);

        tracing::debug!(owner_id = %owner_id, accounts = numbers.len(), records = records.len(), "Owner history loaded");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use crate::domain::OperationContext;
    use crate::handlers::{AccountDirectory, RegisterUserCommand, TransferCommand, TransferHandler, UserHandler};
    use crate::ledger_store::MemoryLedgerStore;

    #[tokio::test]
    async fn test_history_is_newest_first_and_complete() {
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryLedgerStore::new());
        let users = UserHandler::new(store.clone());
        let engine = TransferHandler::new(store.clone());
        let history = HistoryService::new(store.clone());

        let alice = users
            .register(RegisterUserCommand::new("Alice", "alice@example.com", "secret1"))
            .await
            .unwrap();
        let bob = users
            .register(RegisterUserCommand::new("Bob", "bob@example.com", "secret2"))
            .await
            .unwrap();
        let carol = users
            .register(RegisterUserCommand::new("Carol", "carol@example.com", "secret3"))
            .await
            .unwrap();

        let ctx = OperationContext::new();
        for (amount, to) in [("1", &bob), ("2", &carol), ("3", &bob)] {
            engine
                .execute(
                    TransferCommand::new(alice.account_number.as_str(), to.account_number.as_str(), amount, alice.user_id),
                    &ctx,
                )
                .await
                .unwrap();
        }

        let bob_history = history.history_for_account(&bob.account_number).await.unwrap();
        let amounts: Vec<_> = bob_history.iter().map(|r| r.amount).collect();
        assert_eq!(amounts, vec![dec!(3), dec!(1)]);

        let alice_history = history.history_for_account(&alice.account_number).await.unwrap();
        assert_eq!(alice_history.len(), 3);
        assert!(alice_history.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[tokio::test]
    async fn test_owner_history_deduplicates_internal_transfers() {
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryLedgerStore::new());
        let users = UserHandler::new(store.clone());
        let directory = AccountDirectory::new(store.clone());
        let engine = TransferHandler::new(store.clone());
        let history = HistoryService::new(store.clone());

        let alice = users
            .register(RegisterUserCommand::new("Alice", "alice@example.com", "secret1"))
            .await
            .unwrap();
        let savings = directory.create_account(alice.user_id).await.unwrap();

        engine
            .execute(
                TransferCommand::new(alice.account_number.as_str(), savings.as_str(), "250", alice.user_id),
                &OperationContext::new(),
            )
            .await
            .unwrap();

        let records = history.history_for_owner(alice.user_id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].amount, dec!(250));
    }

    #[tokio::test]
    async fn test_owner_without_accounts_has_empty_history() {
        let history = HistoryService::new(Arc::new(MemoryLedgerStore::new()));
        assert!(history.history_for_owner(Uuid::new_v4()).await.unwrap().is_empty());
    }
}
