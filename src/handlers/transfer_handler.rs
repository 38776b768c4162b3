//! Transfer Handler
//!
//! The funds-transfer engine: validates a transfer, debits one account,
//! credits another and appends one ledger entry, all in one store
//! transaction.

use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;

use crate::domain::{
    AccountNumber, Amount, DomainError, NewTransactionRecord, OperationContext, TransactionRecord,
};
use crate::ledger_store::{LedgerStore, LedgerTx};

use super::TransferCommand;

/// Upper bound on a single transfer attempt when none is configured
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(5);

/// Handler for transfers between accounts
#[derive(Clone)]
pub struct TransferHandler {
    store: Arc<dyn LedgerStore>,
    timeout: Duration,
}

impl TransferHandler {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            timeout: DEFAULT_TRANSFER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Execute the transfer command.
    ///
    /// Preconditions are checked in order, first failure wins: both accounts
    /// exist, the caller owns the sender, the amount is valid, the sender
    /// can cover it, and the two accounts differ.
    ///
    /// Locking and writing are bounded by the handler's timeout; the commit
    /// is not. A timed-out or failed attempt leaves balances and ledger
    /// untouched. Nothing is retried here.
    pub async fn execute(
        &self,
        command: TransferCommand,
        context: &OperationContext,
    ) -> Result<TransactionRecord, DomainError> {
        let span = tracing::info_span!(
            "transfer",
            from = %command.from_account,
            to = %command.to_account,
            amount = %command.amount,
            correlation_id = ?context.correlation_id,
        );

        let outcome = self.apply(&command).instrument(span.clone()).await;

        let _entered = span.enter();
        match outcome {
            Ok(record) => {
                tracing::info!(record_id = record.id, "Transfer committed");
                Ok(record)
            }
            Err(err) if err.is_retryable() => {
                tracing::error!(error = %err, "Transfer aborted by store");
                Err(err)
            }
            Err(err) => {
                tracing::info!(kind = err.kind(), error = %err, "Transfer rejected");
                Err(err)
            }
        }
    }

    async fn apply(&self, command: &TransferCommand) -> Result<TransactionRecord, DomainError> {
        let (tx, record) = match tokio::time::timeout(self.timeout, self.stage(command)).await {
            Ok(staged) => staged?,
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "Transfer timed out");
                return Err(DomainError::StorageFailure(format!(
                    "transfer did not complete within {} ms",
                    self.timeout.as_millis()
                )));
            }
        };

        // Once sent, a commit's outcome is always awaited: a commit that
        // reached the store must never be reported as failed.
        tx.commit().await?;

        Ok(record)
    }

    /// Lock both accounts, check preconditions and write debit, credit and
    /// record. Returning early drops the store transaction, which rolls back
    /// everything written through it.
    async fn stage(
        &self,
        command: &TransferCommand,
    ) -> Result<(Box<dyn LedgerTx>, TransactionRecord), DomainError> {
        // A malformed number cannot name an existing account
        let from: AccountNumber = command
            .from_account
            .parse()
            .map_err(|_| DomainError::SenderAccountNotFound(command.from_account.clone()))?;
        let to: AccountNumber = command
            .to_account
            .parse()
            .map_err(|_| DomainError::RecipientAccountNotFound(command.to_account.clone()))?;

        let mut tx = self.store.begin().await?;

        // Both rows stay locked until commit or drop, so the balance read
        // below cannot go stale before the debit.
        let locked = tx.lock_accounts(&[from.clone(), to.clone()]).await?;

        let sender = locked
            .iter()
            .find(|a| a.account_number == from)
            .ok_or_else(|| DomainError::SenderAccountNotFound(from.to_string()))?;
        if !locked.iter().any(|a| a.account_number == to) {
            return Err(DomainError::RecipientAccountNotFound(to.to_string()));
        }

        if !sender.is_owned_by(command.requesting_user_id) {
            return Err(DomainError::Unauthorized(format!(
                "user {} does not own account {}",
                command.requesting_user_id, from
            )));
        }

        let amount: Amount = command
            .amount
            .parse()
            .map_err(|e: crate::domain::AmountError| DomainError::InvalidAmount(e.to_string()))?;

        sender.ensure_can_debit(&amount)?;

        if from == to {
            return Err(DomainError::SameAccountTransfer);
        }

        tx.adjust_balance(&from, -amount.value()).await?;
        tx.adjust_balance(&to, amount.value()).await?;
        let record = tx
            .append_record(NewTransactionRecord::transfer(
                from,
                to,
                amount,
                command.description.clone(),
            ))
            .await?;

        Ok((tx, record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger_store::MemoryLedgerStore;

    #[test]
    fn test_default_timeout() {
        let handler = TransferHandler::new(Arc::new(MemoryLedgerStore::new()));
        assert_eq!(handler.timeout, DEFAULT_TRANSFER_TIMEOUT);

        let handler = handler.with_timeout(Duration::from_millis(10));
        assert_eq!(handler.timeout, Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_malformed_sender_is_not_found() {
        let handler = TransferHandler::new(Arc::new(MemoryLedgerStore::new()));
        let cmd = TransferCommand::new("12", "1111111111", "10", uuid::Uuid::new_v4());

        let err = handler.execute(cmd, &OperationContext::new()).await.unwrap_err();
        assert_eq!(err, DomainError::SenderAccountNotFound("12".to_string()));
    }
}
