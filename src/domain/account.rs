//! Account
//!
//! A balance-holding entity identified by a unique account number and owned
//! by exactly one user.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountNumber, Amount, DomainError, OPENING_BALANCE};

/// Current state of an account.
///
/// `balance` is a cache of the account's ledger history: it always equals
/// the opening balance plus every credit minus every debit recorded against
/// `account_number`. Only the transfer engine changes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub account_number: AccountNumber,
    pub owner_id: Uuid,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }

    /// Check that `amount` can be debited without going negative
    pub fn ensure_can_debit(&self, amount: &Amount) -> Result<(), DomainError> {
        if self.balance >= amount.value() {
            Ok(())
        } else {
            Err(DomainError::insufficient_funds(amount.value(), self.balance))
        }
    }
}

/// Account about to be inserted by the account directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub account_number: AccountNumber,
    pub owner_id: Uuid,
    pub balance: Decimal,
}

impl NewAccount {
    /// A freshly opened account carrying the opening balance
    pub fn opening(account_number: AccountNumber, owner_id: Uuid) -> Self {
        Self {
            account_number,
            owner_id,
            balance: Decimal::from(OPENING_BALANCE),
        }
    }
}
