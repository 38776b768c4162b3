//! Ledger entries
//!
//! Immutable records of fund movement. Created exactly once on a successful
//! transfer, never updated or deleted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{AccountNumber, Amount};

/// Classification of a ledger entry.
///
/// Only `Transfer` is produced today; the other two are reserved for future
/// producers of ledger entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Transfer,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Transfer => "transfer",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(TransactionType::Deposit),
            "withdrawal" => Ok(TransactionType::Withdrawal),
            "transfer" => Ok(TransactionType::Transfer),
            other => Err(format!("unknown transaction type {other:?}")),
        }
    }
}

/// A persisted ledger entry.
///
/// `id` is the insertion sequence number assigned by the store; it breaks
/// ties between entries sharing a `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: i64,
    pub from_account: AccountNumber,
    pub to_account: AccountNumber,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Whether this entry debits or credits `account_number`
    pub fn involves(&self, account_number: &AccountNumber) -> bool {
        &self.from_account == account_number || &self.to_account == account_number
    }
}

/// Ledger entry about to be appended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransactionRecord {
    pub from_account: AccountNumber,
    pub to_account: AccountNumber,
    pub amount: Amount,
    pub transaction_type: TransactionType,
    pub description: Option<String>,
}

impl NewTransactionRecord {
    pub fn transfer(
        from_account: AccountNumber,
        to_account: AccountNumber,
        amount: Amount,
        description: Option<String>,
    ) -> Self {
        Self {
            from_account,
            to_account,
            amount,
            transaction_type: TransactionType::Transfer,
            description,
        }
    }
}

/// Order records newest first, falling back to insertion order for equal
/// timestamps.
pub fn sort_newest_first(records: &mut [TransactionRecord]) {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: i64, created_at: DateTime<Utc>) -> TransactionRecord {
        TransactionRecord {
            id,
            from_account: "1111111111".parse().unwrap(),
            to_account: "2222222222".parse().unwrap(),
            amount: Decimal::from(10),
            transaction_type: TransactionType::Transfer,
            description: None,
            created_at,
        }
    }

    #[test]
    fn test_transaction_type_round_trip() {
        for ty in [
            TransactionType::Deposit,
            TransactionType::Withdrawal,
            TransactionType::Transfer,
        ] {
            assert_eq!(ty.as_str().parse::<TransactionType>().unwrap(), ty);
        }
        assert!("refund".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_record_serializes_type_field() {
        let json = serde_json::to_value(record(1, Utc::now())).unwrap();
        assert_eq!(json["type"], "transfer");
        assert_eq!(json["from_account"], "1111111111");
    }

    #[test]
    fn test_sort_newest_first_breaks_ties_by_id() {
        let t0 = Utc::now();
        let mut records = vec![
            record(1, t0),
            record(3, t0 + Duration::seconds(1)),
            record(2, t0),
        ];
        sort_newest_first(&mut records);
        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_involves() {
        let r = record(1, Utc::now());
        assert!(r.involves(&"1111111111".parse().unwrap()));
        assert!(r.involves(&"2222222222".parse().unwrap()));
        assert!(!r.involves(&"3333333333".parse().unwrap()));
    }
}
