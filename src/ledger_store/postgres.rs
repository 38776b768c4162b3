//! PostgreSQL Ledger Store
//!
//! Relies on row-level locks (`SELECT ... FOR UPDATE`) inside a regular
//! READ COMMITTED transaction. Locked rows are re-read after the lock is
//! granted, so the balance check always sees the latest committed value.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{
    Account, AccountNumber, NewAccount, NewTransactionRecord, NewUser, TransactionRecord,
    TransactionType, User,
};

use super::{LedgerStore, LedgerTx, StoreError};

type AccountRow = (String, Uuid, Decimal, DateTime<Utc>);
type UserRow = (Uuid, String, String, String, Vec<String>, DateTime<Utc>);
type RecordRow = (i64, String, String, Decimal, String, Option<String>, DateTime<Utc>);

const ACCOUNT_COLUMNS: &str = "account_number, owner_id, balance, created_at";
const USER_COLUMNS: &str = "id, name, email, password_hash, account_numbers, created_at";

fn parse_number(raw: String) -> Result<AccountNumber, StoreError> {
    raw.parse()
        .map_err(|e: crate::domain::AccountNumberError| StoreError::Corrupt(e.to_string()))
}

fn account_from_row((number, owner_id, balance, created_at): AccountRow) -> Result<Account, StoreError> {
    Ok(Account {
        account_number: parse_number(number)?,
        owner_id,
        balance,
        created_at,
    })
}

fn user_from_row(
    (id, name, email, password_hash, numbers, created_at): UserRow,
) -> Result<User, StoreError> {
    Ok(User {
        id,
        name,
        email,
        password_hash,
        account_numbers: numbers
            .into_iter()
            .map(parse_number)
            .collect::<Result<_, _>>()?,
        created_at,
    })
}

fn record_from_row(
    (id, from, to, amount, kind, description, created_at): RecordRow,
) -> Result<TransactionRecord, StoreError> {
    Ok(TransactionRecord {
        id,
        from_account: parse_number(from)?,
        to_account: parse_number(to)?,
        amount,
        transaction_type: kind.parse::<TransactionType>().map_err(StoreError::Corrupt)?,
        description,
        created_at,
    })
}

fn as_strings(numbers: &[AccountNumber]) -> Vec<String> {
    numbers.iter().map(|n| n.as_str().to_string()).collect()
}

/// Ledger store backed by PostgreSQL
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTx { tx }))
    }

    async fn find_account(&self, number: &AccountNumber) -> Result<Option<Account>, StoreError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_number = $1"
        ))
        .bind(number.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(account_from_row).transpose()
    }

    async fn accounts_by_owner(&self, owner_id: Uuid) -> Result<Vec<Account>, StoreError> {
        let rows: Vec<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE owner_id = $1 ORDER BY account_number ASC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(account_from_row).collect()
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;

        row.map(user_from_row).transpose()
    }

    async fn records_for_accounts(
        &self,
        numbers: &[AccountNumber],
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let rows: Vec<RecordRow> = sqlx::query_as(
            r#"
            SELECT id, from_account, to_account, amount, transaction_type, description, created_at
            FROM ledger_transactions
            WHERE from_account = ANY($1) OR to_account = ANY($1)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(as_strings(numbers))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(record_from_row).collect()
    }
}

/// Scoped PostgreSQL transaction. Dropping it rolls back.
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn lock_accounts(&mut self, numbers: &[AccountNumber]) -> Result<Vec<Account>, StoreError> {
        // Rows are locked in ORDER BY order, which keeps opposite-direction
        // transfers between the same pair from deadlocking.
        let rows: Vec<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_number = ANY($1) \
             ORDER BY account_number ASC FOR UPDATE"
        ))
        .bind(as_strings(numbers))
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(account_from_row).collect()
    }

    async fn lock_user(&mut self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"
        ))
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(user_from_row).transpose()
    }

    async fn adjust_balance(&mut self, number: &AccountNumber, delta: Decimal) -> Result<(), StoreError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = balance + $2
            WHERE account_number = $1
            "#,
        )
        .bind(number.as_str())
        .bind(delta)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(StoreError::NotLocked(number.to_string()));
        }
        Ok(())
    }

    async fn append_record(&mut self, record: NewTransactionRecord) -> Result<TransactionRecord, StoreError> {
        let row: RecordRow = sqlx::query_as(
            r#"
            INSERT INTO ledger_transactions (from_account, to_account, amount, transaction_type, description)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, from_account, to_account, amount, transaction_type, description, created_at
            "#,
        )
        .bind(record.from_account.as_str())
        .bind(record.to_account.as_str())
        .bind(record.amount.value())
        .bind(record.transaction_type.as_str())
        .bind(&record.description)
        .fetch_one(&mut *self.tx)
        .await?;

        record_from_row(row)
    }

    async fn insert_user(&mut self, user: NewUser) -> Result<User, StoreError> {
        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO users (id, name, email, password_hash) VALUES ($1, $2, $3, $4) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&mut *self.tx)
        .await?;

        user_from_row(row)
    }

    async fn insert_account(&mut self, account: NewAccount) -> Result<Account, StoreError> {
        let row: AccountRow = sqlx::query_as(&format!(
            "INSERT INTO accounts (account_number, owner_id, balance) VALUES ($1, $2, $3) \
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(account.account_number.as_str())
        .bind(account.owner_id)
        .bind(account.balance)
        .fetch_one(&mut *self.tx)
        .await?;

        account_from_row(row)
    }

    async fn attach_account(&mut self, user_id: Uuid, number: &AccountNumber) -> Result<(), StoreError> {
        let rows_affected = sqlx::query(
            "UPDATE users SET account_numbers = array_append(account_numbers, $2) WHERE id = $1",
        )
        .bind(user_id)
        .bind(number.as_str())
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(StoreError::NotLocked(format!("user {user_id}")));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_from_row_rejects_unknown_type() {
        let row: RecordRow = (
            1,
            "1111111111".to_string(),
            "2222222222".to_string(),
            Decimal::from(10),
            "refund".to_string(),
            None,
            Utc::now(),
        );
        assert!(matches!(record_from_row(row), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_user_from_row_parses_account_numbers() {
        let row: UserRow = (
            Uuid::new_v4(),
            "Ada".to_string(),
            "ada@example.com".to_string(),
            "salt$hash".to_string(),
            vec!["1111111111".to_string(), "2222222222".to_string()],
            Utc::now(),
        );
        let user = user_from_row(row).unwrap();
        assert_eq!(user.account_numbers.len(), 2);
    }

    #[test]
    fn test_account_from_row_rejects_malformed_number() {
        let row: AccountRow = ("12".to_string(), Uuid::new_v4(), Decimal::ZERO, Utc::now());
        assert!(matches!(account_from_row(row), Err(StoreError::Corrupt(_))));
    }
}
