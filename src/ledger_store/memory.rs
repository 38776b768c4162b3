//! In-memory Ledger Store
//!
//! Committed rows live in a snapshot that readers consult without taking
//! any row lock. Writers serialize on per-row async mutexes: a transaction
//! holds the row guards it acquired until it commits or is dropped, and
//! buffers its writes so that nothing becomes visible before a successful
//! commit.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::{
    sort_newest_first, Account, AccountNumber, NewAccount, NewTransactionRecord, NewUser,
    TransactionRecord, User,
};

use super::{DuplicateKey, LedgerStore, LedgerTx, StoreError};

type RowLock = Arc<Mutex<()>>;

/// Issues record ids and keeps `created_at` non-decreasing
struct LedgerClock {
    next_id: i64,
    last: DateTime<Utc>,
}

impl LedgerClock {
    fn tick(&mut self) -> (i64, DateTime<Utc>) {
        let id = self.next_id;
        self.next_id += 1;
        self.last = self.last.max(Utc::now());
        (id, self.last)
    }
}

/// Last committed state of every row
#[derive(Default)]
struct Committed {
    accounts: HashMap<AccountNumber, Account>,
    users: HashMap<Uuid, User>,
    emails: HashMap<String, Uuid>,
    /// Account numbers per owner, ascending
    owners: HashMap<Uuid, BTreeSet<AccountNumber>>,
    records: Vec<TransactionRecord>,
}

/// Write locks, one per committed row
#[derive(Default)]
struct RowLocks {
    accounts: HashMap<AccountNumber, RowLock>,
    users: HashMap<Uuid, RowLock>,
}

struct Inner {
    committed: RwLock<Committed>,
    rows: RwLock<RowLocks>,
    clock: StdMutex<LedgerClock>,
    failing_commits: AtomicUsize,
    commit_latency_ms: AtomicU64,
}

/// Ledger store kept entirely in process memory.
///
/// Cloning is cheap and every clone shares the same data.
#[derive(Clone)]
pub struct MemoryLedgerStore {
    inner: Arc<Inner>,
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                committed: RwLock::new(Committed::default()),
                rows: RwLock::new(RowLocks::default()),
                clock: StdMutex::new(LedgerClock {
                    next_id: 1,
                    last: DateTime::<Utc>::MIN_UTC,
                }),
                failing_commits: AtomicUsize::new(0),
                commit_latency_ms: AtomicU64::new(0),
            }),
        }
    }

    /// Make the next `count` commits fail with `StoreError::Unavailable`.
    /// A failed commit discards all of its writes.
    pub fn fail_next_commits(&self, count: usize) {
        self.inner.failing_commits.store(count, Ordering::SeqCst);
    }

    /// Delay every commit by `latency` before its writes are applied
    pub fn set_commit_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.inner.commit_latency_ms.store(millis, Ordering::SeqCst);
    }

    /// Number of committed ledger records
    pub fn record_count(&self) -> Result<usize, StoreError> {
        Ok(read(&self.inner.committed)?.records.len())
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("in-memory store lock poisoned".to_string())
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StoreError> {
    lock.read().map_err(|_| poisoned())
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StoreError> {
    lock.write().map_err(|_| poisoned())
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        Ok(Box::new(MemoryLedgerTx {
            inner: Arc::clone(&self.inner),
            locked_accounts: BTreeMap::new(),
            locked_users: HashMap::new(),
            balance_deltas: HashMap::new(),
            new_users: Vec::new(),
            new_accounts: Vec::new(),
            attachments: Vec::new(),
            records: Vec::new(),
        }))
    }

    async fn find_account(&self, number: &AccountNumber) -> Result<Option<Account>, StoreError> {
        Ok(read(&self.inner.committed)?.accounts.get(number).cloned())
    }

    async fn accounts_by_owner(&self, owner_id: Uuid) -> Result<Vec<Account>, StoreError> {
        let committed = read(&self.inner.committed)?;
        let owned = committed
            .owners
            .get(&owner_id)
            .map(|numbers| {
                numbers
                    .iter()
                    .filter_map(|n| committed.accounts.get(n).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(owned)
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(read(&self.inner.committed)?.users.get(&user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let committed = read(&self.inner.committed)?;
        Ok(committed
            .emails
            .get(email)
            .and_then(|id| committed.users.get(id))
            .cloned())
    }

    async fn records_for_accounts(
        &self,
        numbers: &[AccountNumber],
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let mut matching: Vec<TransactionRecord> = read(&self.inner.committed)?
            .records
            .iter()
            .filter(|record| numbers.iter().any(|n| record.involves(n)))
            .cloned()
            .collect();
        sort_newest_first(&mut matching);
        Ok(matching)
    }
}

/// Scoped transaction over a [`MemoryLedgerStore`]
pub struct MemoryLedgerTx {
    inner: Arc<Inner>,
    locked_accounts: BTreeMap<AccountNumber, OwnedMutexGuard<()>>,
    locked_users: HashMap<Uuid, OwnedMutexGuard<()>>,
    balance_deltas: HashMap<AccountNumber, Decimal>,
    new_users: Vec<User>,
    new_accounts: Vec<Account>,
    attachments: Vec<(Uuid, AccountNumber)>,
    records: Vec<TransactionRecord>,
}

impl MemoryLedgerTx {
    /// Account state as seen from inside this transaction
    fn current_account(&self, number: &AccountNumber) -> Result<Option<Account>, StoreError> {
        if self.locked_accounts.contains_key(number) {
            let committed = read(&self.inner.committed)?;
            let Some(mut account) = committed.accounts.get(number).cloned() else {
                return Ok(None);
            };
            if let Some(delta) = self.balance_deltas.get(number) {
                account.balance += *delta;
            }
            return Ok(Some(account));
        }
        Ok(self
            .new_accounts
            .iter()
            .find(|a| &a.account_number == number)
            .cloned())
    }

    /// User state as seen from inside this transaction
    fn current_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let user = if self.locked_users.contains_key(&user_id) {
            read(&self.inner.committed)?.users.get(&user_id).cloned()
        } else {
            self.new_users.iter().find(|u| u.id == user_id).cloned()
        };
        let Some(mut user) = user else {
            return Ok(None);
        };
        user.account_numbers.extend(
            self.attachments
                .iter()
                .filter(|(owner, _)| *owner == user_id)
                .map(|(_, number)| number.clone()),
        );
        Ok(Some(user))
    }

    /// Publish buffered writes. Runs with no await point, so the snapshot
    /// moves from one committed state to the next in one step.
    fn apply(mut self) -> Result<(), StoreError> {
        let inner = Arc::clone(&self.inner);
        let mut committed_guard = write(&inner.committed)?;
        let mut rows = write(&inner.rows)?;
        let committed = &mut *committed_guard;

        // Concurrent transactions may have claimed the same keys since insert
        if self.new_accounts.iter().any(|a| committed.accounts.contains_key(&a.account_number)) {
            return Err(StoreError::Duplicate(DuplicateKey::AccountNumber));
        }
        if self.new_users.iter().any(|u| committed.emails.contains_key(&u.email)) {
            return Err(StoreError::Duplicate(DuplicateKey::Email));
        }

        for (number, delta) in self.balance_deltas.drain() {
            if let Some(account) = committed.accounts.get_mut(&number) {
                account.balance += delta;
            }
        }

        for (user_id, number) in self.attachments.drain(..) {
            if let Some(user) = committed.users.get_mut(&user_id) {
                user.account_numbers.push(number);
            } else if let Some(user) = self.new_users.iter_mut().find(|u| u.id == user_id) {
                user.account_numbers.push(number);
            }
        }

        for account in self.new_accounts.drain(..) {
            committed
                .owners
                .entry(account.owner_id)
                .or_default()
                .insert(account.account_number.clone());
            rows.accounts
                .insert(account.account_number.clone(), Arc::new(Mutex::new(())));
            committed.accounts.insert(account.account_number.clone(), account);
        }
        for user in self.new_users.drain(..) {
            committed.emails.insert(user.email.clone(), user.id);
            rows.users.insert(user.id, Arc::new(Mutex::new(())));
            committed.users.insert(user.id, user);
        }
        committed.records.append(&mut self.records);

        Ok(())
    }
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn lock_accounts(&mut self, numbers: &[AccountNumber]) -> Result<Vec<Account>, StoreError> {
        let mut wanted = numbers.to_vec();
        wanted.sort();
        wanted.dedup();

        let rows: Vec<(AccountNumber, RowLock)> = {
            let rows = read(&self.inner.rows)?;
            wanted
                .iter()
                .filter(|n| !self.locked_accounts.contains_key(*n))
                .filter_map(|n| rows.accounts.get(n).map(|row| (n.clone(), Arc::clone(row))))
                .collect()
        };

        // ascending order, see `wanted.sort()`
        for (number, row) in rows {
            let guard = row.lock_owned().await;
            self.locked_accounts.insert(number, guard);
        }

        let mut locked = Vec::with_capacity(wanted.len());
        for number in &wanted {
            if let Some(account) = self.current_account(number)? {
                locked.push(account);
            }
        }
        Ok(locked)
    }

    async fn lock_user(&mut self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        if !self.locked_users.contains_key(&user_id) && !self.new_users.iter().any(|u| u.id == user_id) {
            let row = read(&self.inner.rows)?.users.get(&user_id).cloned();
            match row {
                Some(row) => {
                    let guard = row.lock_owned().await;
                    self.locked_users.insert(user_id, guard);
                }
                None => return Ok(None),
            }
        }
        self.current_user(user_id)
    }

    async fn adjust_balance(&mut self, number: &AccountNumber, delta: Decimal) -> Result<(), StoreError> {
        if let Some(account) = self.new_accounts.iter_mut().find(|a| &a.account_number == number) {
            if account.balance + delta < Decimal::ZERO {
                return Err(StoreError::ConstraintViolation(format!("balance of {number} would go negative")));
            }
            account.balance += delta;
            return Ok(());
        }

        let current = self
            .current_account(number)?
            .ok_or_else(|| StoreError::NotLocked(number.to_string()))?;
        if current.balance + delta < Decimal::ZERO {
            return Err(StoreError::ConstraintViolation(format!("balance of {number} would go negative")));
        }
        *self.balance_deltas.entry(number.clone()).or_insert(Decimal::ZERO) += delta;
        Ok(())
    }

    async fn append_record(&mut self, record: NewTransactionRecord) -> Result<TransactionRecord, StoreError> {
        let (id, created_at) = self.inner.clock.lock().map_err(|_| poisoned())?.tick();
        let stored = TransactionRecord {
            id,
            from_account: record.from_account,
            to_account: record.to_account,
            amount: record.amount.value(),
            transaction_type: record.transaction_type,
            description: record.description,
            created_at,
        };
        self.records.push(stored.clone());
        Ok(stored)
    }

    async fn insert_user(&mut self, user: NewUser) -> Result<User, StoreError> {
        let taken = read(&self.inner.committed)?.emails.contains_key(&user.email)
            || self.new_users.iter().any(|u| u.email == user.email);
        if taken {
            return Err(StoreError::Duplicate(DuplicateKey::Email));
        }

        let user = User {
            id: user.id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            account_numbers: Vec::new(),
            created_at: Utc::now(),
        };
        self.new_users.push(user.clone());
        Ok(user)
    }

    async fn insert_account(&mut self, account: NewAccount) -> Result<Account, StoreError> {
        let taken = read(&self.inner.committed)?.accounts.contains_key(&account.account_number)
            || self.new_accounts.iter().any(|a| a.account_number == account.account_number);
        if taken {
            return Err(StoreError::Duplicate(DuplicateKey::AccountNumber));
        }

        let account = Account {
            account_number: account.account_number,
            owner_id: account.owner_id,
            balance: account.balance,
            created_at: Utc::now(),
        };
        self.new_accounts.push(account.clone());
        Ok(account)
    }

    async fn attach_account(&mut self, user_id: Uuid, number: &AccountNumber) -> Result<(), StoreError> {
        let visible = self.locked_users.contains_key(&user_id) || self.new_users.iter().any(|u| u.id == user_id);
        if !visible {
            return Err(StoreError::NotLocked(format!("user {user_id}")));
        }
        self.attachments.push((user_id, number.clone()));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let tx = *self;

        let latency = tx.inner.commit_latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        let injected = tx
            .inner
            .failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            tracing::warn!("In-memory commit failure injected, rolling back");
            return Err(StoreError::Unavailable("injected commit failure".to_string()));
        }

        tx.apply()
    }
}
