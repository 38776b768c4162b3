//! Account Directory
//!
//! Account lookup by number and by owner, and account creation under the
//! per-user cap.

use std::future::Future;
use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{Account, AccountNumber, DomainError, NewAccount, MAX_ACCOUNTS_PER_USER};
use crate::ledger_store::{DuplicateKey, LedgerStore, StoreError};

/// How many fresh account numbers are drawn before giving up
pub const MAX_NUMBER_ATTEMPTS: u32 = 5;

/// Source of candidate account numbers
pub type NumberSource = Arc<dyn Fn() -> AccountNumber + Send + Sync>;

pub(crate) fn random_numbers() -> NumberSource {
    Arc::new(AccountNumber::random)
}

/// Outcome of one allocation attempt that did not succeed
pub(crate) enum AttemptError {
    /// The drawn number is already taken; draw another
    Collision,
    Failed(DomainError),
}

impl From<DomainError> for AttemptError {
    fn from(err: DomainError) -> Self {
        Self::Failed(err)
    }
}

impl From<StoreError> for AttemptError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(DuplicateKey::AccountNumber) => Self::Collision,
            StoreError::Duplicate(DuplicateKey::Email) => {
                Self::Failed(DomainError::EmailAlreadyRegistered)
            }
            other => Self::Failed(other.into()),
        }
    }
}

/// Run `attempt` with freshly drawn account numbers until it succeeds, fails
/// for a reason other than a number collision, or the draws run out.
pub(crate) async fn with_unique_number<T, F, Fut>(
    numbers: &NumberSource,
    mut attempt: F,
) -> Result<T, DomainError>
where
    F: FnMut(AccountNumber) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    for round in 1..=MAX_NUMBER_ATTEMPTS {
        let number = numbers();
        match attempt(number.clone()).await {
            Ok(value) => return Ok(value),
            Err(AttemptError::Failed(err)) => return Err(err),
            Err(AttemptError::Collision) => {
                tracing::warn!(account_number = %number, attempt = round, "Account number already taken");
            }
        }
    }
    Err(DomainError::AccountNumberCollision {
        attempts: MAX_NUMBER_ATTEMPTS,
    })
}

/// Account directory over a ledger store
#[derive(Clone)]
pub struct AccountDirectory {
    store: Arc<dyn LedgerStore>,
    numbers: NumberSource,
}

impl AccountDirectory {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            numbers: random_numbers(),
        }
    }

    /// Replace the random number generator, e.g. to force collisions
    pub fn with_number_source(mut self, numbers: NumberSource) -> Self {
        self.numbers = numbers;
        self
    }

    /// Open a new account for `owner_id` with the opening balance.
    ///
    /// The owner row is locked for the whole attempt, so two concurrent
    /// calls for the same owner cannot both slip under the cap.
    pub async fn create_account(&self, owner_id: Uuid) -> Result<AccountNumber, DomainError> {
        let number = with_unique_number(&self.numbers, |number| self.try_create(owner_id, number)).await?;

        tracing::info!(owner_id = %owner_id, account_number = %number, "Account created");
        Ok(number)
    }

    async fn try_create(&self, owner_id: Uuid, number: AccountNumber) -> Result<AccountNumber, AttemptError> {
        let mut tx = self.store.begin().await?;

        let owner = tx
            .lock_user(owner_id)
            .await?
            .ok_or_else(|| DomainError::UserNotFound(owner_id.to_string()))?;

        if !owner.can_open_account() {
            return Err(DomainError::AccountLimitExceeded {
                limit: MAX_ACCOUNTS_PER_USER,
            }
            .into());
        }

        tx.insert_account(NewAccount::opening(number.clone(), owner_id)).await?;
        tx.attach_account(owner_id, &number).await?;
        tx.commit().await?;

        Ok(number)
    }

    /// Look up an account by its number
    pub async fn find_by_account_number(&self, number: &str) -> Result<Account, DomainError> {
        let parsed: AccountNumber = number
            .parse()
            .map_err(|_| DomainError::AccountNotFound(number.to_string()))?;

        self.store
            .find_account(&parsed)
            .await?
            .ok_or_else(|| DomainError::AccountNotFound(number.to_string()))
    }

    /// Accounts owned by `owner_id`, sorted by account number ascending
    pub async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Account>, DomainError> {
        Ok(self.store.accounts_by_owner(owner_id).await?)
    }

    /// Name of the user owning `number`
    pub async fn owner_name(&self, number: &str) -> Result<String, DomainError> {
        let account = self.find_by_account_number(number).await?;
        let owner = self
            .store
            .find_user(account.owner_id)
            .await?
            .ok_or_else(|| DomainError::UserNotFound(account.owner_id.to_string()))?;
        Ok(owner.name)
    }
}
