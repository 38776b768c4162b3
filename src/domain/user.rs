//! User
//!
//! Registered users and the account numbers they own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AccountNumber;

/// Maximum number of accounts a single user may own
pub const MAX_ACCOUNTS_PER_USER: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Owned account numbers in creation order (append-only)
    pub account_numbers: Vec<AccountNumber>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Whether another account may be opened for this user
    pub fn can_open_account(&self) -> bool {
        self.account_numbers.len() < MAX_ACCOUNTS_PER_USER
    }
}

/// User about to be inserted at registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
}
