//! Command definitions
//!
//! Commands represent intentions to change the ledger state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::AccountNumber;

// =========================================================================
// TransferCommand
// =========================================================================

/// Command to move funds between two accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferCommand {
    /// Account number to debit
    pub from_account: String,
    /// Account number to credit
    pub to_account: String,
    /// Amount in minor units, unparsed (validated by the engine)
    pub amount: String,
    pub description: Option<String>,
    /// Authenticated caller; must own `from_account`
    pub requesting_user_id: Uuid,
}

impl TransferCommand {
    pub fn new(
        from_account: impl Into<String>,
        to_account: impl Into<String>,
        amount: impl Into<String>,
        requesting_user_id: Uuid,
    ) -> Self {
        Self {
            from_account: from_account.into(),
            to_account: to_account.into(),
            amount: amount.into(),
            description: None,
            requesting_user_id,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

// =========================================================================
// RegisterUserCommand
// =========================================================================

/// Command to register a user together with their first account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUserCommand {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterUserCommand {
    pub fn new(name: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Result of a successful registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUserResult {
    pub user_id: Uuid,
    pub account_number: AccountNumber,
    pub name: String,
}
