//! Account numbers
//!
//! Ten-digit numeric identifiers, immutable once assigned.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of digits in every account number
pub const ACCOUNT_NUMBER_LEN: usize = 10;

/// Smallest number the generator draws (keeps all ten digits significant)
const GENERATED_MIN: u64 = 1_000_000_000;

/// Largest number the generator draws
const GENERATED_MAX: u64 = 9_999_999_999;

/// A validated ten-digit account number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountNumber(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountNumberError {
    #[error("Account number must be exactly {ACCOUNT_NUMBER_LEN} digits (got {0:?})")]
    Malformed(String),
}

impl AccountNumber {
    /// Draw a fresh random account number from the ten-digit keyspace.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.gen_range(GENERATED_MIN..=GENERATED_MAX).to_string())
    }

    /// Draw using the thread-local generator
    pub fn random() -> Self {
        Self::generate(&mut rand::thread_rng())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for AccountNumber {
    type Err = AccountNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == ACCOUNT_NUMBER_LEN && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(s.to_string()))
        } else {
            Err(AccountNumberError::Malformed(s.to_string()))
        }
    }
}

impl TryFrom<String> for AccountNumber {
    type Error = AccountNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AccountNumber> for String {
    fn from(number: AccountNumber) -> Self {
        number.0
    }
}

impl AsRef<str> for AccountNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
