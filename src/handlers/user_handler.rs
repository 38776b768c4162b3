//! User Handler
//!
//! Registration (user plus first account, created together) and
//! password authentication.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::password::{hash_password, verify_password};
use crate::domain::{AccountNumber, DomainError, NewAccount, NewUser, User};
use crate::ledger_store::LedgerStore;

use super::account_handler::{random_numbers, with_unique_number, AttemptError, NumberSource};
use super::{RegisterUserCommand, RegisterUserResult};

const MIN_PASSWORD_LEN: usize = 6;

/// Handler for user registration and login
#[derive(Clone)]
pub struct UserHandler {
    store: Arc<dyn LedgerStore>,
    numbers: NumberSource,
}

impl UserHandler {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            numbers: random_numbers(),
        }
    }

    pub fn with_number_source(mut self, numbers: NumberSource) -> Self {
        self.numbers = numbers;
        self
    }

    /// Register a user and open their first account
    pub async fn register(&self, command: RegisterUserCommand) -> Result<RegisterUserResult, DomainError> {
        let command = validate(command)?;

        if self.store.find_user_by_email(&command.email).await?.is_some() {
            return Err(DomainError::EmailAlreadyRegistered);
        }

        let new_user = NewUser {
            id: Uuid::new_v4(),
            name: command.name,
            email: command.email,
            password_hash: hash_password(&command.password)?,
        };

        let number = with_unique_number(&self.numbers, |number| self.try_register(&new_user, number)).await?;

        tracing::info!(user_id = %new_user.id, account_number = %number, "User registered");

        Ok(RegisterUserResult {
            user_id: new_user.id,
            account_number: number,
            name: new_user.name,
        })
    }

    async fn try_register(&self, user: &NewUser, number: AccountNumber) -> Result<AccountNumber, AttemptError> {
        let mut tx = self.store.begin().await?;

        tx.insert_user(user.clone()).await?;
        tx.insert_account(NewAccount::opening(number.clone(), user.id)).await?;
        tx.attach_account(user.id, &number).await?;
        tx.commit().await?;

        Ok(number)
    }

    /// Check an email/password pair. Unknown email and wrong password are
    /// indistinguishable to the caller.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, DomainError> {
        let email = email.trim().to_lowercase();

        match self.store.find_user_by_email(&email).await? {
            Some(user) if verify_password(password, &user.password_hash) => Ok(user),
            _ => {
                tracing::debug!(email = %email, "Authentication failed");
                Err(DomainError::InvalidCredentials)
            }
        }
    }
}

fn validate(command: RegisterUserCommand) -> Result<RegisterUserCommand, DomainError> {
    let name = command.name.trim().to_string();
    if name.is_empty() {
        return Err(DomainError::InvalidRequest("name is required".to_string()));
    }

    let email = command.email.trim().to_lowercase();
    if !is_plausible_email(&email) {
        return Err(DomainError::InvalidRequest(format!("invalid email: {email}")));
    }

    let password = command.password;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(DomainError::InvalidRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(DomainError::InvalidRequest(
            "password must contain a number".to_string(),
        ));
    }

    Ok(RegisterUserCommand { name, email, password })
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}
