//! Common test utilities

#![allow(dead_code)]

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use account_ledger::db;
use account_ledger::domain::AccountNumber;
use account_ledger::handlers::{RegisterUserCommand, UserHandler};
use account_ledger::ledger_store::{LedgerStore, MemoryLedgerStore};

/// A registered user and their first account
#[derive(Debug, Clone)]
pub struct Registered {
    pub user_id: uuid::Uuid,
    pub account: AccountNumber,
}

/// Fresh in-memory store, both as its concrete type and as a trait object
pub fn memory_store() -> (MemoryLedgerStore, Arc<dyn LedgerStore>) {
    let store = MemoryLedgerStore::new();
    let shared: Arc<dyn LedgerStore> = Arc::new(store.clone());
    (store, shared)
}

/// Register a user with a unique email derived from `name`
pub async fn register(store: &Arc<dyn LedgerStore>, name: &str) -> Registered {
    let email = format!("{}-{}@example.com", name.to_lowercase(), uuid::Uuid::new_v4().simple());
    let result = UserHandler::new(store.clone())
        .register(RegisterUserCommand::new(name, email, "password1"))
        .await
        .expect("registration failed");

    Registered {
        user_id: result.user_id,
        account: result.account_number,
    }
}

/// Setup test database - apply schema and truncate tables
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    db::run_migrations(&pool).await.expect("Failed to apply schema");

    sqlx::query("TRUNCATE TABLE ledger_transactions, accounts, users RESTART IDENTITY CASCADE")
        .execute(&pool)
        .await
        .expect("Failed to clean up DB");

    pool
}
