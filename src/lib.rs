//! Account Ledger Library
//!
//! Re-exports modules for integration testing and external use.

pub mod api;
pub mod domain;
pub mod handlers;
pub mod history;
pub mod ledger_store;

pub mod config;
pub mod db;
mod error;

pub use config::Config;
pub use domain::{AccountNumber, Amount, AmountError, DomainError, OperationContext};
pub use error::{AppError, AppResult, ErrorResponse};
