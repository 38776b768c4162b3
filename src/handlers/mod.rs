//! Command Handlers module
//!
//! Handlers that orchestrate ledger operations over a [`LedgerStore`].
//! Every write they perform goes through one store transaction.
//!
//! [`LedgerStore`]: crate::ledger_store::LedgerStore

mod account_handler;
mod commands;
mod transfer_handler;
mod user_handler;


pub use account_handler::{AccountDirectory, NumberSource, MAX_NUMBER_ATTEMPTS};
pub use commands::*;
pub use transfer_handler::{TransferHandler, DEFAULT_TRANSFER_TIMEOUT};
pub use user_handler::UserHandler;
