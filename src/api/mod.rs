//! API module
//!
//! HTTP API endpoints and middleware.

pub mod middleware;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use crate::handlers::{AccountDirectory, TransferHandler, UserHandler};
use crate::history::HistoryService;
use crate::ledger_store::LedgerStore;

pub use routes::create_router;

/// Shared state handed to every route
#[derive(Clone)]
pub struct AppState {
    pub transfers: TransferHandler,
    pub accounts: AccountDirectory,
    pub users: UserHandler,
    pub history: HistoryService,
}

impl AppState {
    pub fn new(store: Arc<dyn LedgerStore>, transfer_timeout: Duration) -> Self {
        Self {
            transfers: TransferHandler::new(store.clone()).with_timeout(transfer_timeout),
            accounts: AccountDirectory::new(store.clone()),
            users: UserHandler::new(store.clone()),
            history: HistoryService::new(store),
        }
    }
}
