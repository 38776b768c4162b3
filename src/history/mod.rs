//! History module
//!
//! Read-only queries over the append-only ledger.

mod service;

pub use service::HistoryService;
