//! ERP Ledger Library
//!
//! Double-entry bookkeeping core: chart of accounts, journal posting,
//! balance projection and financial reports. Re-exports modules for
//! integration testing and the server binaries.

pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod reports;
pub mod store;

pub use config::Config;
pub use domain::{Account, AccountType, Amount, AmountError, DomainError, OperationContext};
pub use error::{AppError, AppResult};
pub use store::{InMemoryLedgerStore, LedgerStore, PgLedgerStore};
