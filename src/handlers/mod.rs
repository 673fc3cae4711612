//! Command Handlers module
//!
//! Handlers that orchestrate ledger operations over a `LedgerStore`.

mod account_handler;
mod commands;
mod journal_handler;
mod settlement_handler;


pub use account_handler::AccountHandler;
pub use commands::{
    AccountLedger, CreateAccountCommand, JournalEntryView, JournalLineCommand, JournalLineView,
    LedgerRow, PostJournalEntryCommand, ReviseJournalEntryCommand, SettlementCommand,
    UpdateAccountCommand,
};
pub(crate) use commands::deserialize_some;
pub use journal_handler::JournalHandler;
pub use settlement_handler::SettlementHandler;
