//! Domain module
//!
//! Core ledger types and pure business rules.

pub mod account;
pub mod amount;
pub mod context;
pub mod error;
pub mod journal;
pub mod period;

pub use account::{build_account_tree, ensure_acyclic_parent, Account, AccountNode, AccountType};
pub use amount::{within_tolerance, Amount, AmountError, BALANCE_TOLERANCE};
pub use context::OperationContext;
pub use error::{DomainError, ErrorKind};
pub use journal::{
    balance_deltas, ensure_balanced, line_totals, reversal_deltas, revision_deltas, EntryRevision,
    JournalDraft, JournalEntry, JournalEntryLine, LineDraft, LineType,
};
pub use period::DateRange;
