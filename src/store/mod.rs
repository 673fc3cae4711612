//! Ledger Store module
//!
//! Persistence layer for accounts and journal entries. Every write operation
//! is atomic: either the entry, its lines and all balance deltas become
//! visible together, or nothing changes.

mod error;
mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::{Account, EntryRevision, JournalEntry};

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryLedgerStore;
pub use postgres::PgLedgerStore;

/// Ordering of journal listings by entry date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Oldest first, for ledgers and reports
    Ascending,
    /// Newest first, for general listings
    #[default]
    Descending,
}

/// Filter for journal listings. Date bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    /// Only entries with at least one line on this account
    pub account_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub order: SortOrder,
}

impl EntryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_account(mut self, account_id: Uuid) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn between(mut self, start_date: Option<NaiveDate>, end_date: Option<NaiveDate>) -> Self {
        self.start_date = start_date;
        self.end_date = end_date;
        self
    }

    pub fn ascending(mut self) -> Self {
        self.order = SortOrder::Ascending;
        self
    }

    pub fn matches(&self, entry: &JournalEntry) -> bool {
        self.account_id.map_or(true, |id| entry.touches(id))
            && self.start_date.map_or(true, |start| entry.date >= start)
            && self.end_date.map_or(true, |end| entry.date <= end)
    }
}

/// Storage backend for the ledger.
///
/// Implementations are the single writer of account balances: `post_entry`,
/// `revise_entry` and `remove_entry` apply the balance deltas computed by
/// `crate::domain::journal` in the same transaction as the entry change, and
/// serialize concurrent writers touching the same account.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Persist a new account. Fails with `DuplicateAccountCode` or
    /// `ParentAccountNotFound`.
    async fn insert_account(&self, account: Account) -> StoreResult<Account>;

    /// Persist changed account metadata. The stored balance is left as is.
    async fn save_account(&self, account: Account) -> StoreResult<Account>;

    /// Remove an account without children or journal lines.
    async fn delete_account(&self, account_id: Uuid) -> StoreResult<()>;

    async fn get_account(&self, account_id: Uuid) -> StoreResult<Option<Account>>;

    /// All accounts ordered by code.
    async fn list_accounts(&self) -> StoreResult<Vec<Account>>;

    /// Persist a balanced entry and apply its deltas.
    async fn post_entry(&self, entry: JournalEntry) -> StoreResult<JournalEntry>;

    /// Patch an entry; when lines are replaced, revert the old deltas and
    /// apply the new ones in the same transaction.
    async fn revise_entry(&self, entry_id: Uuid, revision: EntryRevision)
        -> StoreResult<JournalEntry>;

    /// Revert an entry's deltas and delete it with its lines.
    async fn remove_entry(&self, entry_id: Uuid) -> StoreResult<JournalEntry>;

    async fn get_entry(&self, entry_id: Uuid) -> StoreResult<Option<JournalEntry>>;

    async fn list_entries(&self, filter: &EntryFilter) -> StoreResult<Vec<JournalEntry>>;
}
