//! In-memory ledger store
//!
//! Holds the whole ledger behind one `RwLock`. Writers take the lock for the
//! duration of the operation and finish every check before the first
//! mutation, so readers never observe a half-applied posting.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    balance_deltas, ensure_acyclic_parent, reversal_deltas, revision_deltas, Account,
    DomainError, EntryRevision, JournalEntry,
};

use super::{EntryFilter, LedgerStore, SortOrder, StoreResult};

#[derive(Debug, Default)]
struct LedgerState {
    accounts: HashMap<Uuid, Account>,
    entries: HashMap<Uuid, JournalEntry>,
}

impl LedgerState {
    fn code_taken(&self, code: &str, except: Option<Uuid>) -> bool {
        self.accounts
            .values()
            .any(|a| a.code == code && Some(a.id) != except)
    }

    fn entry_code_taken(&self, code: &str, except: Option<Uuid>) -> bool {
        self.entries
            .values()
            .any(|e| e.code.as_deref() == Some(code) && Some(e.id) != except)
    }

    fn ensure_accounts_exist(&self, entry: &JournalEntry) -> Result<(), DomainError> {
        match entry
            .lines
            .iter()
            .find(|line| !self.accounts.contains_key(&line.account_id))
        {
            Some(line) => Err(DomainError::AccountNotFound(line.account_id)),
            None => Ok(()),
        }
    }

    /// Callers must have verified every account in `deltas` exists.
    fn apply_deltas(&mut self, deltas: &BTreeMap<Uuid, Decimal>) {
        let now = Utc::now();
        for (account_id, delta) in deltas {
            if delta.is_zero() {
                continue;
            }
            if let Some(account) = self.accounts.get_mut(account_id) {
                account.balance += *delta;
                account.updated_at = now;
            }
        }
    }
}

/// Ledger store kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<LedgerState>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn insert_account(&self, account: Account) -> StoreResult<Account> {
        let mut state = self.state.write().await;

        if state.code_taken(&account.code, None) {
            return Err(DomainError::DuplicateAccountCode(account.code).into());
        }
        if let Some(parent_id) = account.parent_id {
            if !state.accounts.contains_key(&parent_id) {
                return Err(DomainError::ParentAccountNotFound(parent_id).into());
            }
        }

        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn save_account(&self, account: Account) -> StoreResult<Account> {
        let mut state = self.state.write().await;

        if state.code_taken(&account.code, Some(account.id)) {
            return Err(DomainError::DuplicateAccountCode(account.code).into());
        }
        if let Some(parent_id) = account.parent_id {
            if !state.accounts.contains_key(&parent_id) {
                return Err(DomainError::ParentAccountNotFound(parent_id).into());
            }
            ensure_acyclic_parent(account.id, parent_id, |id| {
                state.accounts.get(&id).and_then(|a| a.parent_id)
            })?;
        }

        let stored = state
            .accounts
            .get_mut(&account.id)
            .ok_or(DomainError::AccountNotFound(account.id))?;

        let balance = stored.balance;
        *stored = Account {
            balance,
            updated_at: Utc::now(),
            ..account
        };
        Ok(stored.clone())
    }

    async fn delete_account(&self, account_id: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;

        if !state.accounts.contains_key(&account_id) {
            return Err(DomainError::AccountNotFound(account_id).into());
        }
        if state
            .accounts
            .values()
            .any(|a| a.parent_id == Some(account_id))
        {
            return Err(DomainError::AccountHasChildren(account_id).into());
        }
        if state.entries.values().any(|e| e.touches(account_id)) {
            return Err(DomainError::AccountHasJournalLines(account_id).into());
        }

        state.accounts.remove(&account_id);
        Ok(())
    }

    async fn get_account(&self, account_id: Uuid) -> StoreResult<Option<Account>> {
        Ok(self.state.read().await.accounts.get(&account_id).cloned())
    }

    async fn list_accounts(&self) -> StoreResult<Vec<Account>> {
        let mut accounts: Vec<Account> =
            self.state.read().await.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(accounts)
    }

    async fn post_entry(&self, entry: JournalEntry) -> StoreResult<JournalEntry> {
        let mut state = self.state.write().await;

        state.ensure_accounts_exist(&entry)?;
        if let Some(code) = entry.code.as_deref() {
            if state.entry_code_taken(code, None) {
                return Err(DomainError::DuplicateEntryCode(code.to_string()).into());
            }
        }

        state.apply_deltas(&balance_deltas(&entry.lines));
        state.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn revise_entry(
        &self,
        entry_id: Uuid,
        revision: EntryRevision,
    ) -> StoreResult<JournalEntry> {
        let mut state = self.state.write().await;

        // Work on a copy so a failed check leaves the stored entry untouched
        let mut entry = state
            .entries
            .get(&entry_id)
            .cloned()
            .ok_or(DomainError::JournalEntryNotFound(entry_id))?;
        let replaced = entry.revise(revision);

        if let Some(code) = entry.code.as_deref() {
            if state.entry_code_taken(code, Some(entry_id)) {
                return Err(DomainError::DuplicateEntryCode(code.to_string()).into());
            }
        }

        if let Some(old_lines) = replaced {
            state.ensure_accounts_exist(&entry)?;
            state.apply_deltas(&revision_deltas(&old_lines, &entry.lines));
        }

        state.entries.insert(entry_id, entry.clone());
        Ok(entry)
    }

    async fn remove_entry(&self, entry_id: Uuid) -> StoreResult<JournalEntry> {
        let mut state = self.state.write().await;

        let entry = state
            .entries
            .remove(&entry_id)
            .ok_or(DomainError::JournalEntryNotFound(entry_id))?;
        state.apply_deltas(&reversal_deltas(&entry.lines));
        Ok(entry)
    }

    async fn get_entry(&self, entry_id: Uuid) -> StoreResult<Option<JournalEntry>> {
        Ok(self.state.read().await.entries.get(&entry_id).cloned())
    }

    async fn list_entries(&self, filter: &EntryFilter) -> StoreResult<Vec<JournalEntry>> {
        let state = self.state.read().await;
        let mut entries: Vec<JournalEntry> = state
            .entries
            .values()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect();

        entries.sort_by(|a, b| (a.date, a.created_at).cmp(&(b.date, b.created_at)));
        if filter.order == SortOrder::Descending {
            entries.reverse();
        }
        Ok(entries)
    }
}
