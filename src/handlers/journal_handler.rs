//! Journal Handler
//!
//! Posts, revises and removes journal entries. Balance effects are applied by
//! the ledger store inside the same transaction as the entry change.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{
    ensure_balanced, Account, DateRange, DomainError, JournalEntry, LineType, OperationContext,
};
use crate::error::{AppError, AppResult};
use crate::store::{EntryFilter, LedgerStore};

use super::{
    AccountLedger, JournalEntryView, JournalLineView, LedgerRow, PostJournalEntryCommand,
    ReviseJournalEntryCommand,
};

/// Handler for the journal posting engine
#[derive(Clone)]
pub struct JournalHandler {
    store: Arc<dyn LedgerStore>,
}

impl JournalHandler {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Post a balanced entry and apply its balance deltas atomically
    pub async fn create_journal_entry(
        &self,
        command: PostJournalEntryCommand,
        context: &OperationContext,
    ) -> AppResult<JournalEntryView> {
        let draft = command.into_draft()?;
        ensure_balanced(&draft.lines)?;

        let entry = self.store.post_entry(JournalEntry::from_draft(draft)).await?;

        tracing::info!(
            entry_id = %entry.id,
            date = %entry.date,
            lines = entry.lines.len(),
            correlation_id = ?context.correlation_id,
            "Journal entry posted"
        );

        self.resolve(entry).await
    }

    /// Patch an entry. A new line set is validated in full before the old
    /// lines are reverted.
    pub async fn update_journal_entry(
        &self,
        entry_id: Uuid,
        command: ReviseJournalEntryCommand,
        context: &OperationContext,
    ) -> AppResult<JournalEntryView> {
        let revision = command.into_revision()?;
        if let Some(lines) = &revision.lines {
            ensure_balanced(lines)?;
        }
        let replaces_lines = revision.replaces_lines();

        let entry = self.store.revise_entry(entry_id, revision).await?;

        tracing::info!(
            entry_id = %entry.id,
            replaces_lines,
            correlation_id = ?context.correlation_id,
            "Journal entry updated"
        );

        self.resolve(entry).await
    }

    /// Revert every balance effect of the entry and remove it
    pub async fn delete_journal_entry(
        &self,
        entry_id: Uuid,
        context: &OperationContext,
    ) -> AppResult<()> {
        let entry = self.store.remove_entry(entry_id).await?;

        tracing::info!(
            entry_id = %entry.id,
            lines = entry.lines.len(),
            correlation_id = ?context.correlation_id,
            "Journal entry deleted"
        );

        Ok(())
    }

    pub async fn get_journal_entry(&self, entry_id: Uuid) -> AppResult<JournalEntryView> {
        let entry = self
            .store
            .get_entry(entry_id)
            .await?
            .ok_or(DomainError::JournalEntryNotFound(entry_id))?;
        self.resolve(entry).await
    }

    /// General listing, newest first
    pub async fn get_journal_entries(
        &self,
        account_id: Option<Uuid>,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> AppResult<Vec<JournalEntryView>> {
        let range = DateRange::new(start_date, end_date)?;
        let mut filter = EntryFilter::new().between(range.start, range.end);
        if let Some(account_id) = account_id {
            filter = filter.for_account(account_id);
        }

        let entries = self.store.list_entries(&filter).await?;
        let accounts = self.account_index().await?;
        entries
            .into_iter()
            .map(|entry| to_view(entry, &accounts))
            .collect()
    }

    /// Entries oldest first, for report consumers
    pub async fn get_journal_entries_by_date_range(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> AppResult<Vec<JournalEntry>> {
        let range = DateRange::new(start_date, end_date)?;
        let filter = EntryFilter::new().between(range.start, range.end).ascending();
        Ok(self.store.list_entries(&filter).await?)
    }

    /// Movements on one account in date order with a running balance.
    ///
    /// Entries before `start_date` are folded into the opening balance.
    pub async fn get_account_ledger(
        &self,
        account_id: Uuid,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> AppResult<AccountLedger> {
        let range = DateRange::new(start_date, end_date)?;
        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or(DomainError::AccountNotFound(account_id))?;

        let filter = EntryFilter::new()
            .for_account(account_id)
            .between(None, range.end)
            .ascending();
        let entries = self.store.list_entries(&filter).await?;

        Ok(build_ledger(&account, &entries, range))
    }

    async fn account_index(&self) -> AppResult<HashMap<Uuid, Account>> {
        Ok(self
            .store
            .list_accounts()
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect())
    }

    async fn resolve(&self, entry: JournalEntry) -> AppResult<JournalEntryView> {
        let accounts = self.account_index().await?;
        to_view(entry, &accounts)
    }
}

fn to_view(entry: JournalEntry, accounts: &HashMap<Uuid, Account>) -> AppResult<JournalEntryView> {
    let mut total_debits = Decimal::ZERO;
    let mut total_credits = Decimal::ZERO;
    let mut lines = Vec::with_capacity(entry.lines.len());

    for line in entry.lines {
        // Lines reference accounts with a restricting foreign key
        let account = accounts.get(&line.account_id).ok_or_else(|| {
            AppError::Internal(format!(
                "journal line {} references missing account {}",
                line.id, line.account_id
            ))
        })?;

        match line.line_type {
            LineType::Debit => total_debits += line.amount.value(),
            LineType::Credit => total_credits += line.amount.value(),
        }

        lines.push(JournalLineView {
            id: line.id,
            account_id: account.id,
            account_code: account.code.clone(),
            account_name: account.name.clone(),
            account_type: account.account_type,
            amount: line.amount.value(),
            line_type: line.line_type,
            description: line.description,
        });
    }

    Ok(JournalEntryView {
        id: entry.id,
        code: entry.code,
        date: entry.date,
        reference: entry.reference,
        description: entry.description,
        lines,
        total_debits,
        total_credits,
        created_at: entry.created_at,
        updated_at: entry.updated_at,
    })
}

/// `entries` must be in ascending date order and end no later than `range.end`.
fn build_ledger(account: &Account, entries: &[JournalEntry], range: DateRange) -> AccountLedger {
    let mut opening_balance = Decimal::ZERO;
    let mut running_balance = Decimal::ZERO;
    let mut rows = Vec::new();

    for entry in entries {
        let (debit, credit) = entry
            .lines
            .iter()
            .filter(|line| line.account_id == account.id)
            .fold((Decimal::ZERO, Decimal::ZERO), |(d, c), line| {
                match line.line_type {
                    LineType::Debit => (d + line.amount.value(), c),
                    LineType::Credit => (d, c + line.amount.value()),
                }
            });

        running_balance += debit - credit;

        if range.start.map_or(false, |start| entry.date < start) {
            opening_balance = running_balance;
            continue;
        }

        rows.push(LedgerRow {
            entry_id: entry.id,
            entry_code: entry.code.clone(),
            date: entry.date,
            reference: entry.reference.clone(),
            description: entry.description.clone(),
            debit,
            credit,
            running_balance,
        });
    }

    AccountLedger {
        account_id: account.id,
        account_code: account.code.clone(),
        account_name: account.name.clone(),
        start_date: range.start,
        end_date: range.end,
        opening_balance,
        rows,
        closing_balance: running_balance,
    }
}
