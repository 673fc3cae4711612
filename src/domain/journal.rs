//! Journal entries and balance deltas
//!
//! A journal entry owns its lines. The delta functions here are the only
//! place the posting sign convention is expressed; every store applies the
//! maps they return inside one transaction.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Amount, DomainError};

/// Side of a journal line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineType {
    Debit,
    Credit,
}

impl LineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineType::Debit => "debit",
            LineType::Credit => "credit",
        }
    }

    /// Balance effect of `amount` on this side: +debit, -credit.
    pub fn signed(&self, amount: Decimal) -> Decimal {
        match self {
            LineType::Debit => amount,
            LineType::Credit => -amount,
        }
    }
}

impl fmt::Display for LineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LineType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debit" => Ok(LineType::Debit),
            "credit" => Ok(LineType::Credit),
            other => Err(DomainError::validation(format!("invalid line type: {}", other))),
        }
    }
}

/// One debit or credit movement against one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntryLine {
    pub id: Uuid,
    pub account_id: Uuid,
    pub amount: Amount,
    #[serde(rename = "type")]
    pub line_type: LineType,
    pub description: Option<String>,
}

impl JournalEntryLine {
    pub fn signed_amount(&self) -> Decimal {
        self.line_type.signed(self.amount.value())
    }
}

/// A posted, balanced set of lines recorded on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    pub code: Option<String>,
    pub date: NaiveDate,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub lines: Vec<JournalEntryLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated line input, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineDraft {
    pub account_id: Uuid,
    pub amount: Amount,
    #[serde(rename = "type")]
    pub line_type: LineType,
    #[serde(default)]
    pub description: Option<String>,
}

impl LineDraft {
    pub fn debit(account_id: Uuid, amount: Amount) -> Self {
        Self {
            account_id,
            amount,
            line_type: LineType::Debit,
            description: None,
        }
    }

    pub fn credit(account_id: Uuid, amount: Amount) -> Self {
        Self {
            account_id,
            amount,
            line_type: LineType::Credit,
            description: None,
        }
    }

    fn into_line(self) -> JournalEntryLine {
        JournalEntryLine {
            id: Uuid::new_v4(),
            account_id: self.account_id,
            amount: self.amount,
            line_type: self.line_type,
            description: self.description,
        }
    }
}

/// Input for a new journal entry.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalDraft {
    pub code: Option<String>,
    pub date: NaiveDate,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub lines: Vec<LineDraft>,
}

/// Patch applied to a posted entry. `None` leaves a field untouched;
/// `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryRevision {
    pub code: Option<Option<String>>,
    pub date: Option<NaiveDate>,
    pub reference: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub lines: Option<Vec<LineDraft>>,
}

impl EntryRevision {
    pub fn replaces_lines(&self) -> bool {
        self.lines.is_some()
    }
}

/// Sum of debit and credit amounts, in that order.
pub fn line_totals(lines: &[LineDraft]) -> (Decimal, Decimal) {
    lines
        .iter()
        .fold((Decimal::ZERO, Decimal::ZERO), |(debits, credits), line| {
            match line.line_type {
                LineType::Debit => (debits + line.amount.value(), credits),
                LineType::Credit => (debits, credits + line.amount.value()),
            }
        })
}

/// Non-empty and debit total equal to credit total.
pub fn ensure_balanced(lines: &[LineDraft]) -> Result<(), DomainError> {
    if lines.is_empty() {
        return Err(DomainError::validation("journal entry must have lines"));
    }
    let (debits, credits) = line_totals(lines);
    if debits != credits {
        return Err(DomainError::unbalanced(debits, credits));
    }
    Ok(())
}

/// Net balance change per account for posting `lines`.
///
/// Keyed by account id in ascending order, which is also the lock order.
pub fn balance_deltas(lines: &[JournalEntryLine]) -> BTreeMap<Uuid, Decimal> {
    let mut deltas = BTreeMap::new();
    for line in lines {
        *deltas.entry(line.account_id).or_insert(Decimal::ZERO) += line.signed_amount();
    }
    deltas
}

/// Net balance change for replacing `old` lines with `new` lines.
///
/// Reverting the old set and applying the new set collapse into one map.
/// Accounts whose net change is zero keep an explicit zero entry so callers
/// still lock and verify them.
pub fn revision_deltas(
    old: &[JournalEntryLine],
    new: &[JournalEntryLine],
) -> BTreeMap<Uuid, Decimal> {
    let mut deltas = balance_deltas(new);
    for (account_id, delta) in balance_deltas(old) {
        *deltas.entry(account_id).or_insert(Decimal::ZERO) -= delta;
    }
    deltas
}

/// Inverse of [`balance_deltas`], used when an entry is removed.
pub fn reversal_deltas(lines: &[JournalEntryLine]) -> BTreeMap<Uuid, Decimal> {
    balance_deltas(lines)
        .into_iter()
        .map(|(account_id, delta)| (account_id, -delta))
        .collect()
}

impl JournalEntry {
    /// Materialize a draft into an entry with fresh ids.
    pub fn from_draft(draft: JournalDraft) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            code: draft.code,
            date: draft.date,
            reference: draft.reference,
            description: draft.description,
            lines: draft.lines.into_iter().map(LineDraft::into_line).collect(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a revision in place and return the replaced lines, if any.
    pub fn revise(&mut self, revision: EntryRevision) -> Option<Vec<JournalEntryLine>> {
        if let Some(code) = revision.code {
            self.code = code;
        }
        if let Some(date) = revision.date {
            self.date = date;
        }
        if let Some(reference) = revision.reference {
            self.reference = reference;
        }
        if let Some(description) = revision.description {
            self.description = description;
        }
        self.updated_at = Utc::now();

        revision.lines.map(|drafts| {
            let new_lines = drafts.into_iter().map(LineDraft::into_line).collect();
            std::mem::replace(&mut self.lines, new_lines)
        })
    }

    /// Distinct accounts referenced by the lines.
    pub fn account_ids(&self) -> Vec<Uuid> {
        balance_deltas(&self.lines).into_keys().collect()
    }

    pub fn touches(&self, account_id: Uuid) -> bool {
        self.lines.iter().any(|line| line.account_id == account_id)
    }
}
