//! Command definitions
//!
//! Commands represent intentions to change the ledger. Results and views are
//! what the handlers hand back once the change is committed.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::domain::{
    AccountType, Amount, DomainError, EntryRevision, JournalDraft, LineDraft, LineType,
};

/// Distinguish an absent field from an explicit `null`.
///
/// Used with `#[serde(default)]`, so a missing key stays `None` and a
/// present key, null or not, becomes `Some(..)`.
pub(crate) fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Trim, and treat blank strings as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(field: &str, value: String) -> Result<String, DomainError> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(DomainError::validation(format!("{} is required", field)));
    }
    Ok(value)
}

// =========================================================================
// Account commands
// =========================================================================

/// Command to open a new account in the chart of accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountCommand {
    pub code: String,
    pub name: String,
    /// One of asset, liability, equity, revenue, expense
    #[serde(rename = "type")]
    pub account_type: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub description: Option<String>,
}

impl CreateAccountCommand {
    pub fn new(code: impl Into<String>, name: impl Into<String>, account_type: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            account_type: account_type.into(),
            parent_id: None,
            description: None,
        }
    }

    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Validated code, name and type.
    pub(crate) fn validate(&self) -> Result<(String, String, AccountType), DomainError> {
        let code = required("code", self.code.clone())?;
        let name = required("name", self.name.clone())?;
        let account_type = self.account_type.parse()?;
        Ok((code, name, account_type))
    }
}

/// Partial account update. Absent fields are left untouched.
///
/// `parent_id` is doubly optional: `Some(None)` detaches the account from its
/// parent, `None` keeps the current parent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAccountCommand {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub account_type: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub parent_id: Option<Option<Uuid>>,
    #[serde(default)]
    pub description: Option<String>,
}

impl UpdateAccountCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_type(mut self, account_type: impl Into<String>) -> Self {
        self.account_type = Some(account_type.into());
        self
    }

    pub fn with_parent(mut self, parent_id: Option<Uuid>) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

// =========================================================================
// Journal commands
// =========================================================================

/// One requested debit or credit line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalLineCommand {
    pub account_id: Uuid,
    pub amount: Decimal,
    /// debit or credit
    #[serde(rename = "type")]
    pub line_type: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl JournalLineCommand {
    pub fn debit(account_id: Uuid, amount: Decimal) -> Self {
        Self {
            account_id,
            amount,
            line_type: LineType::Debit.as_str().to_string(),
            description: None,
        }
    }

    pub fn credit(account_id: Uuid, amount: Decimal) -> Self {
        Self {
            account_id,
            amount,
            line_type: LineType::Credit.as_str().to_string(),
            description: None,
        }
    }

    fn into_draft(self) -> Result<LineDraft, DomainError> {
        let amount = Amount::new(self.amount)
            .map_err(|e| DomainError::validation(format!("invalid line amount: {}", e)))?;
        Ok(LineDraft {
            account_id: self.account_id,
            amount,
            line_type: self.line_type.parse()?,
            description: non_blank(self.description),
        })
    }
}

fn into_line_drafts(lines: Vec<JournalLineCommand>) -> Result<Vec<LineDraft>, DomainError> {
    lines.into_iter().map(JournalLineCommand::into_draft).collect()
}

/// Command to post a balanced journal entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostJournalEntryCommand {
    #[serde(default)]
    pub code: Option<String>,
    pub date: NaiveDate,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub lines: Vec<JournalLineCommand>,
}

impl PostJournalEntryCommand {
    pub fn new(date: NaiveDate, lines: Vec<JournalLineCommand>) -> Self {
        Self {
            code: None,
            date,
            reference: None,
            description: None,
            lines,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub(crate) fn into_draft(self) -> Result<JournalDraft, DomainError> {
        Ok(JournalDraft {
            code: non_blank(self.code),
            date: self.date,
            reference: non_blank(self.reference),
            description: non_blank(self.description),
            lines: into_line_drafts(self.lines)?,
        })
    }
}

/// Partial journal entry update. Supplying `lines` replaces the whole set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviseJournalEntryCommand {
    /// `null` or a blank string clears the code
    #[serde(default, deserialize_with = "deserialize_some")]
    pub code: Option<Option<String>>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub reference: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub lines: Option<Vec<JournalLineCommand>>,
}

impl ReviseJournalEntryCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lines(mut self, lines: Vec<JournalLineCommand>) -> Self {
        self.lines = Some(lines);
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(Some(description.into()));
        self
    }

    pub fn clear_reference(mut self) -> Self {
        self.reference = Some(None);
        self
    }

    pub(crate) fn into_revision(self) -> Result<EntryRevision, DomainError> {
        Ok(EntryRevision {
            code: self.code.map(non_blank),
            date: self.date,
            reference: self.reference.map(non_blank),
            description: self.description.map(non_blank),
            lines: self.lines.map(into_line_drafts).transpose()?,
        })
    }
}

// =========================================================================
// Settlement commands
// =========================================================================

/// Cash receipt from a customer or payment to a supplier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementCommand {
    pub amount: Decimal,
    pub date: NaiveDate,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl SettlementCommand {
    pub fn new(amount: Decimal, date: NaiveDate) -> Self {
        Self {
            amount,
            date,
            reference: None,
            description: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

// =========================================================================
// Results
// =========================================================================

/// Journal line with its account resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalLineView {
    pub id: Uuid,
    pub account_id: Uuid,
    pub account_code: String,
    pub account_name: String,
    pub account_type: AccountType,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub line_type: LineType,
    pub description: Option<String>,
}

/// Journal entry as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntryView {
    pub id: Uuid,
    pub code: Option<String>,
    pub date: NaiveDate,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub lines: Vec<JournalLineView>,
    pub total_debits: Decimal,
    pub total_credits: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of an account ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub entry_id: Uuid,
    pub entry_code: Option<String>,
    pub date: NaiveDate,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub debit: Decimal,
    pub credit: Decimal,
    /// debit minus credit accumulated in date order
    pub running_balance: Decimal,
}

/// Date-ordered movements on one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountLedger {
    pub account_id: Uuid,
    pub account_code: String,
    pub account_name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Net movement before `start_date`
    pub opening_balance: Decimal,
    pub rows: Vec<LedgerRow>,
    pub closing_balance: Decimal,
}
