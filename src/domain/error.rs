//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Coarse classification every ledger error falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; always detected before any mutation.
    Validation,
    /// A referenced account or journal entry does not exist.
    NotFound,
    /// A structural constraint would be violated.
    Conflict,
}

/// Ledger rule violations and domain invariant failures.
///
/// These are caller-input errors and are never retried.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Missing or malformed field
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Account type outside the five supported classifications
    #[error("Invalid account type: {0}")]
    InvalidAccountType(String),

    /// Debit and credit totals of a journal entry differ
    #[error("Debits and credits must be equal (debits {debits}, credits {credits})")]
    UnbalancedEntry { debits: Decimal, credits: Decimal },

    /// Account assigned as its own parent
    #[error("Account {0} cannot be its own parent")]
    SelfParent(Uuid),

    /// Parent assignment would close a loop in the account tree
    #[error("Assigning parent {parent_id} to account {account_id} would create a cycle")]
    ParentCycle { account_id: Uuid, parent_id: Uuid },

    /// Account type is fixed once the account exists
    #[error("Account type cannot be changed after creation")]
    AccountTypeImmutable,

    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    #[error("Parent account not found: {0}")]
    ParentAccountNotFound(Uuid),

    #[error("Journal entry not found: {0}")]
    JournalEntryNotFound(Uuid),

    #[error("Account {0} has child accounts")]
    AccountHasChildren(Uuid),

    #[error("Account {0} is referenced by journal lines")]
    AccountHasJournalLines(Uuid),

    #[error("Account code already exists: {0}")]
    DuplicateAccountCode(String),

    #[error("Journal entry code already exists: {0}")]
    DuplicateEntryCode(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unbalanced(debits: Decimal, credits: Decimal) -> Self {
        Self::UnbalancedEntry { debits, credits }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_)
            | Self::InvalidAccountType(_)
            | Self::UnbalancedEntry { .. }
            | Self::SelfParent(_)
            | Self::ParentCycle { .. }
            | Self::AccountTypeImmutable => ErrorKind::Validation,
            Self::AccountNotFound(_)
            | Self::ParentAccountNotFound(_)
            | Self::JournalEntryNotFound(_) => ErrorKind::NotFound,
            Self::AccountHasChildren(_)
            | Self::AccountHasJournalLines(_)
            | Self::DuplicateAccountCode(_)
            | Self::DuplicateEntryCode(_) => ErrorKind::Conflict,
        }
    }

    pub fn is_validation_error(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_conflict_error(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    /// Stable machine-readable code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::InvalidAccountType(_) => "invalid_account_type",
            Self::UnbalancedEntry { .. } => "unbalanced_entry",
            Self::SelfParent(_) => "self_parent",
            Self::ParentCycle { .. } => "parent_cycle",
            Self::AccountTypeImmutable => "account_type_immutable",
            Self::AccountNotFound(_) => "account_not_found",
            Self::ParentAccountNotFound(_) => "parent_account_not_found",
            Self::JournalEntryNotFound(_) => "journal_entry_not_found",
            Self::AccountHasChildren(_) => "account_has_children",
            Self::AccountHasJournalLines(_) => "account_has_journal_lines",
            Self::DuplicateAccountCode(_) => "duplicate_account_code",
            Self::DuplicateEntryCode(_) => "duplicate_entry_code",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_unbalanced_entry_error() {
        let err = DomainError::unbalanced(dec!(100), dec!(90));

        assert!(err.is_validation_error());
        assert!(!err.is_conflict_error());
        assert!(err.to_string().starts_with("Debits and credits must be equal"));
        assert!(err.to_string().contains("90"));
    }

    #[test]
    fn test_error_kinds() {
        let id = Uuid::new_v4();
        assert_eq!(DomainError::SelfParent(id).kind(), ErrorKind::Validation);
        assert_eq!(DomainError::AccountNotFound(id).kind(), ErrorKind::NotFound);
        assert_eq!(DomainError::JournalEntryNotFound(id).kind(), ErrorKind::NotFound);
        assert_eq!(DomainError::AccountHasChildren(id).kind(), ErrorKind::Conflict);
        assert!(DomainError::DuplicateAccountCode("1000".into()).is_conflict_error());
    }

    #[test]
    fn test_error_codes_are_snake_case() {
        let err = DomainError::AccountHasJournalLines(Uuid::nil());
        assert_eq!(err.error_code(), "account_has_journal_lines");
    }
}
