//! Account reconciliation against an external statement

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{within_tolerance, Account, JournalEntry, LineType};

/// A line on the account, for ticking off against the statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationLine {
    pub entry_id: Uuid,
    pub entry_code: Option<String>,
    pub date: NaiveDate,
    pub reference: Option<String>,
    pub line_id: Uuid,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub line_type: LineType,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationResult {
    pub account_id: Uuid,
    pub account_code: String,
    pub account_name: String,
    pub statement_date: NaiveDate,
    pub statement_balance: Decimal,
    /// Current running balance of the account
    pub book_balance: Decimal,
    /// statement_balance - book_balance
    pub difference: Decimal,
    pub reconciled: bool,
    pub lines: Vec<ReconciliationLine>,
}

/// Compare the book balance with `statement_balance` and list the account's
/// lines dated on or before `statement_date`, oldest first.
pub fn build_reconciliation(
    account: &Account,
    entries: &[JournalEntry],
    statement_balance: Decimal,
    statement_date: NaiveDate,
) -> ReconciliationResult {
    let mut dated: Vec<&JournalEntry> = entries
        .iter()
        .filter(|entry| entry.date <= statement_date)
        .collect();
    dated.sort_by_key(|entry| (entry.date, entry.created_at));

    let lines = dated
        .into_iter()
        .flat_map(|entry| {
            entry
                .lines
                .iter()
                .filter(|line| line.account_id == account.id)
                .map(move |line| ReconciliationLine {
                    entry_id: entry.id,
                    entry_code: entry.code.clone(),
                    date: entry.date,
                    reference: entry.reference.clone(),
                    line_id: line.id,
                    amount: line.amount.value(),
                    line_type: line.line_type,
                    description: line.description.clone(),
                })
        })
        .collect();

    let book_balance = account.balance;
    let difference = statement_balance - book_balance;

    ReconciliationResult {
        account_id: account.id,
        account_code: account.code.clone(),
        account_name: account.name.clone(),
        statement_date,
        statement_balance,
        book_balance,
        difference,
        reconciled: within_tolerance(statement_balance, book_balance),
        lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountType, Amount, JournalDraft, LineDraft};
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    fn bank() -> Account {
        let mut account =
            Account::open("1010".into(), "Bank".into(), AccountType::Asset, None, None);
        account.balance = dec!(1040.00);
        account
    }

    fn deposit(account_id: Uuid, date: NaiveDate, value: Decimal) -> JournalEntry {
        let amount = Amount::new(value).unwrap();
        JournalEntry::from_draft(JournalDraft {
            code: None,
            date,
            reference: Some(format!("DEP-{}", date)),
            description: None,
            lines: vec![
                LineDraft::debit(account_id, amount),
                LineDraft::credit(Uuid::new_v4(), amount),
            ],
        })
    }

    #[test]
    fn test_matching_statement_reconciles() {
        let account = bank();
        let result = build_reconciliation(&account, &[], dec!(1040.00), day(30));

        assert!(result.reconciled);
        assert_eq!(result.difference, Decimal::ZERO);
    }

    #[test]
    fn test_difference_and_line_cutoff() {
        let account = bank();
        let entries = vec![
            deposit(account.id, day(20), dec!(40)),
            deposit(account.id, day(2), dec!(1000)),
            deposit(account.id, day(30), dec!(15)),
        ];

        let result = build_reconciliation(&account, &entries, dec!(1000), day(20));

        assert!(!result.reconciled);
        assert_eq!(result.difference, dec!(-40));
        assert_eq!(result.lines.len(), 2);
        assert_eq!(result.lines[0].date, day(2));
        assert_eq!(result.lines[1].date, day(20));
        assert!(result.lines.iter().all(|l| l.line_type == LineType::Debit));
    }

    #[test]
    fn test_sub_cent_difference_reconciles() {
        let account = bank();
        let result = build_reconciliation(&account, &[], dec!(1040.005), day(30));
        assert!(result.reconciled);
        assert_eq!(result.difference, dec!(0.005));
    }
}
