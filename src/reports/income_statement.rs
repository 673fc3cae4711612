//! Income statement

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Account, AccountType, DateRange, JournalEntry};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomeStatementItem {
    pub account_id: Uuid,
    pub code: String,
    pub name: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomeStatement {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub revenue: Vec<IncomeStatementItem>,
    pub expenses: Vec<IncomeStatementItem>,
    pub total_revenue: Decimal,
    pub total_expenses: Decimal,
    pub net_income: Decimal,
}

/// Revenue and expense activity of the journal lines dated within `range`.
///
/// Revenue accumulates credit minus debit, expenses debit minus credit. Only
/// accounts with at least one line in the range are listed.
pub fn build_income_statement(
    accounts: &[Account],
    entries: &[JournalEntry],
    range: DateRange,
) -> IncomeStatement {
    let index: HashMap<Uuid, &Account> = accounts.iter().map(|a| (a.id, a)).collect();

    // Raw debit-minus-credit per account; sorted later by code
    let mut activity: BTreeMap<Uuid, Decimal> = BTreeMap::new();
    for entry in entries.iter().filter(|e| range.contains(e.date)) {
        for line in &entry.lines {
            let is_nominal = index.get(&line.account_id).map_or(false, |a| {
                matches!(a.account_type, AccountType::Revenue | AccountType::Expense)
            });
            if is_nominal {
                *activity.entry(line.account_id).or_insert(Decimal::ZERO) += line.signed_amount();
            }
        }
    }

    let mut revenue = Vec::new();
    let mut expenses = Vec::new();
    for (account_id, net_debit) in activity {
        let Some(account) = index.get(&account_id) else {
            continue;
        };
        let (section, amount) = match account.account_type {
            AccountType::Revenue => (&mut revenue, -net_debit),
            _ => (&mut expenses, net_debit),
        };
        section.push(IncomeStatementItem {
            account_id,
            code: account.code.clone(),
            name: account.name.clone(),
            amount,
        });
    }
    revenue.sort_by(|a, b| a.code.cmp(&b.code));
    expenses.sort_by(|a, b| a.code.cmp(&b.code));

    let total_revenue: Decimal = revenue.iter().map(|i| i.amount).sum();
    let total_expenses: Decimal = expenses.iter().map(|i| i.amount).sum();

    IncomeStatement {
        start_date: range.start,
        end_date: range.end,
        revenue,
        expenses,
        total_revenue,
        total_expenses,
        net_income: total_revenue - total_expenses,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Amount, JournalDraft, LineDraft};
    use rust_decimal_macros::dec;

    fn account(code: &str, name: &str, account_type: AccountType) -> Account {
        Account::open(code.into(), name.into(), account_type, None, None)
    }

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn posting(date: NaiveDate, debit: Uuid, credit: Uuid, value: Decimal) -> JournalEntry {
        let amount = Amount::new(value).unwrap();
        JournalEntry::from_draft(JournalDraft {
            code: None,
            date,
            reference: None,
            description: None,
            lines: vec![LineDraft::debit(debit, amount), LineDraft::credit(credit, amount)],
        })
    }

    #[test]
    fn test_rent_expense_only() {
        let cash = account("1000", "Cash", AccountType::Asset);
        let rent = account("6100", "Rent Expense", AccountType::Expense);
        let entries = vec![posting(day(3, 1), rent.id, cash.id, dec!(1500))];

        let march = DateRange::new(Some(day(3, 1)), Some(day(3, 31))).unwrap();
        let statement = build_income_statement(&[cash, rent], &entries, march);

        assert!(statement.revenue.is_empty());
        assert_eq!(statement.expenses.len(), 1);
        assert_eq!(statement.expenses[0].name, "Rent Expense");
        assert_eq!(statement.expenses[0].amount, dec!(1500));
        assert_eq!(statement.net_income, dec!(-1500));
    }

    #[test]
    fn test_revenue_credit_positive_and_range_filter() {
        let cash = account("1000", "Cash", AccountType::Asset);
        let sales = account("4000", "Sales", AccountType::Revenue);
        let wages = account("6000", "Wages", AccountType::Expense);

        let entries = vec![
            posting(day(1, 10), cash.id, sales.id, dec!(900)),
            posting(day(1, 15), sales.id, cash.id, dec!(100)),
            posting(day(1, 20), wages.id, cash.id, dec!(300)),
            posting(day(2, 1), cash.id, sales.id, dec!(5000)),
        ];

        let january = DateRange::new(Some(day(1, 1)), Some(day(1, 31))).unwrap();
        let statement = build_income_statement(&[cash, sales, wages], &entries, january);

        assert_eq!(statement.total_revenue, dec!(800));
        assert_eq!(statement.total_expenses, dec!(300));
        assert_eq!(statement.net_income, dec!(500));
    }

    #[test]
    fn test_unbounded_range_covers_everything() {
        let cash = account("1000", "Cash", AccountType::Asset);
        let sales = account("4000", "Sales", AccountType::Revenue);
        let entries = vec![
            posting(day(1, 1), cash.id, sales.id, dec!(10)),
            posting(day(12, 31), cash.id, sales.id, dec!(20)),
        ];

        let statement = build_income_statement(&[cash, sales], &entries, DateRange::all());
        assert_eq!(statement.total_revenue, dec!(30));
    }
}
