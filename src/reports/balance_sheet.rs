//! Balance sheet

use std::collections::HashSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{within_tolerance, Account, AccountType, JournalEntry};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceSheetItem {
    pub account_id: Uuid,
    pub code: String,
    pub name: String,
    /// Presented on the account's natural side: assets debit positive,
    /// liabilities and equity credit positive
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceSheet {
    pub as_of: NaiveDate,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub assets: Vec<BalanceSheetItem>,
    pub liabilities: Vec<BalanceSheetItem>,
    pub equity: Vec<BalanceSheetItem>,
    pub total_assets: Decimal,
    pub total_liabilities: Decimal,
    pub total_equity: Decimal,
    pub total_liabilities_and_equity: Decimal,
    pub is_balanced: bool,
}

/// Partition accounts into the three balance sheet sections.
///
/// With `activity` set, only accounts referenced by at least one of those
/// entries are included; the caller passes the entries of the reporting
/// range. Without it every account is included.
pub fn build_balance_sheet(
    accounts: &[Account],
    activity: Option<&[JournalEntry]>,
    as_of: NaiveDate,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> BalanceSheet {
    let active: Option<HashSet<Uuid>> = activity.map(|entries| {
        entries
            .iter()
            .flat_map(|entry| entry.lines.iter().map(|line| line.account_id))
            .collect()
    });

    let mut assets = Vec::new();
    let mut liabilities = Vec::new();
    let mut equity = Vec::new();

    for account in accounts {
        if let Some(active) = &active {
            if !active.contains(&account.id) {
                continue;
            }
        }

        let (section, balance) = match account.account_type {
            AccountType::Asset => (&mut assets, account.balance),
            AccountType::Liability => (&mut liabilities, -account.balance),
            AccountType::Equity => (&mut equity, -account.balance),
            AccountType::Revenue | AccountType::Expense => continue,
        };
        section.push(BalanceSheetItem {
            account_id: account.id,
            code: account.code.clone(),
            name: account.name.clone(),
            balance,
        });
    }

    for section in [&mut assets, &mut liabilities, &mut equity] {
        section.sort_by(|a, b| a.code.cmp(&b.code));
    }

    let total = |items: &[BalanceSheetItem]| items.iter().map(|i| i.balance).sum::<Decimal>();
    let total_assets = total(&assets);
    let total_liabilities = total(&liabilities);
    let total_equity = total(&equity);
    let total_liabilities_and_equity = total_liabilities + total_equity;

    BalanceSheet {
        as_of,
        start_date,
        end_date,
        assets,
        liabilities,
        equity,
        total_assets,
        total_liabilities,
        total_equity,
        total_liabilities_and_equity,
        is_balanced: within_tolerance(total_assets, total_liabilities_and_equity),
    }
}
