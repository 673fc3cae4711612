//! Cash flow statement
//!
//! Cash accounts are recognized by name: any asset whose name or code
//! contains "cash" or "bank". Each cash line is classified by the type of the
//! first non-cash line on the same entry.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Account, AccountType, DateRange, JournalEntry};

/// Activity bucket of a cash movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CashFlowActivity {
    Operating,
    Investing,
    Financing,
}

impl CashFlowActivity {
    fn for_counterparty(account_type: AccountType) -> Self {
        match account_type {
            AccountType::Revenue | AccountType::Expense => CashFlowActivity::Operating,
            AccountType::Asset => CashFlowActivity::Investing,
            AccountType::Liability | AccountType::Equity => CashFlowActivity::Financing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashFlowItem {
    pub entry_id: Uuid,
    pub date: NaiveDate,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub counterparty_account_id: Uuid,
    pub counterparty_code: String,
    pub counterparty_name: String,
    /// Positive for inflows, negative for outflows
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashFlowStatement {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub operating: Vec<CashFlowItem>,
    pub investing: Vec<CashFlowItem>,
    pub financing: Vec<CashFlowItem>,
    pub total_operating: Decimal,
    pub total_investing: Decimal,
    pub total_financing: Decimal,
    pub net_cash_flow: Decimal,
    pub beginning_cash: Decimal,
    pub ending_cash: Decimal,
}

/// Build the statement for `range`.
///
/// `entries` must include every entry dated before `range.start` as well as
/// the range itself, so the beginning balance can be rebuilt from history.
/// An open start falls back to the current cash balance less the period's
/// net flow.
pub fn build_cash_flow(
    accounts: &[Account],
    entries: &[JournalEntry],
    range: DateRange,
) -> CashFlowStatement {
    let index: HashMap<Uuid, &Account> = accounts.iter().map(|a| (a.id, a)).collect();
    let is_cash = |account_id: &Uuid| index.get(account_id).map_or(false, |a| a.is_cash_like());

    let mut operating = Vec::new();
    let mut investing = Vec::new();
    let mut financing = Vec::new();
    let mut history = Decimal::ZERO;

    for entry in entries {
        let before_start = range.start.map_or(false, |start| entry.date < start);
        if !before_start && !range.contains(entry.date) {
            continue;
        }

        for line in entry.lines.iter().filter(|l| is_cash(&l.account_id)) {
            if before_start {
                history += line.signed_amount();
                continue;
            }

            let counterparty = entry
                .lines
                .iter()
                .filter(|other| !is_cash(&other.account_id))
                .find_map(|other| index.get(&other.account_id));
            // Transfers between two cash accounts move no cash in or out
            let Some(counterparty) = counterparty else {
                continue;
            };

            let item = CashFlowItem {
                entry_id: entry.id,
                date: entry.date,
                reference: entry.reference.clone(),
                description: entry.description.clone(),
                counterparty_account_id: counterparty.id,
                counterparty_code: counterparty.code.clone(),
                counterparty_name: counterparty.name.clone(),
                // Debit to cash is money in, credit is money out
                amount: line.signed_amount(),
            };
            match CashFlowActivity::for_counterparty(counterparty.account_type) {
                CashFlowActivity::Operating => operating.push(item),
                CashFlowActivity::Investing => investing.push(item),
                CashFlowActivity::Financing => financing.push(item),
            }
        }
    }

    let total = |items: &[CashFlowItem]| items.iter().map(|i| i.amount).sum::<Decimal>();
    let total_operating = total(&operating);
    let total_investing = total(&investing);
    let total_financing = total(&financing);
    let net_cash_flow = total_operating + total_investing + total_financing;

    let beginning_cash = if range.start.is_some() {
        history
    } else {
        let current_cash: Decimal = accounts
            .iter()
            .filter(|a| a.is_cash_like())
            .map(|a| a.balance)
            .sum();
        current_cash - net_cash_flow
    };

    CashFlowStatement {
        start_date: range.start,
        end_date: range.end,
        operating,
        investing,
        financing,
        total_operating,
        total_investing,
        total_financing,
        net_cash_flow,
        beginning_cash,
        ending_cash: beginning_cash + net_cash_flow,
    }
}
