//! Trial balance

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{within_tolerance, Account, AccountType};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialBalanceLine {
    pub account_id: Uuid,
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    /// Raw running balance, debit positive
    pub balance: Decimal,
}

/// Account listing with debit-side and credit-side totals.
///
/// `total_credits` is presented credit-positive, so a balanced ledger shows
/// two equal positive totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialBalance {
    pub accounts: Vec<TrialBalanceLine>,
    pub total_debits: Decimal,
    pub total_credits: Decimal,
    pub is_balanced: bool,
}

pub fn build_trial_balance(accounts: &[Account]) -> TrialBalance {
    let mut total_debits = Decimal::ZERO;
    let mut credit_side = Decimal::ZERO;

    let mut lines: Vec<TrialBalanceLine> = accounts
        .iter()
        .map(|account| {
            if account.account_type.is_debit_normal() {
                total_debits += account.balance;
            } else {
                credit_side += account.balance;
            }
            TrialBalanceLine {
                account_id: account.id,
                code: account.code.clone(),
                name: account.name.clone(),
                account_type: account.account_type,
                balance: account.balance,
            }
        })
        .collect();
    lines.sort_by(|a, b| a.code.cmp(&b.code));

    let total_credits = -credit_side;

    TrialBalance {
        accounts: lines,
        total_debits,
        total_credits,
        is_balanced: within_tolerance(total_debits, total_credits),
    }
}
