//! Report Engine
//!
//! Read-only financial statements derived from account balances and journal
//! history. The builders are pure functions; `ReportService` feeds them from a
//! ledger store.

mod balance_sheet;
mod cash_flow;
mod income_statement;
mod reconciliation;
mod service;
mod trial_balance;

pub use balance_sheet::{build_balance_sheet, BalanceSheet, BalanceSheetItem};
pub use cash_flow::{build_cash_flow, CashFlowActivity, CashFlowItem, CashFlowStatement};
pub use income_statement::{build_income_statement, IncomeStatement, IncomeStatementItem};
pub use reconciliation::{build_reconciliation, ReconciliationLine, ReconciliationResult};
pub use service::{ReportPeriod, ReportService};
pub use trial_balance::{build_trial_balance, TrialBalance, TrialBalanceLine};
