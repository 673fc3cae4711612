//! Report Service
//!
//! Loads the ledger state a report needs and hands it to the pure builders.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::{DateRange, DomainError};
use crate::error::AppResult;
use crate::store::{EntryFilter, LedgerStore};

use super::{
    build_balance_sheet, build_cash_flow, build_income_statement, build_reconciliation,
    build_trial_balance, BalanceSheet, CashFlowStatement, IncomeStatement, ReconciliationResult,
    TrialBalance,
};

/// Reporting period as requested by a caller: explicit dates or a fiscal year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ReportPeriod {
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub fiscal_year: Option<i32>,
}

impl ReportPeriod {
    pub fn fiscal_year(year: i32) -> Self {
        Self {
            fiscal_year: Some(year),
            ..Self::default()
        }
    }

    pub fn between(start_date: Option<NaiveDate>, end_date: Option<NaiveDate>) -> Self {
        Self {
            start_date,
            end_date,
            fiscal_year: None,
        }
    }

    /// Explicit dates take precedence over the fiscal year.
    pub fn resolve(&self) -> Result<DateRange, DomainError> {
        DateRange::resolve(self.start_date, self.end_date, self.fiscal_year)
    }
}

/// Read-only report engine over a ledger store
#[derive(Clone)]
pub struct ReportService {
    store: Arc<dyn LedgerStore>,
}

impl ReportService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn trial_balance(&self) -> AppResult<TrialBalance> {
        let accounts = self.store.list_accounts().await?;
        Ok(build_trial_balance(&accounts))
    }

    /// Balance sheet as of `as_of` (defaults to the period end, then today).
    pub async fn balance_sheet(
        &self,
        as_of: Option<NaiveDate>,
        period: ReportPeriod,
    ) -> AppResult<BalanceSheet> {
        let range = period.resolve()?;
        let accounts = self.store.list_accounts().await?;

        let activity = if range.is_bounded() {
            let filter = EntryFilter::new().between(range.start, range.end).ascending();
            Some(self.store.list_entries(&filter).await?)
        } else {
            None
        };

        let as_of = as_of
            .or(range.end)
            .unwrap_or_else(|| Utc::now().date_naive());

        Ok(build_balance_sheet(
            &accounts,
            activity.as_deref(),
            as_of,
            range.start,
            range.end,
        ))
    }

    pub async fn income_statement(&self, period: ReportPeriod) -> AppResult<IncomeStatement> {
        let range = period.resolve()?;
        let accounts = self.store.list_accounts().await?;
        let filter = EntryFilter::new().between(range.start, range.end).ascending();
        let entries = self.store.list_entries(&filter).await?;

        Ok(build_income_statement(&accounts, &entries, range))
    }

    pub async fn cash_flow(&self, period: ReportPeriod) -> AppResult<CashFlowStatement> {
        let range = period.resolve()?;
        let accounts = self.store.list_accounts().await?;
        // History before the start is needed for the beginning balance
        let filter = EntryFilter::new().between(None, range.end).ascending();
        let entries = self.store.list_entries(&filter).await?;

        Ok(build_cash_flow(&accounts, &entries, range))
    }

    pub async fn reconciliation(
        &self,
        account_id: Uuid,
        statement_balance: Decimal,
        statement_date: NaiveDate,
    ) -> AppResult<ReconciliationResult> {
        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or(DomainError::AccountNotFound(account_id))?;

        let filter = EntryFilter::new()
            .for_account(account_id)
            .between(None, Some(statement_date))
            .ascending();
        let entries = self.store.list_entries(&filter).await?;

        Ok(build_reconciliation(
            &account,
            &entries,
            statement_balance,
            statement_date,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_period_resolution() {
        let range = ReportPeriod::fiscal_year(2023).resolve().unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2023, 1, 1));
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2023, 12, 31));

        let explicit = ReportPeriod {
            start_date: NaiveDate::from_ymd_opt(2023, 3, 1),
            end_date: None,
            fiscal_year: Some(2023),
        };
        let range = explicit.resolve().unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2023, 3, 1));
        assert_eq!(range.end, None);

        assert_eq!(ReportPeriod::default().resolve().unwrap(), DateRange::all());
    }

    #[test]
    fn test_report_period_rejects_inverted_range() {
        let period = ReportPeriod::between(
            NaiveDate::from_ymd_opt(2024, 2, 1),
            NaiveDate::from_ymd_opt(2024, 1, 1),
        );
        assert!(period.resolve().unwrap_err().is_validation_error());
    }

    #[test]
    fn test_report_period_from_query_json() {
        let period: ReportPeriod = serde_json::from_str(r#"{"fiscal_year": 2024}"#).unwrap();
        assert_eq!(period, ReportPeriod::fiscal_year(2024));
    }
}
