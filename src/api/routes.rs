//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Account, AccountNode, DomainError, OperationContext};
use crate::error::AppError;
use crate::handlers::{
    deserialize_some, AccountHandler, AccountLedger, CreateAccountCommand, JournalEntryView,
    JournalHandler, JournalLineCommand, PostJournalEntryCommand, ReviseJournalEntryCommand,
    SettlementCommand, SettlementHandler, UpdateAccountCommand,
};
use crate::reports::{
    BalanceSheet, CashFlowStatement, IncomeStatement, ReconciliationResult, ReportPeriod,
    ReportService, TrialBalance,
};

use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::SharedStore;

/// Fewest lines a journal entry may carry
const MIN_JOURNAL_LINES: usize = 2;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct CreateJournalEntryRequest {
    #[serde(default)]
    pub code: Option<String>,
    pub date: NaiveDate,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub lines: Vec<JournalLineCommand>,
}

impl CreateJournalEntryRequest {
    fn into_command(self) -> Result<PostJournalEntryCommand, AppError> {
        check_line_count(&self.lines)?;
        Ok(PostJournalEntryCommand {
            code: self.code,
            date: self.date,
            reference: self.reference,
            description: self.description,
            lines: self.lines,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateJournalEntryRequest {
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

impl UpdateJournalEntryRequest {
    fn into_command(self) -> Result<ReviseJournalEntryCommand, AppError> {
        if let Some(lines) = &self.lines {
            check_line_count(lines)?;
        }
        Ok(ReviseJournalEntryCommand {
            code: self.code,
            date: self.date,
            reference: self.reference,
            description: self.description,
            lines: self.lines,
        })
    }
}

fn check_line_count(lines: &[JournalLineCommand]) -> Result<(), AppError> {
    if lines.len() < MIN_JOURNAL_LINES {
        return Err(DomainError::validation(format!(
            "journal entry needs at least {} lines",
            MIN_JOURNAL_LINES
        ))
        .into());
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
pub struct JournalEntriesQuery {
    #[serde(default)]
    pub account_id: Option<Uuid>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LedgerQuery {
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BalanceSheetQuery {
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub fiscal_year: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ReconciliationRequest {
    pub account_id: Uuid,
    pub statement_balance: Decimal,
    pub statement_date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct SettlementResponse {
    /// False when the ledger could not take the posting
    pub posted: bool,
    pub entry: Option<JournalEntryView>,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<SharedStore> {
    Router::new()
        // Account registry
        .route("/accounts", post(create_account).get(list_accounts))
        .route("/accounts/tree", get(get_accounts_tree))
        .route(
            "/accounts/:account_id",
            get(get_account).patch(update_account).delete(delete_account),
        )
        .route("/accounts/:account_id/ledger", get(get_account_ledger))
        // Journal
        .route(
            "/journal-entries",
            post(create_journal_entry).get(list_journal_entries),
        )
        .route(
            "/journal-entries/:entry_id",
            get(get_journal_entry)
                .patch(update_journal_entry)
                .delete(delete_journal_entry),
        )
        // Reports
        .route("/reports/trial-balance", get(trial_balance))
        .route("/reports/balance-sheet", get(balance_sheet))
        .route("/reports/income-statement", get(income_statement))
        .route("/reports/cash-flow", get(cash_flow))
        .route("/reports/reconciliation", post(reconciliation))
        // Settlements
        .route("/settlements/customer-receipts", post(customer_receipt))
        .route("/settlements/supplier-payments", post(supplier_payment))
}

// =========================================================================
// Accounts
// =========================================================================

/// Open a new account
async fn create_account(
    State(store): State<SharedStore>,
    Extension(context): Extension<OperationContext>,
    ApiJson(command): ApiJson<CreateAccountCommand>,
) -> Result<(StatusCode, Json<Account>), AppError> {
    let account = AccountHandler::new(store)
        .create_account(command, &context)
        .await?;
    Ok((StatusCode::CREATED, Json(account)))
}

async fn list_accounts(State(store): State<SharedStore>) -> Result<Json<Vec<Account>>, AppError> {
    let accounts = AccountHandler::new(store).list_accounts().await?;
    Ok(Json(accounts))
}

async fn get_accounts_tree(
    State(store): State<SharedStore>,
) -> Result<Json<Vec<AccountNode>>, AppError> {
    let tree = AccountHandler::new(store).get_accounts_tree().await?;
    Ok(Json(tree))
}

async fn get_account(
    State(store): State<SharedStore>,
    ApiPath(account_id): ApiPath<Uuid>,
) -> Result<Json<Account>, AppError> {
    let account = AccountHandler::new(store)
        .get_account_by_id(account_id)
        .await?;
    Ok(Json(account))
}

async fn update_account(
    State(store): State<SharedStore>,
    Extension(context): Extension<OperationContext>,
    ApiPath(account_id): ApiPath<Uuid>,
    ApiJson(command): ApiJson<UpdateAccountCommand>,
) -> Result<Json<Account>, AppError> {
    let account = AccountHandler::new(store)
        .update_account(account_id, command, &context)
        .await?;
    Ok(Json(account))
}

async fn delete_account(
    State(store): State<SharedStore>,
    Extension(context): Extension<OperationContext>,
    ApiPath(account_id): ApiPath<Uuid>,
) -> Result<StatusCode, AppError> {
    AccountHandler::new(store)
        .delete_account(account_id, &context)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Account movements with a running balance
async fn get_account_ledger(
    State(store): State<SharedStore>,
    ApiPath(account_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<LedgerQuery>,
) -> Result<Json<AccountLedger>, AppError> {
    let ledger = JournalHandler::new(store)
        .get_account_ledger(account_id, query.start_date, query.end_date)
        .await?;
    Ok(Json(ledger))
}

// =========================================================================
// Journal entries
// =========================================================================

/// Post a balanced journal entry
async fn create_journal_entry(
    State(store): State<SharedStore>,
    Extension(context): Extension<OperationContext>,
    ApiJson(request): ApiJson<CreateJournalEntryRequest>,
) -> Result<(StatusCode, Json<JournalEntryView>), AppError> {
    let command = request.into_command()?;
    let entry = JournalHandler::new(store)
        .create_journal_entry(command, &context)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// List entries, newest first
async fn list_journal_entries(
    State(store): State<SharedStore>,
    ApiQuery(query): ApiQuery<JournalEntriesQuery>,
) -> Result<Json<Vec<JournalEntryView>>, AppError> {
    let entries = JournalHandler::new(store)
        .get_journal_entries(query.account_id, query.start_date, query.end_date)
        .await?;
    Ok(Json(entries))
}

async fn get_journal_entry(
    State(store): State<SharedStore>,
    ApiPath(entry_id): ApiPath<Uuid>,
) -> Result<Json<JournalEntryView>, AppError> {
    let entry = JournalHandler::new(store).get_journal_entry(entry_id).await?;
    Ok(Json(entry))
}

async fn update_journal_entry(
    State(store): State<SharedStore>,
    Extension(context): Extension<OperationContext>,
    ApiPath(entry_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateJournalEntryRequest>,
) -> Result<Json<JournalEntryView>, AppError> {
    let command = request.into_command()?;
    let entry = JournalHandler::new(store)
        .update_journal_entry(entry_id, command, &context)
        .await?;
    Ok(Json(entry))
}

async fn delete_journal_entry(
    State(store): State<SharedStore>,
    Extension(context): Extension<OperationContext>,
    ApiPath(entry_id): ApiPath<Uuid>,
) -> Result<StatusCode, AppError> {
    JournalHandler::new(store)
        .delete_journal_entry(entry_id, &context)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// Reports
// =========================================================================

async fn trial_balance(State(store): State<SharedStore>) -> Result<Json<TrialBalance>, AppError> {
    let report = ReportService::new(store).trial_balance().await?;
    Ok(Json(report))
}

async fn balance_sheet(
    State(store): State<SharedStore>,
    ApiQuery(query): ApiQuery<BalanceSheetQuery>,
) -> Result<Json<BalanceSheet>, AppError> {
    let period = ReportPeriod {
        start_date: query.start_date,
        end_date: query.end_date,
        fiscal_year: query.fiscal_year,
    };
    let report = ReportService::new(store)
        .balance_sheet(query.as_of, period)
        .await?;
    Ok(Json(report))
}

async fn income_statement(
    State(store): State<SharedStore>,
    ApiQuery(period): ApiQuery<ReportPeriod>,
) -> Result<Json<IncomeStatement>, AppError> {
    let report = ReportService::new(store).income_statement(period).await?;
    Ok(Json(report))
}

async fn cash_flow(
    State(store): State<SharedStore>,
    ApiQuery(period): ApiQuery<ReportPeriod>,
) -> Result<Json<CashFlowStatement>, AppError> {
    let report = ReportService::new(store).cash_flow(period).await?;
    Ok(Json(report))
}

/// Compare an account's book balance with an external statement
async fn reconciliation(
    State(store): State<SharedStore>,
    ApiJson(request): ApiJson<ReconciliationRequest>,
) -> Result<Json<ReconciliationResult>, AppError> {
    let report = ReportService::new(store)
        .reconciliation(
            request.account_id,
            request.statement_balance,
            request.statement_date,
        )
        .await?;
    Ok(Json(report))
}

// =========================================================================
// Settlements
// =========================================================================

async fn customer_receipt(
    State(store): State<SharedStore>,
    Extension(context): Extension<OperationContext>,
    ApiJson(command): ApiJson<SettlementCommand>,
) -> Result<Json<SettlementResponse>, AppError> {
    let entry = SettlementHandler::new(store)
        .record_customer_receipt(command, &context)
        .await?;
    Ok(Json(SettlementResponse {
        posted: entry.is_some(),
        entry,
    }))
}

async fn supplier_payment(
    State(store): State<SharedStore>,
    Extension(context): Extension<OperationContext>,
    ApiJson(command): ApiJson<SettlementCommand>,
) -> Result<Json<SettlementResponse>, AppError> {
    let entry = SettlementHandler::new(store)
        .record_supplier_payment(command, &context)
        .await?;
    Ok(Json(SettlementResponse {
        posted: entry.is_some(),
        entry,
    }))
}
