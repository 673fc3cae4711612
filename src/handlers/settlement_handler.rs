//! Settlement Handler
//!
//! Posts cash receipts and disbursements on behalf of the sales and
//! purchasing workflows. Accounts are discovered by name/code heuristics, and
//! a ledger that cannot take the posting never blocks the caller: failures
//! are logged and the result is `None`.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{Account, AccountType, Amount, DomainError, OperationContext};
use crate::error::AppResult;
use crate::store::LedgerStore;

use super::{
    JournalEntryView, JournalHandler, JournalLineCommand, PostJournalEntryCommand,
    SettlementCommand,
};

/// Which way the money moves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SettlementKind {
    /// Debit cash, credit accounts receivable
    CustomerReceipt,
    /// Debit accounts payable, credit cash
    SupplierPayment,
}

impl SettlementKind {
    fn label(&self) -> &'static str {
        match self {
            SettlementKind::CustomerReceipt => "customer receipt",
            SettlementKind::SupplierPayment => "supplier payment",
        }
    }

    fn counterparty(&self, accounts: &[Account]) -> Option<Uuid> {
        let (account_type, keyword) = match self {
            SettlementKind::CustomerReceipt => (AccountType::Asset, "receivable"),
            SettlementKind::SupplierPayment => (AccountType::Liability, "payable"),
        };
        accounts
            .iter()
            .find(|a| a.account_type == account_type && a.matches_keyword(keyword))
            .map(|a| a.id)
    }
}

/// First cash-like account by code
fn find_cash_account(accounts: &[Account]) -> Option<Uuid> {
    accounts.iter().find(|a| a.is_cash_like()).map(|a| a.id)
}

/// Handler for settlement postings from sibling workflows
#[derive(Clone)]
pub struct SettlementHandler {
    store: Arc<dyn LedgerStore>,
    journal: JournalHandler,
}

impl SettlementHandler {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            journal: JournalHandler::new(store.clone()),
            store,
        }
    }

    /// Record cash received from a customer against accounts receivable
    pub async fn record_customer_receipt(
        &self,
        command: SettlementCommand,
        context: &OperationContext,
    ) -> AppResult<Option<JournalEntryView>> {
        self.record(SettlementKind::CustomerReceipt, command, context)
            .await
    }

    /// Record cash paid to a supplier against accounts payable
    pub async fn record_supplier_payment(
        &self,
        command: SettlementCommand,
        context: &OperationContext,
    ) -> AppResult<Option<JournalEntryView>> {
        self.record(SettlementKind::SupplierPayment, command, context)
            .await
    }

    async fn record(
        &self,
        kind: SettlementKind,
        command: SettlementCommand,
        context: &OperationContext,
    ) -> AppResult<Option<JournalEntryView>> {
        // A bad amount is the caller's mistake, not a ledger setup problem
        let amount = Amount::new(command.amount)
            .map_err(|e| DomainError::validation(format!("invalid settlement amount: {}", e)))?;

        let accounts = match self.store.list_accounts().await {
            Ok(accounts) => accounts,
            Err(e) => {
                tracing::warn!(error = %e, kind = kind.label(), "Settlement skipped: accounts unavailable");
                return Ok(None);
            }
        };

        let (Some(cash), Some(counterparty)) =
            (find_cash_account(&accounts), kind.counterparty(&accounts))
        else {
            tracing::warn!(
                kind = kind.label(),
                reference = ?command.reference,
                "Settlement skipped: cash or counterparty account not configured"
            );
            return Ok(None);
        };

        let value = amount.value();
        let lines = match kind {
            SettlementKind::CustomerReceipt => vec![
                JournalLineCommand::debit(cash, value),
                JournalLineCommand::credit(counterparty, value),
            ],
            SettlementKind::SupplierPayment => vec![
                JournalLineCommand::debit(counterparty, value),
                JournalLineCommand::credit(cash, value),
            ],
        };

        let mut post = PostJournalEntryCommand::new(command.date, lines);
        post.reference = command.reference;
        post.description = command
            .description
            .or_else(|| Some(capitalize(kind.label())));

        match self.journal.create_journal_entry(post, context).await {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    kind = kind.label(),
                    correlation_id = ?context.correlation_id,
                    "Settlement posting failed"
                );
                Ok(None)
            }
        }
    }
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
