//! Account Handler
//!
//! Chart of accounts maintenance: create, update, delete and tree assembly.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{
    build_account_tree, Account, AccountNode, AccountType, DomainError, OperationContext,
};
use crate::error::AppResult;
use crate::store::LedgerStore;

use super::commands::non_blank;
use super::{CreateAccountCommand, UpdateAccountCommand};

/// Handler for the account registry
#[derive(Clone)]
pub struct AccountHandler {
    store: Arc<dyn LedgerStore>,
}

impl AccountHandler {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Open a new account with a zero balance
    pub async fn create_account(
        &self,
        command: CreateAccountCommand,
        context: &OperationContext,
    ) -> AppResult<Account> {
        let (code, name, account_type) = command.validate()?;

        let account = Account::open(
            code,
            name,
            account_type,
            command.parent_id,
            non_blank(command.description),
        );
        let account = self.store.insert_account(account).await?;

        tracing::info!(
            account_id = %account.id,
            code = %account.code,
            account_type = %account.account_type,
            correlation_id = ?context.correlation_id,
            "Account created"
        );

        Ok(account)
    }

    /// Patch an account in place. The balance is never touched here.
    pub async fn update_account(
        &self,
        account_id: Uuid,
        command: UpdateAccountCommand,
        context: &OperationContext,
    ) -> AppResult<Account> {
        let mut account = self.get_account_by_id(account_id).await?;

        if let Some(code) = command.code {
            account.code = non_blank(Some(code))
                .ok_or_else(|| DomainError::validation("code is required"))?;
        }
        if let Some(name) = command.name {
            account.name = non_blank(Some(name))
                .ok_or_else(|| DomainError::validation("name is required"))?;
        }
        if let Some(account_type) = command.account_type {
            let account_type: AccountType = account_type.parse()?;
            if account_type != account.account_type {
                return Err(DomainError::AccountTypeImmutable.into());
            }
        }
        // Parent existence and loops are checked by the store under its lock
        if let Some(parent_id) = command.parent_id {
            account.parent_id = parent_id;
        }
        if let Some(description) = command.description {
            account.description = non_blank(Some(description));
        }

        let account = self.store.save_account(account).await?;

        tracing::info!(
            account_id = %account.id,
            code = %account.code,
            correlation_id = ?context.correlation_id,
            "Account updated"
        );

        Ok(account)
    }

    /// Delete a leaf account that no journal line references
    pub async fn delete_account(
        &self,
        account_id: Uuid,
        context: &OperationContext,
    ) -> AppResult<()> {
        self.store.delete_account(account_id).await?;

        tracing::info!(
            account_id = %account_id,
            correlation_id = ?context.correlation_id,
            "Account deleted"
        );

        Ok(())
    }

    /// Whole chart of accounts as a forest, siblings ordered by code
    pub async fn get_accounts_tree(&self) -> AppResult<Vec<AccountNode>> {
        let accounts = self.store.list_accounts().await?;
        Ok(build_account_tree(accounts))
    }

    pub async fn get_account_by_id(&self, account_id: Uuid) -> AppResult<Account> {
        self.store
            .get_account(account_id)
            .await?
            .ok_or_else(|| DomainError::AccountNotFound(account_id).into())
    }

    /// All accounts ordered by code
    pub async fn list_accounts(&self) -> AppResult<Vec<Account>> {
        Ok(self.store.list_accounts().await?)
    }

    /// Accounts with current balances, as consumed by trial balance builders
    pub async fn get_trial_balance_base_data(&self) -> AppResult<Vec<Account>> {
        self.list_accounts().await
    }
}
