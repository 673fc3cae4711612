//! PostgreSQL ledger store
//!
//! Each posting, revision and removal runs in one transaction. Account rows
//! touched by the change are locked with `SELECT ... FOR UPDATE` in id order
//! before anything is written, which serializes concurrent balance updates on
//! the same account while postings to disjoint accounts proceed in parallel.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{
    balance_deltas, ensure_acyclic_parent, reversal_deltas, revision_deltas, Account, Amount,
    DomainError, EntryRevision, JournalEntry, JournalEntryLine,
};

use super::{EntryFilter, LedgerStore, SortOrder, StoreError, StoreResult};

/// Default number of attempts for a ledger transaction
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Transaction-scoped advisory lock key guarding parent reassignment
const ACCOUNT_TREE_LOCK: i64 = 0x4c45_4447_4552;

/// SQLSTATE unique_violation
const UNIQUE_VIOLATION: &str = "23505";

/// SQLSTATE foreign_key_violation
const FOREIGN_KEY_VIOLATION: &str = "23503";

const ACCOUNT_COLUMNS: &str =
    "id, code, name, account_type, balance, parent_id, description, created_at, updated_at";

const ENTRY_COLUMNS: &str =
    "id, code, entry_date, reference, description, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    code: String,
    name: String,
    account_type: String,
    balance: Decimal,
    parent_id: Option<Uuid>,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = StoreError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let account_type = row.account_type.parse().map_err(|_| {
            StoreError::Corrupt(format!(
                "account {} has unknown type '{}'",
                row.id, row.account_type
            ))
        })?;

        Ok(Account {
            id: row.id,
            code: row.code,
            name: row.name,
            account_type,
            balance: row.balance,
            parent_id: row.parent_id,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EntryRow {
    id: Uuid,
    code: Option<String>,
    entry_date: NaiveDate,
    reference: Option<String>,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EntryRow {
    fn into_entry(self, lines: Vec<JournalEntryLine>) -> JournalEntry {
        JournalEntry {
            id: self.id,
            code: self.code,
            date: self.entry_date,
            reference: self.reference,
            description: self.description,
            lines,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LineRow {
    id: Uuid,
    entry_id: Uuid,
    account_id: Uuid,
    amount: Decimal,
    line_type: String,
    description: Option<String>,
}

impl TryFrom<LineRow> for JournalEntryLine {
    type Error = StoreError;

    fn try_from(row: LineRow) -> Result<Self, Self::Error> {
        let amount = Amount::new(row.amount)
            .map_err(|e| StoreError::Corrupt(format!("line {}: {}", row.id, e)))?;
        let line_type = row
            .line_type
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("line {}: {}", row.id, e)))?;

        Ok(JournalEntryLine {
            id: row.id,
            account_id: row.account_id,
            amount,
            line_type,
            description: row.description,
        })
    }
}

/// Translate unique-code violations into ledger errors. `code` is the value
/// that was being written.
fn map_unique_code(err: sqlx::Error, code: Option<&str>) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            let code = code.unwrap_or_default().to_string();
            match db.constraint() {
                Some("accounts_code_key") => {
                    return DomainError::DuplicateAccountCode(code).into();
                }
                Some("journal_entries_code_key") => {
                    return DomainError::DuplicateEntryCode(code).into();
                }
                _ => {}
            }
        }
    }
    StoreError::Database(err)
}

/// Ledger store backed by PostgreSQL
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
    max_retries: u32,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Bound the number of attempts per transaction (at least one).
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // =========================================================================
    // Transaction retry
    // =========================================================================

    /// Run a whole transaction again on serialization failures and deadlocks.
    ///
    /// Only complete attempts are retried; a failed attempt has rolled back
    /// before the next one starts.
    async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut attempt_fn: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        for attempt in 0..self.max_retries {
            match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < self.max_retries => {
                    tracing::warn!(
                        operation,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        error = %e,
                        "Transient ledger conflict, retrying"
                    );
                    let delay = Duration::from_millis(50 * (attempt as u64 + 1));
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_retryable() => {
                    tracing::error!(operation, error = %e, "Ledger transaction retries exhausted");
                    return Err(StoreError::MaxRetriesExceeded);
                }
                Err(e) => return Err(e),
            }
        }

        Err(StoreError::MaxRetriesExceeded)
    }

    // =========================================================================
    // Locking and balance updates
    // =========================================================================

    /// Lock the given account rows in id order and return the ids that exist.
    async fn lock_accounts(
        tx: &mut Transaction<'_, Postgres>,
        account_ids: Vec<Uuid>,
    ) -> StoreResult<HashSet<Uuid>> {
        if account_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let locked: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM accounts
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(account_ids)
        .fetch_all(&mut **tx)
        .await?;

        Ok(locked.into_iter().collect())
    }

    /// Lock every account in `deltas` and verify the lines only reference
    /// existing accounts. Runs before any write of the transaction.
    async fn lock_and_verify(
        tx: &mut Transaction<'_, Postgres>,
        deltas: &BTreeMap<Uuid, Decimal>,
        lines: &[JournalEntryLine],
    ) -> StoreResult<()> {
        let locked = Self::lock_accounts(tx, deltas.keys().copied().collect()).await?;
        if let Some(line) = lines.iter().find(|l| !locked.contains(&l.account_id)) {
            return Err(DomainError::AccountNotFound(line.account_id).into());
        }
        Ok(())
    }

    async fn apply_deltas(
        tx: &mut Transaction<'_, Postgres>,
        deltas: &BTreeMap<Uuid, Decimal>,
    ) -> StoreResult<()> {
        for (account_id, delta) in deltas {
            if delta.is_zero() {
                continue;
            }
            sqlx::query(
                r#"
                UPDATE accounts
                SET balance = balance + $2, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(account_id)
            .bind(delta)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    // =========================================================================
    // Entry persistence helpers
    // =========================================================================

    async fn insert_lines(
        tx: &mut Transaction<'_, Postgres>,
        entry_id: Uuid,
        lines: &[JournalEntryLine],
    ) -> StoreResult<()> {
        for (line_no, line) in lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO journal_entry_lines
                    (id, entry_id, line_no, account_id, amount, line_type, description)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(line.id)
            .bind(entry_id)
            .bind(line_no as i32)
            .bind(line.account_id)
            .bind(line.amount.value())
            .bind(line.line_type.as_str())
            .bind(&line.description)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn load_lines<'e, E>(
        executor: E,
        entry_ids: Vec<Uuid>,
    ) -> StoreResult<HashMap<Uuid, Vec<JournalEntryLine>>>
    where
        E: PgExecutor<'e>,
    {
        let rows: Vec<LineRow> = sqlx::query_as(
            r#"
            SELECT id, entry_id, account_id, amount, line_type, description
            FROM journal_entry_lines
            WHERE entry_id = ANY($1)
            ORDER BY entry_id, line_no
            "#,
        )
        .bind(entry_ids)
        .fetch_all(executor)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<JournalEntryLine>> = HashMap::new();
        for row in rows {
            let entry_id = row.entry_id;
            grouped
                .entry(entry_id)
                .or_default()
                .push(JournalEntryLine::try_from(row)?);
        }
        Ok(grouped)
    }

    /// Load and lock an entry with its lines.
    async fn lock_entry(
        tx: &mut Transaction<'_, Postgres>,
        entry_id: Uuid,
    ) -> StoreResult<JournalEntry> {
        let sql = format!(
            "SELECT {} FROM journal_entries WHERE id = $1 FOR UPDATE",
            ENTRY_COLUMNS
        );
        let row: EntryRow = sqlx::query_as(&sql)
            .bind(entry_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(DomainError::JournalEntryNotFound(entry_id))?;

        let mut lines = Self::load_lines(&mut **tx, vec![entry_id]).await?;
        Ok(row.into_entry(lines.remove(&entry_id).unwrap_or_default()))
    }

    // =========================================================================
    // Single-attempt write transactions
    // =========================================================================

    async fn try_post_entry(&self, entry: &JournalEntry) -> StoreResult<JournalEntry> {
        let mut tx = self.pool.begin().await?;

        let deltas = balance_deltas(&entry.lines);
        Self::lock_and_verify(&mut tx, &deltas, &entry.lines).await?;

        sqlx::query(
            r#"
            INSERT INTO journal_entries
                (id, code, entry_date, reference, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.code)
        .bind(entry.date)
        .bind(&entry.reference)
        .bind(&entry.description)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique_code(e, entry.code.as_deref()))?;

        Self::insert_lines(&mut tx, entry.id, &entry.lines).await?;
        Self::apply_deltas(&mut tx, &deltas).await?;

        tx.commit().await?;
        Ok(entry.clone())
    }

    async fn try_revise_entry(
        &self,
        entry_id: Uuid,
        revision: EntryRevision,
    ) -> StoreResult<JournalEntry> {
        let mut tx = self.pool.begin().await?;

        let mut entry = Self::lock_entry(&mut tx, entry_id).await?;
        let replaced = entry.revise(revision);

        // Revert and reapply collapse into one net delta per account
        let deltas = replaced
            .as_ref()
            .map(|old_lines| revision_deltas(old_lines, &entry.lines));
        if let Some(deltas) = &deltas {
            Self::lock_and_verify(&mut tx, deltas, &entry.lines).await?;
        }

        sqlx::query(
            r#"
            UPDATE journal_entries
            SET code = $2, entry_date = $3, reference = $4, description = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(entry.id)
        .bind(&entry.code)
        .bind(entry.date)
        .bind(&entry.reference)
        .bind(&entry.description)
        .bind(entry.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique_code(e, entry.code.as_deref()))?;

        if let Some(deltas) = &deltas {
            sqlx::query("DELETE FROM journal_entry_lines WHERE entry_id = $1")
                .bind(entry_id)
                .execute(&mut *tx)
                .await?;
            Self::insert_lines(&mut tx, entry_id, &entry.lines).await?;
            Self::apply_deltas(&mut tx, deltas).await?;
        }

        tx.commit().await?;
        Ok(entry)
    }

    async fn try_remove_entry(&self, entry_id: Uuid) -> StoreResult<JournalEntry> {
        let mut tx = self.pool.begin().await?;

        let entry = Self::lock_entry(&mut tx, entry_id).await?;
        let deltas = reversal_deltas(&entry.lines);
        Self::lock_accounts(&mut tx, deltas.keys().copied().collect()).await?;

        // Lines go with the entry (ON DELETE CASCADE)
        sqlx::query("DELETE FROM journal_entries WHERE id = $1")
            .bind(entry_id)
            .execute(&mut *tx)
            .await?;
        Self::apply_deltas(&mut tx, &deltas).await?;

        tx.commit().await?;
        Ok(entry)
    }

    async fn try_delete_account(&self, account_id: Uuid) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let locked = Self::lock_accounts(&mut tx, vec![account_id]).await?;
        if !locked.contains(&account_id) {
            return Err(DomainError::AccountNotFound(account_id).into());
        }

        let has_children: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM accounts WHERE parent_id = $1)")
                .bind(account_id)
                .fetch_one(&mut *tx)
                .await?;
        if has_children {
            return Err(DomainError::AccountHasChildren(account_id).into());
        }

        let has_lines: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM journal_entry_lines WHERE account_id = $1)",
        )
        .bind(account_id)
        .fetch_one(&mut *tx)
        .await?;
        if has_lines {
            return Err(DomainError::AccountHasJournalLines(account_id).into());
        }

        sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(account_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                // A child or line inserted after the checks above
                let constraint = match &e {
                    sqlx::Error::Database(db)
                        if db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) =>
                    {
                        Some(db.constraint().unwrap_or_default().to_string())
                    }
                    _ => None,
                };
                match constraint.as_deref() {
                    Some("accounts_parent_id_fkey") => {
                        StoreError::from(DomainError::AccountHasChildren(account_id))
                    }
                    Some(_) => StoreError::from(DomainError::AccountHasJournalLines(account_id)),
                    None => StoreError::Database(e),
                }
            })?;

        tx.commit().await?;
        Ok(())
    }

    async fn try_save_account(&self, account: &Account) -> StoreResult<Account> {
        let mut tx = self.pool.begin().await?;

        if let Some(parent_id) = account.parent_id {
            // Parent moves are serialized; the loop check sees every committed move
            sqlx::query("SELECT pg_advisory_xact_lock($1)")
                .bind(ACCOUNT_TREE_LOCK)
                .execute(&mut *tx)
                .await?;

            let links: Vec<(Uuid, Option<Uuid>)> =
                sqlx::query_as("SELECT id, parent_id FROM accounts")
                    .fetch_all(&mut *tx)
                    .await?;
            let parents: HashMap<Uuid, Option<Uuid>> = links.into_iter().collect();

            if !parents.contains_key(&parent_id) {
                return Err(DomainError::ParentAccountNotFound(parent_id).into());
            }
            ensure_acyclic_parent(account.id, parent_id, |id| {
                parents.get(&id).copied().flatten()
            })?;
        }

        // Balance is owned by the posting path and not written here
        let sql = format!(
            r#"
            UPDATE accounts
            SET code = $2, name = $3, account_type = $4, parent_id = $5,
                description = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        );
        let row: Option<AccountRow> = sqlx::query_as(&sql)
            .bind(account.id)
            .bind(&account.code)
            .bind(&account.name)
            .bind(account.account_type.as_str())
            .bind(account.parent_id)
            .bind(&account.description)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_unique_code(e, Some(&account.code)))?;

        let saved: Account = row
            .ok_or(DomainError::AccountNotFound(account.id))?
            .try_into()?;
        tx.commit().await?;
        Ok(saved)
    }

    async fn ensure_parent_exists(&self, parent_id: Option<Uuid>) -> StoreResult<()> {
        if let Some(parent_id) = parent_id {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM accounts WHERE id = $1)")
                    .bind(parent_id)
                    .fetch_one(&self.pool)
                    .await?;
            if !exists {
                return Err(DomainError::ParentAccountNotFound(parent_id).into());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn insert_account(&self, account: Account) -> StoreResult<Account> {
        self.ensure_parent_exists(account.parent_id).await?;

        let sql = format!(
            r#"
            INSERT INTO accounts
                (id, code, name, account_type, balance, parent_id, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        );
        let row: AccountRow = sqlx::query_as(&sql)
            .bind(account.id)
            .bind(&account.code)
            .bind(&account.name)
            .bind(account.account_type.as_str())
            .bind(account.balance)
            .bind(account.parent_id)
            .bind(&account.description)
            .bind(account.created_at)
            .bind(account.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_code(e, Some(&account.code)))?;

        row.try_into()
    }

    async fn save_account(&self, account: Account) -> StoreResult<Account> {
        let account = &account;
        self.with_retry("save_account", || self.try_save_account(account))
            .await
    }

    async fn delete_account(&self, account_id: Uuid) -> StoreResult<()> {
        self.with_retry("delete_account", || self.try_delete_account(account_id))
            .await
    }

    async fn get_account(&self, account_id: Uuid) -> StoreResult<Option<Account>> {
        let sql = format!("SELECT {} FROM accounts WHERE id = $1", ACCOUNT_COLUMNS);
        let row: Option<AccountRow> = sqlx::query_as(&sql)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Account::try_from).transpose()
    }

    async fn list_accounts(&self) -> StoreResult<Vec<Account>> {
        let sql = format!("SELECT {} FROM accounts ORDER BY code", ACCOUNT_COLUMNS);
        let rows: Vec<AccountRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        rows.into_iter().map(Account::try_from).collect()
    }

    async fn post_entry(&self, entry: JournalEntry) -> StoreResult<JournalEntry> {
        let entry = &entry;
        self.with_retry("post_entry", || self.try_post_entry(entry))
            .await
    }

    async fn revise_entry(
        &self,
        entry_id: Uuid,
        revision: EntryRevision,
    ) -> StoreResult<JournalEntry> {
        let revision = &revision;
        self.with_retry("revise_entry", || {
            self.try_revise_entry(entry_id, revision.clone())
        })
        .await
    }

    async fn remove_entry(&self, entry_id: Uuid) -> StoreResult<JournalEntry> {
        self.with_retry("remove_entry", || self.try_remove_entry(entry_id))
            .await
    }

    async fn get_entry(&self, entry_id: Uuid) -> StoreResult<Option<JournalEntry>> {
        let sql = format!("SELECT {} FROM journal_entries WHERE id = $1", ENTRY_COLUMNS);
        let row: Option<EntryRow> = sqlx::query_as(&sql)
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let mut lines = Self::load_lines(&self.pool, vec![entry_id]).await?;
                Ok(Some(row.into_entry(lines.remove(&entry_id).unwrap_or_default())))
            }
            None => Ok(None),
        }
    }

    async fn list_entries(&self, filter: &EntryFilter) -> StoreResult<Vec<JournalEntry>> {
        let direction = match filter.order {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        };
        let sql = format!(
            r#"
            SELECT {columns}
            FROM journal_entries e
            WHERE ($1::uuid IS NULL OR EXISTS (
                    SELECT 1 FROM journal_entry_lines l
                    WHERE l.entry_id = e.id AND l.account_id = $1))
              AND ($2::date IS NULL OR e.entry_date >= $2)
              AND ($3::date IS NULL OR e.entry_date <= $3)
            ORDER BY e.entry_date {direction}, e.created_at {direction}
            "#,
            columns = ENTRY_COLUMNS,
            direction = direction
        );

        let rows: Vec<EntryRow> = sqlx::query_as(&sql)
            .bind(filter.account_id)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .fetch_all(&self.pool)
            .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids = rows.iter().map(|row| row.id).collect();
        let mut lines = Self::load_lines(&self.pool, ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let entry_lines = lines.remove(&row.id).unwrap_or_default();
                row.into_entry(entry_lines)
            })
            .collect())
    }
}
