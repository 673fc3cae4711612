//! Load Testing Tool
//!
//! Posts journal entries concurrently against a handful of shared accounts,
//! then checks that the trial balance still balances.
//!
//! Run with: cargo run --bin load_test --release -- --entries 1000 --workers 16

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use tokio::task::JoinSet;
use uuid::Uuid;

use erp_ledger::domain::{Account, AccountType, Amount, JournalDraft, JournalEntry, LineDraft};
use erp_ledger::reports::build_trial_balance;
use erp_ledger::{db, LedgerStore, PgLedgerStore};

fn arg<T: std::str::FromStr>(args: &[String], flag: &str, default: T) -> T {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let entry_count: u64 = arg(&args, "--entries", 1000);
    let workers: u64 = arg(&args, "--workers", 16).max(1);

    let database_url = std::env::var("DATABASE_URL")?;

    println!("Load Test - Posting {} entries with {} workers", entry_count, workers);
    println!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(workers as u32 + 2)
        .connect(&database_url)
        .await?;
    if !db::check_schema(&pool).await? {
        db::run_migrations(&pool).await?;
    }

    let store = Arc::new(PgLedgerStore::new(pool.clone()).with_max_retries(10));

    // Unique codes so repeated runs do not collide
    let run = Uuid::new_v4().simple().to_string();
    let mut accounts = Vec::new();
    for (suffix, account_type) in [
        ("CASH", AccountType::Asset),
        ("AR", AccountType::Asset),
        ("SALES", AccountType::Revenue),
        ("RENT", AccountType::Expense),
    ] {
        let account = Account::open(
            format!("LT-{}-{}", &run[..8], suffix),
            format!("Load test {}", suffix.to_lowercase()),
            account_type,
            None,
            None,
        );
        accounts.push(store.insert_account(account).await?);
    }
    let ids: Arc<Vec<Uuid>> = Arc::new(accounts.iter().map(|a| a.id).collect());

    let start = Instant::now();
    let mut tasks = JoinSet::new();

    for worker in 0..workers {
        let store = store.clone();
        let ids = ids.clone();
        let share = entry_count / workers + u64::from(worker < entry_count % workers);

        tasks.spawn(async move {
            let mut posted = 0u64;
            for i in 0..share {
                let n = (worker + i) as usize;
                let debit = ids[n % ids.len()];
                let credit = ids[(n + 1) % ids.len()];
                let amount = Amount::new(Decimal::new(((n % 97) + 1) as i64 * 25, 2))?;

                let entry = JournalEntry::from_draft(JournalDraft {
                    code: None,
                    date: Utc::now().date_naive(),
                    reference: Some(format!("load-test-{}-{}", worker, i)),
                    description: None,
                    lines: vec![LineDraft::debit(debit, amount), LineDraft::credit(credit, amount)],
                });

                match store.post_entry(entry).await {
                    Ok(_) => posted += 1,
                    Err(e) => eprintln!("worker {}: posting failed: {}", worker, e),
                }
            }
            anyhow::Ok(posted)
        });
    }

    let mut success_count = 0u64;
    while let Some(joined) = tasks.join_next().await {
        success_count += joined??;
    }

    let elapsed = start.elapsed();
    let rate = success_count as f64 / elapsed.as_secs_f64();

    let mut ledger_accounts = Vec::new();
    for id in ids.iter() {
        if let Some(account) = store.get_account(*id).await? {
            ledger_accounts.push(account);
        }
    }
    let trial_balance = build_trial_balance(&ledger_accounts);

    println!("\n=== Load Test Results ===");
    println!("Total entries: {}", entry_count);
    println!("Successful: {}", success_count);
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Rate: {:.0} entries/sec", rate);
    println!(
        "Trial balance: debits {} / credits {} ({})",
        trial_balance.total_debits,
        trial_balance.total_credits,
        if trial_balance.is_balanced { "balanced" } else { "NOT BALANCED" }
    );

    pool.close().await;

    if !trial_balance.is_balanced {
        anyhow::bail!("trial balance does not balance after concurrent posting");
    }
    Ok(())
}
