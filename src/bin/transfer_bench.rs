//! Transfer load generator
//!
//! Run with: cargo run --bin transfer_bench --release -- --users 20 --transfers 5000 --concurrency 32
//!
//! Uses the in-memory store unless `--postgres` is given (then `DATABASE_URL`
//! must point at a migrated database). Prints throughput and checks that the
//! total balance across all accounts is unchanged.

use std::sync::Arc;
use std::time::Instant;

use rand::Rng;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use tokio::task::JoinSet;

use account_ledger::db;
use account_ledger::domain::{AccountNumber, OperationContext};
use account_ledger::handlers::{RegisterUserCommand, TransferCommand, TransferHandler, UserHandler};
use account_ledger::ledger_store::{LedgerStore, MemoryLedgerStore, PgLedgerStore};

fn arg<T: std::str::FromStr>(args: &[String], name: &str, default: T) -> T {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let user_count: usize = arg(&args, "--users", 20).max(2);
    let transfer_count: usize = arg(&args, "--transfers", 5000);
    let concurrency: usize = arg(&args, "--concurrency", 32).max(1);
    let use_postgres = args.iter().any(|a| a == "--postgres");

    let store: Arc<dyn LedgerStore> = if use_postgres {
        let database_url = std::env::var("DATABASE_URL")?;
        println!("Connecting to database...");
        let pool = PgPoolOptions::new()
            .max_connections(concurrency.min(50) as u32)
            .connect(&database_url)
            .await?;
        db::run_migrations(&pool).await?;
        Arc::new(PgLedgerStore::new(pool))
    } else {
        Arc::new(MemoryLedgerStore::new())
    };

    println!("Transfer Bench - {user_count} users, {transfer_count} transfers, concurrency {concurrency}");

    let users = UserHandler::new(store.clone());
    let run_id = uuid::Uuid::new_v4().simple().to_string();
    let mut owners: Vec<(uuid::Uuid, AccountNumber)> = Vec::with_capacity(user_count);
    for i in 0..user_count {
        let result = users
            .register(RegisterUserCommand::new(
                format!("Bench User {i}"),
                format!("bench-{run_id}-{i}@example.com"),
                "bench-password-1",
            ))
            .await?;
        owners.push((result.user_id, result.account_number));
    }
    let owners = Arc::new(owners);

    let total_before = total_balance(store.as_ref(), &owners).await?;

    let engine = TransferHandler::new(store.clone());
    let start = Instant::now();
    let mut tasks = JoinSet::new();
    let per_task = transfer_count.div_ceil(concurrency);

    for worker in 0..concurrency {
        let engine = engine.clone();
        let owners = owners.clone();
        let quota = per_task.min(transfer_count.saturating_sub(worker * per_task));
        tasks.spawn(async move {
            let mut committed = 0usize;
            let mut rejected = 0usize;
            for _ in 0..quota {
                let (from, to, amount) = {
                    let mut rng = rand::thread_rng();
                    let from = rng.gen_range(0..owners.len());
                    let mut to = rng.gen_range(0..owners.len() - 1);
                    if to >= from {
                        to += 1;
                    }
                    (from, to, rng.gen_range(1..=500u32))
                };
                let (owner, from_number) = &owners[from];
                let command = TransferCommand::new(
                    from_number.as_str(),
                    owners[to].1.as_str(),
                    amount.to_string(),
                    *owner,
                );
                match engine.execute(command, &OperationContext::new()).await {
                    Ok(_) => committed += 1,
                    Err(_) => rejected += 1,
                }
            }
            (committed, rejected)
        });
    }

    let (mut committed, mut rejected) = (0usize, 0usize);
    while let Some(result) = tasks.join_next().await {
        let (ok, failed) = result?;
        committed += ok;
        rejected += failed;
    }

    let elapsed = start.elapsed();
    let total_after = total_balance(store.as_ref(), &owners).await?;

    println!("\n=== Transfer Bench Results ===");
    println!("Attempted: {}", committed + rejected);
    println!("Committed: {committed}");
    println!("Rejected: {rejected}");
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Rate: {:.0} transfers/sec", (committed + rejected) as f64 / elapsed.as_secs_f64());
    println!("Total balance before: {total_before}, after: {total_after}");

    if total_before != total_after {
        anyhow::bail!("total balance changed during the run");
    }

    Ok(())
}

async fn total_balance(
    store: &dyn LedgerStore,
    owners: &[(uuid::Uuid, AccountNumber)],
) -> anyhow::Result<Decimal> {
    let mut total = Decimal::ZERO;
    for (_, number) in owners {
        if let Some(account) = store.find_account(number).await? {
            total += account.balance;
        }
    }
    Ok(total)
}
