//! Concurrent transfer tests
//!
//! Transfers race on the same two accounts from several threads. Some may
//! lose to a conflicting writer, but the ledger total must never change and
//! every committed transaction row must match a balance movement.
//!
//! Run with: cargo test --test concurrent_transfers_test -- --nocapture

use std::sync::{Arc, Barrier};
use std::thread;

use rust_decimal::Decimal;
use tempfile::TempDir;
use uuid::Uuid;

use wallet_core::adapters::memory::{self, MemoryStorage};
use wallet_core::config::Config;
use wallet_core::events::EventDispatcher;
use wallet_core::ports::{StorageScope, TransactionalStorage};
use wallet_core::services::{CreateTransactionInput, CreateTransactionService};
use wallet_core::{Account, Client, Context, Error, WalletContext};

/// Number of concurrent threads
const THREAD_COUNT: usize = 6;

/// Transfers attempted per thread
const ITERATIONS_PER_THREAD: usize = 5;

fn run_transfers<F>(transfer: F) -> (usize, usize)
where
    F: Fn(usize) -> Result<(), Error> + Send + Sync + 'static,
{
    let transfer = Arc::new(transfer);
    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let mut handles = Vec::new();

    for i in 0..THREAD_COUNT {
        let transfer = Arc::clone(&transfer);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            let mut ok = 0;
            let mut failed = 0;
            for _ in 0..ITERATIONS_PER_THREAD {
                match transfer(i) {
                    Ok(()) => ok += 1,
                    Err(Error::Commit(_) | Error::Persistence(_)) => failed += 1,
                    Err(other) => panic!("thread {}: unexpected error {:?}", i, other),
                }
            }
            (ok, failed)
        }));
    }

    handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .fold((0, 0), |acc, (ok, failed)| (acc.0 + ok, acc.1 + failed))
}

#[test]
fn test_concurrent_transfers_in_memory() {
    let storage = MemoryStorage::new();
    let c1 = Client::new("client1", "client1@example.com").unwrap();
    let c2 = Client::new("client2", "client2@example.com").unwrap();
    let mut a1 = Account::new(&c1);
    let mut a2 = Account::new(&c2);
    a1.credit(Decimal::new(1000, 0)).unwrap();
    a2.credit(Decimal::new(1000, 0)).unwrap();
    let scope = storage.begin().unwrap();
    scope.account_repository().save(&a1).unwrap();
    scope.account_repository().save(&a2).unwrap();
    scope.commit().unwrap();

    let uow = Arc::new(memory::unit_of_work(Arc::new(storage.clone())));
    let service = CreateTransactionService::new(uow, Arc::new(EventDispatcher::new()));
    let (from, to) = (a1.id, a2.id);

    let (ok, failed) = run_transfers(move |i| {
        let (f, t) = if i % 2 == 0 { (from, to) } else { (to, from) };
        service
            .execute(
                &Context::background(),
                CreateTransactionInput::new(f.to_string(), t.to_string(), Decimal::ONE),
            )
            .map(|_| ())
    });

    println!("in-memory: {} committed, {} conflicted", ok, failed);
    assert_eq!(ok + failed, THREAD_COUNT * ITERATIONS_PER_THREAD);
    assert!(ok > 0);

    let accounts = storage.accounts().unwrap();
    let total: Decimal = accounts.iter().map(|a| a.balance).sum();
    assert_eq!(total, Decimal::new(2000, 0));
    assert_eq!(storage.transactions().unwrap().len(), ok);
}

#[test]
fn test_concurrent_transfers_duckdb() {
    let temp_dir = TempDir::new().unwrap();
    let wallet = Arc::new(WalletContext::with_config(temp_dir.path(), Config::default()).unwrap());
    let seed = wallet.demo_service.seed(&Context::background()).unwrap();
    let (from, to): (Uuid, Uuid) = (seed.accounts[0].account_id, seed.accounts[1].account_id);

    let worker = Arc::clone(&wallet);
    let (ok, failed) = run_transfers(move |_| {
        worker
            .create_transaction_service
            .execute(
                &Context::background(),
                CreateTransactionInput::new(from.to_string(), to.to_string(), Decimal::ONE),
            )
            .map(|_| ())
    });

    println!("duckdb: {} committed, {} conflicted", ok, failed);
    assert_eq!(ok + failed, THREAD_COUNT * ITERATIONS_PER_THREAD);

    let ctx = Context::background();
    let status = wallet.status_service.get_status(&ctx).unwrap();
    assert_eq!(status.total_balance, Decimal::new(2000, 0));

    let history = wallet.status_service.history(&ctx, &from.to_string()).unwrap();
    assert_eq!(history.transactions.len(), ok);
    assert_eq!(history.balance, Decimal::new(1000, 0) - Decimal::from(ok as i64));
}
