//! Wallet Core - a minimal double-entry ledger
//!
//! This crate implements the ledger following hexagonal architecture:
//!
//! - **domain**: Core entities (Client, Account, Transaction), domain events
//!   and the error type
//! - **ports**: Trait definitions for storage, repositories and publishing
//! - **events**: The event dispatcher and its handlers
//! - **uow**: The unit-of-work coordinator and its typed repository registry
//! - **services**: Use cases (create client/account/transaction, status, demo)
//! - **adapters**: Concrete implementations (DuckDB, in-memory, publishers)

pub mod adapters;
pub mod config;
pub mod context;
pub mod domain;
pub mod events;
pub mod migrations;
pub mod ports;
pub mod services;
pub mod uow;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use tracing::info;

use adapters::duckdb::{self as duck, DuckDbStorage};
use adapters::publisher::{JsonLinesPublisher, RetryingPublisher};
use config::{Config, DATABASE_FILE};
use domain::event::{BALANCE_UPDATED, TRANSACTION_CREATED};
use events::{EventDispatcher, PublishHandler};
use ports::MessagePublisher;
use services::*;
use uow::UnitOfWork;

// Re-export commonly used types at crate root
pub use context::Context;
pub use domain::result::{Error, OperationResult};
pub use domain::{Account, Client, DebitPolicy, DomainEvent, Transaction};

/// Main context for wallet operations
///
/// Owns the storage, the event dispatcher and every use case, all wired to
/// the DuckDB ledger in the wallet directory.
pub struct WalletContext {
    pub wallet_dir: PathBuf,
    pub config: Config,
    pub storage: Arc<DuckDbStorage>,
    pub dispatcher: Arc<EventDispatcher>,
    pub uow: Arc<UnitOfWork<DuckDbStorage>>,
    pub create_client_service: CreateClientService<DuckDbStorage>,
    pub create_account_service: CreateAccountService<DuckDbStorage>,
    pub create_transaction_service: CreateTransactionService<DuckDbStorage>,
    pub status_service: StatusService<DuckDbStorage>,
    pub demo_service: DemoService<DuckDbStorage>,
}

impl WalletContext {
    /// Open the wallet in `wallet_dir` with its settings
    pub fn new(wallet_dir: &Path) -> Result<Self> {
        let config = Config::load(wallet_dir)?;
        Self::with_config(wallet_dir, config)
    }

    /// Open the wallet in `wallet_dir` with an explicit configuration
    pub fn with_config(wallet_dir: &Path, config: Config) -> Result<Self> {
        std::fs::create_dir_all(wallet_dir)
            .with_context(|| format!("cannot create {}", wallet_dir.display()))?;

        let db_path = wallet_dir.join(DATABASE_FILE);
        let storage = Arc::new(
            DuckDbStorage::new(&db_path)
                .with_context(|| format!("cannot open {}", db_path.display()))?,
        );
        storage.ensure_schema()?;

        let events_path = config.events_path(wallet_dir);
        let publisher: Arc<dyn MessagePublisher> = Arc::new(
            RetryingPublisher::new(JsonLinesPublisher::new(&events_path))
                .with_attempts(config.publish_attempts),
        );
        let dispatcher = Arc::new(EventDispatcher::new());
        dispatcher.register(
            TRANSACTION_CREATED,
            Arc::new(PublishHandler::transaction_created(Arc::clone(&publisher))),
        )?;
        dispatcher.register(
            BALANCE_UPDATED,
            Arc::new(PublishHandler::balance_updated(publisher)),
        )?;

        let uow = Arc::new(duck::unit_of_work(Arc::clone(&storage)));

        info!(
            wallet_dir = %wallet_dir.display(),
            debit_policy = %config.debit_policy,
            events = %events_path.display(),
            "wallet context ready"
        );

        Ok(Self {
            wallet_dir: wallet_dir.to_path_buf(),
            create_client_service: CreateClientService::new(Arc::clone(&uow)),
            create_account_service: CreateAccountService::new(Arc::clone(&uow)),
            create_transaction_service: CreateTransactionService::new(
                Arc::clone(&uow),
                Arc::clone(&dispatcher),
            )
            .with_policy(config.debit_policy),
            status_service: StatusService::new(Arc::clone(&uow)),
            demo_service: DemoService::new(Arc::clone(&uow)),
            config,
            storage,
            dispatcher,
            uow,
        })
    }

    /// Path of the JSON lines event log
    pub fn events_path(&self) -> PathBuf {
        self.config.events_path(&self.wallet_dir)
    }
}
