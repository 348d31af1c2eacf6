//! DuckDB storage engine
//!
//! [`DuckDbStorage`] owns the root connection. Each scope runs on its own
//! cloned connection with an explicit `BEGIN TRANSACTION`, so concurrent
//! scopes are isolated by DuckDB's MVCC and a conflicting write fails the
//! scope that made it.

mod repositories;
pub mod schema;

pub use repositories::{DuckDbAccountRepository, DuckDbClientRepository, DuckDbTransactionRepository};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::anyhow;
use duckdb::Connection;
use tracing::{debug, warn};

use crate::domain::result::{Error, Result};
use crate::ports::{
    AccountRepository, ClientRepository, StorageScope, TransactionRepository,
    TransactionalStorage,
};
use crate::uow::{AccountDb, ClientDb, TransactionDb, UnitOfWork};

/// Maximum number of attempts when the database file is locked
const MAX_RETRIES: u32 = 5;

/// First retry delay in milliseconds, doubled on every attempt
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Whether an open error is a file locking issue worth retrying
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
        || lower.contains("could not set lock on file")
}

/// A DuckDB database used as a [`TransactionalStorage`]
pub struct DuckDbStorage {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbStorage {
    /// Open (or create) a database file
    ///
    /// Locking errors are retried with exponential backoff (50, 100, 200,
    /// 400ms) since another process may briefly hold the file.
    pub fn new(db_path: &Path) -> anyhow::Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        warn!(
                            delay_ms = delay.as_millis() as u64,
                            attempt = attempt + 1,
                            max = MAX_RETRIES,
                            error = %err_msg,
                            "database busy, retrying"
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("Failed to open database after {} retries", MAX_RETRIES)))
    }

    /// A private in-memory database, mostly for tests
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_in_memory_with_flags(config)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    fn try_open_connection(db_path: &Path) -> anyhow::Result<Connection> {
        // Autoloaded extensions are not needed and may fail code signing checks
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    /// Apply pending schema migrations
    pub fn ensure_schema(&self) -> anyhow::Result<schema::MigrationReport> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("lock poisoned: {}", e))?;
        schema::migrate(&conn)
    }

    /// Path of the database file, `None` when in memory
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }
}

impl TransactionalStorage for DuckDbStorage {
    type Scope = DuckDbScope;

    fn begin(&self) -> Result<DuckDbScope> {
        let conn = {
            let root = self
                .conn
                .lock()
                .map_err(|e| Error::persistence(format!("lock poisoned: {}", e)))?;
            root.try_clone()?
        };
        conn.execute_batch("BEGIN TRANSACTION")?;
        debug!("began duckdb transaction");
        Ok(DuckDbScope {
            conn: Arc::new(ScopedConnection {
                conn: Mutex::new(conn),
                finished: AtomicBool::new(false),
            }),
        })
    }
}

/// A connection with one open transaction, shared by the scope's repositories
pub struct ScopedConnection {
    conn: Mutex<Connection>,
    finished: AtomicBool,
}

impl ScopedConnection {
    /// Run `f` on the connection while the transaction is still open
    pub(crate) fn with<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        if self.finished.load(Ordering::SeqCst) {
            return Err(Error::persistence("scope already finished"));
        }
        let conn = self
            .conn
            .lock()
            .map_err(|e| Error::persistence(format!("lock poisoned: {}", e)))?;
        f(&conn)
    }

    fn finish(&self, statement: &str) -> Result<()> {
        if self.finished.swap(true, Ordering::SeqCst) {
            return Err(Error::persistence("scope already finished"));
        }
        let conn = self
            .conn
            .lock()
            .map_err(|e| Error::persistence(format!("lock poisoned: {}", e)))?;
        conn.execute_batch(statement)?;
        Ok(())
    }
}

/// One DuckDB transaction
///
/// Dropping an unfinished scope rolls it back.
pub struct DuckDbScope {
    conn: Arc<ScopedConnection>,
}

impl DuckDbScope {
    /// Connection handle for repositories bound to this scope
    pub fn connection(&self) -> Arc<ScopedConnection> {
        Arc::clone(&self.conn)
    }

    pub fn client_repository(&self) -> DuckDbClientRepository {
        DuckDbClientRepository::new(self.connection())
    }

    pub fn account_repository(&self) -> DuckDbAccountRepository {
        DuckDbAccountRepository::new(self.connection())
    }

    pub fn transaction_repository(&self) -> DuckDbTransactionRepository {
        DuckDbTransactionRepository::new(self.connection())
    }
}

impl StorageScope for DuckDbScope {
    fn commit(self) -> Result<()> {
        self.conn
            .finish("COMMIT")
            .map_err(|e| Error::commit(e.to_string()))?;
        debug!("committed duckdb transaction");
        Ok(())
    }

    fn rollback(self) -> Result<()> {
        self.conn.finish("ROLLBACK")?;
        debug!("rolled back duckdb transaction");
        Ok(())
    }
}

impl Drop for DuckDbScope {
    fn drop(&mut self) {
        if !self.conn.finished.load(Ordering::SeqCst) {
            if let Err(err) = self.conn.finish("ROLLBACK") {
                warn!(error = %err, "rollback of abandoned scope failed");
            }
        }
    }
}

/// A unit of work with every DuckDB repository registered
pub fn unit_of_work(storage: Arc<DuckDbStorage>) -> UnitOfWork<DuckDbStorage> {
    let mut uow = UnitOfWork::new(storage);
    uow.register::<ClientDb, _>(|scope: &DuckDbScope| {
        Arc::new(scope.client_repository()) as Arc<dyn ClientRepository>
    });
    uow.register::<AccountDb, _>(|scope: &DuckDbScope| {
        Arc::new(scope.account_repository()) as Arc<dyn AccountRepository>
    });
    uow.register::<TransactionDb, _>(|scope: &DuckDbScope| {
        Arc::new(scope.transaction_repository()) as Arc<dyn TransactionRepository>
    });
    uow
}
