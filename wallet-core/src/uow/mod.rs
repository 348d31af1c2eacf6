//! Unit of work - one atomic storage scope per logical operation
//!
//! [`UnitOfWork`] holds the repository factories and is shared by the use
//! cases. Every call to [`UnitOfWork::run`] begins a fresh storage scope and
//! hands the work closure a [`UowScope`], through which repositories bound to
//! that scope are resolved. The scope commits when the closure succeeds and
//! rolls back when it fails.

mod registry;

pub use registry::{
    AccountDb, ClientDb, RepositoryHandle, RepositoryKey, RepositoryName, TransactionDb,
};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::context::Context;
use crate::domain::result::{Error, Result};
use crate::ports::{StorageScope, TransactionalStorage};

type Factory<Sc> = Box<dyn Fn(&Sc) -> RepositoryHandle + Send + Sync>;

/// Lifecycle of a single `run` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UowState {
    Idle,
    Open,
    Committed,
    RolledBack,
}

impl fmt::Display for UowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UowState::Idle => "idle",
            UowState::Open => "open",
            UowState::Committed => "committed",
            UowState::RolledBack => "rolled back",
        };
        f.write_str(s)
    }
}

/// Coordinator of atomic repository work over a transactional storage
pub struct UnitOfWork<S: TransactionalStorage> {
    storage: Arc<S>,
    factories: HashMap<RepositoryName, Factory<S::Scope>>,
}

impl<S: TransactionalStorage + 'static> UnitOfWork<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            factories: HashMap::new(),
        }
    }

    /// Bind repository key `K` to a factory producing scope-bound instances
    ///
    /// Registering the same key again replaces the previous factory.
    pub fn register<K, F>(&mut self, factory: F)
    where
        K: RepositoryKey + 'static,
        F: Fn(&S::Scope) -> Arc<K::Repository> + Send + Sync + 'static,
    {
        let previous = self
            .factories
            .insert(K::NAME, Box::new(move |scope| K::wrap(factory(scope))));
        if previous.is_some() {
            debug!(repository = %K::NAME, "replaced repository factory");
        }
    }

    /// Whether a factory is registered under `name`
    pub fn is_registered(&self, name: RepositoryName) -> bool {
        self.factories.contains_key(&name)
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Run `work` inside one storage scope
    ///
    /// - `work` fails: the scope is rolled back and the error is returned
    ///   unchanged.
    /// - `work` succeeds but `ctx` is done: rolled back, `Error::Cancelled`.
    /// - otherwise the scope is committed; a failing commit is reported as
    ///   `Error::Commit`.
    pub fn run<T, F>(&self, ctx: &Context, work: F) -> Result<T>
    where
        F: FnOnce(&mut UowScope<'_, S>) -> Result<T>,
    {
        ctx.check()?;

        let mut state = UowState::Idle;
        let scope = self.storage.begin()?;
        transition(&mut state, UowState::Open);

        let mut uow = UowScope {
            scope: Some(scope),
            factories: &self.factories,
            cache: HashMap::new(),
            state,
        };
        let outcome = work(&mut uow);
        let scope = uow.finish()?;

        let value = match outcome {
            Ok(value) => value,
            Err(err) => {
                rollback(scope, &mut state, &err);
                return Err(err);
            }
        };

        if let Err(err) = ctx.check() {
            rollback(scope, &mut state, &err);
            return Err(err);
        }

        match scope.commit() {
            Ok(()) => {
                transition(&mut state, UowState::Committed);
                Ok(value)
            }
            Err(Error::Commit(msg)) => Err(Error::Commit(msg)),
            Err(err) => Err(Error::commit(err.to_string())),
        }
    }
}

fn transition(state: &mut UowState, next: UowState) {
    debug!(from = %state, to = %next, "unit of work state change");
    *state = next;
}

fn rollback<Sc: StorageScope>(scope: Sc, state: &mut UowState, cause: &Error) {
    debug!(cause = %cause, "rolling back unit of work");
    if let Err(err) = scope.rollback() {
        // The caller still gets the error that caused the rollback
        warn!(error = %err, cause = %cause, "rollback failed");
    }
    transition(state, UowState::RolledBack);
}

/// Handle given to the work closure of [`UnitOfWork::run`]
pub struct UowScope<'a, S: TransactionalStorage> {
    scope: Option<S::Scope>,
    factories: &'a HashMap<RepositoryName, Factory<S::Scope>>,
    cache: HashMap<RepositoryName, RepositoryHandle>,
    state: UowState,
}

impl<S: TransactionalStorage> UowScope<'_, S> {
    /// Repository `K` bound to this scope
    ///
    /// The factory runs at most once per scope; later calls return the cached
    /// instance.
    pub fn get_repository<K: RepositoryKey>(&mut self, ctx: &Context) -> Result<Arc<K::Repository>> {
        ctx.check()?;

        if let Some(repo) = self.cache.get(&K::NAME).and_then(K::unwrap) {
            return Ok(repo);
        }

        let factory = self
            .factories
            .get(&K::NAME)
            .ok_or_else(|| Error::NotRegistered(K::NAME.to_string()))?;
        let scope = self
            .scope
            .as_ref()
            .ok_or_else(|| Error::persistence("unit of work scope already finished"))?;

        let handle = factory(scope);
        let repo = K::unwrap(&handle)
            .ok_or_else(|| Error::NotRegistered(K::NAME.to_string()))?;
        self.cache.insert(K::NAME, handle);
        debug!(repository = %K::NAME, "instantiated scoped repository");
        Ok(repo)
    }

    pub fn state(&self) -> UowState {
        self.state
    }

    /// Number of repositories instantiated so far in this scope
    pub fn cached_repositories(&self) -> usize {
        self.cache.len()
    }

    fn finish(mut self) -> Result<S::Scope> {
        self.cache.clear();
        self.scope
            .take()
            .ok_or_else(|| Error::persistence("unit of work scope already finished"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use uuid::Uuid;

    use super::*;
    use crate::domain::{Account, Client, Transaction};
    use crate::ports::{AccountRepository, TransactionRepository};

    /// Storage that only counts what happened to its scopes
    #[derive(Default)]
    struct CountingStorage {
        begun: AtomicUsize,
        committed: Arc<AtomicUsize>,
        rolled_back: Arc<AtomicUsize>,
        fail_commit: Arc<AtomicBool>,
    }

    struct CountingScope {
        id: usize,
        committed: Arc<AtomicUsize>,
        rolled_back: Arc<AtomicUsize>,
        fail_commit: Arc<AtomicBool>,
    }

    impl TransactionalStorage for CountingStorage {
        type Scope = CountingScope;

        fn begin(&self) -> Result<CountingScope> {
            let id = self.begun.fetch_add(1, Ordering::SeqCst);
            Ok(CountingScope {
                id,
                committed: Arc::clone(&self.committed),
                rolled_back: Arc::clone(&self.rolled_back),
                fail_commit: Arc::clone(&self.fail_commit),
            })
        }
    }

    impl StorageScope for CountingScope {
        fn commit(self) -> Result<()> {
            if self.fail_commit.load(Ordering::SeqCst) {
                return Err(Error::persistence("disk full"));
            }
            self.committed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn rollback(self) -> Result<()> {
            self.rolled_back.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ScopedAccounts {
        saved: Mutex<Vec<Uuid>>,
    }

    impl AccountRepository for ScopedAccounts {
        fn find_by_id(&self, id: Uuid) -> Result<Account> {
            Err(Error::not_found(format!("account {}", id)))
        }

        fn save(&self, account: &Account) -> Result<()> {
            self.saved.lock().unwrap().push(account.id);
            Ok(())
        }

        fn update_balance(&self, _account: &Account) -> Result<()> {
            Ok(())
        }

        fn list(&self) -> Result<Vec<Account>> {
            Ok(Vec::new())
        }
    }

    struct NoTransactions;

    impl TransactionRepository for NoTransactions {
        fn create(&self, _transaction: &Transaction) -> Result<()> {
            Ok(())
        }

        fn find_by_account(&self, _account_id: Uuid) -> Result<Vec<Transaction>> {
            Ok(Vec::new())
        }
    }

    fn uow_with_counter() -> (UnitOfWork<CountingStorage>, Arc<AtomicUsize>) {
        let mut uow = UnitOfWork::new(Arc::new(CountingStorage::default()));
        let factory_calls = Arc::new(AtomicUsize::new(0));
        let calls = Arc::clone(&factory_calls);
        uow.register::<AccountDb, _>(move |_: &CountingScope| {
            calls.fetch_add(1, Ordering::SeqCst);
            Arc::new(ScopedAccounts {
                saved: Mutex::new(Vec::new()),
            }) as Arc<dyn AccountRepository>
        });
        (uow, factory_calls)
    }

    #[test]
    fn test_repository_cached_within_scope() {
        let (uow, factory_calls) = uow_with_counter();
        let ctx = Context::background();

        uow.run(&ctx, |scope| {
            let first = scope.get_repository::<AccountDb>(&ctx)?;
            let second = scope.get_repository::<AccountDb>(&ctx)?;
            assert!(Arc::ptr_eq(&first, &second));
            assert_eq!(scope.cached_repositories(), 1);
            assert_eq!(scope.state(), UowState::Open);
            Ok(())
        })
        .unwrap();

        assert_eq!(factory_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_each_run_gets_fresh_scope_and_instances() {
        let (uow, factory_calls) = uow_with_counter();
        let ctx = Context::background();

        let first = uow
            .run(&ctx, |scope| scope.get_repository::<AccountDb>(&ctx))
            .unwrap();
        let second = uow
            .run(&ctx, |scope| scope.get_repository::<AccountDb>(&ctx))
            .unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(factory_calls.load(Ordering::SeqCst), 2);
        assert_eq!(uow.storage().begun.load(Ordering::SeqCst), 2);
        assert_eq!(uow.storage().committed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_factory_receives_current_scope() {
        let mut uow = UnitOfWork::new(Arc::new(CountingStorage::default()));
        let seen_scopes = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&seen_scopes);
        uow.register::<AccountDb, _>(move |scope: &CountingScope| {
            seen.lock().unwrap().push(scope.id);
            Arc::new(ScopedAccounts {
                saved: Mutex::new(Vec::new()),
            }) as Arc<dyn AccountRepository>
        });
        let ctx = Context::background();
        let client = Client::new("client", "c@c.com").unwrap();
        let account = Account::new(&client);

        uow.run(&ctx, |_| Ok(())).unwrap();
        uow.run(&ctx, |scope| {
            let repo = scope.get_repository::<AccountDb>(&ctx)?;
            repo.save(&account)
        })
        .unwrap();

        // The first run never asked for a repository
        assert_eq!(*seen_scopes.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_unregistered_repository() {
        let (uow, _) = uow_with_counter();
        let ctx = Context::background();

        let err = uow
            .run(&ctx, |scope| scope.get_repository::<TransactionDb>(&ctx).map(|_| ()))
            .unwrap_err();

        assert!(matches!(err, Error::NotRegistered(name) if name == "TransactionDB"));
        assert_eq!(uow.storage().rolled_back.load(Ordering::SeqCst), 1);
        assert_eq!(uow.storage().committed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reregistering_replaces_factory() {
        let (mut uow, first_calls) = uow_with_counter();
        let ctx = Context::background();
        uow.register::<AccountDb, _>(|_: &CountingScope| {
            Arc::new(ScopedAccounts {
                saved: Mutex::new(Vec::new()),
            }) as Arc<dyn AccountRepository>
        });
        uow.register::<TransactionDb, _>(|_: &CountingScope| {
            Arc::new(NoTransactions) as Arc<dyn TransactionRepository>
        });

        uow.run(&ctx, |scope| {
            scope.get_repository::<AccountDb>(&ctx)?;
            scope.get_repository::<TransactionDb>(&ctx)?;
            assert_eq!(scope.cached_repositories(), 2);
            Ok(())
        })
        .unwrap();

        assert_eq!(first_calls.load(Ordering::SeqCst), 0);
        assert!(uow.is_registered(RepositoryName::TransactionDb));
        assert!(!uow.is_registered(RepositoryName::ClientDb));
    }

    #[test]
    fn test_work_error_rolls_back_and_is_returned_unchanged() {
        let (uow, _) = uow_with_counter();
        let ctx = Context::background();

        let err = uow
            .run(&ctx, |_| -> Result<()> { Err(Error::not_found("account 'X'")) })
            .unwrap_err();

        assert_eq!(err.to_string(), "Not found: account 'X'");
        assert_eq!(uow.storage().rolled_back.load(Ordering::SeqCst), 1);
        assert_eq!(uow.storage().committed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_commit_failure_is_commit_error() {
        let (uow, _) = uow_with_counter();
        uow.storage().fail_commit.store(true, Ordering::SeqCst);

        let err = uow.run(&Context::background(), |_| Ok(42)).unwrap_err();

        assert!(matches!(err, Error::Commit(msg) if msg.contains("disk full")));
    }

    #[test]
    fn test_cancelled_before_commit_rolls_back() {
        let (uow, _) = uow_with_counter();
        let ctx = Context::background();

        let err = uow
            .run(&ctx, |scope| {
                scope.get_repository::<AccountDb>(&ctx)?;
                ctx.cancel();
                Ok(())
            })
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled(_)));
        assert_eq!(uow.storage().rolled_back.load(Ordering::SeqCst), 1);
        assert_eq!(uow.storage().committed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancelled_context_never_begins() {
        let (uow, _) = uow_with_counter();
        let ctx = Context::background();
        ctx.cancel();

        let err = uow.run(&ctx, |_| Ok(())).unwrap_err();

        assert!(matches!(err, Error::Cancelled(_)));
        assert_eq!(uow.storage().begun.load(Ordering::SeqCst), 0);
    }
}
