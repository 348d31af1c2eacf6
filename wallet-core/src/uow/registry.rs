//! Typed repository keys
//!
//! Each key names one repository port and maps to exactly one
//! [`RepositoryHandle`] variant, so a cached handle always converts back to
//! the port it was registered for.

use std::fmt;
use std::sync::Arc;

use crate::ports::{AccountRepository, ClientRepository, TransactionRepository};

/// Logical name of a scope-bound repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryName {
    ClientDb,
    AccountDb,
    TransactionDb,
}

impl RepositoryName {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepositoryName::ClientDb => "ClientDB",
            RepositoryName::AccountDb => "AccountDB",
            RepositoryName::TransactionDb => "TransactionDB",
        }
    }
}

impl fmt::Display for RepositoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A repository instance of any registered kind
#[derive(Clone)]
pub enum RepositoryHandle {
    Client(Arc<dyn ClientRepository>),
    Account(Arc<dyn AccountRepository>),
    Transaction(Arc<dyn TransactionRepository>),
}

/// Compile-time identifier tying a name to a repository port
pub trait RepositoryKey {
    type Repository: ?Sized + Send + Sync;

    const NAME: RepositoryName;

    fn wrap(repository: Arc<Self::Repository>) -> RepositoryHandle;

    fn unwrap(handle: &RepositoryHandle) -> Option<Arc<Self::Repository>>;
}

/// Key for the scope-bound [`ClientRepository`]
pub struct ClientDb;

/// Key for the scope-bound [`AccountRepository`]
pub struct AccountDb;

/// Key for the scope-bound [`TransactionRepository`]
pub struct TransactionDb;

impl RepositoryKey for ClientDb {
    type Repository = dyn ClientRepository;
    const NAME: RepositoryName = RepositoryName::ClientDb;

    fn wrap(repository: Arc<Self::Repository>) -> RepositoryHandle {
        RepositoryHandle::Client(repository)
    }

    fn unwrap(handle: &RepositoryHandle) -> Option<Arc<Self::Repository>> {
        match handle {
            RepositoryHandle::Client(repo) => Some(Arc::clone(repo)),
            _ => None,
        }
    }
}

impl RepositoryKey for AccountDb {
    type Repository = dyn AccountRepository;
    const NAME: RepositoryName = RepositoryName::AccountDb;

    fn wrap(repository: Arc<Self::Repository>) -> RepositoryHandle {
        RepositoryHandle::Account(repository)
    }

    fn unwrap(handle: &RepositoryHandle) -> Option<Arc<Self::Repository>> {
        match handle {
            RepositoryHandle::Account(repo) => Some(Arc::clone(repo)),
            _ => None,
        }
    }
}

impl RepositoryKey for TransactionDb {
    type Repository = dyn TransactionRepository;
    const NAME: RepositoryName = RepositoryName::TransactionDb;

    fn wrap(repository: Arc<Self::Repository>) -> RepositoryHandle {
        RepositoryHandle::Transaction(repository)
    }

    fn unwrap(handle: &RepositoryHandle) -> Option<Arc<Self::Repository>> {
        match handle {
            RepositoryHandle::Transaction(repo) => Some(Arc::clone(repo)),
            _ => None,
        }
    }
}
