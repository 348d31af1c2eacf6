//! Transactional storage port
//!
//! A storage engine hands out scopes; every repository bound to a scope sees
//! that scope's uncommitted writes, and nothing outside the scope does until
//! `commit`.

use crate::domain::result::Result;

/// A storage engine able to open atomic scopes
pub trait TransactionalStorage: Send + Sync {
    type Scope: StorageScope;

    /// Begin a new scope
    fn begin(&self) -> Result<Self::Scope>;
}

/// One open transaction on the storage engine
///
/// Both methods consume the scope: it is finished exactly once.
pub trait StorageScope: Send + 'static {
    /// Make every write of this scope visible atomically
    fn commit(self) -> Result<()>;

    /// Discard every write of this scope
    fn rollback(self) -> Result<()>;
}
