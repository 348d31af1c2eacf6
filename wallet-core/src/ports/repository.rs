//! Repository ports - one capability interface per entity

use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{Account, Client, Transaction};

/// Client persistence
pub trait ClientRepository: Send + Sync {
    /// Get a client by id, `Error::NotFound` if absent
    fn get(&self, id: Uuid) -> Result<Client>;

    /// Insert a new client
    fn save(&self, client: &Client) -> Result<()>;

    /// All clients, oldest first
    fn list(&self) -> Result<Vec<Client>>;
}

/// Account persistence
pub trait AccountRepository: Send + Sync {
    /// Get an account by id, `Error::NotFound` if absent
    fn find_by_id(&self, id: Uuid) -> Result<Account>;

    /// Insert a new account
    fn save(&self, account: &Account) -> Result<()>;

    /// Store the account's current balance
    ///
    /// Fails with `Error::NotFound` when the account row no longer exists.
    fn update_balance(&self, account: &Account) -> Result<()>;

    /// All accounts, oldest first
    fn list(&self) -> Result<Vec<Account>>;
}

/// Transaction persistence. Transactions are append-only.
pub trait TransactionRepository: Send + Sync {
    /// Insert a transaction record
    fn create(&self, transaction: &Transaction) -> Result<()>;

    /// Transactions touching an account (either side), newest first
    fn find_by_account(&self, account_id: Uuid) -> Result<Vec<Transaction>>;
}
