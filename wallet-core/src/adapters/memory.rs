//! In-memory storage engine
//!
//! Every scope works on a private copy of the committed tables. Commit
//! applies only the rows the scope touched, after checking that no account it
//! updated was changed by another scope in the meantime.
//!
//! Fail points let tests make a chosen operation fail.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, Client, Transaction};
use crate::ports::{
    AccountRepository, ClientRepository, StorageScope, TransactionRepository,
    TransactionalStorage,
};
use crate::uow::{AccountDb, ClientDb, TransactionDb, UnitOfWork};

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Begin,
    ClientSave,
    AccountSave,
    AccountUpdateBalance,
    TransactionCreate,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    clients: Vec<Client>,
    accounts: HashMap<Uuid, (Account, u64)>,
    account_order: Vec<Uuid>,
    transactions: Vec<Transaction>,
}

type Faults = Arc<Mutex<HashSet<FailPoint>>>;

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| Error::persistence(format!("lock poisoned: {}", e)))
}

fn check_fault(faults: &Faults, point: FailPoint) -> Result<()> {
    if lock(faults)?.contains(&point) {
        return Err(Error::persistence(format!("injected failure at {:?}", point)));
    }
    Ok(())
}

/// Storage keeping everything in process memory
#[derive(Default, Clone)]
pub struct MemoryStorage {
    committed: Arc<Mutex<Tables>>,
    faults: Faults,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `point` fail until [`clear_failures`](Self::clear_failures)
    pub fn fail_on(&self, point: FailPoint) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(point);
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.clear();
        }
    }

    /// Committed accounts, for inspection
    pub fn accounts(&self) -> Result<Vec<Account>> {
        let tables = lock(&self.committed)?;
        Ok(tables
            .account_order
            .iter()
            .filter_map(|id| tables.accounts.get(id).map(|(a, _)| a.clone()))
            .collect())
    }

    /// Committed transactions, in insertion order
    pub fn transactions(&self) -> Result<Vec<Transaction>> {
        Ok(lock(&self.committed)?.transactions.clone())
    }

    /// Committed clients, in insertion order
    pub fn clients(&self) -> Result<Vec<Client>> {
        Ok(lock(&self.committed)?.clients.clone())
    }
}

/// A unit of work with every in-memory repository registered
pub fn unit_of_work(storage: Arc<MemoryStorage>) -> UnitOfWork<MemoryStorage> {
    let mut uow = UnitOfWork::new(storage);
    uow.register::<ClientDb, _>(MemoryScope::client_repository);
    uow.register::<AccountDb, _>(MemoryScope::account_repository);
    uow.register::<TransactionDb, _>(MemoryScope::transaction_repository);
    uow
}

/// Pending changes of one scope
#[derive(Default)]
struct Pending {
    snapshot: Tables,
    new_clients: Vec<Client>,
    new_accounts: Vec<Uuid>,
    /// Updated accounts and the version each was read at
    updated_accounts: HashMap<Uuid, u64>,
    new_transactions: Vec<Transaction>,
}

impl TransactionalStorage for MemoryStorage {
    type Scope = MemoryScope;

    fn begin(&self) -> Result<MemoryScope> {
        check_fault(&self.faults, FailPoint::Begin)?;
        let snapshot = lock(&self.committed)?.clone();
        Ok(MemoryScope {
            committed: Arc::clone(&self.committed),
            faults: Arc::clone(&self.faults),
            pending: Arc::new(Mutex::new(Pending {
                snapshot,
                ..Pending::default()
            })),
        })
    }
}

/// One open in-memory transaction
pub struct MemoryScope {
    committed: Arc<Mutex<Tables>>,
    faults: Faults,
    pending: Arc<Mutex<Pending>>,
}

impl MemoryScope {
    fn repository(&self) -> MemoryRepository {
        MemoryRepository {
            pending: Arc::clone(&self.pending),
            faults: Arc::clone(&self.faults),
        }
    }

    pub fn client_repository(&self) -> Arc<dyn ClientRepository> {
        Arc::new(self.repository())
    }

    pub fn account_repository(&self) -> Arc<dyn AccountRepository> {
        Arc::new(self.repository())
    }

    pub fn transaction_repository(&self) -> Arc<dyn TransactionRepository> {
        Arc::new(self.repository())
    }
}

impl StorageScope for MemoryScope {
    fn commit(self) -> Result<()> {
        if lock(&self.faults)?.contains(&FailPoint::Commit) {
            return Err(Error::commit("injected failure at Commit"));
        }

        let mut pending = lock(&self.pending)?;
        let mut tables = lock(&self.committed)?;

        for (id, base) in &pending.updated_accounts {
            // Accounts created in this scope have no committed version yet
            if let Some((_, version)) = tables.accounts.get(id) {
                if version != base {
                    return Err(Error::commit(format!(
                        "account {} was modified by a concurrent operation",
                        id
                    )));
                }
            }
        }

        let pending = &mut *pending;
        tables.clients.append(&mut pending.new_clients);
        for id in pending.new_accounts.drain(..) {
            if let Some(entry) = pending.snapshot.accounts.get(&id) {
                tables.accounts.insert(id, (entry.0.clone(), 0));
                tables.account_order.push(id);
            }
        }
        for id in pending.updated_accounts.keys() {
            if let Some((account, _)) = pending.snapshot.accounts.get(id) {
                let entry = tables
                    .accounts
                    .entry(*id)
                    .or_insert_with(|| (account.clone(), 0));
                entry.0 = account.clone();
                entry.1 += 1;
            }
        }
        tables.transactions.append(&mut pending.new_transactions);

        debug!("committed in-memory scope");
        Ok(())
    }

    fn rollback(self) -> Result<()> {
        debug!("rolled back in-memory scope");
        Ok(())
    }
}

/// Scope-bound implementation of every repository port
struct MemoryRepository {
    pending: Arc<Mutex<Pending>>,
    faults: Faults,
}

impl ClientRepository for MemoryRepository {
    fn get(&self, id: Uuid) -> Result<Client> {
        lock(&self.pending)?
            .snapshot
            .clients
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("client {}", id)))
    }

    fn save(&self, client: &Client) -> Result<()> {
        check_fault(&self.faults, FailPoint::ClientSave)?;
        let mut pending = lock(&self.pending)?;
        if pending.snapshot.clients.iter().any(|c| c.id == client.id) {
            return Err(Error::persistence(format!("duplicate client {}", client.id)));
        }
        pending.snapshot.clients.push(client.clone());
        pending.new_clients.push(client.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<Client>> {
        Ok(lock(&self.pending)?.snapshot.clients.clone())
    }
}

impl AccountRepository for MemoryRepository {
    fn find_by_id(&self, id: Uuid) -> Result<Account> {
        lock(&self.pending)?
            .snapshot
            .accounts
            .get(&id)
            .map(|(account, _)| account.clone())
            .ok_or_else(|| Error::not_found(format!("account {}", id)))
    }

    fn save(&self, account: &Account) -> Result<()> {
        check_fault(&self.faults, FailPoint::AccountSave)?;
        let mut pending = lock(&self.pending)?;
        if pending.snapshot.accounts.contains_key(&account.id) {
            return Err(Error::persistence(format!("duplicate account {}", account.id)));
        }
        pending
            .snapshot
            .accounts
            .insert(account.id, (account.clone(), 0));
        pending.snapshot.account_order.push(account.id);
        pending.new_accounts.push(account.id);
        Ok(())
    }

    fn update_balance(&self, account: &Account) -> Result<()> {
        check_fault(&self.faults, FailPoint::AccountUpdateBalance)?;
        let mut pending = lock(&self.pending)?;
        let pending = &mut *pending;
        let (stored, version) = pending
            .snapshot
            .accounts
            .get_mut(&account.id)
            .ok_or_else(|| Error::not_found(format!("account {}", account.id)))?;
        stored.balance = account.balance;
        stored.updated_at = account.updated_at;
        if !pending.new_accounts.contains(&account.id) {
            pending.updated_accounts.entry(account.id).or_insert(*version);
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<Account>> {
        let pending = lock(&self.pending)?;
        Ok(pending
            .snapshot
            .account_order
            .iter()
            .filter_map(|id| pending.snapshot.accounts.get(id).map(|(a, _)| a.clone()))
            .collect())
    }
}

impl TransactionRepository for MemoryRepository {
    fn create(&self, transaction: &Transaction) -> Result<()> {
        check_fault(&self.faults, FailPoint::TransactionCreate)?;
        let mut pending = lock(&self.pending)?;
        pending.snapshot.transactions.push(transaction.clone());
        pending.new_transactions.push(transaction.clone());
        Ok(())
    }

    fn find_by_account(&self, account_id: Uuid) -> Result<Vec<Transaction>> {
        let pending = lock(&self.pending)?;
        Ok(pending
            .snapshot
            .transactions
            .iter()
            .rev()
            .filter(|t| t.account_id_from == account_id || t.account_id_to == account_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn seeded() -> (MemoryStorage, Account) {
        let storage = MemoryStorage::new();
        let client = Client::new("client1", "client1@example.com").unwrap();
        let mut account = Account::new(&client);
        account.credit(Decimal::new(1000, 0)).unwrap();

        let scope = storage.begin().unwrap();
        scope.client_repository().save(&client).unwrap();
        scope.account_repository().save(&account).unwrap();
        scope.commit().unwrap();
        (storage, account)
    }

    #[test]
    fn test_uncommitted_writes_are_private() {
        let (storage, mut account) = seeded();

        let writer = storage.begin().unwrap();
        account.credit(Decimal::new(5, 0)).unwrap();
        writer.account_repository().update_balance(&account).unwrap();

        let reader = storage.begin().unwrap();
        let seen = reader.account_repository().find_by_id(account.id).unwrap();
        assert_eq!(seen.balance, Decimal::new(1000, 0));

        writer.commit().unwrap();
        assert_eq!(storage.accounts().unwrap()[0].balance, Decimal::new(1005, 0));
    }

    #[test]
    fn test_rollback_discards() {
        let (storage, mut account) = seeded();

        let scope = storage.begin().unwrap();
        account.credit(Decimal::new(5, 0)).unwrap();
        scope.account_repository().update_balance(&account).unwrap();
        scope.rollback().unwrap();

        assert_eq!(storage.accounts().unwrap()[0].balance, Decimal::new(1000, 0));
    }

    #[test]
    fn test_conflicting_update_fails_commit() {
        let (storage, account) = seeded();

        let first = storage.begin().unwrap();
        let second = storage.begin().unwrap();

        let mut a = account.clone();
        a.credit(Decimal::ONE).unwrap();
        first.account_repository().update_balance(&a).unwrap();

        let mut b = account.clone();
        b.credit(Decimal::TWO).unwrap();
        second.account_repository().update_balance(&b).unwrap();

        first.commit().unwrap();
        let err = second.commit().unwrap_err();
        assert!(matches!(err, Error::Commit(_)));
        assert_eq!(storage.accounts().unwrap()[0].balance, Decimal::new(1001, 0));
    }

    #[test]
    fn test_fail_points() {
        let (storage, account) = seeded();
        storage.fail_on(FailPoint::AccountUpdateBalance);

        let scope = storage.begin().unwrap();
        let err = scope.account_repository().update_balance(&account).unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));

        storage.clear_failures();
        storage.fail_on(FailPoint::Commit);
        let scope = storage.begin().unwrap();
        assert!(matches!(scope.commit(), Err(Error::Commit(_))));

        storage.clear_failures();
        assert!(storage.begin().unwrap().commit().is_ok());
    }

    #[test]
    fn test_missing_rows() {
        let (storage, _) = seeded();
        let scope = storage.begin().unwrap();
        let ghost = Account::new(&Client::new("ghost", "g@example.com").unwrap());

        assert!(matches!(
            scope.account_repository().find_by_id(ghost.id),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            scope.account_repository().update_balance(&ghost),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            scope.client_repository().get(ghost.client_id),
            Err(Error::NotFound(_))
        ));
    }
}
