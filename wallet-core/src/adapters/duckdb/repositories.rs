//! Repositories bound to one DuckDB transaction

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use duckdb::{params, Row};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::ScopedConnection;
use crate::domain::result::{Error, Result};
use crate::domain::{Account, Client, Transaction};
use crate::ports::{AccountRepository, ClientRepository, TransactionRepository};

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::persistence(format!("bad timestamp '{}': {}", s, e)))
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::persistence(format!("bad id '{}': {}", s, e)))
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    Decimal::from_str(s).map_err(|e| Error::persistence(format!("bad decimal '{}': {}", s, e)))
}

/// Raw text columns of a row, decoded after the statement is done
type ClientRow = (String, String, String, String, String);
type AccountRow = (String, String, String, String, String);
type TransactionRow = (String, String, String, String, String);

fn read5(row: &Row<'_>) -> duckdb::Result<(String, String, String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn to_client((id, name, email, created, updated): ClientRow) -> Result<Client> {
    Ok(Client {
        id: parse_uuid(&id)?,
        name,
        email,
        created_at: parse_timestamp(&created)?,
        updated_at: parse_timestamp(&updated)?,
    })
}

fn to_account((id, client_id, balance, created, updated): AccountRow) -> Result<Account> {
    Ok(Account {
        id: parse_uuid(&id)?,
        client_id: parse_uuid(&client_id)?,
        balance: parse_decimal(&balance)?,
        created_at: parse_timestamp(&created)?,
        updated_at: parse_timestamp(&updated)?,
    })
}

fn to_transaction((id, from, to, amount, created): TransactionRow) -> Result<Transaction> {
    Ok(Transaction {
        id: parse_uuid(&id)?,
        account_id_from: parse_uuid(&from)?,
        account_id_to: parse_uuid(&to)?,
        amount: parse_decimal(&amount)?,
        created_at: parse_timestamp(&created)?,
    })
}

const CLIENT_COLUMNS: &str = "client_id, name, email, created_at, updated_at";
const ACCOUNT_COLUMNS: &str = "account_id, client_id, balance::VARCHAR, created_at, updated_at";
const TRANSACTION_COLUMNS: &str =
    "transaction_id, account_id_from, account_id_to, amount::VARCHAR, created_at";

pub struct DuckDbClientRepository {
    conn: Arc<ScopedConnection>,
}

impl DuckDbClientRepository {
    pub fn new(conn: Arc<ScopedConnection>) -> Self {
        Self { conn }
    }
}

impl ClientRepository for DuckDbClientRepository {
    fn get(&self, id: Uuid) -> Result<Client> {
        let raw = self.conn.with(|conn| {
            let sql = format!("SELECT {} FROM clients WHERE client_id = ?", CLIENT_COLUMNS);
            match conn.query_row(&sql, [id.to_string()], read5) {
                Ok(raw) => Ok(raw),
                Err(duckdb::Error::QueryReturnedNoRows) => {
                    Err(Error::not_found(format!("client {}", id)))
                }
                Err(e) => Err(e.into()),
            }
        })?;
        to_client(raw)
    }

    fn save(&self, client: &Client) -> Result<()> {
        self.conn.with(|conn| {
            conn.execute(
                "INSERT INTO clients (client_id, name, email, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    client.id.to_string(),
                    client.name,
                    client.email,
                    format_timestamp(&client.created_at),
                    format_timestamp(&client.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    fn list(&self) -> Result<Vec<Client>> {
        let rows = self.conn.with(|conn| {
            let sql = format!("SELECT {} FROM clients ORDER BY created_at", CLIENT_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], read5)?
                .collect::<duckdb::Result<Vec<_>>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(to_client).collect()
    }
}

pub struct DuckDbAccountRepository {
    conn: Arc<ScopedConnection>,
}

impl DuckDbAccountRepository {
    pub fn new(conn: Arc<ScopedConnection>) -> Self {
        Self { conn }
    }
}

impl AccountRepository for DuckDbAccountRepository {
    fn find_by_id(&self, id: Uuid) -> Result<Account> {
        let raw = self.conn.with(|conn| {
            let sql = format!("SELECT {} FROM accounts WHERE account_id = ?", ACCOUNT_COLUMNS);
            match conn.query_row(&sql, [id.to_string()], read5) {
                Ok(raw) => Ok(raw),
                Err(duckdb::Error::QueryReturnedNoRows) => {
                    Err(Error::not_found(format!("account {}", id)))
                }
                Err(e) => Err(e.into()),
            }
        })?;
        to_account(raw)
    }

    fn save(&self, account: &Account) -> Result<()> {
        self.conn.with(|conn| {
            conn.execute(
                "INSERT INTO accounts (account_id, client_id, balance, created_at, updated_at)
                 VALUES (?, ?, CAST(? AS DECIMAL(18, 4)), ?, ?)",
                params![
                    account.id.to_string(),
                    account.client_id.to_string(),
                    account.balance.to_string(),
                    format_timestamp(&account.created_at),
                    format_timestamp(&account.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    fn update_balance(&self, account: &Account) -> Result<()> {
        let updated = self.conn.with(|conn| {
            Ok(conn.execute(
                "UPDATE accounts SET balance = CAST(? AS DECIMAL(18, 4)), updated_at = ?
                 WHERE account_id = ?",
                params![
                    account.balance.to_string(),
                    format_timestamp(&account.updated_at),
                    account.id.to_string(),
                ],
            )?)
        })?;
        if updated == 0 {
            return Err(Error::not_found(format!("account {}", account.id)));
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<Account>> {
        let rows = self.conn.with(|conn| {
            let sql = format!("SELECT {} FROM accounts ORDER BY created_at", ACCOUNT_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], read5)?
                .collect::<duckdb::Result<Vec<_>>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(to_account).collect()
    }
}

pub struct DuckDbTransactionRepository {
    conn: Arc<ScopedConnection>,
}

impl DuckDbTransactionRepository {
    pub fn new(conn: Arc<ScopedConnection>) -> Self {
        Self { conn }
    }
}

impl TransactionRepository for DuckDbTransactionRepository {
    fn create(&self, transaction: &Transaction) -> Result<()> {
        self.conn.with(|conn| {
            conn.execute(
                "INSERT INTO transactions
                    (transaction_id, account_id_from, account_id_to, amount, created_at)
                 VALUES (?, ?, ?, CAST(? AS DECIMAL(18, 4)), ?)",
                params![
                    transaction.id.to_string(),
                    transaction.account_id_from.to_string(),
                    transaction.account_id_to.to_string(),
                    transaction.amount.to_string(),
                    format_timestamp(&transaction.created_at),
                ],
            )?;
            Ok(())
        })
    }

    fn find_by_account(&self, account_id: Uuid) -> Result<Vec<Transaction>> {
        let rows = self.conn.with(|conn| {
            let sql = format!(
                "SELECT {} FROM transactions
                 WHERE account_id_from = ? OR account_id_to = ?
                 ORDER BY created_at DESC",
                TRANSACTION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let id = account_id.to_string();
            let rows = stmt
                .query_map(params![id, id], read5)?
                .collect::<duckdb::Result<Vec<_>>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(to_transaction).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::duckdb::DuckDbStorage;
    use crate::domain::DebitPolicy;
    use crate::ports::{StorageScope, TransactionalStorage};

    fn storage() -> DuckDbStorage {
        let storage = DuckDbStorage::open_in_memory().unwrap();
        storage.ensure_schema().unwrap();
        storage
    }

    #[test]
    fn test_client_round_trip() {
        let storage = storage();
        let client = Client::new("client1", "client1@example.com").unwrap();

        let scope = storage.begin().unwrap();
        scope.client_repository().save(&client).unwrap();
        scope.commit().unwrap();

        let scope = storage.begin().unwrap();
        let repo = scope.client_repository();
        let loaded = repo.get(client.id).unwrap();
        assert_eq!(loaded.id, client.id);
        assert_eq!(loaded.email, "client1@example.com");
        assert_eq!(repo.list().unwrap().len(), 1);

        let err = repo.get(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_account_balance_precision_survives() {
        let storage = storage();
        let client = Client::new("client1", "client1@example.com").unwrap();
        let mut account = Account::new(&client);
        account.credit(Decimal::new(10_0001, 4)).unwrap();

        let scope = storage.begin().unwrap();
        let repo = scope.account_repository();
        repo.save(&account).unwrap();
        account.debit(Decimal::new(5, 1), DebitPolicy::default()).unwrap();
        repo.update_balance(&account).unwrap();
        scope.commit().unwrap();

        let scope = storage.begin().unwrap();
        let loaded = scope.account_repository().find_by_id(account.id).unwrap();
        assert_eq!(loaded.balance, Decimal::new(9_5001, 4));
        assert_eq!(loaded.client_id, client.id);
    }

    #[test]
    fn test_update_balance_of_missing_account() {
        let storage = storage();
        let client = Client::new("client1", "client1@example.com").unwrap();
        let account = Account::new(&client);

        let scope = storage.begin().unwrap();
        let err = scope.account_repository().update_balance(&account).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_rollback_discards_writes() {
        let storage = storage();
        let client = Client::new("client1", "client1@example.com").unwrap();
        let account = Account::new(&client);

        let scope = storage.begin().unwrap();
        scope.account_repository().save(&account).unwrap();
        scope.rollback().unwrap();

        let scope = storage.begin().unwrap();
        assert!(scope.account_repository().list().unwrap().is_empty());
    }

    #[test]
    fn test_find_transactions_by_account() {
        let storage = storage();
        let c1 = Client::new("client1", "client1@example.com").unwrap();
        let c2 = Client::new("client2", "client2@example.com").unwrap();
        let mut a1 = Account::new(&c1);
        let mut a2 = Account::new(&c2);
        let a3 = Account::new(&c2);
        a1.credit(Decimal::new(100, 0)).unwrap();

        let scope = storage.begin().unwrap();
        let repo = scope.transaction_repository();
        let first =
            Transaction::new(&mut a1, &mut a2, Decimal::new(10, 0), DebitPolicy::default()).unwrap();
        repo.create(&first).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second =
            Transaction::new(&mut a2, &mut a1, Decimal::new(3, 0), DebitPolicy::default()).unwrap();
        repo.create(&second).unwrap();
        scope.commit().unwrap();

        let scope = storage.begin().unwrap();
        let repo = scope.transaction_repository();
        let found = repo.find_by_account(a1.id).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, second.id);
        assert_eq!(found[1].amount, Decimal::new(10, 0));
        assert!(repo.find_by_account(a3.id).unwrap().is_empty());
    }
}
