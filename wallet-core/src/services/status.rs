//! Status service - clients, balances and transaction history

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::context::Context;
use crate::domain::result::{Error, Result};
use crate::domain::Transaction;
use crate::ports::TransactionalStorage;
use crate::uow::{AccountDb, ClientDb, TransactionDb, UnitOfWork};

/// Read-only views over the ledger
pub struct StatusService<S: TransactionalStorage> {
    uow: Arc<UnitOfWork<S>>,
}

impl<S: TransactionalStorage + 'static> StatusService<S> {
    pub fn new(uow: Arc<UnitOfWork<S>>) -> Self {
        Self { uow }
    }

    /// Every account with its owner, plus the ledger total
    pub fn get_status(&self, ctx: &Context) -> Result<StatusSummary> {
        self.uow.run(ctx, |scope| {
            let clients = scope.get_repository::<ClientDb>(ctx)?.list()?;
            let accounts = scope.get_repository::<AccountDb>(ctx)?.list()?;

            let names: HashMap<Uuid, &str> =
                clients.iter().map(|c| (c.id, c.name.as_str())).collect();
            let total_balance = accounts.iter().map(|a| a.balance).sum();

            Ok(StatusSummary {
                total_clients: clients.len(),
                total_accounts: accounts.len(),
                total_balance,
                accounts: accounts
                    .iter()
                    .map(|a| AccountSummary {
                        id: a.id,
                        client_id: a.client_id,
                        client_name: names.get(&a.client_id).map(|n| n.to_string()),
                        balance: a.balance,
                    })
                    .collect(),
            })
        })
    }

    /// Transactions touching an account, newest first
    pub fn history(&self, ctx: &Context, account_id: &str) -> Result<AccountHistory> {
        let id = Uuid::parse_str(account_id.trim()).map_err(|_| {
            Error::validation(format!("account_id is not a valid id: '{}'", account_id))
        })?;

        self.uow.run(ctx, |scope| {
            let account = scope.get_repository::<AccountDb>(ctx)?.find_by_id(id)?;
            let transactions = scope.get_repository::<TransactionDb>(ctx)?.find_by_account(id)?;
            Ok(AccountHistory {
                account_id: account.id,
                balance: account.balance,
                transactions,
            })
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub total_clients: usize,
    pub total_accounts: usize,
    pub total_balance: Decimal,
    pub accounts: Vec<AccountSummary>,
}

#[derive(Debug, Serialize)]
pub struct AccountSummary {
    pub id: Uuid,
    pub client_id: Uuid,
    pub client_name: Option<String>,
    pub balance: Decimal,
}

#[derive(Debug, Serialize)]
pub struct AccountHistory {
    pub account_id: Uuid,
    pub balance: Decimal,
    pub transactions: Vec<Transaction>,
}
