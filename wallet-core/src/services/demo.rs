//! Demo service - seed a fresh ledger with sample data

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::context::Context;
use crate::domain::result::Result;
use crate::domain::{Account, Client};
use crate::ports::TransactionalStorage;
use crate::uow::{AccountDb, ClientDb, UnitOfWork};

/// Opening balance of every demo account
pub const DEMO_OPENING_BALANCE: i64 = 1000;

const DEMO_CLIENTS: &[(&str, &str)] = &[
    ("client1", "client1@example.com"),
    ("client2", "client2@example.com"),
];

pub struct DemoService<S: TransactionalStorage> {
    uow: Arc<UnitOfWork<S>>,
}

impl<S: TransactionalStorage + 'static> DemoService<S> {
    pub fn new(uow: Arc<UnitOfWork<S>>) -> Self {
        Self { uow }
    }

    /// Create the demo clients, each with one funded account
    ///
    /// Everything is written in one scope: either all of it lands or none.
    pub fn seed(&self, ctx: &Context) -> Result<DemoSeed> {
        let seeded = self.uow.run(ctx, |scope| {
            let clients = scope.get_repository::<ClientDb>(ctx)?;
            let accounts = scope.get_repository::<AccountDb>(ctx)?;

            let mut seeded = Vec::with_capacity(DEMO_CLIENTS.len());
            for (name, email) in DEMO_CLIENTS {
                let client = Client::new(*name, *email)?;
                let mut account = Account::new(&client);
                account.credit(Decimal::new(DEMO_OPENING_BALANCE, 0))?;

                clients.save(&client)?;
                accounts.save(&account)?;
                seeded.push(SeededAccount {
                    client_id: client.id,
                    client_name: client.name,
                    account_id: account.id,
                    balance: account.balance,
                });
            }
            Ok(seeded)
        })?;

        info!(accounts = seeded.len(), "seeded demo data");
        Ok(DemoSeed { accounts: seeded })
    }
}

#[derive(Debug, Serialize)]
pub struct DemoSeed {
    pub accounts: Vec<SeededAccount>,
}

#[derive(Debug, Serialize)]
pub struct SeededAccount {
    pub client_id: Uuid,
    pub client_name: String,
    pub account_id: Uuid,
    pub balance: Decimal,
}
