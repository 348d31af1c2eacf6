//! Create-account use case

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::context::Context;
use crate::domain::result::{Error, Result};
use crate::domain::Account;
use crate::ports::TransactionalStorage;
use crate::uow::{AccountDb, ClientDb, UnitOfWork};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountInput {
    pub client_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountOutput {
    pub id: Uuid,
}

pub struct CreateAccountService<S: TransactionalStorage> {
    uow: Arc<UnitOfWork<S>>,
}

impl<S: TransactionalStorage + 'static> CreateAccountService<S> {
    pub fn new(uow: Arc<UnitOfWork<S>>) -> Self {
        Self { uow }
    }

    /// Open a zero-balance account for an existing client
    pub fn execute(&self, ctx: &Context, input: CreateAccountInput) -> Result<CreateAccountOutput> {
        let client_id = Uuid::parse_str(input.client_id.trim()).map_err(|_| {
            Error::validation(format!("client_id is not a valid id: '{}'", input.client_id))
        })?;

        let account = self.uow.run(ctx, |scope| {
            let client = scope.get_repository::<ClientDb>(ctx)?.get(client_id)?;
            let account = Account::new(&client);
            scope.get_repository::<AccountDb>(ctx)?.save(&account)?;
            Ok(account)
        })?;

        info!(account = %account.id, client = %client_id, "account created");
        Ok(CreateAccountOutput { id: account.id })
    }
}
