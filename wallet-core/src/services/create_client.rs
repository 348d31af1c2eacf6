//! Create-client use case

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::context::Context;
use crate::domain::result::Result;
use crate::domain::Client;
use crate::ports::TransactionalStorage;
use crate::uow::{ClientDb, UnitOfWork};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClientInput {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClientOutput {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Client> for CreateClientOutput {
    fn from(client: Client) -> Self {
        Self {
            id: client.id,
            name: client.name,
            email: client.email,
            created_at: client.created_at,
            updated_at: client.updated_at,
        }
    }
}

pub struct CreateClientService<S: TransactionalStorage> {
    uow: Arc<UnitOfWork<S>>,
}

impl<S: TransactionalStorage + 'static> CreateClientService<S> {
    pub fn new(uow: Arc<UnitOfWork<S>>) -> Self {
        Self { uow }
    }

    pub fn execute(&self, ctx: &Context, input: CreateClientInput) -> Result<CreateClientOutput> {
        let client = Client::new(input.name, input.email)?;

        self.uow.run(ctx, |scope| {
            scope.get_repository::<ClientDb>(ctx)?.save(&client)
        })?;

        info!(client = %client.id, "client created");
        Ok(client.into())
    }
}
