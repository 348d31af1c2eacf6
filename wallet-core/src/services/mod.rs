//! Service layer - use cases
//!
//! Every use case runs its storage work through the shared
//! [`UnitOfWork`](crate::uow::UnitOfWork), so each call is one atomic scope.

mod create_account;
mod create_client;
mod create_transaction;
mod demo;
mod status;

pub use create_account::{CreateAccountInput, CreateAccountOutput, CreateAccountService};
pub use create_client::{CreateClientInput, CreateClientOutput, CreateClientService};
pub use create_transaction::{
    CreateTransactionInput, CreateTransactionOutput, CreateTransactionService,
};
pub use demo::{DemoSeed, DemoService, SeededAccount, DEMO_OPENING_BALANCE};
pub use status::{AccountHistory, AccountSummary, StatusService, StatusSummary};
