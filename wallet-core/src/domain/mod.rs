//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account;
mod client;
pub mod event;
pub mod result;
mod transaction;

pub use account::{validate_amount, Account, DebitPolicy, MAX_AMOUNT, MAX_AMOUNT_SCALE};
pub use client::Client;
pub use event::{BalanceUpdatedPayload, DomainEvent, TransactionCreatedPayload};
pub use transaction::Transaction;
