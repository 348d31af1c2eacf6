//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core domain
//! depends only on these traits, not on concrete implementations.

mod publisher;
mod repository;
mod storage;

pub use publisher::MessagePublisher;
pub use repository::{AccountRepository, ClientRepository, TransactionRepository};
pub use storage::{StorageScope, TransactionalStorage};
