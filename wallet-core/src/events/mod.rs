//! Domain event dispatch
//!
//! - **dispatcher**: the name → ordered handler list registry
//! - **handlers**: handler implementations, including the bridge to a
//!   [`MessagePublisher`](crate::ports::MessagePublisher)

mod dispatcher;
mod handlers;

pub use dispatcher::EventDispatcher;
pub use handlers::{FnHandler, PublishHandler, BALANCES_TOPIC, TRANSACTIONS_TOPIC};

use crate::domain::result::Result;
use crate::domain::DomainEvent;

/// Something that reacts to a dispatched domain event
pub trait EventHandler: Send + Sync {
    /// Label used in logs and failure reports
    fn name(&self) -> &str;

    fn handle(&self, event: &DomainEvent) -> Result<()>;
}
