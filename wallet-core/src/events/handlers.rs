//! Event handler implementations

use std::sync::Arc;

use tracing::debug;

use crate::domain::result::Result;
use crate::domain::DomainEvent;
use crate::ports::MessagePublisher;

use super::EventHandler;

/// Topic that `TransactionCreated` events are published to
pub const TRANSACTIONS_TOPIC: &str = "transactions";

/// Topic that `BalanceUpdated` events are published to
pub const BALANCES_TOPIC: &str = "balances";

/// Forwards an event's payload to a publisher topic
pub struct PublishHandler {
    name: String,
    topic: String,
    publisher: Arc<dyn MessagePublisher>,
}

impl PublishHandler {
    pub fn new(topic: impl Into<String>, publisher: Arc<dyn MessagePublisher>) -> Self {
        let topic = topic.into();
        Self {
            name: format!("publish:{}", topic),
            topic,
            publisher,
        }
    }

    /// Handler for `TransactionCreated` → `transactions`
    pub fn transaction_created(publisher: Arc<dyn MessagePublisher>) -> Self {
        Self::new(TRANSACTIONS_TOPIC, publisher)
    }

    /// Handler for `BalanceUpdated` → `balances`
    pub fn balance_updated(publisher: Arc<dyn MessagePublisher>) -> Self {
        Self::new(BALANCES_TOPIC, publisher)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl EventHandler for PublishHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, event: &DomainEvent) -> Result<()> {
        debug!(event = %event.name, topic = %self.topic, "publishing event");
        self.publisher.publish(&self.topic, &event.payload)
    }
}

/// Wraps a closure as a handler
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&DomainEvent) -> Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&DomainEvent) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, event: &DomainEvent) -> Result<()> {
        (self.f)(event)
    }
}
