//! Message publishing port
//!
//! Bridges in-process domain events to an external transport. Delivery
//! guarantees are the transport's business; retries belong to the
//! implementation (see `adapters::publisher::RetryingPublisher`).

use serde_json::Value as JsonValue;

use crate::domain::result::Result;

/// Publish a payload to a topic
pub trait MessagePublisher: Send + Sync {
    fn publish(&self, topic: &str, payload: &JsonValue) -> Result<()>;
}
