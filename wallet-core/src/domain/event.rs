//! Domain events emitted after a committed state change

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::result::Result;

/// Emitted once a transfer has been committed
pub const TRANSACTION_CREATED: &str = "TransactionCreated";

/// Emitted after `TRANSACTION_CREATED` with the committed balances
pub const BALANCE_UPDATED: &str = "BalanceUpdated";

/// A named notification with an arbitrary JSON payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: Uuid,
    pub name: String,
    pub payload: JsonValue,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent {
    pub fn new(name: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            payload,
            occurred_at: Utc::now(),
        }
    }

    /// Build an event from any serializable payload
    pub fn with_payload<T: Serialize>(name: impl Into<String>, payload: &T) -> Result<Self> {
        Ok(Self::new(name, serde_json::to_value(payload)?))
    }
}

/// Payload of `TransactionCreated`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCreatedPayload {
    pub id: Uuid,
    pub account_id_from: Uuid,
    pub account_id_to: Uuid,
    pub amount: Decimal,
}

/// Payload of `BalanceUpdated`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceUpdatedPayload {
    pub account_id_from: Uuid,
    pub account_id_to: Uuid,
    pub balance_account_id_from: Decimal,
    pub balance_account_id_to: Decimal,
}
