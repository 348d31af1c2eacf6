//! Transaction domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::account::{validate_amount, Account, DebitPolicy};
use super::result::{Error, Result};

/// A transfer of value between two accounts. Never updated once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id_from: Uuid,
    pub account_id_to: Uuid,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Build a transfer and apply it to both accounts in memory
    ///
    /// On error neither account is modified. Persisting the new balances is
    /// the caller's job.
    pub fn new(
        from: &mut Account,
        to: &mut Account,
        amount: Decimal,
        policy: DebitPolicy,
    ) -> Result<Self> {
        validate_amount(amount)?;
        if from.id == to.id {
            return Err(Error::validation(
                "source and destination accounts must differ",
            ));
        }

        let mut debited = from.clone();
        debited.debit(amount, policy)?;
        let mut credited = to.clone();
        credited.credit(amount)?;
        *from = debited;
        *to = credited;

        Ok(Self {
            id: Uuid::new_v4(),
            account_id_from: from.id,
            account_id_to: to.id,
            amount,
            created_at: Utc::now(),
        })
    }
}
