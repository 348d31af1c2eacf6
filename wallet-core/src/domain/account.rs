//! Account domain model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::client::Client;
use super::result::{Error, Result};

/// Whether a debit may take an account below zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DebitPolicy {
    /// Debits that would leave a negative balance fail with `InsufficientFunds`
    #[default]
    RejectOverdraft,
    /// Balances may go negative
    AllowNegative,
}

impl DebitPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebitPolicy::RejectOverdraft => "reject-overdraft",
            DebitPolicy::AllowNegative => "allow-negative",
        }
    }
}

impl fmt::Display for DebitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DebitPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "reject-overdraft" | "reject" | "rejectoverdraft" => Ok(DebitPolicy::RejectOverdraft),
            "allow-negative" | "allow" | "allownegative" => Ok(DebitPolicy::AllowNegative),
            other => Err(Error::Config(format!("unknown debit policy '{}'", other))),
        }
    }
}

/// An account holding a balance, owned by exactly one client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    /// Owning client; the account only refers to it
    pub client_id: Uuid,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Open a zero-balance account for a client
    pub fn new(client: &Client) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            client_id: client.id,
            balance: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Add `amount` to the balance
    pub fn credit(&mut self, amount: Decimal) -> Result<()> {
        validate_amount(amount)?;
        let balance = checked_balance(self.balance.checked_add(amount), self.id)?;
        self.balance = balance;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Subtract `amount` from the balance, subject to `policy`
    pub fn debit(&mut self, amount: Decimal, policy: DebitPolicy) -> Result<()> {
        validate_amount(amount)?;
        if policy == DebitPolicy::RejectOverdraft && self.balance < amount {
            return Err(Error::insufficient_funds(format!(
                "account {} has balance {}, cannot debit {}",
                self.id, self.balance, amount
            )));
        }
        let balance = checked_balance(self.balance.checked_sub(amount), self.id)?;
        self.balance = balance;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// A balance must stay within what the ledger can store
fn checked_balance(balance: Option<Decimal>, account_id: Uuid) -> Result<Decimal> {
    match balance {
        Some(balance) if balance.abs() <= MAX_AMOUNT => Ok(balance),
        _ => Err(Error::validation(format!(
            "balance of account {} would exceed {}",
            account_id, MAX_AMOUNT
        ))),
    }
}

/// Fractional digits the ledger stores for amounts and balances
pub const MAX_AMOUNT_SCALE: u32 = 4;

/// Largest magnitude of an amount or balance: 99999999999999.9999,
/// the limit of a `DECIMAL(18, 4)` column
pub const MAX_AMOUNT: Decimal =
    Decimal::from_parts(0xA763_FFFF, 0x0DE0_B6B3, 0, false, MAX_AMOUNT_SCALE);

/// Reject zero, negative, oversized and over-precise amounts
pub fn validate_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::validation(format!(
            "amount must be greater than zero, got {}",
            amount
        )));
    }
    if amount > MAX_AMOUNT {
        return Err(Error::validation(format!(
            "amount {} exceeds the maximum of {}",
            amount, MAX_AMOUNT
        )));
    }
    if amount.normalize().scale() > MAX_AMOUNT_SCALE {
        return Err(Error::validation(format!(
            "amount {} has more than {} decimal places",
            amount, MAX_AMOUNT_SCALE
        )));
    }
    Ok(())
}
