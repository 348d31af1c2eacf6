//! Create-transaction use case
//!
//! Moves an amount between two accounts atomically and, once the change is
//! committed, announces it with `TransactionCreated` followed by
//! `BalanceUpdated`.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::context::Context;
use crate::domain::event::{BALANCE_UPDATED, TRANSACTION_CREATED};
use crate::domain::result::{Error, Result};
use crate::domain::{
    validate_amount, BalanceUpdatedPayload, DebitPolicy, DomainEvent, Transaction,
    TransactionCreatedPayload,
};
use crate::events::EventDispatcher;
use crate::ports::TransactionalStorage;
use crate::uow::{AccountDb, TransactionDb, UnitOfWork};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransactionInput {
    pub account_id_from: String,
    pub account_id_to: String,
    /// Accepts a JSON number or a decimal string
    pub amount: Decimal,
}

impl CreateTransactionInput {
    pub fn new(
        account_id_from: impl Into<String>,
        account_id_to: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            account_id_from: account_id_from.into(),
            account_id_to: account_id_to.into(),
            amount,
        }
    }

    /// Parse a request body; malformed JSON is a validation error
    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body)
            .map_err(|e| Error::validation(format!("invalid request body: {}", e)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransactionOutput {
    pub id: Uuid,
    pub account_id_from: Uuid,
    pub account_id_to: Uuid,
    pub amount: Decimal,
    /// Event handlers that failed after the commit
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_failures: Vec<String>,
}

pub struct CreateTransactionService<S: TransactionalStorage> {
    uow: Arc<UnitOfWork<S>>,
    dispatcher: Arc<EventDispatcher>,
    policy: DebitPolicy,
}

impl<S: TransactionalStorage + 'static> CreateTransactionService<S> {
    pub fn new(uow: Arc<UnitOfWork<S>>, dispatcher: Arc<EventDispatcher>) -> Self {
        Self {
            uow,
            dispatcher,
            policy: DebitPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: DebitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> DebitPolicy {
        self.policy
    }

    pub fn execute(
        &self,
        ctx: &Context,
        input: CreateTransactionInput,
    ) -> Result<CreateTransactionOutput> {
        let from_id = parse_account_id("account_id_from", &input.account_id_from)?;
        let to_id = parse_account_id("account_id_to", &input.account_id_to)?;
        validate_amount(input.amount)?;
        if from_id == to_id {
            return Err(Error::validation(
                "account_id_from and account_id_to must differ",
            ));
        }

        let span = info_span!("create_transaction", from = %from_id, to = %to_id, amount = %input.amount);
        let _enter = span.enter();

        let (transaction, balance_from, balance_to) = self.uow.run(ctx, |scope| {
            let accounts = scope.get_repository::<AccountDb>(ctx)?;
            let transactions = scope.get_repository::<TransactionDb>(ctx)?;

            let mut from = accounts.find_by_id(from_id)?;
            let mut to = accounts.find_by_id(to_id)?;

            let transaction = Transaction::new(&mut from, &mut to, input.amount, self.policy)?;

            accounts.update_balance(&from)?;
            accounts.update_balance(&to)?;
            transactions.create(&transaction)?;

            Ok((transaction, from.balance, to.balance))
        })?;

        info!(transaction = %transaction.id, "transaction committed");

        let event_failures = self.announce(&transaction, balance_from, balance_to);

        Ok(CreateTransactionOutput {
            id: transaction.id,
            account_id_from: transaction.account_id_from,
            account_id_to: transaction.account_id_to,
            amount: transaction.amount,
            event_failures,
        })
    }

    /// Dispatch both events; failures are reported, never propagated
    fn announce(
        &self,
        transaction: &Transaction,
        balance_from: Decimal,
        balance_to: Decimal,
    ) -> Vec<String> {
        let created = DomainEvent::with_payload(
            TRANSACTION_CREATED,
            &TransactionCreatedPayload {
                id: transaction.id,
                account_id_from: transaction.account_id_from,
                account_id_to: transaction.account_id_to,
                amount: transaction.amount,
            },
        );
        let updated = DomainEvent::with_payload(
            BALANCE_UPDATED,
            &BalanceUpdatedPayload {
                account_id_from: transaction.account_id_from,
                account_id_to: transaction.account_id_to,
                balance_account_id_from: balance_from,
                balance_account_id_to: balance_to,
            },
        );

        let mut failures = Vec::new();
        for event in [created, updated] {
            let outcome = event.and_then(|event| self.dispatcher.dispatch(&event));
            match outcome {
                Ok(_) => {}
                Err(Error::Dispatch(dispatch)) => {
                    for failure in &dispatch.failures {
                        failures.push(format!(
                            "{}: {}: {}",
                            dispatch.event, failure.handler, failure.message
                        ));
                    }
                }
                Err(err) => failures.push(err.to_string()),
            }
        }

        if !failures.is_empty() {
            warn!(
                transaction = %transaction.id,
                failures = failures.len(),
                "event dispatch failed after commit"
            );
        }
        failures
    }
}

fn parse_account_id(field: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value.trim())
        .map_err(|_| Error::validation(format!("{} is not a valid id: '{}'", field, value)))
}
