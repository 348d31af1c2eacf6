//! Transfer command - move money between two accounts

use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use rust_decimal::Decimal;
use wallet_core::services::{CreateTransactionInput, CreateTransactionOutput};
use wallet_core::{Context, Error};

use super::get_context;
use crate::output;

pub fn run(from: String, to: String, amount: String, timeout_secs: Option<u64>, json: bool) -> Result<()> {
    let amount = match parse_amount(&amount) {
        Ok(amount) => amount,
        Err(err) if json => return output::print_json::<CreateTransactionOutput>(Err(err)),
        Err(err) => return Err(err.into()),
    };

    let ctx = get_context()?;
    let op_ctx = match timeout_secs {
        Some(secs) => Context::with_timeout(Duration::from_secs(secs)),
        None => Context::background(),
    };

    let outcome = ctx
        .create_transaction_service
        .execute(&op_ctx, CreateTransactionInput::new(from, to, amount));
    if json {
        return output::print_json(outcome);
    }

    let result = outcome?;

    println!("{}", "Transfer committed".green());
    println!("  Transaction ID: {}", result.id);
    println!("  From:           {}", result.account_id_from);
    println!("  To:             {}", result.account_id_to);
    println!("  Amount:         {}", result.amount);

    for failure in &result.event_failures {
        output::warning(&format!("Event not delivered: {}", failure));
    }
    Ok(())
}

fn parse_amount(raw: &str) -> wallet_core::domain::result::Result<Decimal> {
    Decimal::from_str(raw.trim()).map_err(|_| Error::validation(format!("invalid amount '{}'", raw)))
}
