//! History command - list an account's transactions

use anyhow::Result;
use colored::Colorize;
use wallet_core::Context;

use super::get_context;
use crate::output;

pub fn run(account_id: String, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let outcome = ctx.status_service.history(&Context::background(), &account_id);
    if json {
        return output::print_json(outcome);
    }

    let history = outcome?;

    println!("{} {}", "Account".bold(), history.account_id);
    println!("Balance: {}", history.balance);
    println!();

    if history.transactions.is_empty() {
        output::info("No transactions");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Date", "Transaction", "Direction", "Counterparty", "Amount"]);
    for tx in &history.transactions {
        let (direction, counterparty, amount) = if tx.account_id_from == history.account_id {
            ("out", tx.account_id_to, format!("-{}", tx.amount))
        } else {
            ("in", tx.account_id_from, format!("+{}", tx.amount))
        };
        table.add_row(vec![
            tx.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            tx.id.to_string(),
            direction.to_string(),
            counterparty.to_string(),
            amount,
        ]);
    }
    println!("{}", table);

    Ok(())
}
