//! Demo command - seed sample clients and accounts

use anyhow::Result;
use colored::Colorize;
use wallet_core::Context;

use super::get_context;
use crate::output;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let outcome = ctx.demo_service.seed(&Context::background());
    if json {
        return output::print_json(outcome);
    }

    let seed = outcome?;

    println!("{}", "Demo data created".green());
    for account in &seed.accounts {
        println!(
            "  {} account {} balance {}",
            account.client_name, account.account_id, account.balance
        );
    }
    println!("Run 'wallet status' to see the ledger.");
    Ok(())
}
