//! Status command - show clients, accounts and balances

use anyhow::Result;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use wallet_core::Context;

use super::get_context;
use crate::output;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let outcome = ctx.status_service.get_status(&Context::background());
    if json {
        return output::print_json(outcome);
    }

    let status = outcome?;

    println!("{}", "Ledger Status".bold());
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.add_row(vec!["Clients", &status.total_clients.to_string()]);
    table.add_row(vec!["Accounts", &status.total_accounts.to_string()]);
    table.add_row(vec!["Total balance", &status.total_balance.to_string()]);
    println!("{}", table);
    println!();

    if status.accounts.is_empty() {
        output::info("No accounts yet. Run 'wallet demo' to seed sample data.");
        return Ok(());
    }

    let mut accounts = output::create_table();
    accounts.set_header(vec!["Account", "Client", "Balance"]);
    for account in &status.accounts {
        accounts.add_row(vec![
            account.id.to_string(),
            account
                .client_name
                .clone()
                .unwrap_or_else(|| account.client_id.to_string()),
            account.balance.to_string(),
        ]);
    }
    println!("{}", accounts);

    Ok(())
}
