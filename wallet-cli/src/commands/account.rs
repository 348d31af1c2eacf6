//! Account command - manage accounts

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use wallet_core::services::CreateAccountInput;
use wallet_core::Context;

use super::get_context;
use crate::output;

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a zero-balance account for a client
    New {
        /// Owning client ID
        #[arg(long)]
        client_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: AccountCommands) -> Result<()> {
    match command {
        AccountCommands::New { client_id, json } => {
            let ctx = get_context()?;
            let outcome = ctx
                .create_account_service
                .execute(&Context::background(), CreateAccountInput { client_id });
            if json {
                return output::print_json(outcome);
            }

            let account = outcome?;
            println!("{}", "Account created".green());
            println!("  Account ID: {}", account.id);
            Ok(())
        }
    }
}
