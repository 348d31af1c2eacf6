//! Wallet CLI - a double-entry ledger in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{account, client, demo, history, status, transfer};

/// Environment variable holding the log filter, e.g. `wallet_core=debug`
const LOG_ENV: &str = "WALLET_LOG";

/// Wallet - clients, accounts and transfers in your terminal
#[derive(Parser)]
#[command(name = "wallet", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage clients
    Client {
        #[command(subcommand)]
        command: client::ClientCommands,
    },

    /// Manage accounts
    Account {
        #[command(subcommand)]
        command: account::AccountCommands,
    },

    /// Move money from one account to another
    Transfer {
        /// Source account ID
        #[arg(long)]
        from: String,
        /// Destination account ID
        #[arg(long)]
        to: String,
        /// Amount to move, e.g. 100 or 12.50
        #[arg(long, allow_hyphen_values = true)]
        amount: String,
        /// Give up if the transfer has not committed after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show clients, accounts and the ledger total
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the transactions of an account
    History {
        /// Account ID
        account_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Seed two demo clients with funded accounts
    Demo {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    // A second init (e.g. in tests) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::report_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Client { command } => client::run(command),
        Commands::Account { command } => account::run(command),
        Commands::Transfer { from, to, amount, timeout, json } => {
            transfer::run(from, to, amount, timeout, json)
        }
        Commands::Status { json } => status::run(json),
        Commands::History { account_id, json } => history::run(account_id, json),
        Commands::Demo { json } => demo::run(json),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_negative_amount_reaches_validation() {
        let cli = Cli::try_parse_from([
            "wallet", "transfer", "--from", "a", "--to", "b", "--amount", "-50",
        ])
        .unwrap();
        match cli.command {
            Commands::Transfer { amount, .. } => assert_eq!(amount, "-50"),
            _ => panic!("expected transfer"),
        }
    }
}
