//! Client command - manage clients

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use wallet_core::services::CreateClientInput;
use wallet_core::Context;

use super::get_context;
use crate::output;

#[derive(Subcommand)]
pub enum ClientCommands {
    /// Register a new client
    New {
        /// Client name
        #[arg(long)]
        name: String,
        /// Client email
        #[arg(long)]
        email: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: ClientCommands) -> Result<()> {
    match command {
        ClientCommands::New { name, email, json } => run_new(name, email, json),
    }
}

fn run_new(name: String, email: String, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let outcome = ctx
        .create_client_service
        .execute(&Context::background(), CreateClientInput { name, email });
    if json {
        return output::print_json(outcome);
    }

    let client = outcome?;
    println!("{}", "Client created".green());
    println!("  Client ID: {}", client.id);
    println!("  Name:      {}", client.name);
    println!("  Email:     {}", client.email);
    Ok(())
}
