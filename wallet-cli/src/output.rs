//! Output formatting utilities

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use serde::Serialize;
use wallet_core::{Error, OperationResult};

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Print a warning message
pub fn warning(msg: &str) {
    eprintln!("{}", msg.yellow());
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Print a failed command's error chain to stderr
///
/// Ledger errors are prefixed with the HTTP status they map to, so scripts
/// can tell client mistakes from server faults.
pub fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<Error>() {
        Some(ledger) => error(&format!("Error ({}): {}", ledger.http_status(), ledger)),
        None => error(&format!("Error: {}", err)),
    }
    for cause in err.chain().skip(1) {
        eprintln!("  caused by: {}", cause);
    }
}

/// Print an operation outcome as a JSON envelope on stdout
///
/// A failed outcome is printed too and then handed back unchanged, so the
/// exit code and the stderr report still carry its status.
pub fn print_json<T: Serialize>(outcome: wallet_core::domain::result::Result<T>) -> anyhow::Result<()> {
    match outcome {
        Ok(data) => {
            println!("{}", serde_json::to_string_pretty(&OperationResult::ok(data))?);
            Ok(())
        }
        Err(err) => {
            let envelope = OperationResult::<T>::from_error(&err);
            println!("{}", serde_json::to_string_pretty(&envelope)?);
            Err(err.into())
        }
    }
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}
