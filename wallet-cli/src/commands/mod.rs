//! CLI command implementations

pub mod account;
pub mod client;
pub mod demo;
pub mod history;
pub mod status;
pub mod transfer;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;
use wallet_core::WalletContext;

/// Get the wallet directory from environment or default
pub fn get_wallet_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("WALLET_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".wallet"))
        .context("Could not find home directory; set WALLET_DIR")
}

/// Open the wallet context for the configured directory
pub fn get_context() -> Result<WalletContext> {
    let wallet_dir = get_wallet_dir()?;
    debug!(wallet_dir = %wallet_dir.display(), "opening wallet");
    WalletContext::new(&wallet_dir)
        .with_context(|| format!("Failed to open wallet in {}", wallet_dir.display()))
}
