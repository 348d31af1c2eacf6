//! Configuration management
//!
//! Settings live in `<wallet_dir>/settings.json`:
//! ```json
//! {
//!   "ledger": {
//!     "debitPolicy": "rejectOverdraft",
//!     "eventsFile": "events.jsonl",
//!     "publishAttempts": 3
//!   }
//! }
//! ```
//! Keys this crate does not manage are kept as they are on save.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::adapters::publisher::DEFAULT_PUBLISH_ATTEMPTS;
use crate::domain::DebitPolicy;

/// Name of the settings file inside the wallet directory
pub const SETTINGS_FILE: &str = "settings.json";

/// Name of the ledger database inside the wallet directory
pub const DATABASE_FILE: &str = "wallet.duckdb";

/// Default event log, relative to the wallet directory
pub const DEFAULT_EVENTS_FILE: &str = "events.jsonl";

/// Environment override for the debit policy
pub const DEBIT_POLICY_ENV: &str = "WALLET_DEBIT_POLICY";

/// Environment override for the event log path
pub const EVENTS_FILE_ENV: &str = "WALLET_EVENTS_FILE";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    ledger: LedgerSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    debit_policy: Option<DebitPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    events_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    publish_attempts: Option<u32>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Wallet configuration (resolved view of the settings)
#[derive(Debug, Clone)]
pub struct Config {
    pub debit_policy: DebitPolicy,
    /// Event log path, absolute or relative to the wallet directory
    pub events_file: PathBuf,
    pub publish_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debit_policy: DebitPolicy::default(),
            events_file: PathBuf::from(DEFAULT_EVENTS_FILE),
            publish_attempts: DEFAULT_PUBLISH_ATTEMPTS,
        }
    }
}

impl Config {
    /// Load config from the wallet directory
    ///
    /// A missing settings file yields the defaults. `WALLET_DEBIT_POLICY` and
    /// `WALLET_EVENTS_FILE` override the file.
    pub fn load(wallet_dir: &Path) -> Result<Self> {
        let raw = read_settings(wallet_dir)?;
        let defaults = Config::default();

        let debit_policy = match std::env::var(DEBIT_POLICY_ENV).ok() {
            Some(value) => value
                .parse::<DebitPolicy>()
                .with_context(|| format!("invalid {}", DEBIT_POLICY_ENV))?,
            None => raw.ledger.debit_policy.unwrap_or(defaults.debit_policy),
        };

        let events_file = std::env::var_os(EVENTS_FILE_ENV)
            .map(PathBuf::from)
            .or(raw.ledger.events_file)
            .unwrap_or(defaults.events_file);

        Ok(Self {
            debit_policy,
            events_file,
            publish_attempts: raw
                .ledger
                .publish_attempts
                .unwrap_or(defaults.publish_attempts)
                .max(1),
        })
    }

    /// Save config to the wallet directory
    ///
    /// Preserves settings this crate doesn't manage.
    pub fn save(&self, wallet_dir: &Path) -> Result<()> {
        let mut settings = read_settings(wallet_dir)?;
        settings.ledger.debit_policy = Some(self.debit_policy);
        settings.ledger.events_file = Some(self.events_file.clone());
        settings.ledger.publish_attempts = Some(self.publish_attempts);

        std::fs::create_dir_all(wallet_dir)
            .with_context(|| format!("cannot create {}", wallet_dir.display()))?;
        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(wallet_dir.join(SETTINGS_FILE), content)?;
        Ok(())
    }

    /// Event log path resolved against the wallet directory
    pub fn events_path(&self, wallet_dir: &Path) -> PathBuf {
        if self.events_file.is_absolute() {
            self.events_file.clone()
        } else {
            wallet_dir.join(&self.events_file)
        }
    }
}

fn read_settings(wallet_dir: &Path) -> Result<SettingsFile> {
    let settings_path = wallet_dir.join(SETTINGS_FILE);
    if !settings_path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(&settings_path)
        .with_context(|| format!("cannot read {}", settings_path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("invalid settings in {}", settings_path.display()))
}
