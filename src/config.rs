//! Configuration Module
//!
//! This module defines all configuration structures for solscribe.
//! Configuration is loaded from TOML files and parsed using serde; every
//! engine receives the section it needs at construction time.
//!
//! The signing secret never lives in the file. It is read from the
//! `SOLSCRIBE_SECRET_KEY` environment variable (a `.env` file is honoured).

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::retry::{Backoff, RetryPolicy};
use crate::types::{Address, DisbursementEntry};

/// Environment variable holding the base58 signing secret
pub const SECRET_KEY_ENV: &str = "SOLSCRIBE_SECRET_KEY";

/// Main configuration structure
///
/// # Example TOML
/// ```toml
/// [ledger]
/// endpoint = "https://api.devnet.solana.com"
///
/// [batch]
/// page_size = 20
/// page_delay_ms = 1000
///
/// [retry]
/// max_attempts = 3
/// delay_ms = 5000
///
/// [issuance]
/// count = 10
/// collection = "..."
///
/// [storage]
/// gateway_url = "https://devnet.irys.xyz"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ledger: LedgerConfig,
    pub batch: BatchConfig,
    pub retry: RetryConfig,
    pub issuance: IssuanceConfig,
    pub storage: StorageConfig,
    pub registry: RegistryConfig,
}

/// Ledger connection configuration
///
/// # Fields
/// - `endpoint`: JSON-RPC endpoint of the ledger gateway
/// - `explorer_url`: prefix used when logging transaction links
/// - `request_timeout_ms`: per-request HTTP timeout
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub endpoint: String,
    pub explorer_url: String,
    pub request_timeout_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.mainnet-beta.solana.com".to_string(),
            explorer_url: "https://solscan.io/tx".to_string(),
            request_timeout_ms: 60_000,
        }
    }
}

/// Disbursement paging configuration
///
/// # Fields
/// - `page_size`: recipients per submitted operation; `0` submits the whole
///   list as a single page
/// - `page_delay_ms`: pause between pages
/// - `decimals`: default token decimals when the command does not give one
/// - `recipients`: inline recipient list, used when no list file is given
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub page_size: usize,
    pub page_delay_ms: u64,
    pub decimals: u8,
    pub recipients: Vec<DisbursementEntry>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            page_delay_ms: 1_000,
            decimals: 8,
            recipients: Vec::new(),
        }
    }
}

impl BatchConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

/// Retry policy shared by the disbursement and issuance engines
///
/// # Fields
/// - `max_attempts`: total attempts per unit of work (page or entity)
/// - `delay_ms`: delay before the second attempt
/// - `backoff`: `"fixed"` or `"exponential"`
/// - `max_delay_ms`: cap for exponential backoff
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_ms: u64,
    pub backoff: String,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 5_000,
            backoff: "fixed".to_string(),
            max_delay_ms: 60_000,
        }
    }
}

impl RetryConfig {
    /// Build the policy described by this section
    pub fn policy(&self) -> anyhow::Result<RetryPolicy> {
        let delay = Duration::from_millis(self.delay_ms);
        let backoff = match self.backoff.to_ascii_lowercase().as_str() {
            "fixed" => Backoff::Fixed(delay),
            "exponential" => Backoff::Exponential {
                initial: delay,
                max: Duration::from_millis(self.max_delay_ms),
            },
            other => anyhow::bail!("unknown backoff shape: {other}"),
        };
        if self.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }
        Ok(RetryPolicy::new(self.max_attempts, backoff))
    }
}

/// Inscription NFT issuance configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IssuanceConfig {
    /// Number of entities to create per run
    pub count: u32,
    pub name: String,
    pub symbol: String,
    pub uri: String,
    /// Collection every created NFT is verified into
    pub collection: Option<Address>,
    /// Payload written into each inscription
    pub inscription: String,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            count: 10,
            name: String::new(),
            symbol: String::new(),
            uri: String::new(),
            collection: None,
            inscription: String::new(),
        }
    }
}

/// Content store configuration
///
/// # Fields
/// - `node_url`: upload node (e.g. "https://node2.irys.xyz")
/// - `gateway_url`: public gateway prefix for uploaded content
/// - `token`: payment currency name used in node routes
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub node_url: String,
    pub gateway_url: String,
    pub token: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            node_url: "https://node2.irys.xyz".to_string(),
            gateway_url: "https://gateway.irys.xyz".to_string(),
            token: "solana".to_string(),
        }
    }
}

/// Checkpoint registry configuration
///
/// # Fields
/// - `url`: database connection URL (e.g. "sqlite://solscribe.db"); when
///   absent, progress is only tracked in memory for the current process
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub url: Option<String>,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Returns
    /// * `Ok(Config)` if the file was successfully loaded and parsed
    /// * `Err` if the file couldn't be read or the TOML is invalid
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Load a recipient list from a `.json` or `.toml` file
///
/// JSON files hold a top-level array of `{ "address", "amount" }` records;
/// TOML files hold `[[recipients]]` tables.
pub fn load_recipients(path: impl AsRef<Path>) -> anyhow::Result<Vec<DisbursementEntry>> {
    #[derive(Deserialize)]
    struct RecipientFile {
        recipients: Vec<DisbursementEntry>,
    }

    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let entries = if is_json {
        serde_json::from_str(&content)?
    } else {
        toml::from_str::<RecipientFile>(&content)?.recipients
    };
    Ok(entries)
}

/// Load a plain list of owner addresses, one per line
///
/// Blank lines and lines starting with `#` are skipped.
pub fn load_addresses(path: impl AsRef<Path>) -> anyhow::Result<Vec<Address>> {
    let content = fs::read_to_string(path.as_ref())?;
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| Address::parse(line).map_err(anyhow::Error::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const ADDR: &str = "11111111111111111111111111111111";

    #[test]
    fn test_defaults_when_sections_missing() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.batch.page_size, 20);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.issuance.count, 10);
        assert!(config.registry.url.is_none());
    }

    #[test]
    fn test_load_full_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[ledger]
endpoint = "http://localhost:8899"

[batch]
page_size = 2
page_delay_ms = 0

[[batch.recipients]]
address = "{ADDR}"
amount = "1.5"

[retry]
max_attempts = 4
delay_ms = 10
backoff = "exponential"
max_delay_ms = 40

[issuance]
count = 2
collection = "{ADDR}"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.ledger.endpoint, "http://localhost:8899");
        assert_eq!(config.batch.page_size, 2);
        assert_eq!(config.batch.recipients.len(), 1);
        assert_eq!(config.batch.recipients[0].amount, "1.5");
        assert_eq!(config.issuance.collection.unwrap().as_str(), ADDR);

        let policy = config.retry.policy().unwrap();
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.delay_for(3), Duration::from_millis(40));
    }

    #[test]
    fn test_rejects_invalid_address_in_config() {
        let result: Result<Config, _> = toml::from_str(
            r#"
[issuance]
collection = "not-an-address"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_unknown_backoff() {
        let retry = RetryConfig {
            backoff: "linear".to_string(),
            ..RetryConfig::default()
        };
        assert!(retry.policy().is_err());
    }

    #[test]
    fn test_load_recipients_json_and_toml() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("list.json");
        fs::write(
            &json_path,
            format!(r#"[{{"address": "{ADDR}", "amount": "100"}}, {{"recipient": "{ADDR}", "amount": "0.5"}}]"#),
        )
        .unwrap();
        let entries = load_recipients(&json_path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].amount, "0.5");

        let toml_path = dir.path().join("list.toml");
        fs::write(
            &toml_path,
            format!("[[recipients]]\naddress = \"{ADDR}\"\namount = \"3\"\n"),
        )
        .unwrap();
        let entries = load_recipients(&toml_path).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_load_addresses_skips_comments() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# holders\n{ADDR}\n\n  {ADDR}  ").unwrap();
        let addresses = load_addresses(file.path()).unwrap();
        assert_eq!(addresses.len(), 2);
    }
}
