//! Indexer configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use windex_types::{Height, Network, TxId};

use crate::IndexerError;

/// Configuration for the indexer.
///
/// Can be loaded from a TOML file via [`IndexerConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Every field has a default, so an
/// empty file is a valid configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Which ledger network addresses are derived for.
    #[serde(default = "default_network")]
    pub network: Network,

    /// Data directory for the LMDB environment.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// LMDB map size in bytes.
    #[serde(default = "default_map_size")]
    pub map_size: usize,

    /// Blocks a block reward stays locked for.
    #[serde(default = "default_reward_lock")]
    pub reward_lock: Height,

    /// Address gap for wallets that do not choose one.
    #[serde(default = "default_max_gap")]
    pub max_gap: u16,

    /// Failed wallet loads tolerated before the wallet is marked `Error`.
    #[serde(default = "default_max_load_retries")]
    pub max_load_retries: u32,

    /// Genesis transactions and blocks, never indexed.
    #[serde(default = "default_genesis_tx_ids")]
    pub genesis_tx_ids: Vec<TxId>,

    /// Seconds an open proposal may go without updates before it is swept.
    #[serde(default = "default_proposal_ttl_secs")]
    pub proposal_ttl_secs: u32,

    /// Seconds between time-lock sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub time_sweep_interval_secs: u64,

    /// Seconds between stale-proposal sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub proposal_sweep_interval_secs: u64,

    /// Base URL of the full node's HTTP API.
    #[serde(default = "default_full_node_url")]
    pub full_node_url: String,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_network() -> Network {
    Network::Mainnet
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./windex_data")
}

fn default_map_size() -> usize {
    1 << 30
}

fn default_reward_lock() -> Height {
    300
}

fn default_max_gap() -> u16 {
    20
}

fn default_max_load_retries() -> u32 {
    3
}

const MAINNET_GENESIS: [&str; 3] = [
    "000006cb93385b8b87a545a1cbb6197e6caff600c12cc12fc54250d39c8088fc",
    "0002d4d2a15def7604688e1878ab681142a7b155cbe52a6b4e031250ae96db0a",
    "0002ad8d1519daaddc8e1a37b14aac0b045129c01832281fb1c02d873c7abbf9",
];

fn default_genesis_tx_ids() -> Vec<TxId> {
    MAINNET_GENESIS
        .iter()
        .filter_map(|hex| TxId::from_hex(hex).ok())
        .collect()
}

fn default_proposal_ttl_secs() -> u32 {
    5 * 60
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_full_node_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl IndexerConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, IndexerError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| IndexerError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, IndexerError> {
        toml::from_str(s).map_err(|e| IndexerError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, IndexerError> {
        toml::to_string_pretty(self).map_err(|e| IndexerError::Config(e.to_string()))
    }

    pub fn is_genesis(&self, tx_id: &TxId) -> bool {
        self.genesis_tx_ids.contains(tx_id)
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            data_dir: default_data_dir(),
            map_size: default_map_size(),
            reward_lock: default_reward_lock(),
            max_gap: default_max_gap(),
            max_load_retries: default_max_load_retries(),
            genesis_tx_ids: default_genesis_tx_ids(),
            proposal_ttl_secs: default_proposal_ttl_secs(),
            time_sweep_interval_secs: default_sweep_interval_secs(),
            proposal_sweep_interval_secs: default_sweep_interval_secs(),
            full_node_url: default_full_node_url(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = IndexerConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        let parsed = IndexerConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.reward_lock, config.reward_lock);
        assert_eq!(parsed.genesis_tx_ids, config.genesis_tx_ids);
        assert_eq!(parsed.network, Network::Mainnet);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = IndexerConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.reward_lock, 300);
        assert_eq!(config.max_gap, 20);
        assert_eq!(config.genesis_tx_ids.len(), 3);
        assert_eq!(config.log_format, "human");
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            network = "testnet"
            reward_lock = 1
            genesis_tx_ids = []
        "#;
        let config = IndexerConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.network, Network::Testnet);
        assert_eq!(config.reward_lock, 1);
        assert!(config.genesis_tx_ids.is_empty());
        assert_eq!(config.max_load_retries, 3);
    }

    #[test]
    fn genesis_ids_are_recognised() {
        let config = IndexerConfig::default();
        let genesis = TxId::from_hex(MAINNET_GENESIS[0]).unwrap();
        assert!(config.is_genesis(&genesis));
        assert!(!config.is_genesis(&TxId::ZERO));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        assert!(matches!(
            IndexerConfig::from_toml_str("reward_lock = \"soon\""),
            Err(IndexerError::Config(_))
        ));
    }
}
