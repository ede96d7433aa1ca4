//! Network identifier.

use serde::{Deserialize, Serialize};

/// Identifies which ledger network the indexer follows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// The production network.
    Mainnet,
    /// The public test network.
    Testnet,
    /// A private or local development network.
    Privatenet,
}

impl Network {
    /// Version byte prefixed to pay-to-pubkey-hash addresses.
    pub fn p2pkh_version(&self) -> u8 {
        match self {
            Self::Mainnet => 0x28,
            Self::Testnet | Self::Privatenet => 0x49,
        }
    }

    /// Version byte prefixed to pay-to-script-hash addresses.
    pub fn p2sh_version(&self) -> u8 {
        match self {
            Self::Mainnet => 0x64,
            Self::Testnet | Self::Privatenet => 0x87,
        }
    }

    /// Human-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Privatenet => "privatenet",
        }
    }
}
