//! State enums for wallets and transaction proposals.

use serde::{Deserialize, Serialize};

/// Lifecycle of a wallet inside the indexer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WalletStatus {
    /// Wallet record exists; addresses and balances are still being built.
    Creating,
    /// Address generation and balance backfill completed.
    Ready,
    /// Loading failed after the retry budget was exhausted.
    Error,
}

impl WalletStatus {
    /// Whether the wallet may serve new-address and balance queries.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Lifecycle of a transaction proposal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalStatus {
    /// Draft holding UTXO reservations.
    Open,
    /// Broadcast succeeded.
    Sent,
    /// Broadcast was attempted and failed.
    SendError,
    /// Cancelled by the owner or swept for staleness.
    Cancelled,
}

impl ProposalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Open)
    }

    /// Whether entering this state gives the reserved UTXOs back to the wallet.
    ///
    /// A sent proposal keeps them: its inputs are about to be spent on-chain.
    pub fn releases_utxos(&self) -> bool {
        matches!(self, Self::SendError | Self::Cancelled)
    }
}
