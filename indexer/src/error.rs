use thiserror::Error;

use windex_store::StoreError;
use windex_types::{TxId, TypesError, WalletId, WalletStatus};

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("types error: {0}")]
    Types(#[from] windex_types::TypesError),

    #[error("crypto error: {0}")]
    Crypto(#[from] windex_crypto::CryptoError),

    #[error("store error: {0}")]
    Store(#[from] windex_store::StoreError),

    /// The event can never be applied; redelivery will not help.
    #[error("event rejected: {0}")]
    Rejected(String),

    #[error("full node does not report {0} as voided")]
    VoidNotConfirmed(TxId),

    #[error("wallet not found: {0}")]
    WalletNotFound(WalletId),

    #[error("wallet {id} is {status:?}, expected Ready")]
    WalletNotReady { id: WalletId, status: WalletStatus },

    #[error("proposal not found: {0}")]
    ProposalNotFound(String),

    #[error("invalid proposal: {0}")]
    InvalidProposal(String),

    #[error("full node error: {0}")]
    FullNode(String),

    #[error("notification error: {0}")]
    Notify(String),

    #[error("config error: {0}")]
    Config(String),
}

impl IndexerError {
    /// Whether redelivering the same input may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(StoreError::Amount(_)) => false,
            Self::Store(_) | Self::FullNode(_) | Self::VoidNotConfirmed(_) => true,
            _ => false,
        }
    }

    /// Whether the event being applied can never succeed: its amounts do not
    /// fit the balances they would move.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Rejected(_)
                | Self::Types(TypesError::Overflow | TypesError::InvalidAmount(_))
                | Self::Store(StoreError::Amount(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_is_a_rejection_not_a_retry() {
        let from_store = IndexerError::from(StoreError::Amount(TypesError::Overflow));
        assert!(from_store.is_rejection());
        assert!(!from_store.is_retryable());
        assert!(IndexerError::from(TypesError::Overflow).is_rejection());
        assert!(IndexerError::from(StoreError::Backend("busy".into())).is_retryable());
        assert!(!IndexerError::from(StoreError::Backend("busy".into())).is_rejection());
    }
}
