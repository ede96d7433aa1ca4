//! Transaction proposal storage trait.

use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use windex_types::{ProposalStatus, Timestamp, WalletId};

/// Identifies a proposal.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalId(String);

impl ProposalId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A not-yet-broadcast transaction draft.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxProposal {
    pub id: ProposalId,
    pub wallet_id: WalletId,
    pub status: ProposalStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Trait for proposal storage.
pub trait ProposalStore {
    fn get_proposal(&self, id: &ProposalId) -> Result<Option<TxProposal>, StoreError>;

    fn put_proposal(&mut self, proposal: &TxProposal) -> Result<(), StoreError>;

    /// Open proposals whose last update is strictly before `cutoff`.
    fn open_proposals_updated_before(&self, cutoff: Timestamp) -> Result<Vec<TxProposal>, StoreError>;
}
