//! Transaction proposals: UTXO reservations for drafts being signed.

use tracing::info;

use windex_crypto::sha256d;
use windex_store::{
    AddressStore, IndexStore, IndexTxn, ProposalId, ProposalStore, TxProposal, UtxoRef, UtxoStore,
};
use windex_types::{ProposalStatus, Timestamp, WalletId};

use crate::processor::Indexer;
use crate::wallet::require_ready;
use crate::IndexerError;

fn proposal_id(wallet_id: &WalletId, created_at: Timestamp, utxos: &[UtxoRef]) -> ProposalId {
    let mut preimage = wallet_id.as_str().as_bytes().to_vec();
    preimage.extend_from_slice(&created_at.as_secs().to_be_bytes());
    for utxo in utxos {
        preimage.extend_from_slice(utxo.tx_id.as_bytes());
        preimage.extend_from_slice(&utxo.index.to_be_bytes());
    }
    ProposalId::new(hex::encode(sha256d(&preimage)))
}

impl<S: IndexStore> Indexer<S> {
    /// Reserve `utxos` for a new proposal. Every UTXO must belong to the
    /// wallet and be live, unlocked and unreserved.
    pub fn create_proposal(
        &self,
        wallet_id: &WalletId,
        utxos: &[UtxoRef],
        now: Timestamp,
    ) -> Result<TxProposal, IndexerError> {
        if utxos.is_empty() {
            return Err(IndexerError::InvalidProposal("no inputs".into()));
        }
        let mut txn = self.store.write_txn()?;
        require_ready(&txn, wallet_id)?;
        let id = proposal_id(wallet_id, now, utxos);

        for outpoint in utxos {
            let row = txn
                .get_utxo(outpoint)?
                .ok_or_else(|| IndexerError::InvalidProposal(format!("unknown utxo {outpoint}")))?;
            let owner = txn.get_address(&row.address)?.and_then(|a| a.wallet_id);
            let problem = if owner.as_ref() != Some(wallet_id) {
                Some("does not belong to the wallet")
            } else if !row.is_live() {
                Some("is spent or voided")
            } else if row.locked {
                Some("is locked")
            } else if row.tx_proposal.is_some() {
                Some("is already reserved")
            } else {
                None
            };
            if let Some(problem) = problem {
                return Err(IndexerError::InvalidProposal(format!("utxo {outpoint} {problem}")));
            }
            txn.set_utxo_proposal(outpoint, Some(id.clone()))?;
        }

        let proposal = TxProposal {
            id,
            wallet_id: wallet_id.clone(),
            status: ProposalStatus::Open,
            created_at: now,
            updated_at: now,
        };
        txn.put_proposal(&proposal)?;
        txn.commit()?;
        info!(proposal = %proposal.id, wallet = %wallet_id, inputs = utxos.len(), "created proposal");
        Ok(proposal)
    }

    pub fn mark_sent(&self, id: &ProposalId, now: Timestamp) -> Result<TxProposal, IndexerError> {
        self.close_proposal(id, ProposalStatus::Sent, now)
    }

    pub fn mark_send_error(&self, id: &ProposalId, now: Timestamp) -> Result<TxProposal, IndexerError> {
        self.close_proposal(id, ProposalStatus::SendError, now)
    }

    pub fn cancel_proposal(&self, id: &ProposalId, now: Timestamp) -> Result<TxProposal, IndexerError> {
        self.close_proposal(id, ProposalStatus::Cancelled, now)
    }

    fn close_proposal(
        &self,
        id: &ProposalId,
        status: ProposalStatus,
        now: Timestamp,
    ) -> Result<TxProposal, IndexerError> {
        let mut txn = self.store.write_txn()?;
        let proposal = close_in(&mut txn, id, status, now)?;
        txn.commit()?;
        info!(proposal = %id, status = ?status, "closed proposal");
        Ok(proposal)
    }

    /// Cancel open proposals with no update for `ttl_secs`, releasing their
    /// reservations. Returns how many were cancelled.
    pub fn sweep_stale_proposals(&self, now: Timestamp, ttl_secs: u32) -> Result<usize, IndexerError> {
        let mut txn = self.store.write_txn()?;
        let stale = txn.open_proposals_updated_before(now.saturating_sub(ttl_secs))?;
        if stale.is_empty() {
            return Ok(0);
        }
        for proposal in &stale {
            close_in(&mut txn, &proposal.id, ProposalStatus::Cancelled, now)?;
        }
        txn.commit()?;
        info!(cancelled = stale.len(), "swept stale proposals");
        Ok(stale.len())
    }
}

fn close_in<T: IndexTxn>(
    txn: &mut T,
    id: &ProposalId,
    status: ProposalStatus,
    now: Timestamp,
) -> Result<TxProposal, IndexerError> {
    let mut proposal = txn
        .get_proposal(id)?
        .ok_or_else(|| IndexerError::ProposalNotFound(id.to_string()))?;
    if proposal.status.is_terminal() {
        return Err(IndexerError::InvalidProposal(format!(
            "proposal {id} is already {:?}",
            proposal.status
        )));
    }
    if status.releases_utxos() {
        for utxo in txn.proposal_utxos(id)? {
            txn.set_utxo_proposal(&utxo.outpoint(), None)?;
        }
    }
    proposal.status = status;
    proposal.updated_at = now;
    txn.put_proposal(&proposal)?;
    Ok(proposal)
}
