//! UTXO storage trait.

use crate::proposal::ProposalId;
use crate::StoreError;
use serde::{Deserialize, Serialize};
use windex_types::{Address, Height, OutputValue, Timestamp, TokenId, TxId};

/// Primary key of a UTXO.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UtxoRef {
    pub tx_id: TxId,
    pub index: u32,
}

impl UtxoRef {
    pub fn new(tx_id: TxId, index: u32) -> Self {
        Self { tx_id, index }
    }
}

impl std::fmt::Display for UtxoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.index)
    }
}

/// A transaction output as tracked by the indexer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub tx_id: TxId,
    pub index: u32,
    pub token_id: TokenId,
    pub address: Address,
    pub value: OutputValue,
    pub timelock: Option<Timestamp>,
    pub heightlock: Option<Height>,
    /// Lock state as last resolved. Flips to `false` once; only a void of a
    /// transaction that spent the row while locked flips it back.
    pub locked: bool,
    pub spent_by: Option<TxId>,
    /// Proposal holding a reservation on this output.
    pub tx_proposal: Option<ProposalId>,
    pub voided: bool,
}

impl Utxo {
    pub fn outpoint(&self) -> UtxoRef {
        UtxoRef::new(self.tx_id, self.index)
    }

    /// Unspent and not voided.
    pub fn is_live(&self) -> bool {
        self.spent_by.is_none() && !self.voided
    }

    /// Combine a freshly built row with whatever is already stored under the
    /// same key. Fields owned by later events (spend, unlock, reservation) win
    /// over the fresh row, so re-delivery never re-locks or un-spends.
    pub fn upsert_onto(self, existing: Option<&Utxo>) -> Utxo {
        match existing {
            None => self,
            Some(prev) => Utxo {
                locked: self.locked && prev.locked,
                spent_by: prev.spent_by.or(self.spent_by),
                tx_proposal: prev.tx_proposal.clone().or(self.tx_proposal),
                voided: prev.voided && self.voided,
                ..self
            },
        }
    }
}

/// Trait for UTXO storage.
///
/// Backends implement the keyed reads/writes and the lock-index scans; the
/// single-field mutations have default implementations on top of them.
pub trait UtxoStore {
    fn get_utxo(&self, outpoint: &UtxoRef) -> Result<Option<Utxo>, StoreError>;

    /// Write a row as-is, maintaining any secondary indexes.
    fn put_utxo(&mut self, utxo: &Utxo) -> Result<(), StoreError>;

    /// Every output created by `tx_id`, in index order.
    fn utxos_by_tx(&self, tx_id: &TxId) -> Result<Vec<Utxo>, StoreError>;

    /// Live UTXOs of an address, optionally restricted to one token.
    fn address_utxos(
        &self,
        address: &Address,
        token: Option<&TokenId>,
    ) -> Result<Vec<Utxo>, StoreError>;

    /// Live, still-locked UTXOs with `heightlock <= height`.
    fn utxos_locked_at_or_before_height(&self, height: Height) -> Result<Vec<Utxo>, StoreError>;

    /// Live, still-locked UTXOs with `timelock <= time`.
    fn utxos_locked_at_or_before_time(&self, time: Timestamp) -> Result<Vec<Utxo>, StoreError>;

    /// UTXOs reserved by a proposal.
    fn proposal_utxos(&self, proposal: &ProposalId) -> Result<Vec<Utxo>, StoreError>;

    /// Insert or merge a row (see [`Utxo::upsert_onto`]).
    fn upsert_utxo(&mut self, utxo: Utxo) -> Result<Utxo, StoreError> {
        let existing = self.get_utxo(&utxo.outpoint())?;
        let merged = utxo.upsert_onto(existing.as_ref());
        self.put_utxo(&merged)?;
        Ok(merged)
    }

    /// Mark an output spent. Returns the row as it was before the update.
    fn mark_spent(&mut self, outpoint: &UtxoRef, spent_by: TxId) -> Result<Option<Utxo>, StoreError> {
        let Some(prev) = self.get_utxo(outpoint)? else {
            return Ok(None);
        };
        let mut next = prev.clone();
        next.spent_by = Some(spent_by);
        next.tx_proposal = None;
        self.put_utxo(&next)?;
        Ok(Some(prev))
    }

    /// Undo a spend (only if it was spent by `spent_by`).
    fn unspend(&mut self, outpoint: &UtxoRef, spent_by: &TxId) -> Result<bool, StoreError> {
        match self.get_utxo(outpoint)? {
            Some(mut utxo) if utxo.spent_by.as_ref() == Some(spent_by) => {
                utxo.spent_by = None;
                self.put_utxo(&utxo)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Flip a locked row to unlocked. Returns `false` if it was not locked.
    fn unlock_utxo(&mut self, outpoint: &UtxoRef) -> Result<bool, StoreError> {
        match self.get_utxo(outpoint)? {
            Some(mut utxo) if utxo.locked => {
                utxo.locked = false;
                self.put_utxo(&utxo)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Flip an unlocked row back to locked. Returns `false` if it was
    /// already locked.
    fn relock_utxo(&mut self, outpoint: &UtxoRef) -> Result<bool, StoreError> {
        match self.get_utxo(outpoint)? {
            Some(mut utxo) if !utxo.locked => {
                utxo.locked = true;
                self.put_utxo(&utxo)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn void_utxo(&mut self, outpoint: &UtxoRef) -> Result<bool, StoreError> {
        match self.get_utxo(outpoint)? {
            Some(mut utxo) if !utxo.voided => {
                utxo.voided = true;
                utxo.tx_proposal = None;
                self.put_utxo(&utxo)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn set_utxo_proposal(
        &mut self,
        outpoint: &UtxoRef,
        proposal: Option<ProposalId>,
    ) -> Result<(), StoreError> {
        let mut utxo = self
            .get_utxo(outpoint)?
            .ok_or_else(|| StoreError::NotFound(format!("utxo {outpoint}")))?;
        utxo.tx_proposal = proposal;
        self.put_utxo(&utxo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utxo(locked: bool) -> Utxo {
        Utxo {
            tx_id: TxId::new([1; 32]),
            index: 0,
            token_id: TokenId::native(),
            address: Address::new("A"),
            value: OutputValue::Amount(10),
            timelock: None,
            heightlock: Some(5),
            locked,
            spent_by: None,
            tx_proposal: None,
            voided: false,
        }
    }

    #[test]
    fn upsert_never_relocks() {
        let stored = utxo(false);
        let merged = utxo(true).upsert_onto(Some(&stored));
        assert!(!merged.locked);
    }

    #[test]
    fn upsert_keeps_spend() {
        let mut stored = utxo(true);
        stored.spent_by = Some(TxId::new([9; 32]));
        let merged = utxo(true).upsert_onto(Some(&stored));
        assert_eq!(merged.spent_by, Some(TxId::new([9; 32])));
    }

    #[test]
    fn upsert_fresh_row_is_unchanged() {
        assert_eq!(utxo(true).upsert_onto(None), utxo(true));
    }
}
