//! Transaction record storage trait.

use crate::{StoreError, UtxoRef};
use serde::{Deserialize, Serialize};
use windex_types::{TxEvent, TxId};

/// A transaction the indexer has applied.
///
/// The full event is kept so a later void can be reversed without asking the
/// full node what the transaction spent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRecord {
    pub event: TxEvent,
    pub voided: bool,
    /// Still-locked outputs this transaction spent, which were unlocked on
    /// the spot. A void puts their locks back.
    #[serde(default)]
    pub forced_unlocks: Vec<UtxoRef>,
}

impl TxRecord {
    pub fn tx_id(&self) -> &TxId {
        &self.event.tx_id
    }
}

/// Trait for transaction records.
pub trait TransactionStore {
    fn get_tx(&self, tx_id: &TxId) -> Result<Option<TxRecord>, StoreError>;

    fn put_tx(&mut self, record: &TxRecord) -> Result<(), StoreError>;
}
