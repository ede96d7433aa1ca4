//! Transaction history storage trait.

use crate::StoreError;
use serde::{Deserialize, Serialize};
use windex_types::{Address, Timestamp, TokenId, TxId, WalletId};

/// One row per `(key, tx, token)`: the net effect of a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxHistoryEntry {
    pub tx_id: TxId,
    pub token_id: TokenId,
    /// Signed net amount (unlocked + locked).
    pub balance: i64,
    pub timestamp: Timestamp,
    pub voided: bool,
}

/// Trait for address and wallet history.
///
/// Appends are keyed on `(key, tx_id, token_id)`; appending an existing key
/// replaces the row, so re-delivery cannot duplicate history.
pub trait HistoryStore {
    fn append_address_history(
        &mut self,
        address: &Address,
        entry: &TxHistoryEntry,
    ) -> Result<(), StoreError>;

    /// History of an address, oldest first.
    fn address_history(&self, address: &Address) -> Result<Vec<TxHistoryEntry>, StoreError>;

    /// Mark every row of `tx_id` voided. Returns the number of rows touched.
    fn void_address_history(&mut self, address: &Address, tx_id: &TxId) -> Result<usize, StoreError>;

    fn append_wallet_history(
        &mut self,
        wallet_id: &WalletId,
        entry: &TxHistoryEntry,
    ) -> Result<(), StoreError>;

    /// History of a wallet, oldest first.
    fn wallet_history(&self, wallet_id: &WalletId) -> Result<Vec<TxHistoryEntry>, StoreError>;

    fn void_wallet_history(&mut self, wallet_id: &WalletId, tx_id: &TxId) -> Result<usize, StoreError>;
}
