//! LMDB implementation of HistoryStore.
//!
//! Key format: `owner ++ 0 ++ timestamp ++ tx_id ++ token_id`. A transaction
//! always carries the same timestamp, so re-appending the same
//! `(owner, tx, token)` lands on the same key and replaces the row.

use heed::types::Bytes;
use heed::Database;

use windex_store::{HistoryStore, StoreError, TxHistoryEntry};
use windex_types::{Address, TxId, WalletId};

use crate::keys::{text_key, text_prefix};
use crate::txn::LmdbTxn;
use crate::LmdbError;

fn history_key(owner: &str, entry: &TxHistoryEntry) -> Vec<u8> {
    let mut rest = entry.timestamp.as_secs().to_be_bytes().to_vec();
    rest.extend_from_slice(entry.tx_id.as_bytes());
    rest.extend_from_slice(entry.token_id.as_str().as_bytes());
    text_key(owner, &rest)
}

impl LmdbTxn<'_> {
    fn void_history_rows(
        &mut self,
        db: Database<Bytes, Bytes>,
        owner: &str,
        tx_id: &TxId,
    ) -> Result<usize, StoreError> {
        let mut touched = 0;
        for (key, val) in self.scan_prefix(db, &text_prefix(owner))? {
            let mut entry: TxHistoryEntry = bincode::deserialize(&val).map_err(LmdbError::from)?;
            if &entry.tx_id == tx_id && !entry.voided {
                entry.voided = true;
                self.put_value(db, &key, &entry)?;
                touched += 1;
            }
        }
        Ok(touched)
    }
}

impl HistoryStore for LmdbTxn<'_> {
    fn append_address_history(
        &mut self,
        address: &Address,
        entry: &TxHistoryEntry,
    ) -> Result<(), StoreError> {
        let key = history_key(address.as_str(), entry);
        self.put_value(self.env.address_history_db, &key, entry)
    }

    fn address_history(&self, address: &Address) -> Result<Vec<TxHistoryEntry>, StoreError> {
        self.values_with_prefix(self.env.address_history_db, &text_prefix(address.as_str()))
    }

    fn void_address_history(&mut self, address: &Address, tx_id: &TxId) -> Result<usize, StoreError> {
        self.void_history_rows(self.env.address_history_db, address.as_str(), tx_id)
    }

    fn append_wallet_history(
        &mut self,
        wallet_id: &WalletId,
        entry: &TxHistoryEntry,
    ) -> Result<(), StoreError> {
        let key = history_key(wallet_id.as_str(), entry);
        self.put_value(self.env.wallet_history_db, &key, entry)
    }

    fn wallet_history(&self, wallet_id: &WalletId) -> Result<Vec<TxHistoryEntry>, StoreError> {
        self.values_with_prefix(self.env.wallet_history_db, &text_prefix(wallet_id.as_str()))
    }

    fn void_wallet_history(&mut self, wallet_id: &WalletId, tx_id: &TxId) -> Result<usize, StoreError> {
        self.void_history_rows(self.env.wallet_history_db, wallet_id.as_str(), tx_id)
    }
}
