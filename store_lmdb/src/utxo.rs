//! LMDB implementation of UtxoStore.
//!
//! Rows live in `utxos_db`. Four index databases are kept in step by
//! [`UtxoStore::put_utxo`]: by address, by heightlock, by timelock and by
//! reserving proposal. The lock indexes only hold rows that are locked and
//! live, so the expiry scans never see unlocked, spent or voided outputs.

use heed::types::Bytes;
use heed::Database;

use windex_store::{ProposalId, StoreError, Utxo, UtxoRef, UtxoStore};
use windex_types::{Address, Height, Timestamp, TokenId, TxId};

use crate::keys::{numbered_outpoint_key, outpoint_key, outpoint_suffix, text_key, text_prefix};
use crate::txn::LmdbTxn;

/// Index keys a row contributes, per index database.
fn index_entries(txn: &LmdbTxn<'_>, utxo: &Utxo) -> Vec<(Database<Bytes, Bytes>, Vec<u8>)> {
    let outpoint = utxo.outpoint();
    let mut entries = vec![(
        txn.env.address_utxos_db,
        text_key(utxo.address.as_str(), &outpoint_key(&outpoint)),
    )];
    if utxo.locked && utxo.is_live() {
        if let Some(height) = utxo.heightlock {
            entries.push((txn.env.height_locks_db, numbered_outpoint_key(height, &outpoint)));
        }
        if let Some(time) = utxo.timelock {
            entries.push((
                txn.env.time_locks_db,
                numbered_outpoint_key(time.as_secs(), &outpoint),
            ));
        }
    }
    if let Some(proposal) = &utxo.tx_proposal {
        entries.push((
            txn.env.proposal_utxos_db,
            text_key(proposal.as_str(), &outpoint_key(&outpoint)),
        ));
    }
    entries
}

impl LmdbTxn<'_> {
    /// Resolve index keys to rows.
    fn rows_for_index_keys(&self, keys: Vec<(Vec<u8>, Vec<u8>)>) -> Result<Vec<Utxo>, StoreError> {
        let mut rows = Vec::with_capacity(keys.len());
        for (key, _) in keys {
            let outpoint = outpoint_suffix(&key)
                .ok_or_else(|| StoreError::Corruption("short utxo index key".into()))?;
            let row = self
                .get_utxo(&outpoint)?
                .ok_or_else(|| StoreError::Corruption(format!("dangling index entry {outpoint}")))?;
            rows.push(row);
        }
        Ok(rows)
    }

    fn locked_below(&self, db: Database<Bytes, Bytes>, bound: u32) -> Result<Vec<Utxo>, StoreError> {
        let keys = match bound.checked_add(1) {
            Some(upper) => self.scan_below(db, &upper.to_be_bytes())?,
            None => self.scan_prefix(db, &[])?,
        };
        Ok(self
            .rows_for_index_keys(keys)?
            .into_iter()
            .filter(|u| u.locked && u.is_live())
            .collect())
    }
}

impl UtxoStore for LmdbTxn<'_> {
    fn get_utxo(&self, outpoint: &UtxoRef) -> Result<Option<Utxo>, StoreError> {
        self.get_value(self.env.utxos_db, &outpoint_key(outpoint))
    }

    fn put_utxo(&mut self, utxo: &Utxo) -> Result<(), StoreError> {
        if let Some(previous) = self.get_utxo(&utxo.outpoint())? {
            for (db, key) in index_entries(self, &previous) {
                self.delete(db, &key)?;
            }
        }
        for (db, key) in index_entries(self, utxo) {
            self.put_raw(db, &key, &[])?;
        }
        self.put_value(self.env.utxos_db, &outpoint_key(&utxo.outpoint()), utxo)
    }

    fn utxos_by_tx(&self, tx_id: &TxId) -> Result<Vec<Utxo>, StoreError> {
        self.values_with_prefix(self.env.utxos_db, tx_id.as_bytes())
    }

    fn address_utxos(
        &self,
        address: &Address,
        token: Option<&TokenId>,
    ) -> Result<Vec<Utxo>, StoreError> {
        let keys = self.scan_prefix(self.env.address_utxos_db, &text_prefix(address.as_str()))?;
        Ok(self
            .rows_for_index_keys(keys)?
            .into_iter()
            .filter(|u| u.is_live() && token.map_or(true, |t| &u.token_id == t))
            .collect())
    }

    fn utxos_locked_at_or_before_height(&self, height: Height) -> Result<Vec<Utxo>, StoreError> {
        self.locked_below(self.env.height_locks_db, height)
    }

    fn utxos_locked_at_or_before_time(&self, time: Timestamp) -> Result<Vec<Utxo>, StoreError> {
        self.locked_below(self.env.time_locks_db, time.as_secs())
    }

    fn proposal_utxos(&self, proposal: &ProposalId) -> Result<Vec<Utxo>, StoreError> {
        let keys = self.scan_prefix(self.env.proposal_utxos_db, &text_prefix(proposal.as_str()))?;
        self.rows_for_index_keys(keys)
    }
}

#[cfg(test)]
mod tests {
    use windex_store::{IndexStore, IndexTxn, ProposalId, Utxo, UtxoRef, UtxoStore};
    use windex_types::{Address, OutputValue, Timestamp, TokenId, TxId};

    use crate::LmdbEnvironment;

    fn open_test_env() -> (tempfile::TempDir, LmdbEnvironment) {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 16, 1 << 24).unwrap();
        (dir, env)
    }

    fn utxo(tx: u8, index: u32, address: &str) -> Utxo {
        Utxo {
            tx_id: TxId::new([tx; 32]),
            index,
            token_id: TokenId::native(),
            address: Address::from(address),
            value: OutputValue::Amount(100),
            timelock: None,
            heightlock: None,
            locked: false,
            spent_by: None,
            tx_proposal: None,
            voided: false,
        }
    }

    #[test]
    fn address_scan_skips_spent_and_other_addresses() {
        let (_dir, env) = open_test_env();
        let mut txn = env.write_txn().unwrap();
        txn.put_utxo(&utxo(1, 0, "A1")).unwrap();
        txn.put_utxo(&utxo(1, 1, "A10")).unwrap();
        txn.put_utxo(&utxo(2, 0, "A1")).unwrap();
        txn.mark_spent(&UtxoRef::new(TxId::new([2; 32]), 0), TxId::new([3; 32]))
            .unwrap();
        txn.commit().unwrap();

        let txn = env.write_txn().unwrap();
        let rows = txn.address_utxos(&Address::from("A1"), None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].outpoint(), UtxoRef::new(TxId::new([1; 32]), 0));
        assert_eq!(txn.utxos_by_tx(&TxId::new([1; 32])).unwrap().len(), 2);
    }

    #[test]
    fn lock_indexes_follow_lock_state() {
        let (_dir, env) = open_test_env();
        let mut txn = env.write_txn().unwrap();
        let mut by_height = utxo(1, 0, "A");
        by_height.heightlock = Some(10);
        by_height.locked = true;
        let mut by_time = utxo(1, 1, "A");
        by_time.timelock = Some(Timestamp::new(500));
        by_time.locked = true;
        txn.put_utxo(&by_height).unwrap();
        txn.put_utxo(&by_time).unwrap();

        assert!(txn.utxos_locked_at_or_before_height(9).unwrap().is_empty());
        assert_eq!(txn.utxos_locked_at_or_before_height(10).unwrap().len(), 1);
        assert!(txn.utxos_locked_at_or_before_time(Timestamp::new(499)).unwrap().is_empty());
        assert_eq!(txn.utxos_locked_at_or_before_time(Timestamp::new(500)).unwrap().len(), 1);
        assert_eq!(txn.utxos_locked_at_or_before_height(u32::MAX).unwrap().len(), 1);

        assert!(txn.unlock_utxo(&by_height.outpoint()).unwrap());
        assert!(!txn.unlock_utxo(&by_height.outpoint()).unwrap());
        assert!(txn.utxos_locked_at_or_before_height(10).unwrap().is_empty());
    }

    #[test]
    fn proposal_index_tracks_reservations() {
        let (_dir, env) = open_test_env();
        let mut txn = env.write_txn().unwrap();
        let row = utxo(4, 0, "A");
        let proposal = ProposalId::new("p1");
        txn.put_utxo(&row).unwrap();
        txn.set_utxo_proposal(&row.outpoint(), Some(proposal.clone())).unwrap();
        assert_eq!(txn.proposal_utxos(&proposal).unwrap().len(), 1);
        txn.set_utxo_proposal(&row.outpoint(), None).unwrap();
        assert!(txn.proposal_utxos(&proposal).unwrap().is_empty());
    }
}
