//! Nullable store: thread-safe in-memory storage for testing.
//!
//! A unit of work holds the store's mutex for its whole lifetime and edits a
//! private copy of the state; `commit` swaps the copy in, dropping discards
//! it. That gives the same all-or-nothing, one-writer-at-a-time behaviour as
//! the LMDB backend.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use windex_store::{
    AddressInfo, AddressStore, BalanceStore, HistoryStore, IndexStore, IndexTxn, MetaStore,
    ProposalId, ProposalStore, StoreError, TokenBalance, TokenInfo, TokenStore, TransactionStore,
    TxHistoryEntry, TxProposal, TxRecord, Utxo, UtxoRef, UtxoStore, Wallet, WalletStore,
};
use windex_types::{
    Address, Height, ProposalStatus, Timestamp, TokenId, TxId, WalletId,
};

type HistoryKey = (Timestamp, TxId, TokenId);

#[derive(Clone, Default)]
struct State {
    utxos: BTreeMap<UtxoRef, Utxo>,
    addresses: BTreeMap<Address, AddressInfo>,
    address_balances: BTreeMap<(Address, TokenId), TokenBalance>,
    wallet_balances: BTreeMap<(WalletId, TokenId), TokenBalance>,
    address_history: BTreeMap<Address, BTreeMap<HistoryKey, TxHistoryEntry>>,
    wallet_history: BTreeMap<WalletId, BTreeMap<HistoryKey, TxHistoryEntry>>,
    wallets: BTreeMap<WalletId, Wallet>,
    txs: BTreeMap<TxId, TxRecord>,
    tokens: BTreeMap<TokenId, TokenInfo>,
    proposals: BTreeMap<ProposalId, TxProposal>,
    meta: BTreeMap<String, Vec<u8>>,
}

/// An in-memory implementation of every store trait.
#[derive(Default)]
pub struct NullStore {
    state: Mutex<State>,
    failing_commits: AtomicU32,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every commit fail (the unit of work is rolled back).
    pub fn set_fail_commits(&self, fail: bool) {
        let n = if fail { u32::MAX } else { 0 };
        self.failing_commits.store(n, Ordering::SeqCst);
    }

    /// Make only the next `n` commits fail.
    pub fn fail_next_commits(&self, n: u32) {
        self.failing_commits.store(n, Ordering::SeqCst);
    }

    /// Number of stored UTXO rows, including spent and voided ones.
    pub fn utxo_count(&self) -> usize {
        self.state.lock().unwrap().utxos.len()
    }
}

/// A unit of work over a [`NullStore`].
pub struct NullTxn<'a> {
    guard: MutexGuard<'a, State>,
    work: State,
    failing_commits: &'a AtomicU32,
}

impl IndexStore for NullStore {
    type Txn<'a> = NullTxn<'a>;

    fn write_txn(&self) -> Result<NullTxn<'_>, StoreError> {
        let guard = self
            .state
            .lock()
            .map_err(|_| StoreError::Backend("null store mutex poisoned".into()))?;
        let work = guard.clone();
        Ok(NullTxn {
            guard,
            work,
            failing_commits: &self.failing_commits,
        })
    }
}

impl IndexTxn for NullTxn<'_> {
    fn commit(mut self) -> Result<(), StoreError> {
        let remaining = self.failing_commits.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != u32::MAX {
                self.failing_commits.store(remaining - 1, Ordering::SeqCst);
            }
            return Err(StoreError::Backend("null store set to fail commits".into()));
        }
        *self.guard = std::mem::take(&mut self.work);
        Ok(())
    }
}

fn history_key(entry: &TxHistoryEntry) -> HistoryKey {
    (entry.timestamp, entry.tx_id, entry.token_id.clone())
}

fn void_rows(rows: Option<&mut BTreeMap<HistoryKey, TxHistoryEntry>>, tx_id: &TxId) -> usize {
    let Some(rows) = rows else { return 0 };
    let mut touched = 0;
    for entry in rows.values_mut() {
        if &entry.tx_id == tx_id && !entry.voided {
            entry.voided = true;
            touched += 1;
        }
    }
    touched
}

impl UtxoStore for NullTxn<'_> {
    fn get_utxo(&self, outpoint: &UtxoRef) -> Result<Option<Utxo>, StoreError> {
        Ok(self.work.utxos.get(outpoint).cloned())
    }

    fn put_utxo(&mut self, utxo: &Utxo) -> Result<(), StoreError> {
        self.work.utxos.insert(utxo.outpoint(), utxo.clone());
        Ok(())
    }

    fn utxos_by_tx(&self, tx_id: &TxId) -> Result<Vec<Utxo>, StoreError> {
        let from = UtxoRef::new(*tx_id, 0);
        let to = UtxoRef::new(*tx_id, u32::MAX);
        Ok(self.work.utxos.range(from..=to).map(|(_, u)| u.clone()).collect())
    }

    fn address_utxos(
        &self,
        address: &Address,
        token: Option<&TokenId>,
    ) -> Result<Vec<Utxo>, StoreError> {
        Ok(self
            .work
            .utxos
            .values()
            .filter(|u| &u.address == address && u.is_live())
            .filter(|u| token.map_or(true, |t| &u.token_id == t))
            .cloned()
            .collect())
    }

    fn utxos_locked_at_or_before_height(&self, height: Height) -> Result<Vec<Utxo>, StoreError> {
        Ok(self
            .work
            .utxos
            .values()
            .filter(|u| u.locked && u.is_live() && u.heightlock.is_some_and(|h| h <= height))
            .cloned()
            .collect())
    }

    fn utxos_locked_at_or_before_time(&self, time: Timestamp) -> Result<Vec<Utxo>, StoreError> {
        Ok(self
            .work
            .utxos
            .values()
            .filter(|u| u.locked && u.is_live() && u.timelock.is_some_and(|t| t <= time))
            .cloned()
            .collect())
    }

    fn proposal_utxos(&self, proposal: &ProposalId) -> Result<Vec<Utxo>, StoreError> {
        Ok(self
            .work
            .utxos
            .values()
            .filter(|u| u.tx_proposal.as_ref() == Some(proposal))
            .cloned()
            .collect())
    }
}

impl AddressStore for NullTxn<'_> {
    fn get_address(&self, address: &Address) -> Result<Option<AddressInfo>, StoreError> {
        Ok(self.work.addresses.get(address).cloned())
    }

    fn put_address(&mut self, info: &AddressInfo) -> Result<(), StoreError> {
        self.work.addresses.insert(info.address.clone(), info.clone());
        Ok(())
    }

    fn wallet_addresses(&self, wallet_id: &WalletId) -> Result<Vec<AddressInfo>, StoreError> {
        let mut rows: Vec<AddressInfo> = self
            .work
            .addresses
            .values()
            .filter(|a| a.wallet_id.as_ref() == Some(wallet_id) && a.index.is_some())
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.index);
        Ok(rows)
    }

    fn wallet_address_at(
        &self,
        wallet_id: &WalletId,
        index: u32,
    ) -> Result<Option<AddressInfo>, StoreError> {
        Ok(self
            .work
            .addresses
            .values()
            .find(|a| a.wallet_id.as_ref() == Some(wallet_id) && a.index == Some(index))
            .cloned())
    }
}

impl BalanceStore for NullTxn<'_> {
    fn get_address_balance(
        &self,
        address: &Address,
        token: &TokenId,
    ) -> Result<Option<TokenBalance>, StoreError> {
        Ok(self
            .work
            .address_balances
            .get(&(address.clone(), token.clone()))
            .copied())
    }

    fn put_address_balance(
        &mut self,
        address: &Address,
        token: &TokenId,
        balance: &TokenBalance,
    ) -> Result<(), StoreError> {
        self.work
            .address_balances
            .insert((address.clone(), token.clone()), *balance);
        Ok(())
    }

    fn address_balances(&self, address: &Address) -> Result<Vec<(TokenId, TokenBalance)>, StoreError> {
        Ok(self
            .work
            .address_balances
            .iter()
            .filter(|((a, _), _)| a == address)
            .map(|((_, t), b)| (t.clone(), *b))
            .collect())
    }

    fn get_wallet_balance(
        &self,
        wallet_id: &WalletId,
        token: &TokenId,
    ) -> Result<Option<TokenBalance>, StoreError> {
        Ok(self
            .work
            .wallet_balances
            .get(&(wallet_id.clone(), token.clone()))
            .copied())
    }

    fn put_wallet_balance(
        &mut self,
        wallet_id: &WalletId,
        token: &TokenId,
        balance: &TokenBalance,
    ) -> Result<(), StoreError> {
        self.work
            .wallet_balances
            .insert((wallet_id.clone(), token.clone()), *balance);
        Ok(())
    }

    fn wallet_balances(&self, wallet_id: &WalletId) -> Result<Vec<(TokenId, TokenBalance)>, StoreError> {
        Ok(self
            .work
            .wallet_balances
            .iter()
            .filter(|((w, _), _)| w == wallet_id)
            .map(|((_, t), b)| (t.clone(), *b))
            .collect())
    }
}

impl HistoryStore for NullTxn<'_> {
    fn append_address_history(
        &mut self,
        address: &Address,
        entry: &TxHistoryEntry,
    ) -> Result<(), StoreError> {
        self.work
            .address_history
            .entry(address.clone())
            .or_default()
            .insert(history_key(entry), entry.clone());
        Ok(())
    }

    fn address_history(&self, address: &Address) -> Result<Vec<TxHistoryEntry>, StoreError> {
        Ok(self
            .work
            .address_history
            .get(address)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    fn void_address_history(&mut self, address: &Address, tx_id: &TxId) -> Result<usize, StoreError> {
        Ok(void_rows(self.work.address_history.get_mut(address), tx_id))
    }

    fn append_wallet_history(
        &mut self,
        wallet_id: &WalletId,
        entry: &TxHistoryEntry,
    ) -> Result<(), StoreError> {
        self.work
            .wallet_history
            .entry(wallet_id.clone())
            .or_default()
            .insert(history_key(entry), entry.clone());
        Ok(())
    }

    fn wallet_history(&self, wallet_id: &WalletId) -> Result<Vec<TxHistoryEntry>, StoreError> {
        Ok(self
            .work
            .wallet_history
            .get(wallet_id)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    fn void_wallet_history(&mut self, wallet_id: &WalletId, tx_id: &TxId) -> Result<usize, StoreError> {
        Ok(void_rows(self.work.wallet_history.get_mut(wallet_id), tx_id))
    }
}

impl WalletStore for NullTxn<'_> {
    fn get_wallet(&self, id: &WalletId) -> Result<Option<Wallet>, StoreError> {
        Ok(self.work.wallets.get(id).cloned())
    }

    fn put_wallet(&mut self, wallet: &Wallet) -> Result<(), StoreError> {
        self.work.wallets.insert(wallet.id.clone(), wallet.clone());
        Ok(())
    }
}

impl TransactionStore for NullTxn<'_> {
    fn get_tx(&self, tx_id: &TxId) -> Result<Option<TxRecord>, StoreError> {
        Ok(self.work.txs.get(tx_id).cloned())
    }

    fn put_tx(&mut self, record: &TxRecord) -> Result<(), StoreError> {
        self.work.txs.insert(*record.tx_id(), record.clone());
        Ok(())
    }
}

impl TokenStore for NullTxn<'_> {
    fn get_token(&self, id: &TokenId) -> Result<Option<TokenInfo>, StoreError> {
        Ok(self.work.tokens.get(id).cloned())
    }

    fn put_token(&mut self, info: &TokenInfo) -> Result<(), StoreError> {
        self.work.tokens.insert(info.id.clone(), info.clone());
        Ok(())
    }
}

impl ProposalStore for NullTxn<'_> {
    fn get_proposal(&self, id: &ProposalId) -> Result<Option<TxProposal>, StoreError> {
        Ok(self.work.proposals.get(id).cloned())
    }

    fn put_proposal(&mut self, proposal: &TxProposal) -> Result<(), StoreError> {
        self.work.proposals.insert(proposal.id.clone(), proposal.clone());
        Ok(())
    }

    fn open_proposals_updated_before(&self, cutoff: Timestamp) -> Result<Vec<TxProposal>, StoreError> {
        Ok(self
            .work
            .proposals
            .values()
            .filter(|p| p.status == ProposalStatus::Open && p.updated_at < cutoff)
            .cloned()
            .collect())
    }
}

impl MetaStore for NullTxn<'_> {
    fn put_meta(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.work.meta.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.work.meta.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncommitted_changes_are_discarded() {
        let store = NullStore::new();
        {
            let mut txn = store.write_txn().unwrap();
            txn.set_best_height(5).unwrap();
        }
        assert_eq!(store.write_txn().unwrap().best_height().unwrap(), 0);

        let mut txn = store.write_txn().unwrap();
        txn.set_best_height(5).unwrap();
        txn.commit().unwrap();
        assert_eq!(store.write_txn().unwrap().best_height().unwrap(), 5);
    }

    #[test]
    fn failing_commit_rolls_back() {
        let store = NullStore::new();
        store.set_fail_commits(true);
        let mut txn = store.write_txn().unwrap();
        txn.set_best_height(9).unwrap();
        assert!(txn.commit().is_err());
        store.set_fail_commits(false);
        assert_eq!(store.write_txn().unwrap().best_height().unwrap(), 0);
    }

    #[test]
    fn only_the_next_commits_fail() {
        let store = NullStore::new();
        store.fail_next_commits(1);
        let mut txn = store.write_txn().unwrap();
        txn.set_best_height(3).unwrap();
        assert!(txn.commit().is_err());
        let mut txn = store.write_txn().unwrap();
        txn.set_best_height(4).unwrap();
        txn.commit().unwrap();
        assert_eq!(store.write_txn().unwrap().best_height().unwrap(), 4);
    }
}
