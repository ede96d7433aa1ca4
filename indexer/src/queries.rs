//! Read paths: wallet balances, history and UTXOs, and address lookups.
//!
//! Everything here runs in [`IndexStore::read_txn`], so on LMDB a query
//! never queues behind block ingestion.

use tracing::warn;

use windex_store::{
    AddressInfo, AddressStore, BalanceStore, HistoryStore, IndexStore, MetaStore, TokenBalance,
    TxHistoryEntry, Utxo, UtxoStore,
};
use windex_types::{Address, Height, Timestamp, TokenId, WalletId};

use crate::processor::Indexer;
use crate::wallet::require_ready;
use crate::IndexerError;

/// Which wallet UTXOs to list.
#[derive(Clone, Debug, Default)]
pub struct UtxoFilter {
    pub token: Option<TokenId>,
    pub min_value: Option<u64>,
    pub max_value: Option<u64>,
    /// `Some(true)` for locked only, `Some(false)` for unlocked only.
    pub locked: Option<bool>,
    /// Skip UTXOs reserved by a proposal.
    pub exclude_reserved: bool,
    pub max_count: Option<usize>,
}

impl UtxoFilter {
    fn matches(&self, utxo: &Utxo) -> bool {
        let amount = utxo.value.amount();
        self.token.as_ref().map_or(true, |t| &utxo.token_id == t)
            && self.min_value.map_or(true, |min| amount >= min)
            && self.max_value.map_or(true, |max| amount <= max)
            && self.locked.map_or(true, |locked| utxo.locked == locked)
            && !(self.exclude_reserved && utxo.tx_proposal.is_some())
    }
}

impl<S: IndexStore> Indexer<S> {
    /// Wallet balances, optionally for one token.
    ///
    /// If a returned row says a time lock has expired by `now`, the time
    /// sweep runs first. A failing sweep is logged and the last known
    /// aggregates are returned.
    pub fn wallet_balances(
        &self,
        id: &WalletId,
        token: Option<&TokenId>,
        now: Timestamp,
    ) -> Result<Vec<(TokenId, TokenBalance)>, IndexerError> {
        let rows = self.read_wallet_balances(id, token)?;
        let stale = rows
            .iter()
            .any(|(_, b)| b.lock_expires.is_some_and(|t| t <= now));
        if !stale {
            return Ok(rows);
        }
        match self.sweep_time_locks(now) {
            Ok(_) => self.read_wallet_balances(id, token),
            Err(e) => {
                warn!(wallet = %id, error = %e, "time-lock sweep failed, serving last known balances");
                Ok(rows)
            }
        }
    }

    fn read_wallet_balances(
        &self,
        id: &WalletId,
        token: Option<&TokenId>,
    ) -> Result<Vec<(TokenId, TokenBalance)>, IndexerError> {
        let txn = self.store.read_txn()?;
        require_ready(&txn, id)?;
        Ok(txn
            .wallet_balances(id)?
            .into_iter()
            .filter(|(t, _)| token.map_or(true, |wanted| t == wanted))
            .collect())
    }

    /// Wallet history, newest first, paged by `skip` and `count`.
    pub fn wallet_history(
        &self,
        id: &WalletId,
        token: Option<&TokenId>,
        skip: usize,
        count: usize,
    ) -> Result<Vec<TxHistoryEntry>, IndexerError> {
        let txn = self.store.read_txn()?;
        require_ready(&txn, id)?;
        Ok(txn
            .wallet_history(id)?
            .into_iter()
            .rev()
            .filter(|e| token.map_or(true, |t| &e.token_id == t))
            .skip(skip)
            .take(count)
            .collect())
    }

    /// Live UTXOs of a wallet matching `filter`, in address-index order.
    pub fn wallet_utxos(&self, id: &WalletId, filter: &UtxoFilter) -> Result<Vec<Utxo>, IndexerError> {
        let txn = self.store.read_txn()?;
        require_ready(&txn, id)?;
        let limit = filter.max_count.unwrap_or(usize::MAX);
        let mut out = Vec::new();
        for info in txn.wallet_addresses(id)? {
            for utxo in txn.address_utxos(&info.address, filter.token.as_ref())? {
                if out.len() >= limit {
                    return Ok(out);
                }
                if filter.matches(&utxo) {
                    out.push(utxo);
                }
            }
        }
        Ok(out)
    }

    pub fn address_info(&self, address: &Address) -> Result<Option<AddressInfo>, IndexerError> {
        let txn = self.store.read_txn()?;
        Ok(txn.get_address(address)?)
    }

    /// Highest block height indexed so far.
    pub fn best_height(&self) -> Result<Height, IndexerError> {
        let txn = self.store.read_txn()?;
        Ok(txn.best_height()?)
    }

    /// Best block height as reported by the full node.
    pub fn full_node_height(&self) -> Result<Height, IndexerError> {
        self.full_node.best_height()
    }

    /// Per-token aggregates of one address.
    pub fn address_balances(&self, address: &Address) -> Result<Vec<(TokenId, TokenBalance)>, IndexerError> {
        let txn = self.store.read_txn()?;
        Ok(txn.address_balances(address)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use windex_types::{OutputValue, TxId};

    fn utxo(value: u64, locked: bool) -> Utxo {
        Utxo {
            tx_id: TxId::new([1; 32]),
            index: 0,
            token_id: TokenId::native(),
            address: Address::from("a"),
            value: OutputValue::Amount(value),
            timelock: None,
            heightlock: None,
            locked,
            spent_by: None,
            tx_proposal: None,
            voided: false,
        }
    }

    #[test]
    fn filter_applies_every_bound() {
        let filter = UtxoFilter {
            min_value: Some(10),
            max_value: Some(20),
            locked: Some(false),
            ..UtxoFilter::default()
        };
        assert!(filter.matches(&utxo(15, false)));
        assert!(!filter.matches(&utxo(15, true)));
        assert!(!filter.matches(&utxo(5, false)));
        assert!(!filter.matches(&utxo(25, false)));
    }

    #[test]
    fn filter_can_skip_reserved() {
        let mut reserved = utxo(1, false);
        reserved.tx_proposal = Some(windex_store::ProposalId::new("p"));
        assert!(UtxoFilter::default().matches(&reserved));
        let filter = UtxoFilter {
            exclude_reserved: true,
            ..UtxoFilter::default()
        };
        assert!(!filter.matches(&reserved));
    }
}
