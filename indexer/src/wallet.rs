//! Wallet lifecycle: registration, address loading and backfill.
//!
//! A wallet is registered as `Creating`, then loaded: its address window is
//! generated and claimed, and whatever those addresses already saw is folded
//! into the wallet's aggregates. Loading is one unit of work, so a wallet
//! started after its transactions ends up identical to one that existed
//! before them.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use tracing::{info, warn};

use windex_crypto::{wallet_id, XpubDeriver};
use windex_store::{
    AddressInfo, AddressStore, BalanceStore, HistoryStore, IndexStore, IndexTxn, TxHistoryEntry,
    Wallet, WalletStore,
};
use windex_types::balance::checked_sum;
use windex_types::{Address, Timestamp, TokenId, TxId, WalletId, WalletStatus};

use crate::interfaces::WalletEvent;
use crate::processor::Indexer;
use crate::{gap, IndexerError};

impl<S: IndexStore> Indexer<S> {
    /// Register a wallet. An existing wallet is returned unchanged, except
    /// that one in `Error` is reset so it can be loaded again.
    pub fn create_wallet(
        &self,
        xpubkey: &str,
        auth_xpubkey: Option<&str>,
        max_gap: Option<u16>,
        now: Timestamp,
    ) -> Result<Wallet, IndexerError> {
        XpubDeriver::new(xpubkey, self.config.network)?;
        let id = wallet_id(xpubkey);

        let mut txn = self.store.write_txn()?;
        if let Some(mut existing) = txn.get_wallet(&id)? {
            if existing.status != WalletStatus::Error {
                return Ok(existing);
            }
            existing.status = WalletStatus::Creating;
            existing.retry_count = 0;
            txn.put_wallet(&existing)?;
            txn.commit()?;
            info!(wallet = %id, "reset failed wallet");
            return Ok(existing);
        }

        let wallet = Wallet {
            id: id.clone(),
            xpubkey: xpubkey.to_string(),
            auth_xpubkey: auth_xpubkey.map(str::to_string),
            status: WalletStatus::Creating,
            max_gap: max_gap.unwrap_or(self.config.max_gap),
            highest_used_index: -1,
            last_generated_index: -1,
            retry_count: 0,
            created_at: now,
            ready_at: None,
        };
        txn.put_wallet(&wallet)?;
        txn.commit()?;
        info!(wallet = %id, max_gap = wallet.max_gap, "created wallet");
        Ok(wallet)
    }

    /// Generate and claim the wallet's addresses, backfill its aggregates
    /// and mark it `Ready`. Loading a ready wallet is a no-op.
    ///
    /// A failed load counts against the wallet's retries; past
    /// `max_load_retries` it is marked `Error`.
    pub fn load_wallet(&self, id: &WalletId, now: Timestamp) -> Result<Wallet, IndexerError> {
        match self.try_load_wallet(id, now) {
            Ok((wallet, newly_ready)) => {
                if newly_ready {
                    self.notify_all(vec![(id.clone(), WalletEvent::WalletReady)]);
                }
                Ok(wallet)
            }
            Err(e @ (IndexerError::WalletNotFound(_) | IndexerError::WalletNotReady { .. })) => Err(e),
            Err(e) => {
                if let Err(record_err) = self.record_load_failure(id, &e) {
                    warn!(wallet = %id, error = %record_err, "could not record wallet load failure");
                }
                Err(e)
            }
        }
    }

    fn try_load_wallet(&self, id: &WalletId, now: Timestamp) -> Result<(Wallet, bool), IndexerError> {
        let mut txn = self.store.write_txn()?;
        let mut wallet = txn
            .get_wallet(id)?
            .ok_or_else(|| IndexerError::WalletNotFound(id.clone()))?;
        match wallet.status {
            WalletStatus::Ready => return Ok((wallet, false)),
            WalletStatus::Error => {
                return Err(IndexerError::WalletNotReady {
                    id: id.clone(),
                    status: wallet.status,
                })
            }
            WalletStatus::Creating => {}
        }

        let deriver = XpubDeriver::new(&wallet.xpubkey, self.config.network)?;
        let with_history = gap::extend_wallet(&mut txn, &mut wallet, &deriver, &BTreeSet::new())?;
        backfill_wallet(&mut txn, id, &with_history)?;

        wallet.status = WalletStatus::Ready;
        wallet.ready_at = Some(now);
        txn.put_wallet(&wallet)?;
        txn.commit()?;
        info!(
            wallet = %id,
            addresses = wallet.last_generated_index + 1,
            backfilled = with_history.len(),
            "wallet ready"
        );
        Ok((wallet, true))
    }

    fn record_load_failure(&self, id: &WalletId, cause: &IndexerError) -> Result<(), IndexerError> {
        let mut txn = self.store.write_txn()?;
        let Some(mut wallet) = txn.get_wallet(id)? else {
            return Ok(());
        };
        wallet.retry_count += 1;
        if wallet.retry_count > self.config.max_load_retries {
            wallet.status = WalletStatus::Error;
        }
        txn.put_wallet(&wallet)?;
        txn.commit()?;
        warn!(
            wallet = %id,
            retry_count = wallet.retry_count,
            status = ?wallet.status,
            error = %cause,
            "wallet load failed"
        );
        Ok(())
    }

    /// The wallet's unused gap window: claimed addresses after its highest
    /// used index.
    pub fn get_new_addresses(&self, id: &WalletId) -> Result<Vec<AddressInfo>, IndexerError> {
        let txn = self.store.read_txn()?;
        let wallet = require_ready(&txn, id)?;
        Ok(txn
            .wallet_addresses(id)?
            .into_iter()
            .filter(|a| a.index.is_some_and(|i| i64::from(i) > i64::from(wallet.highest_used_index)))
            .collect())
    }

    pub fn get_wallet(&self, id: &WalletId) -> Result<Wallet, IndexerError> {
        let txn = self.store.read_txn()?;
        txn.get_wallet(id)?
            .ok_or_else(|| IndexerError::WalletNotFound(id.clone()))
    }
}

/// Fetch a wallet, failing unless it is `Ready`.
pub(crate) fn require_ready<T: IndexTxn>(txn: &T, id: &WalletId) -> Result<Wallet, IndexerError> {
    let wallet = txn
        .get_wallet(id)?
        .ok_or_else(|| IndexerError::WalletNotFound(id.clone()))?;
    if !wallet.status.is_ready() {
        return Err(IndexerError::WalletNotReady {
            id: id.clone(),
            status: wallet.status,
        });
    }
    Ok(wallet)
}

/// Fold the address-level state of freshly claimed addresses into the
/// wallet's aggregates and history.
///
/// History rows of the same transaction across several addresses sum into
/// one wallet row; a transaction the wallet already lists is not counted
/// again.
pub(crate) fn backfill_wallet<T: IndexTxn>(
    txn: &mut T,
    wallet_id: &WalletId,
    addresses: &[Address],
) -> Result<(), IndexerError> {
    if addresses.is_empty() {
        return Ok(());
    }

    let mut tokens = BTreeSet::new();
    for address in addresses {
        for (token, row) in txn.address_balances(address)? {
            let mut agg = txn.get_wallet_balance(wallet_id, &token)?.unwrap_or_default();
            agg.add_amounts(&row)?;
            txn.put_wallet_balance(wallet_id, &token, &agg)?;
            tokens.insert(token);
        }
    }

    let mut per_tx: BTreeMap<(TxId, TokenId), TxHistoryEntry> = BTreeMap::new();
    for address in addresses {
        for entry in txn.address_history(address)? {
            match per_tx.entry((entry.tx_id, entry.token_id.clone())) {
                Entry::Occupied(mut seen) => {
                    let seen = seen.get_mut();
                    seen.balance = checked_sum(seen.balance, entry.balance)?;
                }
                Entry::Vacant(slot) => {
                    slot.insert(entry);
                }
            }
        }
    }
    let known: BTreeMap<(TxId, TokenId), TxHistoryEntry> = txn
        .wallet_history(wallet_id)?
        .into_iter()
        .map(|e| ((e.tx_id, e.token_id.clone()), e))
        .collect();

    for (key, entry) in per_tx {
        match known.get(&key) {
            Some(existing) => {
                let mut merged = existing.clone();
                merged.balance = checked_sum(merged.balance, entry.balance)?;
                txn.append_wallet_history(wallet_id, &merged)?;
            }
            None => {
                txn.append_wallet_history(wallet_id, &entry)?;
                if !entry.voided {
                    let mut agg = txn.get_wallet_balance(wallet_id, &entry.token_id)?.unwrap_or_default();
                    agg.transactions += 1;
                    txn.put_wallet_balance(wallet_id, &entry.token_id, &agg)?;
                }
            }
        }
    }

    for token in &tokens {
        txn.refresh_wallet_balance(wallet_id, token)?;
    }
    Ok(())
}
