//! Transaction ingestion pipeline.
//!
//! Each event is validated, then applied inside a single store write
//! transaction: height-lock resolution, UTXO changes, address aggregates,
//! wallet gap extension and wallet aggregates. Any error drops the
//! transaction, so nothing is partially applied and the event can simply be
//! redelivered. Notifications go out only after commit.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use windex_crypto::{validate_address, XpubDeriver};
use windex_store::{
    AddressStore, BalanceStore, HistoryStore, IndexStore, IndexTxn, MetaStore, TokenInfo,
    TokenStore, TransactionStore, TxHistoryEntry, TxRecord, Utxo, UtxoRef, UtxoStore, WalletStore,
};
use windex_types::{
    Address, Height, Timestamp, TokenBalanceMap, TokenId, TxEvent, TxId, TxVersion, WalletId,
};

use crate::balances::{self, AddressDeltas, WalletDeltas};
use crate::config::IndexerConfig;
use crate::interfaces::{FullNode, Notifier, WalletEvent};
use crate::{gap, locks, wallet, IndexerError};

/// Terminal outcome of ingesting one event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcessResult {
    /// The event was applied.
    Applied,
    /// The transaction was already indexed; nothing changed.
    Duplicate,
    /// The event can never be applied and must not be retried.
    Rejected(String),
}

/// Outcome of a void request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VoidResult {
    /// The transaction was reversed.
    Voided,
    AlreadyVoided,
    /// The transaction was never indexed.
    Unknown,
}

type Notifications = Vec<(WalletId, WalletEvent)>;

/// The indexing engine. Cheap to share behind an `Arc`; every operation
/// opens its own unit of work on the store.
pub struct Indexer<S: IndexStore> {
    pub(crate) store: Arc<S>,
    pub(crate) full_node: Arc<dyn FullNode>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) config: IndexerConfig,
}

impl<S: IndexStore> Indexer<S> {
    pub fn new(
        store: Arc<S>,
        full_node: Arc<dyn FullNode>,
        notifier: Arc<dyn Notifier>,
        config: IndexerConfig,
    ) -> Self {
        Self {
            store,
            full_node,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Parse and ingest one JSON event. Unparseable input is rejected.
    pub fn process_json(&self, json: &str) -> Result<ProcessResult, IndexerError> {
        match TxEvent::from_json(json) {
            Ok(event) => self.process_event(&event),
            Err(e) => {
                warn!(error = %e, "rejected unparseable event");
                Ok(ProcessResult::Rejected(e.to_string()))
            }
        }
    }

    /// Ingest one event.
    pub fn process_event(&self, event: &TxEvent) -> Result<ProcessResult, IndexerError> {
        if let Err(reason) = self.validate(event) {
            warn!(tx = %event.tx_id, %reason, "rejected event");
            return Ok(ProcessResult::Rejected(reason));
        }

        let mut txn = self.store.write_txn()?;
        if txn.get_tx(&event.tx_id)?.is_some() {
            debug!(tx = %event.tx_id, "duplicate event");
            return Ok(ProcessResult::Duplicate);
        }
        let notifications = match self.apply(&mut txn, event) {
            Ok(notifications) => notifications,
            Err(e) if e.is_rejection() => {
                warn!(tx = %event.tx_id, error = %e, "rejected event");
                return Ok(ProcessResult::Rejected(e.to_string()));
            }
            Err(e) => return Err(e),
        };
        txn.commit()?;

        info!(
            tx = %event.tx_id,
            version = ?event.version,
            inputs = event.inputs.len(),
            outputs = event.outputs.len(),
            wallets = notifications.len(),
            "applied transaction"
        );
        self.notify_all(notifications);
        Ok(ProcessResult::Applied)
    }

    fn validate(&self, event: &TxEvent) -> Result<(), String> {
        if event.tx_id == TxId::ZERO {
            return Err("empty transaction id".to_string());
        }
        if self.config.is_genesis(&event.tx_id) {
            return Err(format!("{} is a genesis transaction", event.tx_id));
        }
        event.validate().map_err(|e| e.to_string())?;
        let addresses = event
            .outputs
            .iter()
            .map(|o| &o.address)
            .chain(event.inputs.iter().map(|i| &i.address));
        for address in addresses {
            if !validate_address(address.as_str(), self.config.network) {
                return Err(format!(
                    "{address:?} is not a {} address",
                    self.config.network.as_str()
                ));
            }
        }
        Ok(())
    }

    fn apply<T: IndexTxn>(&self, txn: &mut T, event: &TxEvent) -> Result<Notifications, IndexerError> {
        let now = event.timestamp;

        // Height locks: advance the best height and release matured rewards.
        let mut best_height = txn.best_height()?;
        let heightlock = if event.version.is_block() {
            let height = event
                .height
                .ok_or_else(|| IndexerError::Rejected(format!("block {} has no height", event.tx_id)))?;
            if height > best_height {
                best_height = height;
                txn.set_best_height(height)?;
                let matured = locks::find_expired_by_height(txn, height)?;
                let unlocked = locks::apply_unlock(txn, &matured, now, height, false)?;
                if unlocked > 0 {
                    debug!(height, unlocked, "released block rewards");
                }
            }
            Some(height.saturating_add(self.config.reward_lock))
        } else {
            None
        };

        let forced_unlocks = self.apply_utxo_changes(txn, event, heightlock, best_height)?;

        let deltas =
            balances::address_balance_deltas(&event.inputs, &event.outputs, heightlock, now, best_height)?;

        // Gap extension runs before the address aggregates move, so addresses
        // it claims are backfilled with their state before this transaction.
        let address_wallets = self.extend_wallet_gaps(txn, &deltas)?;

        apply_address_deltas(txn, &event.tx_id, now, &deltas)?;

        let wallet_deltas = balances::wallet_balance_deltas(&address_wallets, &deltas)?;
        apply_wallet_deltas(txn, &event.tx_id, now, &wallet_deltas)?;

        if event.version == TxVersion::TokenCreation {
            if let (Some(name), Some(symbol)) = (&event.token_name, &event.token_symbol) {
                txn.put_token(&TokenInfo {
                    id: TokenId::from_tx(&event.tx_id),
                    name: name.clone(),
                    symbol: symbol.clone(),
                })?;
            }
        }

        txn.put_tx(&TxRecord {
            event: event.clone(),
            voided: false,
            forced_unlocks,
        })?;

        Ok(wallet_deltas
            .into_iter()
            .map(|(wallet_id, map)| {
                let event = WalletEvent::NewTx {
                    tx_id: event.tx_id,
                    timestamp: now,
                    balances: net_totals(&map),
                };
                (wallet_id, event)
            })
            .collect())
    }

    /// Insert the outputs and spend the inputs. Returns the inputs that were
    /// still locked and had to be unlocked to be spent.
    fn apply_utxo_changes<T: IndexTxn>(
        &self,
        txn: &mut T,
        event: &TxEvent,
        heightlock: Option<Height>,
        best_height: Height,
    ) -> Result<Vec<UtxoRef>, IndexerError> {
        for (position, output) in event.outputs.iter().enumerate() {
            txn.upsert_utxo(Utxo {
                tx_id: event.tx_id,
                index: TxEvent::output_index(position),
                token_id: output.token_id.clone(),
                address: output.address.clone(),
                value: output.value,
                timelock: output.timelock,
                heightlock,
                locked: locks::is_locked(output.timelock, heightlock, event.timestamp, best_height),
                spent_by: None,
                tx_proposal: None,
                voided: false,
            })?;
        }

        let mut forced_unlocks = Vec::new();
        for input in &event.inputs {
            let outpoint = UtxoRef::new(input.tx_id, input.index);
            match txn.get_utxo(&outpoint)? {
                None => {
                    warn!(tx = %event.tx_id, utxo = %outpoint, "input spends an unknown output");
                }
                Some(row) if row.voided => {
                    warn!(tx = %event.tx_id, utxo = %outpoint, "input spends a voided output");
                }
                Some(row) if row.spent_by.is_some() => {
                    warn!(
                        tx = %event.tx_id,
                        utxo = %outpoint,
                        spent_by = ?row.spent_by,
                        "input spends an already spent output"
                    );
                }
                Some(row) => {
                    if row.locked {
                        warn!(tx = %event.tx_id, utxo = %outpoint, "input spends a locked output");
                        locks::unlock_rows(txn, std::slice::from_ref(&row), true)?;
                        forced_unlocks.push(outpoint);
                    }
                    txn.mark_spent(&outpoint, event.tx_id)?;
                }
            }
        }
        Ok(forced_unlocks)
    }

    /// Resolve which touched addresses belong to a wallet, extending the gap
    /// of every ready wallet that just used an address past its high-water
    /// mark.
    fn extend_wallet_gaps<T: IndexTxn>(
        &self,
        txn: &mut T,
        deltas: &AddressDeltas,
    ) -> Result<BTreeMap<Address, WalletId>, IndexerError> {
        let touched: BTreeSet<Address> = deltas.keys().cloned().collect();
        let mut address_wallets = BTreeMap::new();
        let mut to_extend = BTreeSet::new();

        for address in &touched {
            let Some(info) = txn.get_address(address)? else {
                continue;
            };
            if let (Some(wallet_id), Some(index)) = (info.wallet_id, info.index) {
                if let Some(wallet) = txn.get_wallet(&wallet_id)? {
                    if wallet.status.is_ready() && i64::from(index) > i64::from(wallet.highest_used_index) {
                        to_extend.insert(wallet_id.clone());
                    }
                }
                address_wallets.insert(address.clone(), wallet_id);
            }
        }

        for wallet_id in to_extend {
            let Some(mut wallet) = txn.get_wallet(&wallet_id)? else {
                continue;
            };
            let deriver = XpubDeriver::new(&wallet.xpubkey, self.config.network)?;
            let previous_last = wallet.last_generated_index;
            let with_history = gap::extend_wallet(txn, &mut wallet, &deriver, &touched)?;
            wallet::backfill_wallet(txn, &wallet_id, &with_history)?;

            // Addresses claimed just now that this transaction touches.
            for address in &touched {
                if address_wallets.contains_key(address) {
                    continue;
                }
                if let Some(info) = txn.get_address(address)? {
                    if info.wallet_id.as_ref() == Some(&wallet_id) {
                        address_wallets.insert(address.clone(), wallet_id.clone());
                    }
                }
            }
            debug!(
                wallet = %wallet_id,
                from = previous_last,
                to = wallet.last_generated_index,
                "extended address gap"
            );
        }
        Ok(address_wallets)
    }

    /// Reverse a transaction the full node reports as voided.
    pub fn handle_voided(&self, tx_id: &TxId) -> Result<VoidResult, IndexerError> {
        if !self.full_node.is_voided(tx_id)? {
            return Err(IndexerError::VoidNotConfirmed(*tx_id));
        }

        let mut txn = self.store.write_txn()?;
        let Some(mut record) = txn.get_tx(tx_id)? else {
            debug!(tx = %tx_id, "void for an unknown transaction");
            return Ok(VoidResult::Unknown);
        };
        if record.voided {
            return Ok(VoidResult::AlreadyVoided);
        }

        let outputs = txn.utxos_by_tx(tx_id)?;
        let deltas = balances::stored_balance_deltas(&record.event.inputs, &outputs)?;
        let mut address_wallets = BTreeMap::new();
        for address in deltas.keys() {
            if let Some(wallet_id) = txn.get_address(address)?.and_then(|i| i.wallet_id) {
                address_wallets.insert(address.clone(), wallet_id);
            }
        }
        let wallet_deltas = balances::wallet_balance_deltas(&address_wallets, &deltas)?;

        for (address, map) in balances::negate(&deltas) {
            for (token, delta) in map.iter() {
                txn.merge_address_balance(&address, token, delta, -1)?;
            }
            txn.void_address_history(&address, tx_id)?;
            txn.add_address_transactions(&address, -1)?;
        }
        for (wallet_id, map) in balances::negate(&wallet_deltas) {
            for (token, delta) in map.iter() {
                txn.merge_wallet_balance(&wallet_id, token, delta, -1)?;
            }
            txn.void_wallet_history(&wallet_id, tx_id)?;
        }

        for row in &outputs {
            txn.void_utxo(&row.outpoint())?;
        }
        for input in &record.event.inputs {
            let outpoint = UtxoRef::new(input.tx_id, input.index);
            if !txn.unspend(&outpoint, tx_id)? {
                debug!(tx = %tx_id, utxo = %outpoint, "input was not spent by the voided transaction");
            }
        }

        // Inputs unlocked only because this transaction spent them go back
        // to locked, then through the normal expiry check as of the spend.
        if !record.forced_unlocks.is_empty() {
            let mut forced = Vec::with_capacity(record.forced_unlocks.len());
            for outpoint in &record.forced_unlocks {
                forced.extend(txn.get_utxo(outpoint)?);
            }
            let relocked = locks::relock_rows(&mut txn, &forced)?;
            let best_height = txn.best_height()?;
            let released =
                locks::apply_unlock(&mut txn, &forced, record.event.timestamp, best_height, true)?;
            debug!(tx = %tx_id, relocked, released, "restored locks of spent inputs");
        }

        // Authorities and expiry depend on which UTXOs are live, so they are
        // recomputed after the UTXO set is back to its prior shape.
        for (wallet_id, map) in &wallet_deltas {
            for token in map.tokens() {
                txn.refresh_wallet_balance(wallet_id, token)?;
            }
        }
        for (address, map) in &deltas {
            for token in map.tokens() {
                txn.refresh_address_balance(address, token)?;
            }
        }

        record.voided = true;
        txn.put_tx(&record)?;
        txn.commit()?;

        info!(tx = %tx_id, addresses = deltas.len(), wallets = wallet_deltas.len(), "voided transaction");
        self.notify_all(
            wallet_deltas
                .into_keys()
                .map(|wallet_id| (wallet_id, WalletEvent::TxVoided { tx_id: *tx_id }))
                .collect(),
        );
        Ok(VoidResult::Voided)
    }

    /// Release every time lock that has expired at `now`.
    pub fn sweep_time_locks(&self, now: Timestamp) -> Result<usize, IndexerError> {
        let mut txn = self.store.write_txn()?;
        let best_height = txn.best_height()?;
        let expired = locks::find_expired_by_time(&txn, now)?;
        if expired.is_empty() {
            return Ok(0);
        }
        let unlocked = locks::apply_unlock(&mut txn, &expired, now, best_height, true)?;
        txn.commit()?;
        if unlocked > 0 {
            info!(unlocked, %now, "released time locks");
        }
        Ok(unlocked)
    }

    pub(crate) fn notify_all(&self, notifications: Notifications) {
        for (wallet_id, event) in notifications {
            if let Err(e) = self.notifier.notify(&wallet_id, &event) {
                warn!(wallet = %wallet_id, error = %e, "notification failed");
            }
        }
    }
}

fn net_totals(map: &TokenBalanceMap) -> BTreeMap<TokenId, i64> {
    map.iter().map(|(token, b)| (token.clone(), b.total())).collect()
}

fn apply_address_deltas<T: IndexTxn>(
    txn: &mut T,
    tx_id: &TxId,
    timestamp: Timestamp,
    deltas: &AddressDeltas,
) -> Result<(), IndexerError> {
    for (address, map) in deltas {
        for (token, delta) in map.iter() {
            txn.merge_address_balance(address, token, delta, 1)?;
            if delta.loses_authority() {
                txn.refresh_address_balance(address, token)?;
            }
            txn.append_address_history(
                address,
                &TxHistoryEntry {
                    tx_id: *tx_id,
                    token_id: token.clone(),
                    balance: delta.total(),
                    timestamp,
                    voided: false,
                },
            )?;
        }
        txn.add_address_transactions(address, 1)?;
    }
    Ok(())
}

fn apply_wallet_deltas<T: IndexTxn>(
    txn: &mut T,
    tx_id: &TxId,
    timestamp: Timestamp,
    deltas: &WalletDeltas,
) -> Result<(), IndexerError> {
    for (wallet_id, map) in deltas {
        for (token, delta) in map.iter() {
            txn.merge_wallet_balance(wallet_id, token, delta, 1)?;
            if delta.loses_authority() {
                txn.refresh_wallet_balance(wallet_id, token)?;
            }
            txn.append_wallet_history(
                wallet_id,
                &TxHistoryEntry {
                    tx_id: *tx_id,
                    token_id: token.clone(),
                    balance: delta.total(),
                    timestamp,
                    voided: false,
                },
            )?;
        }
    }
    Ok(())
}
