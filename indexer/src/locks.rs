//! Lock resolution.
//!
//! A UTXO is locked while its heightlock is above the best height or its
//! timelock is in the future. Both kinds expire through the same path,
//! [`apply_unlock`]; only the trigger differs (a new block for heights, the
//! periodic sweep and balance reads for time). Unlocking is one-way, except
//! for the forced unlock of a locked output spent by a transaction that is
//! later voided.

use std::collections::BTreeSet;

use tracing::debug;

use windex_store::{AddressStore, BalanceStore, IndexTxn, StoreError, Utxo, UtxoStore};
use windex_types::{Address, Balance, Height, Timestamp, TokenId, WalletId};

/// Whether an output with these locks is still locked.
///
/// A timelock equal to `now` has expired.
pub fn is_locked(
    timelock: Option<Timestamp>,
    heightlock: Option<Height>,
    now: Timestamp,
    best_height: Height,
) -> bool {
    heightlock.is_some_and(|h| h > best_height) || timelock.is_some_and(|t| t > now)
}

pub fn is_utxo_locked(utxo: &Utxo, now: Timestamp, best_height: Height) -> bool {
    is_locked(utxo.timelock, utxo.heightlock, now, best_height)
}

/// Locked UTXOs whose heightlock has been reached at `height`.
pub fn find_expired_by_height<T: IndexTxn>(txn: &T, height: Height) -> Result<Vec<Utxo>, StoreError> {
    txn.utxos_locked_at_or_before_height(height)
}

/// Locked UTXOs whose timelock has passed at `now`.
pub fn find_expired_by_time<T: IndexTxn>(txn: &T, now: Timestamp) -> Result<Vec<Utxo>, StoreError> {
    txn.utxos_locked_at_or_before_time(now)
}

/// Unlock every candidate that is, at update time, still stored as locked
/// while neither of its locks is active any more. Returns how many flipped.
pub fn apply_unlock<T: IndexTxn>(
    txn: &mut T,
    candidates: &[Utxo],
    now: Timestamp,
    best_height: Height,
    recompute_next_expiry: bool,
) -> Result<usize, StoreError> {
    let mut expired = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let Some(row) = txn.get_utxo(&candidate.outpoint())? else {
            continue;
        };
        if row.locked && row.is_live() && !is_utxo_locked(&row, now, best_height) {
            expired.push(row);
        }
    }
    unlock_rows(txn, &expired, recompute_next_expiry)
}

/// Move rows from the locked to the unlocked track without checking their
/// locks. Used directly only when a still-locked output is spent.
pub fn unlock_rows<T: IndexTxn>(
    txn: &mut T,
    rows: &[Utxo],
    recompute_next_expiry: bool,
) -> Result<usize, StoreError> {
    let mut address_keys: BTreeSet<(Address, TokenId)> = BTreeSet::new();
    let mut wallet_keys: BTreeSet<(WalletId, TokenId)> = BTreeSet::new();
    let mut unlocked = 0;

    for row in rows {
        if !txn.unlock_utxo(&row.outpoint())? {
            continue;
        }
        unlocked += 1;
        let delta = Balance::unlock_transfer(row.value)?;
        txn.merge_address_balance(&row.address, &row.token_id, &delta, 0)?;
        let wallet_id = txn.get_address(&row.address)?.and_then(|info| info.wallet_id);
        if let Some(wallet_id) = &wallet_id {
            txn.merge_wallet_balance(wallet_id, &row.token_id, &delta, 0)?;
        }
        debug!(utxo = %row.outpoint(), address = %row.address, "unlocked");

        // An authority or a timelock moving means the cached bitsets or
        // expiry of the key are stale.
        if recompute_next_expiry || row.value.is_authority() || row.timelock.is_some() {
            address_keys.insert((row.address.clone(), row.token_id.clone()));
            if let Some(wallet_id) = wallet_id {
                wallet_keys.insert((wallet_id, row.token_id.clone()));
            }
        }
    }

    for (address, token) in &address_keys {
        txn.refresh_address_balance(address, token)?;
    }
    for (wallet_id, token) in &wallet_keys {
        txn.refresh_wallet_balance(wallet_id, token)?;
    }
    Ok(unlocked)
}

/// Put back locks that [`unlock_rows`] removed from outputs a now-voided
/// transaction spent while they were still locked. Returns how many flipped.
pub fn relock_rows<T: IndexTxn>(txn: &mut T, rows: &[Utxo]) -> Result<usize, StoreError> {
    let mut relocked = 0;
    for row in rows {
        if !row.is_live() || !txn.relock_utxo(&row.outpoint())? {
            continue;
        }
        relocked += 1;
        let delta = Balance::relock_transfer(row.value)?;
        txn.merge_address_balance(&row.address, &row.token_id, &delta, 0)?;
        txn.refresh_address_balance(&row.address, &row.token_id)?;
        if let Some(wallet_id) = txn.get_address(&row.address)?.and_then(|info| info.wallet_id) {
            txn.merge_wallet_balance(&wallet_id, &row.token_id, &delta, 0)?;
            txn.refresh_wallet_balance(&wallet_id, &row.token_id)?;
        }
        debug!(utxo = %row.outpoint(), address = %row.address, "relocked");
    }
    Ok(relocked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use windex_nullables::NullStore;
    use windex_store::{AddressInfo, IndexStore};
    use windex_types::{OutputValue, TxId};

    #[test]
    fn timelock_boundary_is_inclusive_of_now() {
        let now = Timestamp::new(1_000);
        assert!(!is_locked(Some(Timestamp::new(999)), None, now, 0));
        assert!(!is_locked(Some(now), None, now, 0));
        assert!(is_locked(Some(Timestamp::new(1_001)), None, now, 0));
    }

    #[test]
    fn heightlock_holds_until_best_height_reaches_it() {
        let now = Timestamp::new(0);
        assert!(is_locked(None, Some(2), now, 1));
        assert!(!is_locked(None, Some(2), now, 2));
        assert!(is_locked(Some(Timestamp::new(5)), Some(2), now, 2));
    }

    fn locked_row(timelock: u32) -> Utxo {
        Utxo {
            tx_id: TxId::new([1; 32]),
            index: 0,
            token_id: TokenId::native(),
            address: Address::from("a1"),
            value: OutputValue::Amount(100),
            timelock: Some(Timestamp::new(timelock)),
            heightlock: None,
            locked: true,
            spent_by: None,
            tx_proposal: None,
            voided: false,
        }
    }

    #[test]
    fn sweep_moves_value_and_clears_expiry() {
        let store = NullStore::new();
        let mut txn = store.write_txn().unwrap();
        let row = locked_row(50);
        txn.put_utxo(&row).unwrap();
        txn.put_address(&AddressInfo::unclaimed(row.address.clone())).unwrap();
        txn.merge_address_balance(
            &row.address,
            &row.token_id,
            &Balance::from_output(row.value, true, row.timelock).unwrap(),
            1,
        )
        .unwrap();

        let early = find_expired_by_time(&txn, Timestamp::new(49)).unwrap();
        assert!(early.is_empty());

        let due = find_expired_by_time(&txn, Timestamp::new(50)).unwrap();
        assert_eq!(apply_unlock(&mut txn, &due, Timestamp::new(50), 0, true).unwrap(), 1);
        let balance = txn.get_address_balance(&row.address, &row.token_id).unwrap().unwrap();
        assert_eq!((balance.unlocked_amount, balance.locked_amount), (100, 0));
        assert_eq!(balance.lock_expires, None);

        // Already unlocked: a second pass is a no-op.
        assert_eq!(apply_unlock(&mut txn, &due, Timestamp::new(50), 0, true).unwrap(), 0);
    }

    #[test]
    fn stale_candidate_is_rechecked_against_current_time() {
        let store = NullStore::new();
        let mut txn = store.write_txn().unwrap();
        let row = locked_row(80);
        txn.put_utxo(&row).unwrap();
        assert_eq!(apply_unlock(&mut txn, &[row], Timestamp::new(79), 0, true).unwrap(), 0);
    }
}
