//! Wallet address gap management.
//!
//! A wallet always has exactly `max_gap` generated addresses after the last
//! one that saw a transaction. Generation walks forward from
//! `highest_used_index + 1`, one window of `max_gap` indexes at a time,
//! until that many consecutive unused addresses have been seen.

use std::collections::BTreeSet;

use tracing::debug;

use windex_crypto::XpubDeriver;
use windex_store::{AddressInfo, AddressStore, IndexTxn, Wallet, WalletStore};
use windex_types::Address;

use crate::IndexerError;

/// Outcome of a generation walk.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GeneratedAddresses {
    /// Every index walked, in order, up to and including `last_index`.
    pub all: Vec<(u32, Address)>,
    /// Stored (they saw transactions) but not yet claimed by any wallet.
    pub existing: Vec<(u32, Address)>,
    /// Never seen before.
    pub new: Vec<(u32, Address)>,
    pub highest_used_index: i32,
    pub last_index: i32,
}

/// Walk the wallet's address space.
///
/// `used` names addresses to treat as used even though their stored counter
/// does not say so yet (the transaction being ingested).
pub fn generate_addresses<T: IndexTxn>(
    txn: &T,
    wallet: &Wallet,
    deriver: &XpubDeriver,
    used: &BTreeSet<Address>,
) -> Result<GeneratedAddresses, IndexerError> {
    let gap = u32::from(wallet.max_gap.max(1));
    let mut out = GeneratedAddresses {
        highest_used_index: wallet.highest_used_index,
        ..GeneratedAddresses::default()
    };
    let mut walked: Vec<(u32, Address, Option<AddressInfo>)> = Vec::new();
    let mut next = u32::try_from(wallet.highest_used_index + 1).unwrap_or(0);

    loop {
        let window_end = next.saturating_add(gap);
        let mut missing = Vec::new();
        let mut window = Vec::with_capacity(gap as usize);
        for index in next..window_end {
            match txn.wallet_address_at(&wallet.id, index)? {
                Some(info) => window.push((index, info.address.clone(), Some(info))),
                None => missing.push(index),
            }
        }
        for (index, address) in deriver.addresses_at(&missing)? {
            let info = txn.get_address(&address)?;
            window.push((index, address, info));
        }
        window.sort_by_key(|(index, _, _)| *index);

        for (index, address, info) in &window {
            let seen = info.as_ref().is_some_and(|i| i.transactions > 0);
            if seen || used.contains(address) {
                out.highest_used_index = *index as i32;
            }
        }
        walked.extend(window);

        let last_walked = i64::from(window_end) - 1;
        if last_walked - i64::from(out.highest_used_index) >= i64::from(gap) || window_end == u32::MAX {
            break;
        }
        next = window_end;
    }

    out.last_index = out.highest_used_index + gap as i32;
    for (index, address, info) in walked {
        if index as i32 > out.last_index {
            break;
        }
        match info {
            None => out.new.push((index, address.clone())),
            Some(info) if info.wallet_id.is_none() => out.existing.push((index, address.clone())),
            Some(_) => {}
        }
        out.all.push((index, address));
    }
    Ok(out)
}

/// Claim the walked addresses for the wallet and persist the new indexes.
///
/// Returns the claimed addresses that already carry history, which the
/// caller must fold into the wallet's aggregates.
pub fn claim_addresses<T: IndexTxn>(
    txn: &mut T,
    wallet: &mut Wallet,
    generated: &GeneratedAddresses,
) -> Result<Vec<Address>, IndexerError> {
    let mut with_history = Vec::new();
    for (index, address) in generated.existing.iter().chain(&generated.new) {
        let mut info = txn
            .get_address(address)?
            .unwrap_or_else(|| AddressInfo::unclaimed(address.clone()));
        if info.transactions > 0 {
            with_history.push(address.clone());
        }
        info.index = Some(*index);
        info.wallet_id = Some(wallet.id.clone());
        txn.put_address(&info)?;
    }

    wallet.highest_used_index = wallet.highest_used_index.max(generated.highest_used_index);
    wallet.last_generated_index = wallet.last_generated_index.max(generated.last_index);
    txn.put_wallet(wallet)?;

    debug!(
        wallet = %wallet.id,
        new = generated.new.len(),
        existing = generated.existing.len(),
        highest_used = wallet.highest_used_index,
        last = wallet.last_generated_index,
        "claimed wallet addresses"
    );
    Ok(with_history)
}

/// Generate and claim in one step.
pub fn extend_wallet<T: IndexTxn>(
    txn: &mut T,
    wallet: &mut Wallet,
    deriver: &XpubDeriver,
    used: &BTreeSet<Address>,
) -> Result<Vec<Address>, IndexerError> {
    let generated = generate_addresses(txn, wallet, deriver, used)?;
    claim_addresses(txn, wallet, &generated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use windex_nullables::NullStore;
    use windex_store::IndexStore;
    use windex_types::{Network, Timestamp, WalletId, WalletStatus};

    const XPUB: &str = "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8";

    fn wallet(max_gap: u16) -> Wallet {
        Wallet {
            id: WalletId::new("w"),
            xpubkey: XPUB.into(),
            auth_xpubkey: None,
            status: WalletStatus::Ready,
            max_gap,
            highest_used_index: -1,
            last_generated_index: -1,
            retry_count: 0,
            created_at: Timestamp::new(0),
            ready_at: None,
        }
    }

    #[test]
    fn fresh_wallet_gets_exactly_max_gap_addresses() {
        let store = NullStore::new();
        let txn = store.write_txn().unwrap();
        let deriver = XpubDeriver::new(XPUB, Network::Mainnet).unwrap();
        let out = generate_addresses(&txn, &wallet(5), &deriver, &BTreeSet::new()).unwrap();
        assert_eq!(out.all.len(), 5);
        assert_eq!(out.new.len(), 5);
        assert_eq!(out.highest_used_index, -1);
        assert_eq!(out.last_index, 4);
    }

    #[test]
    fn used_address_pushes_the_window() {
        let store = NullStore::new();
        let mut txn = store.write_txn().unwrap();
        let deriver = XpubDeriver::new(XPUB, Network::Mainnet).unwrap();
        let used = deriver.address_at(2).unwrap();
        let mut info = AddressInfo::unclaimed(used.clone());
        info.transactions = 2;
        txn.put_address(&info).unwrap();

        let out = generate_addresses(&txn, &wallet(3), &deriver, &BTreeSet::new()).unwrap();
        assert_eq!(out.highest_used_index, 2);
        assert_eq!(out.last_index, 5);
        assert_eq!(out.all.len(), 6);
        assert_eq!(out.existing, vec![(2, used)]);
        assert_eq!(out.new.len(), 5);
    }

    #[test]
    fn address_beyond_the_gap_is_not_reached() {
        let store = NullStore::new();
        let mut txn = store.write_txn().unwrap();
        let deriver = XpubDeriver::new(XPUB, Network::Mainnet).unwrap();
        let mut info = AddressInfo::unclaimed(deriver.address_at(3).unwrap());
        info.transactions = 1;
        txn.put_address(&info).unwrap();

        let out = generate_addresses(&txn, &wallet(3), &deriver, &BTreeSet::new()).unwrap();
        assert_eq!(out.highest_used_index, -1);
        assert_eq!(out.last_index, 2);
        assert!(out.existing.is_empty());
    }

    #[test]
    fn claimed_rows_are_reused_and_not_reclaimed() {
        let store = NullStore::new();
        let mut txn = store.write_txn().unwrap();
        let deriver = XpubDeriver::new(XPUB, Network::Mainnet).unwrap();
        let mut w = wallet(4);
        extend_wallet(&mut txn, &mut w, &deriver, &BTreeSet::new()).unwrap();
        assert_eq!(w.last_generated_index, 3);

        let touched: BTreeSet<Address> = [deriver.address_at(2).unwrap()].into_iter().collect();
        let out = generate_addresses(&txn, &w, &deriver, &touched).unwrap();
        assert_eq!(out.highest_used_index, 2);
        assert_eq!(out.last_index, 6);
        // Indexes 0..=3 are already claimed; only 4..=6 are new.
        assert_eq!(out.new.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![4, 5, 6]);
        assert_eq!(out.all.first().map(|(i, _)| *i), Some(0));
    }
}
