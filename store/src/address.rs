//! Address storage trait.

use crate::StoreError;
use serde::{Deserialize, Serialize};
use windex_types::{Address, WalletId};

/// Per-address record. `index` and `wallet_id` stay empty until a wallet
/// claims the address; transactions may arrive before that.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInfo {
    pub address: Address,
    pub index: Option<u32>,
    pub wallet_id: Option<WalletId>,
    /// Number of non-voided transactions touching this address.
    pub transactions: u64,
}

impl AddressInfo {
    pub fn unclaimed(address: Address) -> Self {
        Self {
            address,
            index: None,
            wallet_id: None,
            transactions: 0,
        }
    }
}

/// Trait for address storage.
pub trait AddressStore {
    fn get_address(&self, address: &Address) -> Result<Option<AddressInfo>, StoreError>;

    /// Write a record, maintaining the wallet/index lookup.
    fn put_address(&mut self, info: &AddressInfo) -> Result<(), StoreError>;

    /// Addresses claimed by a wallet, in index order.
    fn wallet_addresses(&self, wallet_id: &WalletId) -> Result<Vec<AddressInfo>, StoreError>;

    /// The address a wallet claimed at `index`, if any.
    fn wallet_address_at(
        &self,
        wallet_id: &WalletId,
        index: u32,
    ) -> Result<Option<AddressInfo>, StoreError>;

    /// Adjust the transaction counter, creating an unclaimed record if needed.
    fn add_address_transactions(
        &mut self,
        address: &Address,
        delta: i64,
    ) -> Result<AddressInfo, StoreError> {
        let mut info = self
            .get_address(address)?
            .unwrap_or_else(|| AddressInfo::unclaimed(address.clone()));
        info.transactions = info.transactions.saturating_add_signed(delta);
        self.put_address(&info)?;
        Ok(info)
    }
}
