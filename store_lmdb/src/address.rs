//! LMDB implementation of AddressStore.

use windex_store::{AddressInfo, AddressStore, StoreError};
use windex_types::{Address, WalletId};

use crate::keys::{text_key, text_prefix};
use crate::txn::LmdbTxn;

fn wallet_index_key(wallet_id: &WalletId, index: u32) -> Vec<u8> {
    text_key(wallet_id.as_str(), &index.to_be_bytes())
}

impl AddressStore for LmdbTxn<'_> {
    fn get_address(&self, address: &Address) -> Result<Option<AddressInfo>, StoreError> {
        self.get_value(self.env.addresses_db, address.as_str().as_bytes())
    }

    fn put_address(&mut self, info: &AddressInfo) -> Result<(), StoreError> {
        if let Some(AddressInfo {
            wallet_id: Some(wallet_id),
            index: Some(index),
            ..
        }) = self.get_address(&info.address)?
        {
            self.delete(self.env.wallet_addresses_db, &wallet_index_key(&wallet_id, index))?;
        }
        if let (Some(wallet_id), Some(index)) = (&info.wallet_id, info.index) {
            self.put_raw(
                self.env.wallet_addresses_db,
                &wallet_index_key(wallet_id, index),
                info.address.as_str().as_bytes(),
            )?;
        }
        self.put_value(self.env.addresses_db, info.address.as_str().as_bytes(), info)
    }

    fn wallet_addresses(&self, wallet_id: &WalletId) -> Result<Vec<AddressInfo>, StoreError> {
        let entries = self.scan_prefix(self.env.wallet_addresses_db, &text_prefix(wallet_id.as_str()))?;
        let mut out = Vec::with_capacity(entries.len());
        for (_, raw) in entries {
            let address = String::from_utf8(raw)
                .map_err(|e| StoreError::Corruption(format!("wallet address index: {e}")))?;
            let info = self
                .get_address(&Address::new(address.clone()))?
                .ok_or_else(|| StoreError::Corruption(format!("dangling wallet address {address}")))?;
            out.push(info);
        }
        Ok(out)
    }

    fn wallet_address_at(
        &self,
        wallet_id: &WalletId,
        index: u32,
    ) -> Result<Option<AddressInfo>, StoreError> {
        let raw = self
            .env
            .wallet_addresses_db
            .get(self.ro(), &wallet_index_key(wallet_id, index))
            .map_err(crate::LmdbError::from)?;
        match raw {
            Some(bytes) => {
                let address = std::str::from_utf8(bytes)
                    .map_err(|e| StoreError::Corruption(format!("wallet address index: {e}")))?;
                self.get_address(&Address::from(address))
            }
            None => Ok(None),
        }
    }
}
