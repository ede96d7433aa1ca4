//! LMDB implementation of BalanceStore.
//!
//! Key format: `owner ++ 0 ++ token_id`, where the owner is an address or a
//! wallet id. A prefix scan on `owner ++ 0` lists every token it holds.

use heed::types::Bytes;
use heed::Database;

use windex_store::{BalanceStore, StoreError, TokenBalance};
use windex_types::{Address, TokenId, WalletId};

use crate::keys::{text_key, text_prefix};
use crate::txn::LmdbTxn;
use crate::LmdbError;

impl LmdbTxn<'_> {
    fn balances_of(
        &self,
        db: Database<Bytes, Bytes>,
        owner: &str,
    ) -> Result<Vec<(TokenId, TokenBalance)>, StoreError> {
        let prefix = text_prefix(owner);
        let mut out = Vec::new();
        for (key, val) in self.scan_prefix(db, &prefix)? {
            let token = std::str::from_utf8(&key[prefix.len()..])
                .map_err(|e| StoreError::Corruption(format!("balance key: {e}")))?;
            let row: TokenBalance = bincode::deserialize(&val).map_err(LmdbError::from)?;
            out.push((TokenId::new(token), row));
        }
        Ok(out)
    }
}

impl BalanceStore for LmdbTxn<'_> {
    fn get_address_balance(
        &self,
        address: &Address,
        token: &TokenId,
    ) -> Result<Option<TokenBalance>, StoreError> {
        let key = text_key(address.as_str(), token.as_str().as_bytes());
        self.get_value(self.env.address_balances_db, &key)
    }

    fn put_address_balance(
        &mut self,
        address: &Address,
        token: &TokenId,
        balance: &TokenBalance,
    ) -> Result<(), StoreError> {
        let key = text_key(address.as_str(), token.as_str().as_bytes());
        self.put_value(self.env.address_balances_db, &key, balance)
    }

    fn address_balances(&self, address: &Address) -> Result<Vec<(TokenId, TokenBalance)>, StoreError> {
        self.balances_of(self.env.address_balances_db, address.as_str())
    }

    fn get_wallet_balance(
        &self,
        wallet_id: &WalletId,
        token: &TokenId,
    ) -> Result<Option<TokenBalance>, StoreError> {
        let key = text_key(wallet_id.as_str(), token.as_str().as_bytes());
        self.get_value(self.env.wallet_balances_db, &key)
    }

    fn put_wallet_balance(
        &mut self,
        wallet_id: &WalletId,
        token: &TokenId,
        balance: &TokenBalance,
    ) -> Result<(), StoreError> {
        let key = text_key(wallet_id.as_str(), token.as_str().as_bytes());
        self.put_value(self.env.wallet_balances_db, &key, balance)
    }

    fn wallet_balances(&self, wallet_id: &WalletId) -> Result<Vec<(TokenId, TokenBalance)>, StoreError> {
        self.balances_of(self.env.wallet_balances_db, wallet_id.as_str())
    }
}
