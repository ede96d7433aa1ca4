//! Abstract storage traits for the wallet indexer.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits.
//!
//! All mutation happens inside a unit of work obtained from
//! [`IndexStore::write_txn`]. Nothing is visible to other units until
//! [`IndexTxn::commit`]; dropping the handle rolls everything back.

pub mod address;
pub mod balance;
pub mod error;
pub mod history;
pub mod meta;
pub mod proposal;
pub mod token;
pub mod transaction;
pub mod utxo;
pub mod wallet;

pub use address::{AddressInfo, AddressStore};
pub use balance::{BalanceStore, TokenBalance};
pub use error::StoreError;
pub use history::{HistoryStore, TxHistoryEntry};
pub use meta::MetaStore;
pub use proposal::{ProposalId, ProposalStore, TxProposal};
pub use token::{TokenInfo, TokenStore};
pub use transaction::{TransactionStore, TxRecord};
pub use utxo::{Utxo, UtxoRef, UtxoStore};
pub use wallet::{Wallet, WalletStore};

use windex_types::{Address, TokenId, WalletId};

/// A storage backend able to open units of work.
pub trait IndexStore: Send + Sync {
    type Txn<'a>: IndexTxn
    where
        Self: 'a;

    /// Open a write transaction. Backends serialize writers, so the returned
    /// handle has exclusive access until it is committed or dropped.
    fn write_txn(&self) -> Result<Self::Txn<'_>, StoreError>;

    /// Open a unit of work for reads only. Mutations through it fail.
    ///
    /// Backends with snapshot readers do not wait for an open writer. The
    /// default falls back to [`IndexStore::write_txn`], which serializes
    /// readers behind ingestion.
    fn read_txn(&self) -> Result<Self::Txn<'_>, StoreError> {
        self.write_txn()
    }
}

/// One unit of work over every store.
pub trait IndexTxn:
    UtxoStore
    + AddressStore
    + BalanceStore
    + HistoryStore
    + WalletStore
    + TransactionStore
    + TokenStore
    + ProposalStore
    + MetaStore
    + Sized
{
    fn commit(self) -> Result<(), StoreError>;

    /// Recompute an address aggregate's authorities and `lock_expires` from
    /// its live UTXOs.
    fn refresh_address_balance(
        &mut self,
        address: &Address,
        token: &TokenId,
    ) -> Result<Option<TokenBalance>, StoreError> {
        let Some(mut row) = self.get_address_balance(address, token)? else {
            return Ok(None);
        };
        let utxos = self.address_utxos(address, Some(token))?;
        row.refresh_from(&utxos);
        self.put_address_balance(address, token, &row)?;
        Ok(Some(row))
    }

    /// Wallet counterpart of [`IndexTxn::refresh_address_balance`], over
    /// every address the wallet has claimed.
    fn refresh_wallet_balance(
        &mut self,
        wallet_id: &WalletId,
        token: &TokenId,
    ) -> Result<Option<TokenBalance>, StoreError> {
        let Some(mut row) = self.get_wallet_balance(wallet_id, token)? else {
            return Ok(None);
        };
        let mut utxos = Vec::new();
        for info in self.wallet_addresses(wallet_id)? {
            utxos.extend(self.address_utxos(&info.address, Some(token))?);
        }
        row.refresh_from(&utxos);
        self.put_wallet_balance(wallet_id, token, &row)?;
        Ok(Some(row))
    }
}
