//! LMDB environment setup.

use std::fs;
use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use tracing::info;

use windex_store::{IndexStore, StoreError};

use crate::txn::LmdbTxn;
use crate::LmdbError;

/// Number of named databases opened below.
const DATABASE_COUNT: u32 = 16;

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Env,
    /// `tx_id ++ index` → `Utxo`
    pub(crate) utxos_db: Database<Bytes, Bytes>,
    /// `address ++ 0 ++ tx_id ++ index` → ()
    pub(crate) address_utxos_db: Database<Bytes, Bytes>,
    /// `heightlock ++ tx_id ++ index` → (), only for locked live rows
    pub(crate) height_locks_db: Database<Bytes, Bytes>,
    /// `timelock ++ tx_id ++ index` → (), only for locked live rows
    pub(crate) time_locks_db: Database<Bytes, Bytes>,
    /// `proposal ++ 0 ++ tx_id ++ index` → ()
    pub(crate) proposal_utxos_db: Database<Bytes, Bytes>,
    /// `address` → `AddressInfo`
    pub(crate) addresses_db: Database<Bytes, Bytes>,
    /// `wallet_id ++ 0 ++ index` → address
    pub(crate) wallet_addresses_db: Database<Bytes, Bytes>,
    /// `address ++ 0 ++ token` → `TokenBalance`
    pub(crate) address_balances_db: Database<Bytes, Bytes>,
    /// `wallet_id ++ 0 ++ token` → `TokenBalance`
    pub(crate) wallet_balances_db: Database<Bytes, Bytes>,
    /// `address ++ 0 ++ timestamp ++ tx_id ++ token` → `TxHistoryEntry`
    pub(crate) address_history_db: Database<Bytes, Bytes>,
    /// `wallet_id ++ 0 ++ timestamp ++ tx_id ++ token` → `TxHistoryEntry`
    pub(crate) wallet_history_db: Database<Bytes, Bytes>,
    pub(crate) wallets_db: Database<Bytes, Bytes>,
    pub(crate) txs_db: Database<Bytes, Bytes>,
    pub(crate) tokens_db: Database<Bytes, Bytes>,
    pub(crate) proposals_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path.
    ///
    /// `max_dbs` is raised to the number of databases this backend needs if
    /// it is smaller.
    pub fn open(path: &Path, max_dbs: u32, map_size: usize) -> Result<Self, LmdbError> {
        fs::create_dir_all(path).map_err(heed::Error::Io)?;
        // SAFETY: the environment is opened once per path by this process
        // and never memory-mapped elsewhere concurrently.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(max_dbs.max(DATABASE_COUNT))
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let mut create = |name: &str| -> Result<Database<Bytes, Bytes>, LmdbError> {
            Ok(env.create_database(&mut wtxn, Some(name))?)
        };
        let store = Self {
            utxos_db: create("utxos")?,
            address_utxos_db: create("address_utxos")?,
            height_locks_db: create("height_locks")?,
            time_locks_db: create("time_locks")?,
            proposal_utxos_db: create("proposal_utxos")?,
            addresses_db: create("addresses")?,
            wallet_addresses_db: create("wallet_addresses")?,
            address_balances_db: create("address_balances")?,
            wallet_balances_db: create("wallet_balances")?,
            address_history_db: create("address_history")?,
            wallet_history_db: create("wallet_history")?,
            wallets_db: create("wallets")?,
            txs_db: create("txs")?,
            tokens_db: create("tokens")?,
            proposals_db: create("proposals")?,
            meta_db: create("meta")?,
            env: env.clone(),
        };
        wtxn.commit()?;

        info!(path = %path.display(), map_size, "opened LMDB environment");
        Ok(store)
    }

    pub fn env(&self) -> &Env {
        &self.env
    }
}

impl IndexStore for LmdbEnvironment {
    type Txn<'a> = LmdbTxn<'a>;

    fn write_txn(&self) -> Result<LmdbTxn<'_>, StoreError> {
        LmdbTxn::new(self)
    }

    fn read_txn(&self) -> Result<LmdbTxn<'_>, StoreError> {
        LmdbTxn::new_read(self)
    }
}
