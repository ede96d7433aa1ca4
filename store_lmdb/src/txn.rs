//! The unit of work: one LMDB transaction spanning every database.
//!
//! If the handle is dropped without calling [`IndexTxn::commit`], all
//! operations are rolled back (the underlying LMDB transaction is aborted).
//! Handles opened with [`IndexStore::read_txn`](windex_store::IndexStore::read_txn)
//! wrap an LMDB read transaction and refuse every mutation.

use std::ops::Bound;

use heed::types::Bytes;
use heed::{Database, RoTxn, RwTxn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use windex_store::{IndexTxn, StoreError};

use crate::environment::LmdbEnvironment;
use crate::keys::increment_prefix;
use crate::LmdbError;

pub(crate) enum Handle<'a> {
    Write(RwTxn<'a>),
    Read(RoTxn<'a>),
}

pub struct LmdbTxn<'a> {
    pub(crate) txn: Handle<'a>,
    pub(crate) env: &'a LmdbEnvironment,
}

impl<'a> LmdbTxn<'a> {
    pub(crate) fn new(env: &'a LmdbEnvironment) -> Result<Self, StoreError> {
        let txn = env.env().write_txn().map_err(LmdbError::from)?;
        Ok(Self { txn: Handle::Write(txn), env })
    }

    pub(crate) fn new_read(env: &'a LmdbEnvironment) -> Result<Self, StoreError> {
        let txn = env.env().read_txn().map_err(LmdbError::from)?;
        Ok(Self { txn: Handle::Read(txn), env })
    }

    pub(crate) fn ro(&self) -> &RoTxn<'a> {
        match &self.txn {
            Handle::Write(txn) => txn,
            Handle::Read(txn) => txn,
        }
    }

    fn rw(&mut self) -> Result<&mut RwTxn<'a>, StoreError> {
        match &mut self.txn {
            Handle::Write(txn) => Ok(txn),
            Handle::Read(_) => Err(StoreError::Backend("write on a read-only transaction".into())),
        }
    }

    pub(crate) fn get_value<T: DeserializeOwned>(
        &self,
        db: Database<Bytes, Bytes>,
        key: &[u8],
    ) -> Result<Option<T>, StoreError> {
        match db.get(self.ro(), key).map_err(LmdbError::from)? {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes).map_err(LmdbError::from)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn put_value<T: Serialize>(
        &mut self,
        db: Database<Bytes, Bytes>,
        key: &[u8],
        value: &T,
    ) -> Result<(), StoreError> {
        let bytes = bincode::serialize(value).map_err(LmdbError::from)?;
        db.put(self.rw()?, key, &bytes).map_err(LmdbError::from)?;
        Ok(())
    }

    pub(crate) fn put_raw(
        &mut self,
        db: Database<Bytes, Bytes>,
        key: &[u8],
        value: &[u8],
    ) -> Result<(), StoreError> {
        db.put(self.rw()?, key, value).map_err(LmdbError::from)?;
        Ok(())
    }

    pub(crate) fn delete(&mut self, db: Database<Bytes, Bytes>, key: &[u8]) -> Result<(), StoreError> {
        db.delete(self.rw()?, key).map_err(LmdbError::from)?;
        Ok(())
    }

    /// Every `(key, value)` whose key starts with `prefix`, in key order.
    pub(crate) fn scan_prefix(
        &self,
        db: Database<Bytes, Bytes>,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let mut upper = prefix.to_vec();
        increment_prefix(&mut upper);
        let bounds = if upper.is_empty() {
            (Bound::Included(prefix), Bound::Unbounded)
        } else {
            (Bound::Included(prefix), Bound::Excluded(upper.as_slice()))
        };
        self.scan(db, &bounds)
    }

    /// Every `(key, value)` with a key strictly below `upper`.
    pub(crate) fn scan_below(
        &self,
        db: Database<Bytes, Bytes>,
        upper: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        self.scan(db, &(Bound::Unbounded, Bound::Excluded(upper)))
    }

    fn scan(
        &self,
        db: Database<Bytes, Bytes>,
        bounds: &(Bound<&[u8]>, Bound<&[u8]>),
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let iter = db.range(self.ro(), bounds).map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for result in iter {
            let (key, val) = result.map_err(LmdbError::from)?;
            results.push((key.to_vec(), val.to_vec()));
        }
        Ok(results)
    }

    /// Decode every value of a prefix scan.
    pub(crate) fn values_with_prefix<T: DeserializeOwned>(
        &self,
        db: Database<Bytes, Bytes>,
        prefix: &[u8],
    ) -> Result<Vec<T>, StoreError> {
        self.scan_prefix(db, prefix)?
            .into_iter()
            .map(|(_, val)| Ok(bincode::deserialize(&val).map_err(LmdbError::from)?))
            .collect()
    }
}

impl IndexTxn for LmdbTxn<'_> {
    fn commit(self) -> Result<(), StoreError> {
        match self.txn {
            Handle::Write(txn) => txn.commit().map_err(LmdbError::from)?,
            Handle::Read(txn) => drop(txn),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use windex_store::{IndexStore, IndexTxn, MetaStore, Wallet, WalletStore};
    use windex_types::{Timestamp, WalletId, WalletStatus};

    use crate::LmdbEnvironment;

    fn open_test_env() -> (tempfile::TempDir, LmdbEnvironment) {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 16, 1 << 24).unwrap();
        (dir, env)
    }

    fn wallet() -> Wallet {
        Wallet {
            id: WalletId::new("w1"),
            xpubkey: "xpub".into(),
            auth_xpubkey: None,
            status: WalletStatus::Creating,
            max_gap: 20,
            highest_used_index: -1,
            last_generated_index: -1,
            retry_count: 0,
            created_at: Timestamp::new(1),
            ready_at: None,
        }
    }

    #[test]
    fn committed_writes_are_visible() {
        let (_dir, env) = open_test_env();
        let mut txn = env.write_txn().unwrap();
        txn.put_wallet(&wallet()).unwrap();
        txn.set_best_height(42).unwrap();
        txn.commit().unwrap();

        let txn = env.write_txn().unwrap();
        assert_eq!(txn.get_wallet(&WalletId::new("w1")).unwrap(), Some(wallet()));
        assert_eq!(txn.best_height().unwrap(), 42);
    }

    #[test]
    fn read_txn_sees_committed_state_and_refuses_writes() {
        let (_dir, env) = open_test_env();
        let mut txn = env.write_txn().unwrap();
        txn.set_best_height(7).unwrap();
        txn.commit().unwrap();

        let mut read = env.read_txn().unwrap();
        assert_eq!(read.best_height().unwrap(), 7);
        assert!(read.set_best_height(8).is_err());
        assert!(read.put_wallet(&wallet()).is_err());
        read.commit().unwrap();

        let txn = env.write_txn().unwrap();
        assert_eq!(txn.best_height().unwrap(), 7);
        assert_eq!(txn.get_wallet(&WalletId::new("w1")).unwrap(), None);
    }

    #[test]
    fn reader_does_not_wait_for_open_writer() {
        let (_dir, env) = open_test_env();
        let mut writer = env.write_txn().unwrap();
        writer.set_best_height(3).unwrap();

        std::thread::scope(|s| {
            let seen = s.spawn(|| env.read_txn().unwrap().best_height().unwrap());
            assert_eq!(seen.join().unwrap(), 0);
        });
        writer.commit().unwrap();
    }

    #[test]
    fn dropped_txn_rolls_back() {
        let (_dir, env) = open_test_env();
        {
            let mut txn = env.write_txn().unwrap();
            txn.put_wallet(&wallet()).unwrap();
        }
        let txn = env.write_txn().unwrap();
        assert_eq!(txn.get_wallet(&WalletId::new("w1")).unwrap(), None);
        assert_eq!(txn.best_height().unwrap(), 0);
    }
}
