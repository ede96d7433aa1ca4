//! LMDB implementation of MetaStore.

use windex_store::{MetaStore, StoreError};

use crate::txn::LmdbTxn;
use crate::LmdbError;

impl MetaStore for LmdbTxn<'_> {
    fn put_meta(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.put_raw(self.env.meta_db, key.as_bytes(), value)
    }

    fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let val = self
            .env
            .meta_db
            .get(self.ro(), key.as_bytes())
            .map_err(LmdbError::from)?;
        Ok(val.map(<[u8]>::to_vec))
    }
}
