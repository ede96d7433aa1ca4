//! Metadata storage trait.

use crate::StoreError;
use windex_types::Height;

const BEST_HEIGHT_KEY: &str = "best_block_height";

/// Generic key-value store for internal bookkeeping that doesn't belong in
/// any domain-specific store.
pub trait MetaStore {
    fn put_meta(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Height of the best block seen so far (0 before the first block).
    fn best_height(&self) -> Result<Height, StoreError> {
        match self.get_meta(BEST_HEIGHT_KEY)? {
            Some(bytes) => {
                let arr: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
                    StoreError::Corruption("best_block_height has unexpected byte length".into())
                })?;
                Ok(Height::from_be_bytes(arr))
            }
            None => Ok(0),
        }
    }

    fn set_best_height(&mut self, height: Height) -> Result<(), StoreError> {
        self.put_meta(BEST_HEIGHT_KEY, &height.to_be_bytes())
    }
}
