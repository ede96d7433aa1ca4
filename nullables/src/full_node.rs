//! Nullable full node: answers from a programmable table.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use windex_indexer::{FullNode, IndexerError};
use windex_types::{Height, TxId};

/// A full node whose void set and best height are set by the test.
#[derive(Default)]
pub struct NullFullNode {
    voided: Mutex<HashSet<TxId>>,
    best_height: AtomicU32,
    unreachable: AtomicBool,
}

impl NullFullNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `tx_id` as voided from now on.
    pub fn void(&self, tx_id: TxId) {
        self.voided.lock().unwrap().insert(tx_id);
    }

    pub fn set_best_height(&self, height: Height) {
        self.best_height.store(height, Ordering::SeqCst);
    }

    /// Make every query fail as if the node were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    fn check_reachable(&self) -> Result<(), IndexerError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(IndexerError::FullNode("null full node is unreachable".into()));
        }
        Ok(())
    }
}

impl FullNode for NullFullNode {
    fn is_voided(&self, tx_id: &TxId) -> Result<bool, IndexerError> {
        self.check_reachable()?;
        Ok(self.voided.lock().unwrap().contains(tx_id))
    }

    fn best_height(&self) -> Result<Height, IndexerError> {
        self.check_reachable()?;
        Ok(self.best_height.load(Ordering::SeqCst))
    }
}
