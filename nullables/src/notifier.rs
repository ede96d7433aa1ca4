//! Nullable notifier: record notifications without delivering them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use windex_indexer::{IndexerError, Notifier, WalletEvent};
use windex_types::WalletId;

/// A notification sink that records every event it is handed.
#[derive(Default)]
pub struct NullNotifier {
    sent: Mutex<Vec<(WalletId, WalletEvent)>>,
    failing: AtomicBool,
}

impl NullNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every notification from now on (they are still not recorded).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All recorded notifications, oldest first.
    pub fn sent(&self) -> Vec<(WalletId, WalletEvent)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl Notifier for NullNotifier {
    fn notify(&self, wallet_id: &WalletId, event: &WalletEvent) -> Result<(), IndexerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(IndexerError::Notify("null notifier set to fail".into()));
        }
        self.sent.lock().unwrap().push((wallet_id.clone(), event.clone()));
        Ok(())
    }
}
