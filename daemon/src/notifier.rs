//! Notification sink that writes wallet events to the log.

use tracing::info;

use windex_indexer::{IndexerError, Notifier, WalletEvent};
use windex_types::WalletId;

/// Emits every wallet event as a JSON payload on the `windex::notify` target.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, wallet_id: &WalletId, event: &WalletEvent) -> Result<(), IndexerError> {
        let payload = serde_json::to_string(event).map_err(|e| IndexerError::Notify(e.to_string()))?;
        info!(target: "windex::notify", wallet = %wallet_id, %payload, "wallet event");
        Ok(())
    }
}
