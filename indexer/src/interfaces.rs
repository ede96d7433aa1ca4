//! Collaborators the engine consumes but does not implement: the full node
//! it confirms voids with, and the sink it pushes wallet notifications to.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use windex_types::{Height, Timestamp, TokenId, TxId, WalletId};

use crate::IndexerError;

/// Read-only queries against the ledger's full node.
pub trait FullNode: Send + Sync {
    /// Whether the node currently considers `tx_id` voided.
    fn is_voided(&self, tx_id: &TxId) -> Result<bool, IndexerError>;

    /// Height of the node's best block.
    fn best_height(&self) -> Result<Height, IndexerError>;
}

/// Outbound notification sink. Delivery is best effort.
pub trait Notifier: Send + Sync {
    fn notify(&self, wallet_id: &WalletId, event: &WalletEvent) -> Result<(), IndexerError>;
}

/// What a wallet is told after a unit of work commits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WalletEvent {
    /// A transaction touched the wallet; `balances` is its net effect per token.
    NewTx {
        tx_id: TxId,
        timestamp: Timestamp,
        balances: BTreeMap<TokenId, i64>,
    },
    /// A previously notified transaction was voided and reversed.
    TxVoided { tx_id: TxId },
    /// Address loading finished; the wallet can be queried.
    WalletReady,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_a_type_tag() {
        let event = WalletEvent::TxVoided {
            tx_id: TxId::new([0xab; 32]),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "tx_voided");
        assert_eq!(json["tx_id"], "ab".repeat(32));

        let ready = serde_json::to_string(&WalletEvent::WalletReady).unwrap();
        assert_eq!(ready, r#"{"type":"wallet_ready"}"#);
    }

    #[test]
    fn new_tx_round_trips() {
        let event = WalletEvent::NewTx {
            tx_id: TxId::new([1; 32]),
            timestamp: Timestamp::new(10),
            balances: [(TokenId::native(), -5)].into_iter().collect(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(serde_json::from_str::<WalletEvent>(&json).unwrap(), event);
    }
}
