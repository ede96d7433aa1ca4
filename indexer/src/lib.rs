//! Transaction ingestion and balance reconciliation engine.
//!
//! Consumes transaction and block events from a full node and keeps the
//! derived wallet state in a [`windex_store::IndexStore`]: UTXO ownership,
//! locked and unlocked balances per address and per wallet, transaction
//! history and wallet address gaps.

pub mod balances;
pub mod config;
pub mod error;
pub mod gap;
pub mod interfaces;
pub mod locks;
pub mod logging;
pub mod processor;
pub mod proposals;
pub mod queries;
pub mod wallet;

pub use config::IndexerConfig;
pub use error::IndexerError;
pub use interfaces::{FullNode, Notifier, WalletEvent};
pub use logging::{init_logging, LogFormat};
pub use processor::{Indexer, ProcessResult, VoidResult};
pub use queries::UtxoFilter;
