//! Nullable infrastructure for deterministic testing.
//!
//! Every external collaborator of the indexer (clock, full node, notification
//! sink, storage) has a test-friendly implementation here that:
//! - Returns deterministic values
//! - Can be controlled programmatically
//! - Never touches the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod full_node;
pub mod notifier;
pub mod store;

pub use clock::NullClock;
pub use full_node::NullFullNode;
pub use notifier::NullNotifier;
pub use store::{NullStore, NullTxn};
